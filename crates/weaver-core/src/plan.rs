//! Decomposition of a [`FabricConfig`] into an ordered task sequence.
//!
//! The configuration schema is a five-level tree (tenant → VRF → bridge
//! domain, tenant → app profile → EPG) with no cross-phase cycles, so a
//! fixed five-phase ordering is sufficient — no general topological sort.
//! Tasks within a phase keep the config's insertion order.

use serde::{Deserialize, Serialize};

use crate::config::{
    AppProfileConfig, BridgeDomainConfig, EpgConfig, FabricConfig, TenantConfig, VrfConfig,
};
use crate::error::{Result, WeaverError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Tenant,
    Vrf,
    BridgeDomain,
    AppProfile,
    Epg,
}

impl ResourceKind {
    /// Human-facing label used in log messages.
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Tenant => "tenant",
            ResourceKind::Vrf => "VRF",
            ResourceKind::BridgeDomain => "Bridge Domain",
            ResourceKind::AppProfile => "Application Profile",
            ResourceKind::Epg => "EPG",
        }
    }
}

/// Typed payload for one task, keyed by resource kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskSpec {
    Tenant(TenantConfig),
    Vrf(VrfConfig),
    BridgeDomain(BridgeDomainConfig),
    AppProfile(AppProfileConfig),
    Epg(EpgConfig),
}

/// One unit of work within a job's plan.
///
/// Derived at job start and discarded after execution — a task has no
/// identity of its own; its outcome is folded into job progress and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningTask {
    /// Task name in the `create_<kind>_<target>` scheme, e.g. `create_tenant_common`.
    pub name: String,
    pub kind: ResourceKind,
    /// Name of the resource this task creates.
    pub target: String,
    /// Qualified refs of resources that must already exist, e.g. `vrf/common/prod_vrf`.
    pub depends_on: Vec<String>,
    pub spec: TaskSpec,
}

impl ProvisioningTask {
    /// Qualified ref of the resource this task creates.
    pub fn resource_ref(&self) -> String {
        match &self.spec {
            TaskSpec::Tenant(t) => format!("tenant/{}", t.name),
            TaskSpec::Vrf(v) => format!("vrf/{}/{}", v.tenant, v.name),
            TaskSpec::BridgeDomain(b) => format!("bd/{}/{}", b.tenant, b.name),
            TaskSpec::AppProfile(a) => format!("ap/{}/{}", a.tenant, a.name),
            TaskSpec::Epg(e) => format!("epg/{}/{}/{}", e.tenant, e.app_profile, e.name),
        }
    }
}

/// Decompose `config` into tasks in strict dependency order: tenants, then
/// VRFs, then bridge domains, then application profiles, then EPGs.
///
/// Produces exactly `config.entity_count()` tasks. Fails only when a parent
/// reference cannot be resolved — unreachable for configs that passed
/// [`crate::validate::validate`], kept as a defensive check for callers that
/// bypass the creation gate.
pub fn plan(config: &FabricConfig) -> Result<Vec<ProvisioningTask>> {
    let mut tasks = Vec::with_capacity(config.entity_count());

    for tenant in &config.tenants {
        tasks.push(ProvisioningTask {
            name: format!("create_tenant_{}", tenant.name),
            kind: ResourceKind::Tenant,
            target: tenant.name.clone(),
            depends_on: Vec::new(),
            spec: TaskSpec::Tenant(tenant.clone()),
        });
    }

    for vrf in &config.vrfs {
        tasks.push(ProvisioningTask {
            name: format!("create_vrf_{}", vrf.name),
            kind: ResourceKind::Vrf,
            target: vrf.name.clone(),
            depends_on: vec![tenant_ref(config, &vrf.tenant, "VRF", &vrf.name)?],
            spec: TaskSpec::Vrf(vrf.clone()),
        });
    }

    for bd in &config.bridge_domains {
        let tenant = tenant_ref(config, &bd.tenant, "bridge domain", &bd.name)?;
        let vrf = config
            .vrfs
            .iter()
            .find(|v| v.tenant == bd.tenant && v.name == bd.vrf)
            .map(|v| format!("vrf/{}/{}", v.tenant, v.name))
            .ok_or_else(|| {
                WeaverError::Planning(format!(
                    "bridge domain '{}' references unresolved VRF '{}' in tenant '{}'",
                    bd.name, bd.vrf, bd.tenant
                ))
            })?;
        tasks.push(ProvisioningTask {
            name: format!("create_bd_{}", bd.name),
            kind: ResourceKind::BridgeDomain,
            target: bd.name.clone(),
            depends_on: vec![tenant, vrf],
            spec: TaskSpec::BridgeDomain(bd.clone()),
        });
    }

    for ap in &config.app_profiles {
        tasks.push(ProvisioningTask {
            name: format!("create_ap_{}", ap.name),
            kind: ResourceKind::AppProfile,
            target: ap.name.clone(),
            depends_on: vec![tenant_ref(config, &ap.tenant, "application profile", &ap.name)?],
            spec: TaskSpec::AppProfile(ap.clone()),
        });
    }

    for epg in &config.epgs {
        let tenant = tenant_ref(config, &epg.tenant, "EPG", &epg.name)?;
        let ap = config
            .app_profiles
            .iter()
            .find(|a| a.tenant == epg.tenant && a.name == epg.app_profile)
            .map(|a| format!("ap/{}/{}", a.tenant, a.name))
            .ok_or_else(|| {
                WeaverError::Planning(format!(
                    "EPG '{}' references unresolved application profile '{}' in tenant '{}'",
                    epg.name, epg.app_profile, epg.tenant
                ))
            })?;
        let bd = config
            .bridge_domains
            .iter()
            .find(|b| b.tenant == epg.tenant && b.name == epg.bridge_domain)
            .map(|b| format!("bd/{}/{}", b.tenant, b.name))
            .ok_or_else(|| {
                WeaverError::Planning(format!(
                    "EPG '{}' references unresolved bridge domain '{}' in tenant '{}'",
                    epg.name, epg.bridge_domain, epg.tenant
                ))
            })?;
        tasks.push(ProvisioningTask {
            name: format!("create_epg_{}", epg.name),
            kind: ResourceKind::Epg,
            target: epg.name.clone(),
            depends_on: vec![tenant, ap, bd],
            spec: TaskSpec::Epg(epg.clone()),
        });
    }

    Ok(tasks)
}

fn tenant_ref(config: &FabricConfig, tenant: &str, kind: &str, name: &str) -> Result<String> {
    if config.tenants.iter().any(|t| t.name == tenant) {
        Ok(format!("tenant/{tenant}"))
    } else {
        Err(WeaverError::Planning(format!(
            "{kind} '{name}' references unresolved tenant '{tenant}'"
        )))
    }
}

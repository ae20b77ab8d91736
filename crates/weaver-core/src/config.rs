//! Declarative fabric configuration.
//!
//! A [`FabricConfig`] describes everything one provisioning job creates on
//! the controller: tenants, VRFs, bridge domains, application profiles, and
//! EPGs. Child entities reference their parents by name (a string foreign
//! key), never by position — [`crate::validate`] checks that every reference
//! resolves before a job may be created.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FabricType {
    It,
    Ot,
}

/// VRF policy-control enforcement preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    #[default]
    Enforced,
    Unenforced,
}

impl EnforcementMode {
    /// The wire value the controller expects (`pcEnfPref`).
    pub fn as_str(&self) -> &'static str {
        match self {
            EnforcementMode::Enforced => "enforced",
            EnforcementMode::Unenforced => "unenforced",
        }
    }
}

/// Connection details for the fabric controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerCredentials {
    pub host: String,
    pub username: String,
    pub secret: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub verify_tls: bool,
}

fn default_port() -> u16 {
    443
}

impl ControllerCredentials {
    /// Copy with the secret masked, for API responses and diagnostics.
    pub fn redacted(&self) -> Self {
        Self {
            secret: "***".into(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VrfConfig {
    pub name: String,
    /// Owning tenant, by name.
    pub tenant: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enforcement: EnforcementMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeDomainConfig {
    pub name: String,
    pub tenant: String,
    /// Associated VRF, which must live under the same tenant.
    pub vrf: String,
    /// Gateway subnet, e.g. `10.1.1.1/24`.
    #[serde(default)]
    pub subnet: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppProfileConfig {
    pub name: String,
    pub tenant: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpgConfig {
    pub name: String,
    pub tenant: String,
    /// Parent application profile, within the same tenant.
    pub app_profile: String,
    /// Associated bridge domain, within the same tenant.
    pub bridge_domain: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Complete declarative configuration for one provisioning job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabricConfig {
    pub site_code: String,
    pub fabric_type: FabricType,
    pub controller: ControllerCredentials,
    #[serde(default)]
    pub tenants: Vec<TenantConfig>,
    #[serde(default)]
    pub vrfs: Vec<VrfConfig>,
    #[serde(default)]
    pub bridge_domains: Vec<BridgeDomainConfig>,
    #[serde(default)]
    pub app_profiles: Vec<AppProfileConfig>,
    #[serde(default)]
    pub epgs: Vec<EpgConfig>,
}

impl FabricConfig {
    /// Total number of entities across all five kinds.
    pub fn entity_count(&self) -> usize {
        self.tenants.len()
            + self.vrfs.len()
            + self.bridge_domains.len()
            + self.app_profiles.len()
            + self.epgs.len()
    }

    /// Copy with controller credentials masked.
    pub fn redacted(&self) -> Self {
        Self {
            controller: self.controller.redacted(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_defaults_apply() {
        let creds: ControllerCredentials = serde_json::from_value(serde_json::json!({
            "host": "10.0.0.1",
            "username": "admin",
            "secret": "s3cret"
        }))
        .unwrap();
        assert_eq!(creds.port, 443);
        assert!(!creds.verify_tls);
    }

    #[test]
    fn redacted_masks_secret_only() {
        let creds = ControllerCredentials {
            host: "apic.example.net".into(),
            username: "admin".into(),
            secret: "s3cret".into(),
            port: 8443,
            verify_tls: true,
        };
        let masked = creds.redacted();
        assert_eq!(masked.secret, "***");
        assert_eq!(masked.host, "apic.example.net");
        assert_eq!(masked.port, 8443);
    }

    #[test]
    fn fabric_type_round_trips_lowercase() {
        assert_eq!(serde_json::to_string(&FabricType::It).unwrap(), "\"it\"");
        let ot: FabricType = serde_json::from_str("\"ot\"").unwrap();
        assert_eq!(ot, FabricType::Ot);
    }

    #[test]
    fn enforcement_defaults_to_enforced() {
        let vrf: VrfConfig = serde_json::from_value(serde_json::json!({
            "name": "prod_vrf",
            "tenant": "common"
        }))
        .unwrap();
        assert_eq!(vrf.enforcement, EnforcementMode::Enforced);
    }

    #[test]
    fn entity_count_sums_all_kinds() {
        let config: FabricConfig = serde_json::from_value(serde_json::json!({
            "site_code": "AUNTH",
            "fabric_type": "it",
            "controller": {"host": "h", "username": "u", "secret": "p"},
            "tenants": [{"name": "common"}],
            "vrfs": [{"name": "v1", "tenant": "common"}],
            "bridge_domains": [{"name": "b1", "tenant": "common", "vrf": "v1"}]
        }))
        .unwrap();
        assert_eq!(config.entity_count(), 3);
    }
}

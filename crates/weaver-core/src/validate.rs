//! Pre-flight validation of a [`FabricConfig`].
//!
//! Validation is pure and deterministic: the same config always produces the
//! same [`ValidationResult`]. All violations are collected — validation never
//! aborts on the first error — so an operator sees the full list at once.
//!
//! Checks run in three passes:
//! 1. structural — required fields present, site code in the allow-list;
//! 2. referential — every parent reference resolves to a declared entity;
//! 3. uniqueness — no duplicate names within the same owning scope.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::FabricConfig;

/// Configurable validation rules.
///
/// Site codes are an allow-list rather than a hardcoded enum so a deployment
/// can extend the set without a rebuild.
#[derive(Debug, Clone)]
pub struct Ruleset {
    pub site_codes: Vec<String>,
}

impl Default for Ruleset {
    fn default() -> Self {
        Self {
            site_codes: vec!["AUNTH".into(), "AUSTH".into(), "AUTER".into()],
        }
    }
}

/// Outcome of validating one configuration. Transient — never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Validate `config` against the default ruleset.
pub fn validate(config: &FabricConfig) -> ValidationResult {
    validate_with(config, &Ruleset::default())
}

/// Validate `config` against a caller-supplied ruleset.
pub fn validate_with(config: &FabricConfig, rules: &Ruleset) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // --- structural ---
    if !rules.site_codes.iter().any(|s| s == &config.site_code) {
        errors.push(format!(
            "Unknown site code '{}' (expected one of: {})",
            config.site_code,
            rules.site_codes.join(", ")
        ));
    }
    if config.controller.host.trim().is_empty() {
        errors.push("Controller host must be specified".into());
    }
    if config.controller.username.trim().is_empty() {
        errors.push("Controller username must be specified".into());
    }
    if config.tenants.is_empty() {
        errors.push("At least one tenant must be specified".into());
    }
    for tenant in &config.tenants {
        if tenant.name.trim().is_empty() {
            errors.push("Tenant name must not be empty".into());
        } else if tenant.description.is_none() {
            warnings.push(format!("Tenant '{}' has no description", tenant.name));
        }
    }
    for vrf in &config.vrfs {
        if vrf.name.trim().is_empty() {
            errors.push("VRF name must not be empty".into());
        }
    }
    for bd in &config.bridge_domains {
        if bd.name.trim().is_empty() {
            errors.push("Bridge domain name must not be empty".into());
        }
    }
    for ap in &config.app_profiles {
        if ap.name.trim().is_empty() {
            errors.push("Application profile name must not be empty".into());
        }
    }
    for epg in &config.epgs {
        if epg.name.trim().is_empty() {
            errors.push("EPG name must not be empty".into());
        }
    }

    // --- referential ---
    let tenant_names: HashSet<&str> = config.tenants.iter().map(|t| t.name.as_str()).collect();
    let vrf_keys: HashSet<(&str, &str)> = config
        .vrfs
        .iter()
        .map(|v| (v.tenant.as_str(), v.name.as_str()))
        .collect();
    let ap_keys: HashSet<(&str, &str)> = config
        .app_profiles
        .iter()
        .map(|a| (a.tenant.as_str(), a.name.as_str()))
        .collect();
    let bd_keys: HashSet<(&str, &str)> = config
        .bridge_domains
        .iter()
        .map(|b| (b.tenant.as_str(), b.name.as_str()))
        .collect();

    for vrf in &config.vrfs {
        if !tenant_names.contains(vrf.tenant.as_str()) {
            errors.push(format!(
                "VRF '{}' references non-existent tenant '{}'",
                vrf.name, vrf.tenant
            ));
        }
    }
    for bd in &config.bridge_domains {
        if !tenant_names.contains(bd.tenant.as_str()) {
            errors.push(format!(
                "Bridge Domain '{}' references non-existent tenant '{}'",
                bd.name, bd.tenant
            ));
        }
        if !vrf_keys.contains(&(bd.tenant.as_str(), bd.vrf.as_str())) {
            errors.push(format!(
                "Bridge Domain '{}' references non-existent VRF '{}' in tenant '{}'",
                bd.name, bd.vrf, bd.tenant
            ));
        }
    }
    for ap in &config.app_profiles {
        if !tenant_names.contains(ap.tenant.as_str()) {
            errors.push(format!(
                "Application Profile '{}' references non-existent tenant '{}'",
                ap.name, ap.tenant
            ));
        }
    }
    for epg in &config.epgs {
        if !tenant_names.contains(epg.tenant.as_str()) {
            errors.push(format!(
                "EPG '{}' references non-existent tenant '{}'",
                epg.name, epg.tenant
            ));
        }
        if !ap_keys.contains(&(epg.tenant.as_str(), epg.app_profile.as_str())) {
            errors.push(format!(
                "EPG '{}' references non-existent application profile '{}' in tenant '{}'",
                epg.name, epg.app_profile, epg.tenant
            ));
        }
        if !bd_keys.contains(&(epg.tenant.as_str(), epg.bridge_domain.as_str())) {
            errors.push(format!(
                "EPG '{}' references non-existent bridge domain '{}' in tenant '{}'",
                epg.name, epg.bridge_domain, epg.tenant
            ));
        }
    }

    // --- uniqueness ---
    let mut seen = HashSet::new();
    for tenant in &config.tenants {
        if !seen.insert(tenant.name.as_str()) {
            errors.push(format!("Duplicate tenant name '{}'", tenant.name));
        }
    }
    let mut seen = HashSet::new();
    for vrf in &config.vrfs {
        if !seen.insert((vrf.tenant.as_str(), vrf.name.as_str())) {
            errors.push(format!(
                "Duplicate VRF name '{}' in tenant '{}'",
                vrf.name, vrf.tenant
            ));
        }
    }
    let mut seen = HashSet::new();
    for bd in &config.bridge_domains {
        if !seen.insert((bd.tenant.as_str(), bd.name.as_str())) {
            errors.push(format!(
                "Duplicate bridge domain name '{}' in tenant '{}'",
                bd.name, bd.tenant
            ));
        }
    }
    let mut seen = HashSet::new();
    for ap in &config.app_profiles {
        if !seen.insert((ap.tenant.as_str(), ap.name.as_str())) {
            errors.push(format!(
                "Duplicate application profile name '{}' in tenant '{}'",
                ap.name, ap.tenant
            ));
        }
    }
    let mut seen = HashSet::new();
    for epg in &config.epgs {
        if !seen.insert((
            epg.tenant.as_str(),
            epg.app_profile.as_str(),
            epg.name.as_str(),
        )) {
            errors.push(format!(
                "Duplicate EPG name '{}' in application profile '{}/{}'",
                epg.name, epg.tenant, epg.app_profile
            ));
        }
    }

    ValidationResult {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AppProfileConfig, BridgeDomainConfig, ControllerCredentials, EnforcementMode, EpgConfig,
        FabricType, TenantConfig, VrfConfig,
    };

    fn base_config() -> FabricConfig {
        FabricConfig {
            site_code: "AUNTH".into(),
            fabric_type: FabricType::It,
            controller: ControllerCredentials {
                host: "10.0.0.1".into(),
                username: "admin".into(),
                secret: "s3cret".into(),
                port: 443,
                verify_tls: false,
            },
            tenants: vec![TenantConfig {
                name: "common".into(),
                description: Some("Common tenant".into()),
            }],
            vrfs: vec![VrfConfig {
                name: "prod_vrf".into(),
                tenant: "common".into(),
                description: None,
                enforcement: EnforcementMode::Enforced,
            }],
            bridge_domains: vec![BridgeDomainConfig {
                name: "web_bd".into(),
                tenant: "common".into(),
                vrf: "prod_vrf".into(),
                subnet: Some("10.1.1.1/24".into()),
                description: None,
            }],
            app_profiles: vec![AppProfileConfig {
                name: "web_app".into(),
                tenant: "common".into(),
                description: None,
            }],
            epgs: vec![EpgConfig {
                name: "web_epg".into(),
                tenant: "common".into(),
                app_profile: "web_app".into(),
                bridge_domain: "web_bd".into(),
                description: None,
            }],
        }
    }

    #[test]
    fn valid_config_passes() {
        let result = validate(&base_config());
        assert!(result.valid, "errors: {:?}", result.errors);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn validate_is_idempotent() {
        let config = base_config();
        assert_eq!(validate(&config), validate(&config));
    }

    #[test]
    fn missing_tenants_is_an_error() {
        let mut config = base_config();
        config.tenants.clear();
        let result = validate(&config);
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("At least one tenant")));
    }

    #[test]
    fn unknown_site_code_is_an_error() {
        let mut config = base_config();
        config.site_code = "NOWHERE".into();
        let result = validate(&config);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("site code")));
    }

    #[test]
    fn custom_ruleset_extends_site_codes() {
        let mut config = base_config();
        config.site_code = "EUFRA".into();
        let rules = Ruleset {
            site_codes: vec!["EUFRA".into()],
        };
        assert!(validate_with(&config, &rules).valid);
        assert!(!validate(&config).valid);
    }

    #[test]
    fn dangling_vrf_tenant_is_an_error() {
        let mut config = base_config();
        config.vrfs[0].tenant = "ghost".into();
        let result = validate(&config);
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("VRF 'prod_vrf' references non-existent tenant 'ghost'")));
    }

    #[test]
    fn bridge_domain_vrf_must_resolve_within_tenant() {
        let mut config = base_config();
        config.bridge_domains[0].vrf = "other_vrf".into();
        let result = validate(&config);
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("non-existent VRF 'other_vrf' in tenant 'common'")));
    }

    #[test]
    fn epg_references_are_checked_against_app_profile_and_bd() {
        let mut config = base_config();
        config.epgs[0].app_profile = "ghost_app".into();
        config.epgs[0].bridge_domain = "ghost_bd".into();
        let result = validate(&config);
        assert!(!result.valid);
        assert_eq!(
            result
                .errors
                .iter()
                .filter(|e| e.starts_with("EPG 'web_epg'"))
                .count(),
            2
        );
    }

    #[test]
    fn all_violations_are_collected() {
        let mut config = base_config();
        config.site_code = "NOWHERE".into();
        config.controller.host = "".into();
        config.vrfs[0].tenant = "ghost".into();
        let result = validate(&config);
        // site code, empty host, dangling VRF tenant, and the bridge domain's
        // VRF lookup (the VRF moved to tenant 'ghost') all report.
        assert_eq!(result.errors.len(), 4, "errors: {:?}", result.errors);
    }

    #[test]
    fn duplicate_names_within_scope_are_errors() {
        let mut config = base_config();
        config.tenants.push(TenantConfig {
            name: "common".into(),
            description: None,
        });
        config.vrfs.push(config.vrfs[0].clone());
        let result = validate(&config);
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("Duplicate tenant name 'common'")));
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("Duplicate VRF name 'prod_vrf' in tenant 'common'")));
    }

    #[test]
    fn same_name_across_scopes_is_allowed() {
        let mut config = base_config();
        config.tenants.push(TenantConfig {
            name: "other".into(),
            description: Some("second tenant".into()),
        });
        config.vrfs.push(VrfConfig {
            name: "prod_vrf".into(),
            tenant: "other".into(),
            description: None,
            enforcement: EnforcementMode::Unenforced,
        });
        let result = validate(&config);
        assert!(result.valid, "errors: {:?}", result.errors);
    }

    #[test]
    fn missing_description_is_a_warning_not_an_error() {
        let mut config = base_config();
        config.tenants[0].description = None;
        let result = validate(&config);
        assert!(result.valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("Tenant 'common' has no description")));
    }
}

//! Reusable configuration templates.
//!
//! A template has a lifecycle independent of any job: a job may reference a
//! template at creation time but always owns its own immutable config copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Fabric,
    Ndo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TemplateKind,
    pub description: String,
    /// Template payloads are kind-specific free-form JSON; the two seeded
    /// kinds carry structurally different documents.
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The templates seeded into a fresh store.
pub(crate) fn default_templates() -> Vec<(&'static str, TemplateKind, &'static str, serde_json::Value)>
{
    vec![
        (
            "Basic Fabric",
            TemplateKind::Fabric,
            "Basic fabric configuration with common tenants",
            serde_json::json!({
                "tenants": [
                    {"name": "common", "description": "Common tenant"},
                    {"name": "mgmt", "description": "Management tenant"}
                ],
                "vrfs": [
                    {"name": "prod_vrf", "tenant": "common", "enforcement": "enforced"},
                    {"name": "dev_vrf", "tenant": "common", "enforcement": "unenforced"}
                ],
                "bridge_domains": [
                    {"name": "web_bd", "tenant": "common", "vrf": "prod_vrf", "subnet": "10.1.1.1/24"},
                    {"name": "app_bd", "tenant": "common", "vrf": "prod_vrf", "subnet": "10.1.2.1/24"}
                ]
            }),
        ),
        (
            "NDO Multi-Site Policy",
            TemplateKind::Ndo,
            "Multi-site policy template for NDO",
            serde_json::json!({
                "schema": {
                    "name": "multi_site_schema",
                    "templates": [
                        {
                            "name": "common_template",
                            "tenants": ["common"],
                            "sites": ["site1", "site2"]
                        }
                    ]
                }
            }),
        ),
    ]
}

//! The controller capability trait and its APIC REST implementation.

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;

use weaver_core::config::ControllerCredentials;
use weaver_core::plan::TaskSpec;

use crate::error::ControllerError;

/// Result of applying one task's resource to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Created,
    /// The controller reported the resource already exists. Treated as
    /// idempotent success, not a failure.
    AlreadyExists,
}

/// Abstract capability for issuing create calls against the external fabric
/// management API. One job borrows a controller for its whole run; each
/// `apply` is one logical API call.
#[async_trait]
pub trait FabricController: Send + Sync {
    /// Establish a session. Called once per job before any task runs.
    async fn authenticate(&self) -> Result<(), ControllerError>;

    /// Create the resource described by `spec`.
    async fn apply(&self, spec: &TaskSpec) -> Result<Applied, ControllerError>;
}

// ---------------------------------------------------------------------------
// ApicClient
// ---------------------------------------------------------------------------

/// REST client speaking the APIC dialect: token auth via `aaaLogin`, one
/// managed-object POST per resource.
pub struct ApicClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    secret: String,
    token: RwLock<Option<String>>,
}

impl ApicClient {
    pub fn new(creds: &ControllerCredentials) -> Result<Self, ControllerError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!creds.verify_tls)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ControllerError::Connect(e.to_string()))?;
        Ok(Self {
            http,
            base_url: format!("https://{}:{}/api", creds.host, creds.port),
            username: creds.username.clone(),
            secret: creds.secret.clone(),
            token: RwLock::new(None),
        })
    }

    /// Construct against an explicit base URL. Used by tests to point the
    /// client at a local mock server.
    pub fn with_base_url(
        base_url: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Result<Self, ControllerError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ControllerError::Connect(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            username: username.into(),
            secret: secret.into(),
            token: RwLock::new(None),
        })
    }

    /// Managed-object path and payload for one task spec.
    fn request_parts(&self, spec: &TaskSpec) -> (String, serde_json::Value) {
        match spec {
            TaskSpec::Tenant(t) => (
                format!("{}/node/mo/uni/tn-{}.json", self.base_url, t.name),
                json!({
                    "fvTenant": {
                        "attributes": {
                            "name": t.name,
                            "descr": t.description.as_deref().unwrap_or(""),
                            "status": "created"
                        }
                    }
                }),
            ),
            TaskSpec::Vrf(v) => (
                format!(
                    "{}/node/mo/uni/tn-{}/ctx-{}.json",
                    self.base_url, v.tenant, v.name
                ),
                json!({
                    "fvCtx": {
                        "attributes": {
                            "name": v.name,
                            "descr": v.description.as_deref().unwrap_or(""),
                            "pcEnfPref": v.enforcement.as_str(),
                            "status": "created"
                        }
                    }
                }),
            ),
            TaskSpec::BridgeDomain(b) => {
                let mut children = vec![json!({
                    "fvRsCtx": {"attributes": {"tnFvCtxName": b.vrf}}
                })];
                if let Some(subnet) = &b.subnet {
                    children.push(json!({
                        "fvSubnet": {
                            "attributes": {"ip": subnet, "scope": "public", "status": "created"}
                        }
                    }));
                }
                (
                    format!(
                        "{}/node/mo/uni/tn-{}/BD-{}.json",
                        self.base_url, b.tenant, b.name
                    ),
                    json!({
                        "fvBD": {
                            "attributes": {
                                "name": b.name,
                                "descr": b.description.as_deref().unwrap_or(""),
                                "status": "created"
                            },
                            "children": children
                        }
                    }),
                )
            }
            TaskSpec::AppProfile(a) => (
                format!(
                    "{}/node/mo/uni/tn-{}/ap-{}.json",
                    self.base_url, a.tenant, a.name
                ),
                json!({
                    "fvAp": {
                        "attributes": {
                            "name": a.name,
                            "descr": a.description.as_deref().unwrap_or(""),
                            "status": "created"
                        }
                    }
                }),
            ),
            TaskSpec::Epg(e) => (
                format!(
                    "{}/node/mo/uni/tn-{}/ap-{}/epg-{}.json",
                    self.base_url, e.tenant, e.app_profile, e.name
                ),
                json!({
                    "fvAEPg": {
                        "attributes": {
                            "name": e.name,
                            "descr": e.description.as_deref().unwrap_or(""),
                            "status": "created"
                        },
                        "children": [
                            {"fvRsBd": {"attributes": {"tnFvBDName": e.bridge_domain}}}
                        ]
                    }
                }),
            ),
        }
    }
}

fn transport_err(e: reqwest::Error) -> ControllerError {
    if e.is_timeout() {
        ControllerError::Timeout
    } else {
        ControllerError::Connect(e.to_string())
    }
}

/// Bound the controller's response text carried into errors and logs.
fn truncate(body: &str, max: usize) -> String {
    if body.len() <= max {
        body.to_string()
    } else {
        let mut end = max;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &body[..end])
    }
}

#[async_trait]
impl FabricController for ApicClient {
    async fn authenticate(&self) -> Result<(), ControllerError> {
        let payload = json!({
            "aaaUser": {
                "attributes": {
                    "name": self.username,
                    "pwd": self.secret
                }
            }
        });
        let response = self
            .http
            .post(format!("{}/aaaLogin.json", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(transport_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ControllerError::AuthFailed(format!(
                "controller returned {status}"
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ControllerError::AuthFailed(e.to_string()))?;
        let token = body["imdata"][0]["aaaLogin"]["attributes"]["token"]
            .as_str()
            .ok_or_else(|| {
                ControllerError::AuthFailed("invalid authentication response".into())
            })?;
        *self.token.write().await = Some(token.to_string());
        Ok(())
    }

    async fn apply(&self, spec: &TaskSpec) -> Result<Applied, ControllerError> {
        let (url, payload) = self.request_parts(spec);
        let mut request = self.http.post(&url).json(&payload);
        if let Some(token) = self.token.read().await.as_deref() {
            request = request.header("APIC-Cookie", token);
        }
        let response = request.send().await.map_err(transport_err)?;

        let status = response.status();
        if status.is_success() {
            return Ok(Applied::Created);
        }
        let body = response.text().await.unwrap_or_default();
        if body.to_ascii_lowercase().contains("already exists") {
            return Ok(Applied::AlreadyExists);
        }
        Err(ControllerError::Api {
            status: status.as_u16(),
            message: truncate(&body, 200),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weaver_core::config::TenantConfig;

    fn tenant_spec(name: &str) -> TaskSpec {
        TaskSpec::Tenant(TenantConfig {
            name: name.into(),
            description: Some("Common tenant".into()),
        })
    }

    #[tokio::test]
    async fn authenticate_stores_session_token() {
        let mut server = mockito::Server::new_async().await;
        let login = server
            .mock("POST", "/aaaLogin.json")
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "imdata": [{"aaaLogin": {"attributes": {"token": "tok-123"}}}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ApicClient::with_base_url(server.url(), "admin", "s3cret").unwrap();
        client.authenticate().await.unwrap();
        login.assert_async().await;
        assert_eq!(client.token.read().await.as_deref(), Some("tok-123"));
    }

    #[tokio::test]
    async fn authenticate_rejects_malformed_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/aaaLogin.json")
            .with_status(200)
            .with_body("{\"imdata\": []}")
            .create_async()
            .await;

        let client = ApicClient::with_base_url(server.url(), "admin", "s3cret").unwrap();
        let err = client.authenticate().await.unwrap_err();
        assert!(matches!(err, ControllerError::AuthFailed(_)));
    }

    #[tokio::test]
    async fn auth_failure_status_is_permanent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/aaaLogin.json")
            .with_status(401)
            .create_async()
            .await;

        let client = ApicClient::with_base_url(server.url(), "admin", "wrong").unwrap();
        let err = client.authenticate().await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn apply_posts_to_the_managed_object_path() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/node/mo/uni/tn-common.json")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "fvTenant": {"attributes": {"name": "common"}}
            })))
            .with_status(200)
            .create_async()
            .await;

        let client = ApicClient::with_base_url(server.url(), "admin", "s3cret").unwrap();
        let applied = client.apply(&tenant_spec("common")).await.unwrap();
        mock.assert_async().await;
        assert_eq!(applied, Applied::Created);
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/node/mo/uni/tn-common.json")
            .with_status(503)
            .with_body("service unavailable")
            .create_async()
            .await;

        let client = ApicClient::with_base_url(server.url(), "admin", "s3cret").unwrap();
        let err = client.apply(&tenant_spec("common")).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn duplicate_resource_is_idempotent_success() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/node/mo/uni/tn-common.json")
            .with_status(400)
            .with_body("{\"error\": \"MO tn-common already exists\"}")
            .create_async()
            .await;

        let client = ApicClient::with_base_url(server.url(), "admin", "s3cret").unwrap();
        let applied = client.apply(&tenant_spec("common")).await.unwrap();
        assert_eq!(applied, Applied::AlreadyExists);
    }

    #[tokio::test]
    async fn rejected_payload_is_a_permanent_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/node/mo/uni/tn-common.json")
            .with_status(400)
            .with_body("invalid attribute")
            .create_async()
            .await;

        let client = ApicClient::with_base_url(server.url(), "admin", "s3cret").unwrap();
        let err = client.apply(&tenant_spec("common")).await.unwrap_err();
        match err {
            ControllerError::Api { status, ref message } => {
                assert_eq!(status, 400);
                assert!(message.contains("invalid attribute"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
        assert!(!err.is_transient());
    }
}

//! API client for communicating with the fleet leader

use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// API client for the fleet leader
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let mut base_url = Url::parse(base_url).context("Invalid leader URL")?;
        // Relative joins replace the last path segment unless it ends in a slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid path")
    }

    /// URL of the single-agent resource, with the location as query parameters
    fn agent_url(&self, location: &Location) -> Result<Url> {
        let mut url = self.url("v1/agent")?;
        url.query_pairs_mut()
            .append_pair("data_center", &location.data_center)
            .append_pair("rack", &location.rack)
            .append_pair("address", &location.address);
        Ok(url)
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            anyhow::bail!("API error ({}): {}", status, message);
        }

        response.json().await.context("Failed to parse response")
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path)?)
            .send()
            .await
            .context("Failed to send request")?;

        Self::parse(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .post(self.url(path)?)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::parse(response).await
    }

    pub async fn topology(&self) -> Result<TopologySnapshot> {
        self.get("v1/topology").await
    }

    /// Look up one agent; `None` when the leader does not know it
    pub async fn agent(&self, location: &Location) -> Result<Option<AgentView>> {
        let response = self
            .client
            .get(self.agent_url(location)?)
            .send()
            .await
            .context("Failed to send request")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::parse(response).await.map(Some)
    }

    pub async fn report(&self, report: &AgentReport) -> Result<UpdateOutcome> {
        self.post("v1/agents", report).await
    }

    pub async fn remove(&self, location: &Location) -> Result<RemoveResponse> {
        let response = self
            .client
            .delete(self.agent_url(location)?)
            .send()
            .await
            .context("Failed to send request")?;

        Self::parse(response).await
    }

    /// Fetch leader health; a 503 still carries a health body
    pub async fn health(&self) -> Result<HealthResponse> {
        let response = self
            .client
            .get(self.url("healthz")?)
            .send()
            .await
            .context("Failed to send request")?;

        if response.status() == StatusCode::SERVICE_UNAVAILABLE {
            return response.json().await.context("Failed to parse response");
        }
        Self::parse(response).await
    }
}

// API response types

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub cpu_count: i64,
    #[serde(default)]
    pub memory_mb: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub data_center: String,
    pub rack: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReport {
    pub location: Location,
    pub resource: Resource,
    pub allocated: Resource,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub registered: bool,
    pub resource_changed: bool,
    pub allocated_changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveResponse {
    pub removed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentView {
    pub location: Location,
    pub resource: Resource,
    pub allocated: Resource,
    pub heartbeat_age_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RackView {
    pub name: String,
    pub resource: Resource,
    pub allocated: Resource,
    pub agents: Vec<AgentView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataCenterView {
    pub name: String,
    pub resource: Resource,
    pub allocated: Resource,
    pub racks: Vec<RackView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub resource: Resource,
    pub allocated: Resource,
    pub agent_count: usize,
    pub data_centers: Vec<DataCenterView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: BTreeMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn location() -> Location {
        Location {
            data_center: "east".to_string(),
            rack: "r 1".to_string(),
            address: "10.0.0.1:7000".to_string(),
        }
    }

    fn location_query() -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("data_center".into(), "east".into()),
            Matcher::UrlEncoded("rack".into(), "r 1".into()),
            Matcher::UrlEncoded("address".into(), "10.0.0.1:7000".into()),
        ])
    }

    #[tokio::test]
    async fn test_topology_is_decoded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/topology")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "resource": {"cpu_count": 8, "memory_mb": 8192},
                    "allocated": {"cpu_count": 2, "memory_mb": 0},
                    "agent_count": 1,
                    "data_centers": [{
                        "name": "east",
                        "resource": {"cpu_count": 8, "memory_mb": 8192},
                        "allocated": {"cpu_count": 2, "memory_mb": 0},
                        "racks": []
                    }]
                }"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let topology = client.topology().await.unwrap();

        assert_eq!(topology.agent_count, 1);
        assert_eq!(topology.resource.cpu_count, 8);
        assert_eq!(topology.data_centers[0].name, "east");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_agent_is_none() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/agent")
            .match_query(location_query())
            .with_status(404)
            .with_body(r#"{"error": "no agent registered at east/r 1/10.0.0.1:7000"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        assert!(client.agent(&location()).await.unwrap().is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_remove_sends_location_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/v1/agent")
            .match_query(location_query())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"removed": true}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        assert!(client.remove(&location()).await.unwrap().removed);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_report_posts_json_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/agents")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "location": {"data_center": "east"},
                "resource": {"cpu_count": 4, "memory_mb": 4096}
            })))
            .with_status(202)
            .with_header("content-type", "application/json")
            .with_body(r#"{"registered": true, "resource_changed": true, "allocated_changed": false}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let outcome = client
            .report(&AgentReport {
                location: location(),
                resource: Resource {
                    cpu_count: 4,
                    memory_mb: 4096,
                },
                allocated: Resource::default(),
            })
            .await
            .unwrap();

        assert!(outcome.registered);
        assert!(!outcome.allocated_changed);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_carries_leader_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/agents")
            .with_status(400)
            .with_body(r#"{"error": "location is missing a data center"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .post::<UpdateOutcome, _>("v1/agents", &serde_json::json!({}))
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("400"));
        assert!(message.contains("missing a data center"));
    }

    #[tokio::test]
    async fn test_unhealthy_leader_still_returns_health() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/healthz")
            .with_status(503)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"status": "unhealthy", "components": {
                    "reaper": {"status": "unhealthy", "message": "stopped", "last_check_timestamp": 0}
                }}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let health = client.health().await.unwrap();

        assert_eq!(health.status, "unhealthy");
        assert_eq!(health.components["reaper"].message.as_deref(), Some("stopped"));
    }

    #[test]
    fn test_invalid_leader_url_is_rejected() {
        assert!(ApiClient::new("not a url").is_err());
    }

    #[tokio::test]
    async fn test_base_path_prefix_is_kept() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/fleet/leader/healthz")
            .with_status(200)
            .with_body(r#"{"status": "healthy", "components": {}}"#)
            .expect(2)
            .create_async()
            .await;

        for base in [
            format!("{}/fleet/leader", server.url()),
            format!("{}/fleet/leader/", server.url()),
        ] {
            let client = ApiClient::new(&base).unwrap();
            assert_eq!(
                client.url("v1/topology").unwrap().path(),
                "/fleet/leader/v1/topology"
            );
            client.health().await.unwrap();
        }
        mock.assert_async().await;
    }
}

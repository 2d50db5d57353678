//! Wire types exchanged with the remote browser server.

use serde::{Deserialize, Serialize};

/// Envelope returned by `/execute/{tool}` and `/command`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ServerResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ServerResponse {
    /// Returns the unwrapped result, collapsing one level of the nested IPC
    /// reply shape `{ id, result }` some tools return.
    pub fn into_result(self) -> Option<serde_json::Value> {
        match self.result {
            Some(serde_json::Value::Object(map)) if map.contains_key("id") && map.contains_key("result") => {
                map.get("result").cloned()
            }
            other => other,
        }
    }
}

/// `GET /health` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub browser_ready: bool,
    #[serde(default)]
    pub browser_state: Option<String>,
}

/// `GET /tools` response entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolSummary {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Structured detail carried by error response bodies, per the external
/// interfaces' documented fields.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub client_ip: Option<String>,
    #[serde(default)]
    pub retry_after: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub remaining: Option<u64>,
    #[serde(default)]
    pub license_status: Option<String>,
    #[serde(default)]
    pub license_message: Option<String>,
    #[serde(default)]
    pub hardware_fingerprint: Option<String>,
    #[serde(default)]
    pub missing_fields: Vec<String>,
    #[serde(default)]
    pub unknown_fields: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_nested_ipc_reply() {
        let response = ServerResponse {
            success: true,
            result: Some(serde_json::json!({"id": 7, "result": {"title": "Home"}})),
            error: None,
        };
        assert_eq!(response.into_result(), Some(serde_json::json!({"title": "Home"})));
    }

    #[test]
    fn leaves_flat_result_unchanged() {
        let response = ServerResponse {
            success: true,
            result: Some(serde_json::json!({"title": "Home"})),
            error: None,
        };
        assert_eq!(response.into_result(), Some(serde_json::json!({"title": "Home"})));
    }

    #[test]
    fn error_body_defaults_missing_fields_to_empty() {
        let body: ErrorBody = serde_json::from_str("{}").unwrap();
        assert!(body.missing_fields.is_empty());
        assert!(body.unknown_fields.is_empty());
    }
}

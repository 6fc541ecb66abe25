//! Worker message envelopes.
//!
//! Requests (client → worker):  `{type: init|invoke|cancel, id, payload?}`
//! Responses (worker → client): `{type: ready|progress|result|error, id?, payload?}`
//!
//! Process workers frame one JSON document per line. Mesh bytes travel as
//! base64 inside the `result` payload.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rackforge_io::scad::{format_number, quote};

/// Correlation id pairing a request with its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Mesh encoding requested from the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    #[default]
    #[serde(rename = "mesh-binary")]
    MeshBinary,
    #[serde(rename = "mesh-ascii")]
    MeshAscii,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::MeshBinary => "mesh-binary",
            OutputFormat::MeshAscii => "mesh-ascii",
        }
    }
}

/// Value of a program variable override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl VariableValue {
    /// Program-text literal, same grammar as the scene serializer.
    pub fn to_literal(&self) -> String {
        match self {
            VariableValue::Bool(b) => b.to_string(),
            VariableValue::Number(n) => format_number(*n),
            VariableValue::Text(s) => quote(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokePayload {
    pub program: String,
    pub output_format: OutputFormat,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, VariableValue>,
}

/// Outcome reported by the worker for one invocation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPayload {
    pub success: bool,
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Option::is_none")]
    pub output: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_time_ms: Option<f64>,
}

impl ResultPayload {
    pub fn success(output: Vec<u8>) -> Self {
        Self {
            success: true,
            output: Some(output),
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressPayload {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerRequest {
    Init { id: RequestId },
    Invoke { id: RequestId, payload: InvokePayload },
    /// Best effort; kernel invocations are not preemptible.
    Cancel { id: RequestId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerResponse {
    Ready {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<RequestId>,
    },
    /// Uncorrelated status text.
    Progress { payload: ProgressPayload },
    #[serde(rename = "result")]
    RenderResult { id: RequestId, payload: ResultPayload },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<RequestId>,
        payload: ErrorPayload,
    },
}

impl WorkerResponse {
    pub fn progress(status: impl Into<String>) -> Self {
        WorkerResponse::Progress {
            payload: ProgressPayload {
                status: status.into(),
            },
        }
    }

    pub fn error(id: Option<RequestId>, message: impl Into<String>) -> Self {
        WorkerResponse::Error {
            id,
            payload: ErrorPayload {
                message: message.into(),
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WorkerResponse::Ready { .. } => "ready",
            WorkerResponse::Progress { .. } => "progress",
            WorkerResponse::RenderResult { .. } => "result",
            WorkerResponse::Error { .. } => "error",
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let text: Option<String> = Option::deserialize(deserializer)?;
        text.map(|t| STANDARD.decode(t).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_envelope_shape() {
        let id = RequestId::new();
        let mut variables = BTreeMap::new();
        variables.insert("preview".to_string(), VariableValue::Bool(true));
        variables.insert("fn".to_string(), VariableValue::Number(48.0));
        let request = WorkerRequest::Invoke {
            id,
            payload: InvokePayload {
                program: "cube(1);".into(),
                output_format: OutputFormat::MeshBinary,
                variables,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "invoke",
                "id": id.0.to_string(),
                "payload": {
                    "program": "cube(1);",
                    "outputFormat": "mesh-binary",
                    "variables": {"fn": 48.0, "preview": true}
                }
            })
        );

        let init = serde_json::to_value(WorkerRequest::Init { id }).unwrap();
        assert_eq!(init, json!({"type": "init", "id": id.0.to_string()}));
    }

    #[test]
    fn test_result_payload_base64() {
        let id = RequestId::new();
        let response = WorkerResponse::RenderResult {
            id,
            payload: ResultPayload {
                render_time_ms: Some(12.5),
                ..ResultPayload::success(vec![0, 1, 2, 255])
            },
        };
        let text = serde_json::to_string(&response).unwrap();
        assert!(text.contains("\"type\":\"result\""));
        assert!(text.contains("\"output\":\"AAEC/w==\""));
        assert!(text.contains("\"renderTimeMs\":12.5"));
        let back: WorkerResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(back, response);
    }

    #[test]
    fn test_render_time_accepts_any_number() {
        let id = RequestId::new();
        for (time, expected) in [("12.5", 12.5), ("40", 40.0)] {
            let text = format!(
                r#"{{"type":"result","id":"{}","payload":{{"success":true,"output":"AA==","renderTimeMs":{}}}}}"#,
                id.0, time
            );
            match serde_json::from_str::<WorkerResponse>(&text).unwrap() {
                WorkerResponse::RenderResult { id: got, payload } => {
                    assert_eq!(got, id);
                    assert_eq!(payload.render_time_ms, Some(expected));
                    assert_eq!(payload.output, Some(vec![0]));
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_progress_has_no_id() {
        let value = serde_json::to_value(WorkerResponse::progress("Compiling")).unwrap();
        assert_eq!(value, json!({"type": "progress", "payload": {"status": "Compiling"}}));
        let ready: WorkerResponse = serde_json::from_str(r#"{"type":"ready"}"#).unwrap();
        assert_eq!(ready, WorkerResponse::Ready { id: None });
    }

    #[test]
    fn test_variable_literals() {
        assert_eq!(VariableValue::Bool(false).to_literal(), "false");
        assert_eq!(VariableValue::Number(0.5).to_literal(), "0.5");
        assert_eq!(VariableValue::Text("a\"b".into()).to_literal(), "\"a\\\"b\"");
        let v: VariableValue = serde_json::from_str("\"x\"").unwrap();
        assert_eq!(v, VariableValue::Text("x".into()));
    }
}

// envelope.rs — Uniform response shape.
//
// Success: {"success": true, "data"?: ..., "message"?: "..."}
// Failure: {"success": false, "error": "<CODE>", "message": "...",
//           "details": {...}, "hint"?: "..."}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use zs_policy::ErrorCode;

use crate::error::GatewayError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Envelope {
    pub fn ok(data: Option<Value>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            error: None,
            message: Some(message.into()),
            data,
            details: None,
            hint: None,
        }
    }

    pub fn from_error(err: &GatewayError) -> Self {
        let details = match err.details() {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        Self {
            success: false,
            error: Some(err.code()),
            message: Some(err.to_string()),
            data: None,
            details: Some(details),
            hint: err.hint(),
        }
    }

    /// The error code of a failed response.
    pub fn code(&self) -> Option<ErrorCode> {
        self.error
    }

    /// Pretty-printed JSON, as handed back to the caller.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            format!(
                "{{\"success\":false,\"error\":\"EXEC_ERROR\",\"message\":\"{}\",\"details\":{{}}}}",
                e.to_string().replace('"', "'")
            )
        })
    }
}

impl<T: Serialize> From<Result<(T, String), GatewayError>> for Envelope {
    fn from(result: Result<(T, String), GatewayError>) -> Self {
        match result {
            Ok((data, message)) => match serde_json::to_value(data) {
                Ok(Value::Null) => Envelope::ok(None, message),
                Ok(value) => Envelope::ok(Some(value), message),
                Err(e) => Envelope::from_error(&GatewayError::Workspace(e.into())),
            },
            Err(err) => Envelope::from_error(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use zs_workspace::WorkspaceError;

    #[test]
    fn success_omits_error_fields() {
        let env = Envelope::ok(Some(json!({ "bytes": 3 })), "Written: a.txt");
        let value: Value = serde_json::from_str(&env.to_json()).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["data"]["bytes"], 3);
        assert_eq!(value["message"], "Written: a.txt");
        assert!(value.get("error").is_none());
        assert!(value.get("hint").is_none());
    }

    #[test]
    fn failure_carries_code_details_and_hint() {
        let err: GatewayError = WorkspaceError::PathEscape {
            path: "../etc/passwd".to_string(),
            reason: "climbs above the zone root".to_string(),
        }
        .into();
        let value: Value = serde_json::from_str(&Envelope::from_error(&err).to_json()).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "PATH_ESCAPE");
        assert_eq!(value["details"]["path"], "../etc/passwd");
        assert!(value["hint"].is_string());
        assert!(value["message"].as_str().unwrap().contains("escapes"));
    }

    #[test]
    fn unit_payload_has_no_data() {
        let env: Envelope = Ok::<_, GatewayError>(((), "done".to_string())).into();
        assert!(env.success);
        assert!(env.data.is_none());
    }
}

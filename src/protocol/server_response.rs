use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::coordinator::command::CommandStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ServerResponse {
    #[serde(rename = "success")]
    Success {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        data: serde_json::Value,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl ServerResponse {
    pub fn success(id: Option<String>, data: serde_json::Value) -> Self {
        Self::Success { id, data }
    }

    pub fn error(id: Option<String>, message: String) -> Self {
        Self::Error {
            id,
            message,
            code: None,
        }
    }

    pub fn error_with_code(id: Option<String>, message: String, code: String) -> Self {
        Self::Error {
            id,
            message,
            code: Some(code),
        }
    }

    /// Success carries the numeric code; every other status becomes an error
    /// whose `code` is the status name.
    pub fn from_status(id: Option<String>, status: CommandStatus) -> Self {
        if status.is_success() {
            Self::success(
                id,
                json!({
                    "result": status.to_string(),
                    "code": status.code(),
                    "message": status.message(),
                }),
            )
        } else {
            Self::error_with_code(id, status.message().to_string(), status.to_string())
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ServerResponse::Success { .. })
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ServerResponse::Success { .. } => None,
            ServerResponse::Error { code, .. } => code.as_deref(),
        }
    }
}

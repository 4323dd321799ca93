use serde::{Deserialize, Serialize};

/// Error classification code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    FlowNotFound,
    EndpointNotFound,
    FlowConfigurationError,
    ExecutorUnsupportedType,
    ProjectNotFound,
    InternalError,
    SystemBusy,
}

impl ErrorCode {
    /// Numeric code exposed to API clients.
    pub fn code(&self) -> u32 {
        match self {
            ErrorCode::BadRequest => 40001,
            ErrorCode::FlowNotFound => 40002,
            ErrorCode::EndpointNotFound => 40003,
            ErrorCode::FlowConfigurationError => 40004,
            ErrorCode::ExecutorUnsupportedType => 40005,
            ErrorCode::ProjectNotFound => 40000,
            ErrorCode::InternalError => 50001,
            ErrorCode::SystemBusy => 50000,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "Bad request",
            ErrorCode::FlowNotFound => "Flow not found",
            ErrorCode::EndpointNotFound => "Endpoint not found",
            ErrorCode::FlowConfigurationError => "Invalid flow configuration",
            ErrorCode::ExecutorUnsupportedType => "Unsupported executor type",
            ErrorCode::ProjectNotFound => "Project not found",
            ErrorCode::InternalError => "Internal error",
            ErrorCode::SystemBusy => "System is busy, please try again later",
        }
    }

    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::SystemBusy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_serde() {
        let json = serde_json::to_string(&ErrorCode::SystemBusy).unwrap();
        assert_eq!(json, "\"SYSTEM_BUSY\"");
        let code: ErrorCode = serde_json::from_str("\"PROJECT_NOT_FOUND\"").unwrap();
        assert_eq!(code, ErrorCode::ProjectNotFound);
    }

    #[test]
    fn test_retryability() {
        assert!(ErrorCode::SystemBusy.is_retryable());
        assert!(!ErrorCode::FlowNotFound.is_retryable());
    }
}

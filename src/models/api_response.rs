use serde::{Deserialize, Serialize};

use crate::bridge::BridgeError;

/// Gateway envelope. `status` is 0 on success, otherwise the HTTP status the
/// error was answered with; `data` then carries the stable error code.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: i32,
    pub msg: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: 0,
            msg: "ok".to_string(),
            data,
        }
    }
}

impl ApiResponse<&'static str> {
    pub fn rejected(http_status: u16, error: &BridgeError) -> Self {
        Self {
            status: i32::from(http_status),
            msg: error.to_string(),
            data: error.error_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_carries_code_and_message() {
        let err = BridgeError::unsupported_chain(56, "not a PoS chain");
        let body = serde_json::to_value(ApiResponse::rejected(400, &err)).unwrap();
        assert_eq!(body["status"], 400);
        assert_eq!(body["data"], "UNSUPPORTED_CHAIN");
        assert_eq!(body["msg"], err.to_string());

        let body = serde_json::to_value(ApiResponse::success("pong")).unwrap();
        assert_eq!(body["status"], 0);
        assert_eq!(body["msg"], "ok");
    }
}

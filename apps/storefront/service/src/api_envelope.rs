use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

pub type ApiErrorTuple = (StatusCode, Json<ApiErrorResponse>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCode {
    InvalidRequest,
    NotFound,
    ChatbotUnavailable,
    UpstreamError,
}

impl ApiErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::NotFound => "not_found",
            Self::ChatbotUnavailable => "chatbot_unavailable",
            Self::UpstreamError => "upstream_error",
        }
    }

    pub const fn default_status(self) -> StatusCode {
        match self {
            Self::InvalidRequest => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound | Self::ChatbotUnavailable => StatusCode::NOT_FOUND,
            Self::UpstreamError => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub message: String,
    pub error: ApiErrorDetail,
}

pub fn error_response(code: ApiErrorCode, message: impl Into<String>) -> ApiErrorTuple {
    error_response_with_status(code.default_status(), code, message)
}

pub fn error_response_with_status(
    status: StatusCode,
    code: ApiErrorCode,
    message: impl Into<String>,
) -> ApiErrorTuple {
    let message = message.into();
    (
        status,
        Json(ApiErrorResponse {
            message: message.clone(),
            error: ApiErrorDetail {
                code: code.as_str(),
                message,
            },
        }),
    )
}

pub fn upstream_error(message: impl Into<String>) -> ApiErrorTuple {
    error_response(ApiErrorCode::UpstreamError, message)
}

pub fn chatbot_unavailable_error(chatbot_type: &str) -> ApiErrorTuple {
    error_response(
        ApiErrorCode::ChatbotUnavailable,
        format!("Chatbot type '{chatbot_type}' is not configured."),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_maps_to_bad_gateway_envelope() {
        let (status, payload) = upstream_error("Langflow responded with HTTP 500");
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let body = serde_json::to_value(payload.0).expect("serialize payload");
        assert_eq!(body["message"], "Langflow responded with HTTP 500");
        assert_eq!(body["error"]["code"], "upstream_error");
        assert_eq!(body["error"]["message"], "Langflow responded with HTTP 500");
    }

    #[test]
    fn unknown_chatbot_is_not_found() {
        let (status, payload) = chatbot_unavailable_error("support");
        assert_eq!(status, StatusCode::NOT_FOUND);
        let body = serde_json::to_value(payload.0).expect("serialize payload");
        assert_eq!(body["error"]["code"], "chatbot_unavailable");
        assert!(
            body["message"]
                .as_str()
                .is_some_and(|message| message.contains("support"))
        );
    }
}

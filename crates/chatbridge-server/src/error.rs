use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chatbridge::errors::ChatError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
    #[error("Invalid server address: {0}")]
    InvalidAddress(#[from] std::net::AddrParseError),
}

// Helper function to format environment variable names
pub(crate) fn to_env_var(field_path: &str) -> String {
    // Handle nested fields by converting dots to double underscores
    // If the field is in the provider object, we need to prefix it appropriately
    let normalized_path = if field_path == "type" || field_path == "provider" {
        "provider.type".to_string()
    } else if field_path.starts_with("provider.") {
        field_path.to_string()
    } else {
        format!("provider.{}", field_path)
    };

    format!(
        "CHATBRIDGE_{}",
        normalized_path.replace('.', "__").to_uppercase()
    )
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Failure of a chat request: the caller's fault (400) or anything else (500)
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.into())
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::InvalidRequest(message) => AppError::BadRequest(message),
            other => AppError::Internal(other.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::Internal(err) => {
                tracing::error!("[chat] {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("type"), "CHATBRIDGE_PROVIDER__TYPE");
        assert_eq!(to_env_var("provider"), "CHATBRIDGE_PROVIDER__TYPE");
        assert_eq!(to_env_var("api_key"), "CHATBRIDGE_PROVIDER__API_KEY");
        assert_eq!(to_env_var("provider.host"), "CHATBRIDGE_PROVIDER__HOST");
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_request_maps_to_400() {
        let err: AppError = ChatError::InvalidRequest("bad input".to_string()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "bad input"}));
    }

    #[tokio::test]
    async fn test_internal_error_exposes_message() {
        let err = AppError::from(anyhow::anyhow!("Server error: 502 Bad Gateway"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Server error: 502 Bad Gateway"})
        );
    }
}

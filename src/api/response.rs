use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::api::errors::FieldError;
use crate::core::time::{format_primitive, primitive_now_utc};

/// Body shape shared by every JSON response, successful or not.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T: Serialize> {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
    status_code: u16,
    timestamp: String,
}

pub(crate) fn envelope<T: Serialize>(
    status: StatusCode,
    message: String,
    data: Option<T>,
    errors: Option<Vec<FieldError>>,
) -> Response {
    let body = Envelope {
        success: status.is_success(),
        message,
        data,
        errors,
        status_code: status.as_u16(),
        timestamp: format_primitive(primitive_now_utc()),
    };
    (status, Json(body)).into_response()
}

#[derive(Debug)]
pub(crate) struct ApiResponse<T> {
    status: StatusCode,
    message: &'static str,
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub(crate) fn ok(message: &'static str, data: T) -> Self {
        Self { status: StatusCode::OK, message, data }
    }

    pub(crate) fn created(message: &'static str, data: T) -> Self {
        Self { status: StatusCode::CREATED, message, data }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        envelope(self.status, self.message.to_string(), Some(self.data), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn success_envelope_carries_data_and_status() {
        let response = ApiResponse::created("Created", serde_json::json!({"id": "x"})).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["statusCode"], 201);
        assert_eq!(json["data"]["id"], "x");
        assert!(json.get("errors").is_none());
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn error_envelope_lists_field_errors() {
        let errors = vec![FieldError { field: "email".into(), message: "bad".into() }];
        let response =
            envelope::<()>(StatusCode::UNPROCESSABLE_ENTITY, "Validation failed".into(), None, Some(errors));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["errors"][0]["field"], "email");
        assert!(json.get("data").is_none());
    }
}

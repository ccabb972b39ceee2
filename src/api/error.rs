use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::voucher::VoucherError;

/// JSON body of every failed request
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

/// Handler error. Internal failures never leak their cause to the client.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(message) => message,
            ApiError::Internal => "Internal server error",
        }
    }
}

impl From<VoucherError> for ApiError {
    fn from(err: VoucherError) -> Self {
        if err.is_client_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            error!(error = %err, "Voucher issuance failed");
            ApiError::Internal
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// JSON body extractor whose failures use the `{success:false,error}` shape
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose failures use the `{success:false,error}` shape
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.message().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SignerError;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        #[allow(dead_code)]
        fid: u64,
    }

    async fn rejection_body(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let err = match ApiJson::<Payload>::from_request(request, &()).await {
            Ok(_) => panic!("payload should be rejected"),
            Err(err) => err,
        };
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn json_request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[test]
    fn test_voucher_errors_map_to_status() {
        let wrong: ApiError = VoucherError::IncorrectAnswer.into();
        assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);
        assert_eq!(wrong.message(), "Incorrect answer");

        let internal: ApiError = VoucherError::Signing(SignerError::MissingKey).into();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.message(), "Internal server error");
    }

    #[tokio::test]
    async fn test_malformed_json_gets_json_error_body() {
        let (status, body) = rejection_body(json_request("{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(!body["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mistyped_field_gets_json_error_body() {
        let (status, body) = rejection_body(json_request(r#"{"fid":"abc"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("fid"));
    }

    #[tokio::test]
    async fn test_bad_query_gets_json_error_body() {
        let request = Request::builder()
            .uri("/?fid=abc")
            .body(Body::empty())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let err = match ApiQuery::<Payload>::from_request_parts(&mut parts, &()).await {
            Ok(_) => panic!("query should be rejected"),
            Err(err) => err,
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.message().starts_with("Failed to deserialize query string"));
    }
}

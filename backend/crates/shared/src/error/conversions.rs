//! Error conversions
//!
//! Request-body failures become client errors with a readable detail; the
//! axum renderer turns any [`AppError`] into an RFC 7807 problem document.

use super::app_error::AppError;

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        use serde_json::error::Category;

        let app_err = match err.classify() {
            Category::Eof => AppError::bad_request("body must not be empty or truncated"),
            Category::Syntax => AppError::bad_request(format!(
                "body contains badly-formed JSON (at line {}, column {})",
                err.line(),
                err.column()
            )),
            Category::Data => AppError::unprocessable(format!("body contains invalid data: {err}")),
            Category::Io => AppError::internal("JSON serialization error"),
        };
        app_err.with_source(err)
    }
}

// ============================================================================
// Axum conversions (feature-gated)
// ============================================================================

#[cfg(feature = "axum")]
impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        use axum::extract::rejection::JsonRejection;

        match rejection {
            JsonRejection::JsonDataError(e) => AppError::unprocessable(e.body_text()),
            JsonRejection::JsonSyntaxError(e) => AppError::bad_request(e.body_text()),
            JsonRejection::MissingJsonContentType(_) => {
                AppError::bad_request("body must be sent as application/json")
            }
            other => AppError::bad_request(other.body_text()),
        }
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;
        use axum::http::StatusCode;

        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // RFC 7807 Problem Details for HTTP APIs
        let body = serde_json::json!({
            "type": format!("https://httpstatuses.io/{}", self.status_code()),
            "title": self.kind().as_str(),
            "status": self.status_code(),
            "detail": self.message(),
            "action": self.action(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::kind::ErrorKind;

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{\"email\":").unwrap_err();
        let app_err: AppError = json_err.into();
        assert_eq!(app_err.kind(), ErrorKind::BadRequest);

        let json_err = serde_json::from_str::<serde_json::Value>("{\"email\" 1}").unwrap_err();
        let app_err: AppError = json_err.into();
        assert_eq!(app_err.kind(), ErrorKind::BadRequest);
        assert!(app_err.message().contains("badly-formed"));

        let json_err = serde_json::from_str::<u8>("\"text\"").unwrap_err();
        let app_err: AppError = json_err.into();
        assert_eq!(app_err.kind(), ErrorKind::UnprocessableEntity);
    }

    #[cfg(feature = "axum")]
    #[test]
    fn test_problem_details_body() {
        use axum::response::IntoResponse;

        let response = AppError::conflict("Email taken")
            .with_action("Use another address")
            .into_response();
        assert_eq!(response.status().as_u16(), 409);
    }
}

use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::enrollment::EnrollmentError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Enrollment(EnrollmentError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Enrollment(err) => write!(f, "enrollment error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Enrollment(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Enrollment(err) => {
                crate::workflows::enrollment::router::error_response(&err)
            }
            other => {
                let body = Json(json!({ "error": other.to_string() }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<EnrollmentError> for AppError {
    fn from(value: EnrollmentError) -> Self {
        Self::Enrollment(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::enrollment::{ClassId, EnrollmentId, PaymentStatus};

    #[test]
    fn enrollment_errors_keep_their_http_status() {
        let response = AppError::from(EnrollmentError::PaymentNotConfirmed {
            enrollment_id: EnrollmentId::new("enr-1"),
            payment_status: PaymentStatus::Pending,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

        let response = AppError::from(EnrollmentError::ClassArchived {
            class_id: ClassId::new("scratch-b1"),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn infrastructure_errors_are_internal() {
        let response = AppError::from(ConfigError::InvalidPort).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

//! Error-to-status mapping for handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use varreg::RegistryError;
use varreg_queue::QueueError;
use varreg_refget::RefgetError;
use varreg_storage::StorageError;
use varreg_vcf::VcfError;
use varreg_vrs::TranslateError;

/// A handler failure carrying its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

fn refget_status(e: &RefgetError) -> StatusCode {
    match e {
        // Transient upstream failures are the proxy's fault, not the
        // client's.
        RefgetError::Unavailable(_) | RefgetError::Io(_) => StatusCode::BAD_GATEWAY,
        RefgetError::UnknownAccession(_)
        | RefgetError::UnresolvedAlias(_)
        | RefgetError::RangeOutOfBounds { .. } => StatusCode::BAD_REQUEST,
    }
}

impl From<TranslateError> for ApiError {
    fn from(e: TranslateError) -> Self {
        let status = match &e {
            TranslateError::Refget(r) => refget_status(r),
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, e.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        let status = match &e {
            StorageError::InvalidRange { .. } => StatusCode::BAD_REQUEST,
            StorageError::Unavailable(_)
            | StorageError::BackpressureTimeout(_)
            | StorageError::BatchAborted(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Translate(t) => t.into(),
            RegistryError::Storage(s) => s.into(),
            RegistryError::Model(m) => Self::internal(m.to_string()),
            RegistryError::DanglingReference { .. } => Self::internal(e.to_string()),
        }
    }
}

impl From<RefgetError> for ApiError {
    fn from(e: RefgetError) -> Self {
        let status = match &e {
            RefgetError::UnknownAccession(_) => StatusCode::NOT_FOUND,
            RefgetError::RangeOutOfBounds { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            _ => refget_status(&e),
        };
        Self::new(status, e.to_string())
    }
}

impl From<QueueError> for ApiError {
    fn from(e: QueueError) -> Self {
        let status = match &e {
            QueueError::RunIdConflict(_) => StatusCode::CONFLICT,
            QueueError::RunUnknown(_) => StatusCode::NOT_FOUND,
            QueueError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self::new(status, e.to_string())
    }
}

impl From<VcfError> for ApiError {
    fn from(e: VcfError) -> Self {
        match e {
            VcfError::Malformed { .. } => Self::bad_request(e.to_string()),
            VcfError::Registry(inner) => inner.into(),
            VcfError::DeadlineExceeded | VcfError::Io(_) => Self::internal(e.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        Self::internal(e.to_string())
    }
}

//! The async seam the editor and invite wizard persist through, and the
//! mapping of its failures onto user-facing notices.

use rocket::http::Status;
use crate::backend::{Backend, BackendError};
use crate::models::{DocumentID, Field, FieldID, FieldPatch, InviteRequest, InviteResponse, NewField};
use crate::views::ClientMeta;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ServiceError {
    pub status: Status,
    pub message: String,
}

impl From<BackendError> for ServiceError {
    fn from(err: BackendError) -> Self {
        ServiceError {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[rocket::async_trait]
pub trait DocumentService: Send + Sync {
    async fn create_field(&self, document_id: &DocumentID, field: NewField) -> ServiceResult<Field>;
    async fn update_field(&self, field_id: &FieldID, patch: FieldPatch) -> ServiceResult<Field>;
    async fn delete_field(&self, field_id: &FieldID) -> ServiceResult<()>;
    async fn invite(&self, document_id: &DocumentID, request: InviteRequest) -> ServiceResult<InviteResponse>;
}

#[rocket::async_trait]
impl DocumentService for Backend {
    async fn create_field(&self, document_id: &DocumentID, field: NewField) -> ServiceResult<Field> {
        Ok(Backend::create_field(self, document_id, field)?)
    }

    async fn update_field(&self, field_id: &FieldID, patch: FieldPatch) -> ServiceResult<Field> {
        Ok(Backend::update_field(self, field_id, patch)?)
    }

    async fn delete_field(&self, field_id: &FieldID) -> ServiceResult<()> {
        Ok(Backend::delete_field(self, field_id)?)
    }

    async fn invite(&self, document_id: &DocumentID, request: InviteRequest) -> ServiceResult<InviteResponse> {
        Ok(Backend::invite(self, document_id, request, &ClientMeta::default())?)
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoticeKind {
    Success,
    Invalid,
    NotFound,
    Forbidden,
    Generic,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: &str) -> Self {
        Notice {
            kind: NoticeKind::Success,
            message: message.to_string(),
        }
    }

    pub fn invalid<E: std::fmt::Display>(err: E) -> Self {
        Notice {
            kind: NoticeKind::Invalid,
            message: err.to_string(),
        }
    }

    pub fn not_found() -> Self {
        Notice {
            kind: NoticeKind::NotFound,
            message: "The document or field no longer exists".to_string(),
        }
    }

    pub fn forbidden() -> Self {
        Notice {
            kind: NoticeKind::Forbidden,
            message: "This document can no longer be changed".to_string(),
        }
    }

    /// Validation failures keep the server's message; other failures get a
    /// fixed message per category.
    pub fn from_error(err: &ServiceError) -> Self {
        match err.status.code {
            400 | 422 => Self::invalid(&err.message),
            404 => Self::not_found(),
            403 => Self::forbidden(),
            _ => Notice {
                kind: NoticeKind::Generic,
                message: "Something went wrong, please try again".to_string(),
            },
        }
    }
}

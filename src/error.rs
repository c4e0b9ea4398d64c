use crate::models::FieldID;

/// Pre-submission validation failures. The message of each variant is shown
/// to the user as-is.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Add at least one field before sending invitations")]
    NoFields,
    #[error("Add at least one signer")]
    NoSigners,
    #[error("{count} field(s) still need to be assigned to a signer")]
    UnassignedFields { count: usize },
    #[error("Each signer must have a unique email address ({email} is used more than once)")]
    DuplicateEmail { email: String },
    #[error("{email} is not one of this document's signers")]
    UnknownSigner { email: String },
    #[error("Field {0} does not belong to this document")]
    UnknownField(FieldID),
    #[error("{0} is not a valid email address")]
    InvalidEmail(String),
    #[error("Signer name is required")]
    MissingName,
    #[error("Signing order must be a positive number")]
    InvalidOrder,
    #[error("Document title is required")]
    MissingTitle,
    #[error("Document must have at least one page")]
    InvalidPageCount,
    #[error("Page {page} is outside the document's {page_count} page(s)")]
    InvalidPage { page: u32, page_count: u32 },
    #[error("Field must lie entirely within the page")]
    OutOfBounds,
    #[error("Field width and height must be greater than 0 and at most 100 percent")]
    InvalidSize,
    #[error("Signers are assigned to fields when invitations are sent")]
    SignerSetOnEdit,
    #[error("Field {0} requires a value")]
    MissingValue(FieldID),
    #[error("Field {0} has a value that does not match its type")]
    InvalidValue(FieldID),
}

use crate::assignment::AssignmentTable;
use crate::{IdKind, TypedUUIDField};

pub struct DocumentKind;
pub struct FieldKind;
pub struct SignerKind;

impl IdKind for DocumentKind {
    const PREFIX: &'static str = "esign_document";
}

impl IdKind for FieldKind {
    const PREFIX: &'static str = "esign_field";
}

impl IdKind for SignerKind {
    const PREFIX: &'static str = "esign_signer";
}

pub type DocumentID = TypedUUIDField<DocumentKind>;
pub type FieldID = TypedUUIDField<FieldKind>;
pub type SignerID = TypedUUIDField<SignerKind>;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Signature,
    Initials,
    Date,
    Text,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Signature => "signature",
            Self::Initials => "initials",
            Self::Date => "date",
            Self::Text => "text",
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SigningOrder {
    Sequential,
    Parallel,
}

impl Default for SigningOrder {
    fn default() -> Self {
        Self::Sequential
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignerStatus {
    Pending,
    Opened,
    Signed,
    Declined,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Draft,
    Pending,
    Completed,
    Declined,
}

impl DocumentStatus {
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft)
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "DRAFT" => Self::Draft,
            "PENDING" => Self::Pending,
            "COMPLETED" => Self::Completed,
            "DECLINED" => Self::Declined,
            other => return Err(format!("unknown document status: {}", other)),
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentID,
    pub title: String,
    pub page_count: u32,
    pub status: DocumentStatus,
    pub signing_order: Option<SigningOrder>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A placeable region on one page of a document. Positions and sizes are
/// percentages of the page's width and height.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: FieldID,
    pub document_id: DocumentID,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub page_number: u32,
    pub position_x: f64,
    pub position_y: f64,
    pub width: f64,
    pub height: f64,
    pub signer_id: Option<SignerID>,
    pub value: Option<String>,
    pub is_required: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Signer {
    pub id: SignerID,
    pub document_id: DocumentID,
    pub email: String,
    pub name: String,
    pub order: u32,
    pub status: SignerStatus,
    #[serde(skip_serializing, default)]
    pub key: String,
    pub opened_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decline_reason: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogEntryType {
    Created,
    Invited,
    Opened,
    Signed,
    Declined,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: uuid::Uuid,
    pub document_id: DocumentID,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub signer_id: Option<SignerID>,
    pub entry_type: LogEntryType,
    pub ip_address: Option<std::net::IpAddr>,
    pub user_agent: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    pub title: String,
    pub page_count: u32,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewField {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub page_number: u32,
    pub position_x: f64,
    pub position_y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_true")]
    pub is_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_id: Option<SignerID>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_id: Option<SignerID>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_required: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignerInvite {
    pub email: String,
    pub name: String,
    pub order: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    pub signers: Vec<SignerInvite>,
    #[serde(default)]
    pub signing_order: SigningOrder,
    pub field_assignments: AssignmentTable,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InvitedSigner {
    #[serde(flatten)]
    pub signer: Signer,
    pub signing_url: String,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InviteResponse {
    pub document: Document,
    pub signers: Vec<InvitedSigner>,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub document: Document,
    pub fields: Vec<Field>,
    pub signers: Vec<Signer>,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SigningView {
    pub document: Document,
    pub signer: Signer,
    pub fields: Vec<Field>,
    pub can_sign: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SignSubmission {
    pub key: String,
    #[serde(default)]
    pub values: std::collections::BTreeMap<FieldID, String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DeclineSubmission {
    pub key: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

#[derive(Clone, Debug, Default)]
pub struct DocumentQuery {
    pub status: Option<DocumentStatus>,
    pub search: Option<String>,
    pub page: usize,
    pub limit: usize,
}

use crate::models::{DocumentStatus, FieldType, Signer, SignerStatus, SigningOrder};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkflowError {
    #[error("signer cannot move from {from:?} to {to:?}")]
    InvalidTransition { from: SignerStatus, to: SignerStatus },
}

impl SignerStatus {
    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Opened => 1,
            Self::Signed | Self::Declined => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Signed | Self::Declined)
    }

    /// Statuses only move forward, and nothing leaves Signed or Declined.
    pub fn can_transition_to(&self, next: SignerStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

pub fn transition(signer: &mut Signer, next: SignerStatus, at: chrono::DateTime<chrono::Utc>) -> Result<(), WorkflowError> {
    if !signer.status.can_transition_to(next) {
        return Err(WorkflowError::InvalidTransition {
            from: signer.status,
            to: next,
        });
    }

    match next {
        SignerStatus::Opened if signer.opened_at.is_none() => signer.opened_at = Some(at),
        SignerStatus::Signed | SignerStatus::Declined => signer.completed_at = Some(at),
        _ => {}
    }
    signer.status = next;
    Ok(())
}

/// The signer whose turn it is under sequential signing: lowest order that
/// has not signed yet. Nobody has a turn once anyone has declined.
pub fn current_turn(signers: &[Signer]) -> Option<&Signer> {
    if signers.iter().any(|s| s.status == SignerStatus::Declined) {
        return None;
    }
    signers.iter()
        .filter(|s| !s.status.is_terminal())
        .min_by(|a, b| a.order.cmp(&b.order).then(a.id.cmp(&b.id)))
}

pub fn may_sign(signer: &Signer, signers: &[Signer], signing_order: Option<SigningOrder>) -> bool {
    if signer.status.is_terminal() || signers.iter().any(|s| s.status == SignerStatus::Declined) {
        return false;
    }
    match signing_order.unwrap_or_default() {
        SigningOrder::Parallel => true,
        SigningOrder::Sequential => current_turn(signers).map_or(false, |s| s.id == signer.id),
    }
}

pub fn document_status(signers: &[Signer]) -> DocumentStatus {
    if signers.iter().any(|s| s.status == SignerStatus::Declined) {
        DocumentStatus::Declined
    } else if !signers.is_empty() && signers.iter().all(|s| s.status == SignerStatus::Signed) {
        DocumentStatus::Completed
    } else {
        DocumentStatus::Pending
    }
}

/// Signature and initials carry base64 image data, optionally as a `data:`
/// URL; dates are `YYYY-MM-DD`.
pub fn is_valid_value(field_type: FieldType, value: &str) -> bool {
    match field_type {
        FieldType::Signature | FieldType::Initials => {
            let data = value.split_once("base64,").map_or(value, |(_, d)| d);
            base64::decode_config(data.trim(), base64::STANDARD).map_or(false, |b| !b.is_empty())
        }
        FieldType::Date => chrono::NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").is_ok(),
        FieldType::Text => true,
    }
}

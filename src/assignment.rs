use std::collections::{BTreeMap, HashSet};
use crate::error::ValidationError;
use crate::models::{Field, FieldID, Signer, SignerInvite};

/// Anything carrying a signer's email address.
pub trait SignerIdentity {
    fn email(&self) -> &str;
}

impl SignerIdentity for SignerInvite {
    fn email(&self) -> &str {
        &self.email
    }
}

impl SignerIdentity for Signer {
    fn email(&self) -> &str {
        &self.email
    }
}

/// The one form emails are compared in: trimmed and lowercased.
pub fn normalise_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentState {
    Unassigned,
    Assigned,
}

/// Which signer is responsible for each field, keyed by field id. Serialises
/// as a plain `{fieldId: signerEmail}` object.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct AssignmentTable {
    entries: BTreeMap<FieldID, String>,
}

impl AssignmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins. The email is not checked against any signer list.
    pub fn assign<E: Into<String>>(&mut self, field_id: FieldID, signer_email: E) -> Option<String> {
        self.entries.insert(field_id, signer_email.into())
    }

    pub fn unassign(&mut self, field_id: &FieldID) -> Option<String> {
        self.entries.remove(field_id)
    }

    pub fn state(&self, field_id: &FieldID) -> AssignmentState {
        if self.entries.contains_key(field_id) {
            AssignmentState::Assigned
        } else {
            AssignmentState::Unassigned
        }
    }

    pub fn signer_for(&self, field_id: &FieldID) -> Option<&str> {
        self.entries.get(field_id).map(|e| e.as_str())
    }

    pub fn fields_for<'a>(&'a self, signer_email: &str) -> impl Iterator<Item=&'a FieldID> + 'a {
        let signer_email = normalise_email(signer_email);
        self.entries.iter()
            .filter(move |(_, e)| normalise_email(e) == signer_email)
            .map(|(f, _)| f)
    }

    pub fn iter(&self) -> impl Iterator<Item=(&FieldID, &str)> {
        self.entries.iter().map(|(f, e)| (f, e.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear()
    }
}

pub fn unassigned_fields<'a>(fields: &'a [Field], table: &AssignmentTable) -> Vec<&'a Field> {
    fields.iter()
        .filter(|f| table.state(&f.id) == AssignmentState::Unassigned)
        .collect()
}

/// An invite cannot go out with zero fields, or with any field unassigned.
pub fn is_ready_to_send(fields: &[Field], table: &AssignmentTable) -> bool {
    !fields.is_empty() && unassigned_fields(fields, table).is_empty()
}

pub fn validate_field_assignments(fields: &[Field], table: &AssignmentTable) -> Result<(), ValidationError> {
    if fields.is_empty() {
        return Err(ValidationError::NoFields);
    }

    match unassigned_fields(fields, table).len() {
        0 => Ok(()),
        count => Err(ValidationError::UnassignedFields { count }),
    }
}

pub fn has_unique_emails<S: SignerIdentity>(signers: &[S]) -> bool {
    validate_unique_emails(signers).is_ok()
}

/// Case-insensitive; reports the first repeated address.
pub fn validate_unique_emails<S: SignerIdentity>(signers: &[S]) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(signers.len());
    for signer in signers {
        let email = normalise_email(signer.email());
        if !seen.insert(email.clone()) {
            return Err(ValidationError::DuplicateEmail { email });
        }
    }
    Ok(())
}

/// Every assigned email must belong to one of `signers`.
pub fn validate_assignment_targets<S: SignerIdentity>(table: &AssignmentTable, signers: &[S]) -> Result<(), ValidationError> {
    let known = signers.iter()
        .map(|s| normalise_email(s.email()))
        .collect::<HashSet<_>>();

    match table.iter().find(|(_, e)| !known.contains(&normalise_email(e))) {
        Some((_, email)) => Err(ValidationError::UnknownSigner { email: email.to_string() }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::models::{DocumentID, FieldType};

    fn fields(n: usize) -> Vec<Field> {
        let document_id = DocumentID::new();
        (0..n).map(|i| Field {
            id: FieldID::new(),
            document_id,
            field_type: FieldType::Signature,
            page_number: 1,
            position_x: 0.0,
            position_y: 12.0 * i as f64,
            width: 25.0,
            height: 10.0,
            signer_id: None,
            value: None,
            is_required: true,
        }).collect()
    }

    fn invite(email: &str) -> SignerInvite {
        SignerInvite {
            email: email.to_string(),
            name: "Signer".to_string(),
            order: 1,
        }
    }

    #[test]
    fn ready_once_every_field_is_assigned() {
        let fields = fields(3);
        let mut table = AssignmentTable::new();
        table.assign(fields[0].id, "a@x.com");
        table.assign(fields[1].id, "b@x.com");
        assert!(!is_ready_to_send(&fields, &table));

        table.assign(fields[2].id, "c@x.com");
        assert!(is_ready_to_send(&fields, &table));
    }

    #[test]
    fn never_ready_without_fields() {
        let mut table = AssignmentTable::new();
        assert!(!is_ready_to_send(&[], &table));
        table.assign(FieldID::new(), "a@x.com");
        assert!(!is_ready_to_send(&[], &table));
        assert_matches!(validate_field_assignments(&[], &table), Err(ValidationError::NoFields));
    }

    #[test]
    fn assign_is_last_write_wins_and_unassign_is_idempotent() {
        let fields = fields(1);
        let id = fields[0].id;
        let mut table = AssignmentTable::new();

        assert_eq!(table.state(&id), AssignmentState::Unassigned);
        assert_eq!(table.assign(id, "a@x.com"), None);
        assert_eq!(table.assign(id, "b@x.com"), Some("a@x.com".to_string()));
        assert_eq!(table.signer_for(&id), Some("b@x.com"));
        assert_eq!(table.len(), 1);

        assert_eq!(table.unassign(&id), Some("b@x.com".to_string()));
        assert_eq!(table.unassign(&id), None);
        assert_eq!(table.state(&id), AssignmentState::Unassigned);
    }

    #[test]
    fn unassigned_count_is_reported() {
        let fields = fields(4);
        let mut table = AssignmentTable::new();
        table.assign(fields[2].id, "a@x.com");
        assert_matches!(
            validate_field_assignments(&fields, &table),
            Err(ValidationError::UnassignedFields { count: 3 })
        );
        let message = validate_field_assignments(&fields, &table).unwrap_err().to_string();
        assert!(message.starts_with("3 field(s)"));
    }

    #[test]
    fn duplicate_emails_are_case_insensitive() {
        assert!(!has_unique_emails(&[invite("a@x.com"), invite("A@X.COM")]));
        assert!(has_unique_emails(&[invite("a@x.com"), invite("b@x.com")]));
        assert_matches!(
            validate_unique_emails(&[invite("a@x.com"), invite("b@x.com"), invite("B@x.com")]),
            Err(ValidationError::DuplicateEmail { email }) if email == "b@x.com"
        );
    }

    #[test]
    fn assignments_must_target_known_signers() {
        let fields = fields(2);
        let mut table = AssignmentTable::new();
        table.assign(fields[0].id, "A@x.com");
        assert!(validate_assignment_targets(&table, &[invite("a@x.com")]).is_ok());

        table.assign(fields[1].id, "z@x.com");
        assert_matches!(
            validate_assignment_targets(&table, &[invite("a@x.com")]),
            Err(ValidationError::UnknownSigner { email }) if email == "z@x.com"
        );
    }

    #[test]
    fn table_serialises_as_plain_object() {
        let fields = fields(1);
        let mut table = AssignmentTable::new();
        table.assign(fields[0].id, "a@x.com");

        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json[fields[0].id.to_string()], "a@x.com");

        let back: AssignmentTable = serde_json::from_value(json).unwrap();
        assert_eq!(back, table);
        assert_eq!(back.fields_for("A@X.com").collect::<Vec<_>>(), vec![&fields[0].id]);
    }

    #[test]
    fn emails_compare_beyond_ascii() {
        assert_eq!(normalise_email("  Ärzte@X.com "), normalise_email("ärzte@x.com"));

        let fields = fields(1);
        let mut table = AssignmentTable::new();
        table.assign(fields[0].id, "Ärzte@x.com");
        assert_eq!(table.fields_for("ärzte@x.com").count(), 1);
        assert!(validate_assignment_targets(&table, &[invite("ärzte@x.com")]).is_ok());
        assert!(!has_unique_emails(&[invite("Ärzte@x.com"), invite("ärzte@x.com")]));
    }
}

//! Typed state for the invite form. Validation is a pure function of the
//! state and reports errors keyed by field path, e.g. `signers[1].email`.

use std::collections::{BTreeMap, HashSet};
use crate::assignment::{normalise_email, SignerIdentity};
use crate::error::ValidationError;
use crate::models::{SignerInvite, SigningOrder};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SignerEntry {
    pub name: String,
    pub email: String,
}

impl SignerEntry {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
        }
    }
}

impl SignerIdentity for SignerEntry {
    fn email(&self) -> &str {
        &self.email
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InviteForm {
    pub signers: Vec<SignerEntry>,
    pub signing_order: SigningOrder,
}

impl InviteForm {
    pub fn new(signing_order: SigningOrder) -> Self {
        Self {
            signers: vec![],
            signing_order,
        }
    }

    pub fn add_signer(&mut self, name: &str, email: &str) {
        self.signers.push(SignerEntry::new(name, email));
    }

    pub fn remove_signer(&mut self, index: usize) -> Option<SignerEntry> {
        if index < self.signers.len() {
            Some(self.signers.remove(index))
        } else {
            None
        }
    }

    /// Signing order is implied by list position, starting at 1.
    pub fn to_invites(&self) -> Vec<SignerInvite> {
        self.signers.iter().enumerate().map(|(i, s)| SignerInvite {
            email: s.email.trim().to_string(),
            name: s.name.trim().to_string(),
            order: (i + 1) as u32,
        }).collect()
    }
}

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, String>);

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(|m| m.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item=(&str, &str)> {
        self.0.iter().map(|(p, m)| (p.as_str(), m.as_str()))
    }

    fn insert(&mut self, path: String, error: ValidationError) {
        self.0.entry(path).or_insert_with(|| error.to_string());
    }
}

impl std::fmt::Display for FormErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (path, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            f.write_fmt(format_args!("{}: {}", path, message))?;
        }
        Ok(())
    }
}

pub fn is_valid_email(email: &str) -> bool {
    email.trim().parse::<lettre::Address>().is_ok()
}

pub fn validate(form: &InviteForm) -> FormErrors {
    let mut errors = FormErrors::default();

    if form.signers.is_empty() {
        errors.insert("signers".to_string(), ValidationError::NoSigners);
        return errors;
    }

    let mut seen = HashSet::with_capacity(form.signers.len());
    for (i, signer) in form.signers.iter().enumerate() {
        if signer.name.trim().is_empty() {
            errors.insert(format!("signers[{}].name", i), ValidationError::MissingName);
        }

        let email = signer.email.trim();
        if !is_valid_email(email) {
            errors.insert(format!("signers[{}].email", i), ValidationError::InvalidEmail(email.to_string()));
        } else if !seen.insert(normalise_email(email)) {
            errors.insert(format!("signers[{}].email", i), ValidationError::DuplicateEmail {
                email: normalise_email(email)
            });
        }
    }

    if let Err(err) = crate::assignment::validate_unique_emails(&form.signers) {
        errors.insert("signers".to_string(), err);
    }

    errors
}

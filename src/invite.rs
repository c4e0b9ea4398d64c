use std::sync::Arc;
use crate::assignment::{self, AssignmentTable};
use crate::error::ValidationError;
use crate::forms::{self, FormErrors, InviteForm};
use crate::models::{DocumentID, Field, FieldID, InviteRequest, InviteResponse};
use crate::service::{DocumentService, Notice};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Signers,
    Assignments,
}

/// Two steps: collect signers and signing order, then give every field a
/// signer. Each gate is checked again immediately before submitting.
pub struct InviteWizard<S: DocumentService> {
    service: Arc<S>,
    document_id: DocumentID,
    fields: Vec<Field>,
    form: InviteForm,
    table: AssignmentTable,
    step: WizardStep,
}

impl<S: DocumentService> InviteWizard<S> {
    pub fn new(service: Arc<S>, document_id: DocumentID, fields: Vec<Field>) -> Self {
        Self {
            service,
            document_id,
            fields,
            form: InviteForm::default(),
            table: AssignmentTable::new(),
            step: WizardStep::Signers,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn form(&self) -> &InviteForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut InviteForm {
        &mut self.form
    }

    pub fn assignments(&self) -> &AssignmentTable {
        &self.table
    }

    /// Moves on to assignments only when the signer form is valid.
    pub fn advance(&mut self) -> Result<(), FormErrors> {
        let errors = forms::validate(&self.form);
        if !errors.is_empty() {
            return Err(errors);
        }
        self.step = WizardStep::Assignments;
        Ok(())
    }

    pub fn back(&mut self) {
        self.step = WizardStep::Signers;
    }

    pub fn assign(&mut self, field_id: FieldID, signer_email: &str) -> Result<(), ValidationError> {
        if !self.fields.iter().any(|f| f.id == field_id) {
            return Err(ValidationError::UnknownField(field_id));
        }
        let email = signer_email.trim();
        let normalised = assignment::normalise_email(email);
        if !self.form.signers.iter().any(|s| assignment::normalise_email(&s.email) == normalised) {
            return Err(ValidationError::UnknownSigner {
                email: email.to_string()
            });
        }
        self.table.assign(field_id, email);
        Ok(())
    }

    pub fn unassign(&mut self, field_id: &FieldID) {
        self.table.unassign(field_id);
    }

    pub fn unassigned(&self) -> Vec<&Field> {
        assignment::unassigned_fields(&self.fields, &self.table)
    }

    pub fn can_submit(&self) -> bool {
        self.step == WizardStep::Assignments
            && forms::validate(&self.form).is_empty()
            && assignment::is_ready_to_send(&self.fields, &self.table)
    }

    pub fn build_request(&self) -> Result<InviteRequest, Notice> {
        let errors = forms::validate(&self.form);
        if !errors.is_empty() {
            return Err(Notice::invalid(errors));
        }

        let signers = self.form.to_invites();
        assignment::validate_unique_emails(&signers).map_err(Notice::invalid)?;
        assignment::validate_field_assignments(&self.fields, &self.table).map_err(Notice::invalid)?;
        assignment::validate_assignment_targets(&self.table, &signers).map_err(Notice::invalid)?;

        Ok(InviteRequest {
            signers,
            signing_order: self.form.signing_order,
            field_assignments: self.table.clone(),
        })
    }

    /// On success the assignment table is discarded; on failure nothing
    /// changes and the user can retry.
    pub async fn submit(&mut self) -> Result<InviteResponse, Notice> {
        let request = self.build_request()?;
        match self.service.invite(&self.document_id, request).await {
            Ok(response) => {
                info!("Invitations for {} sent to {} signer(s)", self.document_id, response.signers.len());
                self.table.clear();
                Ok(response)
            }
            Err(err) => {
                warn!("Unable to send invitations for {}: {}", self.document_id, err);
                Err(Notice::from_error(&err))
            }
        }
    }
}

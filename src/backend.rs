use std::sync::Arc;
use rand::Rng;
use rocket::http::Status;
use crate::error::ValidationError;
use crate::models::{
    DeclineSubmission, Document, DocumentDetail, DocumentID, DocumentQuery, DocumentStatus, Field, FieldID,
    FieldPatch, InviteRequest, InviteResponse, InvitedSigner, LogEntry, LogEntryType, NewDocument, NewField, Page,
    SignSubmission, Signer, SignerID, SignerStatus, SigningView,
};
use crate::store::{ChangeSet, Expect, Repository, StoreError};
use crate::views::ClientMeta;
use crate::workflow::{self, WorkflowError};
use crate::{assignment, forms, layout, Config};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("document {0} can no longer be edited")]
    NotEditable(DocumentID),
    #[error("document {0} is not out for signature")]
    NotSigning(DocumentID),
    #[error("invalid signing key")]
    BadKey,
    #[error("signer has already completed this document")]
    AlreadyCompleted,
    #[error("waiting for earlier signers to finish")]
    NotYourTurn,
}

impl BackendError {
    pub fn status(&self) -> Status {
        match self {
            Self::Store(StoreError::Poisoned) => Status::InternalServerError,
            Self::Store(StoreError::DocumentLocked(_)) => Status::Forbidden,
            Self::Store(StoreError::DocumentChanged(_) | StoreError::SignerChanged(_)) => Status::Conflict,
            Self::Store(_) => Status::NotFound,
            Self::Invalid(_) => Status::UnprocessableEntity,
            Self::Workflow(_) => Status::Conflict,
            Self::NotEditable(_) | Self::NotSigning(_) | Self::BadKey | Self::AlreadyCompleted | Self::NotYourTurn => {
                Status::Forbidden
            }
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Rounding headroom on the right and bottom edges, so a position clamped to
/// `100 - size` is still accepted.
const PLACEMENT_SLACK: f64 = 1e-9;

pub fn make_signer_key() -> String {
    base64::encode_config(
        rand::thread_rng()
            .sample_iter(rand::distributions::Standard)
            .take(64)
            .collect::<Vec<u8>>(),
        base64::URL_SAFE_NO_PAD,
    )
}

/// Document and invite service semantics over a [`Repository`].
pub struct Backend {
    repository: Arc<dyn Repository>,
    config: Config,
}

impl Backend {
    pub fn new(repository: Arc<dyn Repository>, config: Config) -> Self {
        Self {
            repository,
            config,
        }
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    pub fn signing_url(&self, signer: &Signer) -> String {
        format!(
            "{}/documents/{}/sign/{}?key={}",
            self.config.external_uri, signer.document_id, signer.id, signer.key
        )
    }

    fn log_entry(&self, document_id: DocumentID, signer_id: Option<SignerID>, entry_type: LogEntryType, client_meta: &ClientMeta) -> LogEntry {
        LogEntry {
            id: uuid::Uuid::new_v4(),
            document_id,
            timestamp: chrono::Utc::now(),
            signer_id,
            entry_type,
            ip_address: client_meta.ip,
            user_agent: client_meta.user_agent.clone(),
        }
    }

    fn editable_document(&self, id: &DocumentID) -> BackendResult<Document> {
        let document = self.repository.get_document(id)?;
        if !document.status.is_editable() {
            warn!("Rejected edit of {} in status {:?}", id, document.status);
            return Err(BackendError::NotEditable(*id));
        }
        Ok(document)
    }

    fn check_rect(&self, document: &Document, page_number: u32, x: f64, y: f64, width: f64, height: f64) -> BackendResult<()> {
        if page_number < 1 || page_number > document.page_count {
            return Err(ValidationError::InvalidPage {
                page: page_number,
                page_count: document.page_count,
            }.into());
        }
        if !layout::validate_field_size(width, height) {
            return Err(ValidationError::InvalidSize.into());
        }
        if !layout::validate_field_placement(x, y, width - PLACEMENT_SLACK, height - PLACEMENT_SLACK) {
            return Err(ValidationError::OutOfBounds.into());
        }
        Ok(())
    }

    fn check_unassigned(&self, signer_id: &Option<SignerID>) -> BackendResult<()> {
        match signer_id {
            Some(_) => Err(ValidationError::SignerSetOnEdit.into()),
            None => Ok(()),
        }
    }

    fn check_signer(&self, document_id: &DocumentID, signer_id: &SignerID) -> BackendResult<Signer> {
        let signer = self.repository.get_signer(signer_id)?;
        if &signer.document_id != document_id {
            return Err(StoreError::SignerNotFound(*signer_id).into());
        }
        Ok(signer)
    }

    fn report_overlaps(&self, field: &Field) -> BackendResult<()> {
        let fields = self.repository.list_fields(&field.document_id)?;
        for other in fields.iter().filter(|f| f.id != field.id) {
            if layout::do_fields_overlap(field, other) {
                debug!("Field {} overlaps {} on page {}", field.id, other.id, field.page_number);
            }
        }
        Ok(())
    }

    pub fn create_document(&self, new_document: NewDocument, client_meta: &ClientMeta) -> BackendResult<Document> {
        let title = new_document.title.trim();
        if title.is_empty() {
            return Err(ValidationError::MissingTitle.into());
        }
        if new_document.page_count == 0 {
            return Err(ValidationError::InvalidPageCount.into());
        }

        let now = chrono::Utc::now();
        let document = self.repository.insert_document(Document {
            id: DocumentID::new(),
            title: title.to_string(),
            page_count: new_document.page_count,
            status: DocumentStatus::Draft,
            signing_order: None,
            created_at: now,
            updated_at: now,
        })?;
        self.repository.append_log(self.log_entry(document.id, None, LogEntryType::Created, client_meta))?;
        info!("Created document {} ({} page(s))", document.id, document.page_count);
        Ok(document)
    }

    pub fn list_documents(
        &self, status: Option<DocumentStatus>, search: Option<String>, page: Option<usize>, limit: Option<usize>,
    ) -> BackendResult<Page<Document>> {
        let query = DocumentQuery {
            status,
            search,
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(self.config.default_page_size).max(1).min(self.config.max_page_size),
        };
        Ok(self.repository.list_documents(&query)?)
    }

    pub fn document_detail(&self, id: &DocumentID) -> BackendResult<DocumentDetail> {
        let document = self.repository.get_document(id)?;
        let fields = self.repository.list_fields(id)?;
        let signers = self.repository.list_signers(id)?;
        debug!("Loaded document and fields: {:#?}, {:#?}", document, fields);

        Ok(DocumentDetail {
            document,
            fields: layout::sort_fields_by_position(&fields),
            signers,
        })
    }

    pub fn create_field(&self, document_id: &DocumentID, new_field: NewField) -> BackendResult<Field> {
        let document = self.editable_document(document_id)?;
        self.check_rect(
            &document, new_field.page_number,
            new_field.position_x, new_field.position_y, new_field.width, new_field.height,
        )?;
        self.check_unassigned(&new_field.signer_id)?;

        let field = self.repository.insert_field(Field {
            id: FieldID::new(),
            document_id: *document_id,
            field_type: new_field.field_type,
            page_number: new_field.page_number,
            position_x: new_field.position_x,
            position_y: new_field.position_y,
            width: new_field.width,
            height: new_field.height,
            signer_id: None,
            value: None,
            is_required: new_field.is_required,
        })?;
        self.report_overlaps(&field)?;
        Ok(field)
    }

    pub fn update_field(&self, field_id: &FieldID, patch: FieldPatch) -> BackendResult<Field> {
        let mut field = self.repository.get_field(field_id)?;
        let document = self.editable_document(&field.document_id)?;
        self.check_unassigned(&patch.signer_id)?;

        field.page_number = patch.page_number.unwrap_or(field.page_number);
        field.position_x = patch.position_x.unwrap_or(field.position_x);
        field.position_y = patch.position_y.unwrap_or(field.position_y);
        field.width = patch.width.unwrap_or(field.width);
        field.height = patch.height.unwrap_or(field.height);
        field.is_required = patch.is_required.unwrap_or(field.is_required);
        self.check_rect(&document, field.page_number, field.position_x, field.position_y, field.width, field.height)?;

        let field = self.repository.update_field(field)?;
        self.report_overlaps(&field)?;
        Ok(field)
    }

    pub fn delete_field(&self, field_id: &FieldID) -> BackendResult<()> {
        let field = self.repository.get_field(field_id)?;
        self.editable_document(&field.document_id)?;
        self.repository.delete_field(field_id)?;
        debug!("Deleted field {} from {}", field_id, field.document_id);
        Ok(())
    }

    /// Creates the signers, folds the assignment table into the fields and
    /// sends the document out. Every gate is re-checked here against stored
    /// state.
    pub fn invite(&self, document_id: &DocumentID, request: InviteRequest, client_meta: &ClientMeta) -> BackendResult<InviteResponse> {
        let mut document = self.editable_document(document_id)?;

        if request.signers.is_empty() {
            return Err(ValidationError::NoSigners.into());
        }
        for signer in &request.signers {
            if signer.name.trim().is_empty() {
                return Err(ValidationError::MissingName.into());
            }
            if !forms::is_valid_email(&signer.email) {
                return Err(ValidationError::InvalidEmail(signer.email.clone()).into());
            }
            if signer.order == 0 {
                return Err(ValidationError::InvalidOrder.into());
            }
        }
        assignment::validate_unique_emails(&request.signers)?;

        let stored_fields = self.repository.list_fields(document_id)?;
        let mut fields = stored_fields.clone();
        assignment::validate_field_assignments(&fields, &request.field_assignments)?;
        if let Some((field_id, _)) = request.field_assignments.iter().find(|(f, _)| !fields.iter().any(|field| &field.id == *f)) {
            return Err(ValidationError::UnknownField(*field_id).into());
        }
        assignment::validate_assignment_targets(&request.field_assignments, &request.signers)?;

        let signers = request.signers.iter().map(|s| Signer {
            id: SignerID::new(),
            document_id: *document_id,
            email: s.email.trim().to_string(),
            name: s.name.trim().to_string(),
            order: s.order,
            status: SignerStatus::Pending,
            key: make_signer_key(),
            opened_at: None,
            completed_at: None,
            decline_reason: None,
        }).collect::<Vec<_>>();

        for field in fields.iter_mut() {
            let email = request.field_assignments.signer_for(&field.id).unwrap_or_default();
            let normalised = assignment::normalise_email(email);
            let signer = signers.iter()
                .find(|s| assignment::normalise_email(&s.email) == normalised)
                .ok_or_else(|| ValidationError::UnknownSigner { email: email.to_string() })?;
            field.signer_id = Some(signer.id);
        }

        document.status = DocumentStatus::Pending;
        document.signing_order = Some(request.signing_order);
        document.updated_at = chrono::Utc::now();

        self.repository.commit(ChangeSet {
            document: Some(document.clone()),
            fields,
            signers: signers.clone(),
            log: vec![self.log_entry(*document_id, None, LogEntryType::Invited, client_meta)],
            expect: vec![
                Expect::DocumentStatus(*document_id, DocumentStatus::Draft),
                Expect::Fields(*document_id, stored_fields),
            ],
            ..Default::default()
        })?;

        info!("Document {} sent to {} signer(s), {:?} order", document.id, signers.len(), request.signing_order);
        let signers = signers.into_iter().map(|signer| {
            let signing_url = self.signing_url(&signer);
            debug!("Signing link for {}: {}", signer.email, signing_url);
            InvitedSigner {
                signer,
                signing_url,
            }
        }).collect();

        Ok(InviteResponse {
            document,
            signers,
        })
    }

    fn signer_with_key(&self, document_id: &DocumentID, signer_id: &SignerID, key: &str) -> BackendResult<Signer> {
        let signer = self.check_signer(document_id, signer_id)?;
        if signer.key != key {
            return Err(BackendError::BadKey);
        }
        Ok(signer)
    }

    fn signing_view(&self, document: Document, signer: Signer) -> BackendResult<SigningView> {
        let signers = self.repository.list_signers(&document.id)?;
        let fields = self.repository.list_fields(&document.id)?
            .into_iter()
            .filter(|f| f.signer_id == Some(signer.id))
            .collect::<Vec<_>>();
        let can_sign = document.status == DocumentStatus::Pending
            && workflow::may_sign(&signer, &signers, document.signing_order);

        Ok(SigningView {
            fields: layout::sort_fields_by_position(&fields),
            document,
            signer,
            can_sign,
        })
    }

    pub fn open_signing(&self, document_id: &DocumentID, signer_id: &SignerID, key: &str, client_meta: &ClientMeta) -> BackendResult<SigningView> {
        let document = self.repository.get_document(document_id)?;
        let mut signer = self.signer_with_key(document_id, signer_id, key)?;

        if !signer.status.is_terminal() {
            if document.status != DocumentStatus::Pending {
                return Err(BackendError::NotSigning(*document_id));
            }
            if signer.status == SignerStatus::Pending {
                workflow::transition(&mut signer, SignerStatus::Opened, chrono::Utc::now())?;
                let opened = self.repository.commit(ChangeSet {
                    signers: vec![signer.clone()],
                    log: vec![self.log_entry(*document_id, Some(signer.id), LogEntryType::Opened, client_meta)],
                    expect: vec![Expect::SignerStatus(signer.id, SignerStatus::Pending)],
                    ..Default::default()
                });
                match opened {
                    Ok(_) => {}
                    // Another request got there first; show what it stored.
                    Err(StoreError::SignerChanged(_)) => signer = self.repository.get_signer(signer_id)?,
                    Err(err) => return Err(err.into()),
                }
            }
        }

        self.signing_view(document, signer)
    }

    pub fn submit_signing(&self, document_id: &DocumentID, signer_id: &SignerID, submission: SignSubmission, client_meta: &ClientMeta) -> BackendResult<SigningView> {
        let mut document = self.repository.get_document(document_id)?;
        let mut signer = self.signer_with_key(document_id, signer_id, &submission.key)?;
        if signer.status.is_terminal() {
            return Err(BackendError::AlreadyCompleted);
        }
        if document.status != DocumentStatus::Pending {
            return Err(BackendError::NotSigning(*document_id));
        }
        let read_status = signer.status;

        let mut signers = self.repository.list_signers(document_id)?;
        if !workflow::may_sign(&signer, &signers, document.signing_order) {
            return Err(BackendError::NotYourTurn);
        }

        let mut own_fields = self.repository.list_fields(document_id)?
            .into_iter()
            .filter(|f| f.signer_id == Some(signer.id))
            .collect::<Vec<_>>();
        if let Some(field_id) = submission.values.keys().find(|id| !own_fields.iter().any(|f| &f.id == *id)) {
            return Err(ValidationError::UnknownField(*field_id).into());
        }
        for field in own_fields.iter_mut() {
            let value = submission.values.get(&field.id).map(|v| v.trim()).filter(|v| !v.is_empty());
            match value {
                Some(value) if workflow::is_valid_value(field.field_type, value) => field.value = Some(value.to_string()),
                Some(_) => return Err(ValidationError::InvalidValue(field.id).into()),
                None if field.is_required => return Err(ValidationError::MissingValue(field.id).into()),
                None => {}
            }
        }

        let now = chrono::Utc::now();
        workflow::transition(&mut signer, SignerStatus::Signed, now)?;
        document.updated_at = now;

        // The status is worked out from every signer as stored, so parallel
        // signers that read each other as outstanding still complete it.
        let document = self.repository.commit(ChangeSet {
            document: Some(document),
            fields: own_fields,
            signers: vec![signer.clone()],
            log: vec![self.log_entry(*document_id, Some(signer.id), LogEntryType::Signed, client_meta)],
            expect: vec![
                Expect::DocumentStatus(*document_id, DocumentStatus::Pending),
                Expect::SignerStatus(signer.id, read_status),
            ],
            derive_status: true,
        })?.ok_or(StoreError::DocumentNotFound(*document_id))?;

        info!("Signer {} signed document {}", signer.id, document_id);
        if document.status == DocumentStatus::Completed {
            info!("Document {} completed", document_id);
        } else {
            signers = self.repository.list_signers(document_id)?;
            if let Some(next) = workflow::current_turn(&signers) {
                debug!("Document {} now waiting on {}", document_id, next.email);
            }
        }

        self.signing_view(document, signer)
    }

    pub fn decline(&self, document_id: &DocumentID, signer_id: &SignerID, submission: DeclineSubmission, client_meta: &ClientMeta) -> BackendResult<Signer> {
        let mut document = self.repository.get_document(document_id)?;
        let mut signer = self.signer_with_key(document_id, signer_id, &submission.key)?;
        if signer.status.is_terminal() {
            return Err(BackendError::AlreadyCompleted);
        }
        if document.status != DocumentStatus::Pending {
            return Err(BackendError::NotSigning(*document_id));
        }

        let read_status = signer.status;
        let now = chrono::Utc::now();
        workflow::transition(&mut signer, SignerStatus::Declined, now)?;
        signer.decline_reason = submission.reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        document.status = DocumentStatus::Declined;
        document.updated_at = now;

        self.repository.commit(ChangeSet {
            document: Some(document),
            signers: vec![signer.clone()],
            log: vec![self.log_entry(*document_id, Some(signer.id), LogEntryType::Declined, client_meta)],
            expect: vec![
                Expect::DocumentStatus(*document_id, DocumentStatus::Pending),
                Expect::SignerStatus(signer.id, read_status),
            ],
            ..Default::default()
        })?;
        info!("Signer {} declined document {}", signer.id, document_id);
        Ok(signer)
    }

    pub fn log(&self, document_id: &DocumentID) -> BackendResult<Vec<LogEntry>> {
        self.repository.get_document(document_id)?;
        Ok(self.repository.list_log(document_id)?)
    }
}

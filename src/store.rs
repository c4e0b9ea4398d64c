//! Persistence for documents, fields, signers and the audit log.
//!
//! The in-memory repository is injected wherever it is used; nothing here is
//! global. `initialize` loads a seed and `reset` empties it again.

use std::collections::HashMap;
use std::sync::RwLock;
use crate::models::{
    Document, DocumentID, DocumentQuery, DocumentStatus, Field, FieldID, FieldType, LogEntry, Page, Signer,
    SignerID, SignerStatus,
};
use crate::workflow;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("document {0} not found")]
    DocumentNotFound(DocumentID),
    #[error("field {0} not found")]
    FieldNotFound(FieldID),
    #[error("signer {0} not found")]
    SignerNotFound(SignerID),
    #[error("document {0} can no longer be edited")]
    DocumentLocked(DocumentID),
    #[error("document {0} was changed by another request")]
    DocumentChanged(DocumentID),
    #[error("signer {0} was changed by another request")]
    SignerChanged(SignerID),
    #[error("repository lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Stored state a [`ChangeSet`] was computed from. `commit` refuses to
/// apply the set once any of these no longer hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Expect {
    DocumentStatus(DocumentID, DocumentStatus),
    SignerStatus(SignerID, SignerStatus),
    /// The document has exactly these fields, unchanged.
    Fields(DocumentID, Vec<Field>),
}

/// A set of writes applied atomically by [`Repository::commit`].
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub document: Option<Document>,
    pub fields: Vec<Field>,
    pub signers: Vec<Signer>,
    pub log: Vec<LogEntry>,
    pub expect: Vec<Expect>,
    /// Set the document's status from its stored signers after the writes.
    pub derive_status: bool,
}

pub trait Repository: Send + Sync {
    fn insert_document(&self, document: Document) -> StoreResult<Document>;
    fn get_document(&self, id: &DocumentID) -> StoreResult<Document>;
    fn list_documents(&self, query: &DocumentQuery) -> StoreResult<Page<Document>>;

    fn insert_field(&self, field: Field) -> StoreResult<Field>;
    fn get_field(&self, id: &FieldID) -> StoreResult<Field>;
    fn update_field(&self, field: Field) -> StoreResult<Field>;
    fn delete_field(&self, id: &FieldID) -> StoreResult<Field>;
    fn list_fields(&self, document_id: &DocumentID) -> StoreResult<Vec<Field>>;

    fn get_signer(&self, id: &SignerID) -> StoreResult<Signer>;
    /// Signers of a document in signing order.
    fn list_signers(&self, document_id: &DocumentID) -> StoreResult<Vec<Signer>>;

    fn append_log(&self, entry: LogEntry) -> StoreResult<()>;
    fn list_log(&self, document_id: &DocumentID) -> StoreResult<Vec<LogEntry>>;

    /// Applies every write in `changes` or none of them, returning the
    /// document as stored afterwards when the set wrote one.
    fn commit(&self, changes: ChangeSet) -> StoreResult<Option<Document>>;
}

#[derive(Debug, Clone, Default)]
pub struct Seed {
    pub documents: Vec<Document>,
    pub fields: Vec<Field>,
    pub signers: Vec<Signer>,
}

impl Seed {
    /// One editable three-page document with a couple of fields already placed.
    pub fn demo() -> Self {
        let now = chrono::Utc::now();
        let document = Document {
            id: DocumentID::new(),
            title: "Mutual non-disclosure agreement".to_string(),
            page_count: 3,
            status: DocumentStatus::Draft,
            signing_order: None,
            created_at: now,
            updated_at: now,
        };
        let field = |field_type, position_x, position_y| {
            let (width, height) = crate::geometry::default_dimensions(field_type);
            Field {
                id: FieldID::new(),
                document_id: document.id,
                field_type,
                page_number: 3,
                position_x,
                position_y,
                width,
                height,
                signer_id: None,
                value: None,
                is_required: true,
            }
        };
        let fields = vec![
            field(FieldType::Signature, 10.0, 70.0),
            field(FieldType::Date, 60.0, 72.0),
        ];

        Seed {
            documents: vec![document],
            fields,
            signers: vec![],
        }
    }
}

#[derive(Debug, Default)]
struct State {
    documents: HashMap<DocumentID, Document>,
    fields: HashMap<FieldID, Field>,
    signers: HashMap<SignerID, Signer>,
    log: Vec<LogEntry>,
}

#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the repository's contents with `seed`.
    pub fn initialize(&self, seed: Seed) -> StoreResult<()> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        *state = State::default();
        state.documents.extend(seed.documents.into_iter().map(|d| (d.id, d)));
        state.fields.extend(seed.fields.into_iter().map(|f| (f.id, f)));
        state.signers.extend(seed.signers.into_iter().map(|s| (s.id, s)));
        debug!(
            "Repository initialised with {} document(s), {} field(s), {} signer(s)",
            state.documents.len(), state.fields.len(), state.signers.len()
        );
        Ok(())
    }

    pub fn reset(&self) -> StoreResult<()> {
        self.initialize(Seed::default())
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| StoreError::Poisoned)
    }
}

impl State {
    fn editable_document(&self, id: &DocumentID) -> StoreResult<&Document> {
        let document = self.documents.get(id).ok_or(StoreError::DocumentNotFound(*id))?;
        if !document.status.is_editable() {
            return Err(StoreError::DocumentLocked(*id));
        }
        Ok(document)
    }

    fn check(&self, expect: &Expect) -> StoreResult<()> {
        match expect {
            Expect::DocumentStatus(id, status) => {
                let document = self.documents.get(id).ok_or(StoreError::DocumentNotFound(*id))?;
                if &document.status != status {
                    return Err(StoreError::DocumentChanged(*id));
                }
            }
            Expect::SignerStatus(id, status) => {
                let signer = self.signers.get(id).ok_or(StoreError::SignerNotFound(*id))?;
                if &signer.status != status {
                    return Err(StoreError::SignerChanged(*id));
                }
            }
            Expect::Fields(id, fields) => {
                let stored = self.fields.values().filter(|f| &f.document_id == id).count();
                let unchanged = stored == fields.len()
                    && fields.iter().all(|f| self.fields.get(&f.id) == Some(f));
                if !unchanged {
                    return Err(StoreError::DocumentChanged(*id));
                }
            }
        }
        Ok(())
    }

    fn signers_of(&self, document_id: &DocumentID) -> Vec<Signer> {
        let mut signers = self.signers.values()
            .filter(|s| &s.document_id == document_id)
            .cloned()
            .collect::<Vec<_>>();
        signers.sort_by(|a, b| a.order.cmp(&b.order).then(a.id.cmp(&b.id)));
        signers
    }
}

impl Repository for MemoryRepository {
    fn insert_document(&self, document: Document) -> StoreResult<Document> {
        self.write()?.documents.insert(document.id, document.clone());
        Ok(document)
    }

    fn get_document(&self, id: &DocumentID) -> StoreResult<Document> {
        self.read()?.documents.get(id).cloned().ok_or(StoreError::DocumentNotFound(*id))
    }

    fn list_documents(&self, query: &DocumentQuery) -> StoreResult<Page<Document>> {
        let state = self.read()?;
        let search = query.search.as_ref().map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());

        let mut matching = state.documents.values()
            .filter(|d| query.status.map_or(true, |s| d.status == s))
            .filter(|d| search.as_ref().map_or(true, |s| d.title.to_lowercase().contains(s.as_str())))
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let page = query.page.max(1);
        let limit = query.limit.max(1);
        let total = matching.len();
        let data = matching.into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .collect();

        Ok(Page {
            data,
            total,
            page,
            limit,
        })
    }

    fn insert_field(&self, field: Field) -> StoreResult<Field> {
        let mut state = self.write()?;
        state.editable_document(&field.document_id)?;
        state.fields.insert(field.id, field.clone());
        Ok(field)
    }

    fn get_field(&self, id: &FieldID) -> StoreResult<Field> {
        self.read()?.fields.get(id).cloned().ok_or(StoreError::FieldNotFound(*id))
    }

    fn update_field(&self, field: Field) -> StoreResult<Field> {
        let mut state = self.write()?;
        let document_id = state.fields.get(&field.id).ok_or(StoreError::FieldNotFound(field.id))?.document_id;
        state.editable_document(&document_id)?;
        state.fields.insert(field.id, field.clone());
        Ok(field)
    }

    fn delete_field(&self, id: &FieldID) -> StoreResult<Field> {
        let mut state = self.write()?;
        let document_id = state.fields.get(id).ok_or(StoreError::FieldNotFound(*id))?.document_id;
        state.editable_document(&document_id)?;
        state.fields.remove(id).ok_or(StoreError::FieldNotFound(*id))
    }

    fn list_fields(&self, document_id: &DocumentID) -> StoreResult<Vec<Field>> {
        let state = self.read()?;
        if !state.documents.contains_key(document_id) {
            return Err(StoreError::DocumentNotFound(*document_id));
        }
        Ok(state.fields.values().filter(|f| &f.document_id == document_id).cloned().collect())
    }

    fn get_signer(&self, id: &SignerID) -> StoreResult<Signer> {
        self.read()?.signers.get(id).cloned().ok_or(StoreError::SignerNotFound(*id))
    }

    fn list_signers(&self, document_id: &DocumentID) -> StoreResult<Vec<Signer>> {
        let state = self.read()?;
        if !state.documents.contains_key(document_id) {
            return Err(StoreError::DocumentNotFound(*document_id));
        }
        Ok(state.signers_of(document_id))
    }

    fn append_log(&self, entry: LogEntry) -> StoreResult<()> {
        self.write()?.log.push(entry);
        Ok(())
    }

    fn list_log(&self, document_id: &DocumentID) -> StoreResult<Vec<LogEntry>> {
        Ok(self.read()?.log.iter().filter(|e| &e.document_id == document_id).cloned().collect())
    }

    fn commit(&self, changes: ChangeSet) -> StoreResult<Option<Document>> {
        let mut state = self.write()?;

        // Check everything before touching anything.
        for expect in &changes.expect {
            state.check(expect)?;
        }
        if let Some(document) = &changes.document {
            if !state.documents.contains_key(&document.id) {
                return Err(StoreError::DocumentNotFound(document.id));
            }
        }
        if let Some(field) = changes.fields.iter().find(|f| !state.fields.contains_key(&f.id)) {
            return Err(StoreError::FieldNotFound(field.id));
        }
        let known_document = |id: &DocumentID| {
            state.documents.contains_key(id) || changes.document.as_ref().map_or(false, |d| &d.id == id)
        };
        if let Some(signer) = changes.signers.iter().find(|s| !known_document(&s.document_id)) {
            return Err(StoreError::DocumentNotFound(signer.document_id));
        }

        let document_id = changes.document.as_ref().map(|d| d.id);
        if let Some(document) = changes.document {
            state.documents.insert(document.id, document);
        }
        state.fields.extend(changes.fields.into_iter().map(|f| (f.id, f)));
        state.signers.extend(changes.signers.into_iter().map(|s| (s.id, s)));
        state.log.extend(changes.log);

        let document_id = match document_id {
            Some(id) => id,
            None => return Ok(None),
        };
        if changes.derive_status {
            let status = workflow::document_status(&state.signers_of(&document_id));
            if let Some(document) = state.documents.get_mut(&document_id) {
                document.status = status;
            }
        }
        Ok(state.documents.get(&document_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn document(title: &str, status: DocumentStatus, age_minutes: i64) -> Document {
        let at = chrono::Utc::now() - chrono::Duration::minutes(age_minutes);
        Document {
            id: DocumentID::new(),
            title: title.to_string(),
            page_count: 1,
            status,
            signing_order: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn initialize_and_reset() {
        let repo = MemoryRepository::new();
        let seed = Seed::demo();
        let id = seed.documents[0].id;
        repo.initialize(seed).unwrap();

        assert_eq!(repo.list_fields(&id).unwrap().len(), 2);

        repo.reset().unwrap();
        assert_matches!(repo.get_document(&id), Err(StoreError::DocumentNotFound(_)));
    }

    #[test]
    fn list_filters_and_paginates_newest_first() {
        let repo = MemoryRepository::new();
        for i in 0..5 {
            repo.insert_document(document(&format!("Lease {}", i), DocumentStatus::Draft, i)).unwrap();
        }
        repo.insert_document(document("Invoice", DocumentStatus::Pending, 10)).unwrap();

        let page = repo.list_documents(&DocumentQuery {
            status: Some(DocumentStatus::Draft),
            search: Some("lease".to_string()),
            page: 2,
            limit: 2,
        }).unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.data.iter().map(|d| d.title.as_str()).collect::<Vec<_>>(), vec!["Lease 2", "Lease 3"]);

        let pending = repo.list_documents(&DocumentQuery {
            status: Some(DocumentStatus::Pending),
            page: 1,
            limit: 10,
            ..Default::default()
        }).unwrap();
        assert_eq!(pending.total, 1);
        assert_eq!(pending.data[0].title, "Invoice");
    }

    #[test]
    fn fields_require_their_document() {
        let repo = MemoryRepository::new();
        let seed = Seed::demo();
        let mut orphan = seed.fields[0].clone();
        orphan.document_id = DocumentID::new();
        assert_matches!(repo.insert_field(orphan), Err(StoreError::DocumentNotFound(_)));
    }

    #[test]
    fn commit_is_all_or_nothing() {
        let repo = MemoryRepository::new();
        let seed = Seed::demo();
        let mut document = seed.documents[0].clone();
        let mut field = seed.fields[0].clone();
        repo.initialize(seed).unwrap();

        document.status = DocumentStatus::Pending;
        field.position_x = 40.0;
        let mut missing = field.clone();
        missing.id = FieldID::new();

        let result = repo.commit(ChangeSet {
            document: Some(document.clone()),
            fields: vec![field.clone(), missing],
            ..Default::default()
        });
        assert_matches!(result, Err(StoreError::FieldNotFound(_)));
        assert_eq!(repo.get_document(&document.id).unwrap().status, DocumentStatus::Draft);
        assert_eq!(repo.get_field(&field.id).unwrap().position_x, 10.0);

        repo.commit(ChangeSet {
            document: Some(document.clone()),
            fields: vec![field.clone()],
            ..Default::default()
        }).unwrap();
        assert_eq!(repo.get_document(&document.id).unwrap().status, DocumentStatus::Pending);
        assert_eq!(repo.get_field(&field.id).unwrap().position_x, 40.0);
    }

    #[test]
    fn fields_are_frozen_outside_draft() {
        let repo = MemoryRepository::new();
        let seed = Seed::demo();
        let mut document = seed.documents[0].clone();
        let field = seed.fields[0].clone();
        repo.initialize(seed).unwrap();

        document.status = DocumentStatus::Pending;
        repo.commit(ChangeSet {
            document: Some(document.clone()),
            ..Default::default()
        }).unwrap();

        let mut extra = field.clone();
        extra.id = FieldID::new();
        assert_matches!(repo.insert_field(extra), Err(StoreError::DocumentLocked(_)));
        assert_matches!(repo.update_field(field.clone()), Err(StoreError::DocumentLocked(_)));
        assert_matches!(repo.delete_field(&field.id), Err(StoreError::DocumentLocked(_)));
        assert_eq!(repo.list_fields(&document.id).unwrap().len(), 2);
    }

    #[test]
    fn stale_changes_are_refused() {
        let repo = MemoryRepository::new();
        let seed = Seed::demo();
        let mut document = seed.documents[0].clone();
        let fields = seed.fields.clone();
        repo.initialize(seed).unwrap();

        let mut moved = fields[0].clone();
        moved.position_x = 30.0;
        repo.update_field(moved).unwrap();

        document.status = DocumentStatus::Pending;
        let result = repo.commit(ChangeSet {
            document: Some(document.clone()),
            expect: vec![
                Expect::DocumentStatus(document.id, DocumentStatus::Draft),
                Expect::Fields(document.id, fields.clone()),
            ],
            ..Default::default()
        });
        assert_matches!(result, Err(StoreError::DocumentChanged(_)));
        assert_eq!(repo.get_document(&document.id).unwrap().status, DocumentStatus::Draft);

        let mut declined = document.clone();
        declined.status = DocumentStatus::Declined;
        repo.commit(ChangeSet {
            document: Some(declined),
            ..Default::default()
        }).unwrap();
        let result = repo.commit(ChangeSet {
            document: Some(document.clone()),
            expect: vec![Expect::DocumentStatus(document.id, DocumentStatus::Pending)],
            ..Default::default()
        });
        assert_matches!(result, Err(StoreError::DocumentChanged(_)));
        assert_eq!(repo.get_document(&document.id).unwrap().status, DocumentStatus::Declined);
    }

    #[test]
    fn status_is_derived_from_stored_signers() {
        let repo = MemoryRepository::new();
        let seed = Seed::demo();
        let mut document = seed.documents[0].clone();
        repo.initialize(seed).unwrap();

        let signer = |order, status| Signer {
            id: SignerID::new(),
            document_id: document.id,
            email: format!("signer{}@example.com", order),
            name: format!("Signer {}", order),
            order,
            status,
            key: String::new(),
            opened_at: None,
            completed_at: None,
            decline_reason: None,
        };
        let first = signer(1, SignerStatus::Signed);
        let mut second = signer(2, SignerStatus::Pending);
        document.status = DocumentStatus::Pending;
        repo.commit(ChangeSet {
            document: Some(document.clone()),
            signers: vec![first, second.clone()],
            ..Default::default()
        }).unwrap();

        // Written as if the first signer were still outstanding.
        second.status = SignerStatus::Signed;
        let stored = repo.commit(ChangeSet {
            document: Some(document.clone()),
            signers: vec![second.clone()],
            expect: vec![Expect::SignerStatus(second.id, SignerStatus::Pending)],
            derive_status: true,
            ..Default::default()
        }).unwrap();
        assert_eq!(stored.map(|d| d.status), Some(DocumentStatus::Completed));

        assert_matches!(
            repo.commit(ChangeSet {
                signers: vec![second.clone()],
                expect: vec![Expect::SignerStatus(second.id, SignerStatus::Pending)],
                ..Default::default()
            }),
            Err(StoreError::SignerChanged(_))
        );
    }
}

//! Field placement for one document. Geometry is worked out synchronously
//! from the gesture, then persisted; the local field list only changes once
//! the service has accepted the write. Calls do not wait on each other, so a
//! field can be placed while an earlier placement is still in flight.

use std::sync::Arc;
use tokio::sync::RwLock;
use crate::error::ValidationError;
use crate::geometry::{self, ContainerRect, FieldRect, PointerPosition};
use crate::layout;
use crate::models::{DocumentDetail, DocumentID, Field, FieldID, FieldPatch, FieldType, NewField};
use crate::service::{DocumentService, Notice};

pub struct EditorSession<S: DocumentService> {
    service: Arc<S>,
    document_id: DocumentID,
    page_count: u32,
    fields: RwLock<Vec<Field>>,
}

impl<S: DocumentService> EditorSession<S> {
    pub fn new(service: Arc<S>, detail: DocumentDetail) -> Self {
        Self {
            service,
            document_id: detail.document.id,
            page_count: detail.document.page_count,
            fields: RwLock::new(detail.fields),
        }
    }

    pub fn document_id(&self) -> DocumentID {
        self.document_id
    }

    fn check_page(&self, page_number: u32) -> Result<(), Notice> {
        if page_number < 1 || page_number > self.page_count {
            return Err(Notice::invalid(ValidationError::InvalidPage {
                page: page_number,
                page_count: self.page_count,
            }));
        }
        Ok(())
    }

    async fn local_field(&self, field_id: &FieldID) -> Result<Field, Notice> {
        self.fields.read().await
            .iter()
            .find(|f| &f.id == field_id)
            .cloned()
            .ok_or_else(Notice::not_found)
    }

    async fn create(&self, page_number: u32, field_type: FieldType, rect: FieldRect) -> Result<Field, Notice> {
        self.check_page(page_number)?;
        let new_field = NewField {
            field_type,
            page_number,
            position_x: rect.position_x,
            position_y: rect.position_y,
            width: rect.width,
            height: rect.height,
            is_required: true,
            signer_id: None,
        };

        match self.service.create_field(&self.document_id, new_field).await {
            Ok(field) => {
                debug!("Placed {} field {} on page {}", field.field_type, field.id, field.page_number);
                self.fields.write().await.push(field.clone());
                Ok(field)
            }
            Err(err) => {
                warn!("Unable to place field on {}: {}", self.document_id, err);
                Err(Notice::from_error(&err))
            }
        }
    }

    async fn patch(&self, field_id: &FieldID, patch: FieldPatch) -> Result<Field, Notice> {
        match self.service.update_field(field_id, patch).await {
            Ok(field) => {
                let mut fields = self.fields.write().await;
                match fields.iter_mut().find(|f| f.id == field.id) {
                    Some(f) => *f = field.clone(),
                    None => fields.push(field.clone()),
                }
                Ok(field)
            }
            Err(err) => {
                warn!("Unable to update field {}: {}", field_id, err);
                Err(Notice::from_error(&err))
            }
        }
    }

    /// Click-to-place: default size for the type, centred on the pointer.
    pub async fn place_by_click(
        &self, page_number: u32, field_type: FieldType, pointer: PointerPosition, container: ContainerRect,
    ) -> Result<Field, Notice> {
        self.create(page_number, field_type, geometry::field_rect_from_click(pointer, container, field_type)).await
    }

    /// A field type dragged off the toolbar and dropped onto the page.
    pub async fn place_by_drop(
        &self, page_number: u32, field_type: FieldType, drop: PointerPosition, container: ContainerRect,
    ) -> Result<Field, Notice> {
        self.place_by_click(page_number, field_type, drop, container).await
    }

    pub async fn place_by_drag(
        &self, page_number: u32, field_type: FieldType, start: PointerPosition, end: PointerPosition,
        container: ContainerRect,
    ) -> Result<Field, Notice> {
        self.create(page_number, field_type, geometry::field_rect_from_drag(start, end, container, field_type)).await
    }

    /// Re-centres an existing field under the pointer, keeping its size.
    pub async fn move_to(&self, field_id: &FieldID, pointer: PointerPosition, container: ContainerRect) -> Result<Field, Notice> {
        let field = self.local_field(field_id).await?;
        let position = geometry::calculate_field_position_from_event(pointer, container, field.width, field.height);
        self.patch(field_id, FieldPatch {
            position_x: Some(position.position_x),
            position_y: Some(position.position_y),
            ..Default::default()
        }).await
    }

    pub async fn move_to_page(&self, field_id: &FieldID, page_number: u32) -> Result<Field, Notice> {
        self.check_page(page_number)?;
        self.patch(field_id, FieldPatch {
            page_number: Some(page_number),
            ..Default::default()
        }).await
    }

    /// Sizes above the page are capped; the corner is pulled back so the
    /// field stays on the page.
    pub async fn resize(&self, field_id: &FieldID, width: f64, height: f64) -> Result<Field, Notice> {
        let field = self.local_field(field_id).await?;
        let (width, height) = (width.min(100.0), height.min(100.0));
        if !layout::validate_field_size(width, height) {
            return Err(Notice::invalid(ValidationError::InvalidSize));
        }
        let position = geometry::clamp_field_position(field.position_x, field.position_y, width, height);
        self.patch(field_id, FieldPatch {
            position_x: Some(position.position_x),
            position_y: Some(position.position_y),
            width: Some(width),
            height: Some(height),
            ..Default::default()
        }).await
    }

    pub async fn remove(&self, field_id: &FieldID) -> Result<(), Notice> {
        match self.service.delete_field(field_id).await {
            Ok(()) => {
                self.fields.write().await.retain(|f| &f.id != field_id);
                Ok(())
            }
            Err(err) => {
                warn!("Unable to delete field {}: {}", field_id, err);
                Err(Notice::from_error(&err))
            }
        }
    }

    pub async fn fields(&self) -> Vec<Field> {
        self.fields.read().await.clone()
    }

    pub async fn fields_on_page(&self, page_number: u32) -> Vec<Field> {
        self.fields.read().await.iter().filter(|f| f.page_number == page_number).cloned().collect()
    }

    pub async fn reading_order(&self) -> Vec<Field> {
        layout::sort_fields_by_position(&self.fields.read().await)
    }

    /// Overlaps are reported for display only.
    pub async fn overlaps(&self) -> Vec<(FieldID, FieldID)> {
        layout::find_overlaps(&self.fields.read().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::models::{DocumentStatus, NewDocument};
    use crate::service::NoticeKind;
    use crate::store::{MemoryRepository, Repository};
    use crate::views::ClientMeta;
    use crate::Config;

    fn session() -> (Arc<Backend>, EditorSession<Backend>) {
        let backend = Arc::new(Backend::new(Arc::new(MemoryRepository::new()), Config::new("http://localhost:8000")));
        let document = backend.create_document(NewDocument {
            title: "Offer letter".to_string(),
            page_count: 2,
        }, &ClientMeta::default()).unwrap();
        let detail = backend.document_detail(&document.id).unwrap();
        (backend.clone(), EditorSession::new(backend, detail))
    }

    fn page() -> ContainerRect {
        ContainerRect::new(0.0, 0.0, 1000.0, 800.0)
    }

    #[tokio::test]
    async fn click_places_centred_default_field() {
        let (backend, session) = session();
        let field = session.place_by_click(1, FieldType::Signature, PointerPosition::new(100.0, 100.0), page()).await.unwrap();
        assert_eq!((field.position_x, field.position_y, field.width, field.height), (0.0, 7.5, 25.0, 10.0));
        assert_eq!(session.fields().await, vec![field.clone()]);
        assert_eq!(backend.repository().get_field(&field.id).unwrap(), field);
    }

    #[tokio::test]
    async fn placements_run_independently() {
        let (_, session) = session();
        let (a, b) = tokio::join!(
            session.place_by_click(1, FieldType::Date, PointerPosition::new(500.0, 400.0), page()),
            session.place_by_drag(2, FieldType::Text, PointerPosition::new(100.0, 100.0), PointerPosition::new(400.0, 180.0), page()),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(session.fields().await.len(), 2);
        assert_eq!(session.fields_on_page(2).await, vec![b.clone()]);
        assert_eq!((b.position_x, b.position_y, b.width, b.height), (10.0, 12.5, 30.0, 10.0));
        assert_eq!(session.reading_order().await.iter().map(|f| f.id).collect::<Vec<_>>(), vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn failed_placement_leaves_list_unchanged() {
        let (_, session) = session();
        let notice = session.place_by_click(3, FieldType::Signature, PointerPosition::new(10.0, 10.0), page()).await.unwrap_err();
        assert_eq!(notice.kind, NoticeKind::Invalid);
        assert!(session.fields().await.is_empty());
    }

    #[tokio::test]
    async fn move_resize_and_remove() {
        let (backend, session) = session();
        let field = session.place_by_drop(1, FieldType::Initials, PointerPosition::new(500.0, 400.0), page()).await.unwrap();

        let moved = session.move_to(&field.id, PointerPosition::new(990.0, 790.0), page()).await.unwrap();
        assert_eq!((moved.position_x, moved.position_y), (88.0, 90.0));

        let resized = session.resize(&field.id, 20.0, 15.0).await.unwrap();
        assert_eq!((resized.position_x, resized.position_y, resized.width, resized.height), (80.0, 85.0, 20.0, 15.0));
        assert_eq!(session.resize(&field.id, 0.0, 10.0).await.unwrap_err().kind, NoticeKind::Invalid);

        let other = session.place_by_click(1, FieldType::Text, PointerPosition::new(900.0, 720.0), page()).await.unwrap();
        assert_eq!(session.overlaps().await, vec![(field.id, other.id)]);

        session.remove(&field.id).await.unwrap();
        assert_eq!(session.fields().await, vec![other]);
        assert_eq!(session.remove(&field.id).await.unwrap_err().kind, NoticeKind::NotFound);
        assert_eq!(backend.repository().get_document(&session.document_id()).unwrap().status, DocumentStatus::Draft);
    }
}

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Order line mirroring a booking's product and quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: Ulid,
    pub product_id: Ulid,
    pub quantity: i64,
    /// Parent order document, if one has been attached yet.
    pub document_id: Option<Ulid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStage {
    /// Estimate.
    Draft,
    /// Invoice.
    Final,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommerceDocument {
    pub id: Ulid,
    pub stage: DocumentStage,
    pub paid: bool,
    pub customer_id: Option<Ulid>,
    pub special_instructions: Option<String>,
    pub items: Vec<Ulid>,
}

impl CommerceDocument {
    pub fn draft(id: Ulid) -> Self {
        Self {
            id,
            stage: DocumentStage::Draft,
            paid: false,
            customer_id: None,
            special_instructions: None,
            items: Vec::new(),
        }
    }

    pub fn is_paid(&self) -> bool {
        self.paid
    }

    pub fn is_draft(&self) -> bool {
        self.stage == DocumentStage::Draft
    }

    pub fn convert_to_final(&mut self) {
        self.stage = DocumentStage::Final;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommerceError {
    NotFound(Ulid),
    Rejected(String),
}

impl std::fmt::Display for CommerceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommerceError::NotFound(id) => write!(f, "commerce record not found: {id}"),
            CommerceError::Rejected(msg) => write!(f, "commerce write rejected: {msg}"),
        }
    }
}

impl std::error::Error for CommerceError {}

/// The order/invoice layer the engine mirrors bookings into.
#[async_trait]
pub trait CommerceLayer: Send + Sync {
    async fn line_item(&self, id: Ulid) -> Result<Option<LineItem>, CommerceError>;
    async fn insert_line_item(&self, item: LineItem) -> Result<(), CommerceError>;
    async fn update_line_item(&self, item: LineItem) -> Result<(), CommerceError>;
    async fn delete_line_item(&self, id: Ulid) -> Result<(), CommerceError>;

    async fn document(&self, id: Ulid) -> Result<Option<CommerceDocument>, CommerceError>;
    async fn insert_document(&self, doc: CommerceDocument) -> Result<(), CommerceError>;
    async fn update_document(&self, doc: CommerceDocument) -> Result<(), CommerceError>;
    async fn delete_document(&self, id: Ulid) -> Result<(), CommerceError>;
}

/// Write operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    InsertLineItem,
    UpdateLineItem,
    DeleteLineItem,
    InsertDocument,
    UpdateDocument,
    DeleteDocument,
}

/// `DashMap`-backed commerce layer. Counts every successful write.
#[derive(Default)]
pub struct InMemoryCommerce {
    items: DashMap<Ulid, LineItem>,
    documents: DashMap<Ulid, CommerceDocument>,
    writes: AtomicUsize,
    failing: DashSet<FailPoint>,
}

impl InMemoryCommerce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total successful writes (inserts, updates, deletes) so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_on(&self, point: FailPoint) {
        self.failing.insert(point);
    }

    pub fn clear_failures(&self) {
        self.failing.clear();
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Fetch without going through the async trait. Handy in tests.
    pub fn get_item(&self, id: &Ulid) -> Option<LineItem> {
        self.items.get(id).map(|e| e.value().clone())
    }

    pub fn get_document(&self, id: &Ulid) -> Option<CommerceDocument> {
        self.documents.get(id).map(|e| e.value().clone())
    }

    fn check(&self, point: FailPoint) -> Result<(), CommerceError> {
        if self.failing.contains(&point) {
            return Err(CommerceError::Rejected(format!("{point:?} disabled")));
        }
        Ok(())
    }

    fn wrote(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CommerceLayer for InMemoryCommerce {
    async fn line_item(&self, id: Ulid) -> Result<Option<LineItem>, CommerceError> {
        Ok(self.get_item(&id))
    }

    async fn insert_line_item(&self, item: LineItem) -> Result<(), CommerceError> {
        self.check(FailPoint::InsertLineItem)?;
        self.items.insert(item.id, item);
        self.wrote();
        Ok(())
    }

    async fn update_line_item(&self, item: LineItem) -> Result<(), CommerceError> {
        self.check(FailPoint::UpdateLineItem)?;
        let mut entry = self
            .items
            .get_mut(&item.id)
            .ok_or(CommerceError::NotFound(item.id))?;
        *entry = item;
        self.wrote();
        Ok(())
    }

    async fn delete_line_item(&self, id: Ulid) -> Result<(), CommerceError> {
        self.check(FailPoint::DeleteLineItem)?;
        self.items.remove(&id).ok_or(CommerceError::NotFound(id))?;
        self.wrote();
        Ok(())
    }

    async fn document(&self, id: Ulid) -> Result<Option<CommerceDocument>, CommerceError> {
        Ok(self.get_document(&id))
    }

    async fn insert_document(&self, doc: CommerceDocument) -> Result<(), CommerceError> {
        self.check(FailPoint::InsertDocument)?;
        self.documents.insert(doc.id, doc);
        self.wrote();
        Ok(())
    }

    async fn update_document(&self, doc: CommerceDocument) -> Result<(), CommerceError> {
        self.check(FailPoint::UpdateDocument)?;
        let mut entry = self
            .documents
            .get_mut(&doc.id)
            .ok_or(CommerceError::NotFound(doc.id))?;
        *entry = doc;
        self.wrote();
        Ok(())
    }

    async fn delete_document(&self, id: Ulid) -> Result<(), CommerceError> {
        self.check(FailPoint::DeleteDocument)?;
        self.documents.remove(&id).ok_or(CommerceError::NotFound(id))?;
        self.wrote();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> LineItem {
        LineItem {
            id: Ulid::new(),
            product_id: Ulid::new(),
            quantity: 2,
            document_id: None,
        }
    }

    #[tokio::test]
    async fn writes_are_counted() {
        let commerce = InMemoryCommerce::new();
        let mut li = item();
        commerce.insert_line_item(li.clone()).await.unwrap();
        li.quantity = 3;
        commerce.update_line_item(li.clone()).await.unwrap();
        assert_eq!(commerce.writes(), 2);
        assert_eq!(commerce.line_item(li.id).await.unwrap().unwrap().quantity, 3);

        // Reads are free
        let _ = commerce.document(Ulid::new()).await.unwrap();
        assert_eq!(commerce.writes(), 2);
    }

    #[tokio::test]
    async fn fail_point_blocks_write() {
        let commerce = InMemoryCommerce::new();
        commerce.fail_on(FailPoint::InsertDocument);
        let result = commerce.insert_document(CommerceDocument::draft(Ulid::new())).await;
        assert!(matches!(result, Err(CommerceError::Rejected(_))));
        assert_eq!(commerce.document_count(), 0);
        assert_eq!(commerce.writes(), 0);

        commerce.clear_failures();
        commerce
            .insert_document(CommerceDocument::draft(Ulid::new()))
            .await
            .unwrap();
        assert_eq!(commerce.document_count(), 1);
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let commerce = InMemoryCommerce::new();
        let li = item();
        let result = commerce.update_line_item(li.clone()).await;
        assert_eq!(result, Err(CommerceError::NotFound(li.id)));
    }

    #[test]
    fn draft_converts_to_final() {
        let mut doc = CommerceDocument::draft(Ulid::new());
        assert!(doc.is_draft());
        assert!(!doc.is_paid());
        doc.convert_to_final();
        assert!(!doc.is_draft());
    }
}

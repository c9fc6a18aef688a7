use tracing::{debug, warn};
use ulid::Ulid;

use crate::commerce::{CommerceDocument, CommerceError, CommerceLayer, LineItem};
use crate::model::Booking;

use super::EngineError;

/// What a synchronization run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub writes: usize,
    pub created_line_item: bool,
    pub created_document: bool,
    pub promoted: bool,
}

/// Compensation for one write already made.
#[derive(Debug)]
enum Undo {
    DeleteItem(Ulid),
    RestoreItem(LineItem),
    DeleteDocument(Ulid),
    RestoreDocument(CommerceDocument),
}

/// Mirrors a booking into the commerce layer.
///
/// Every write is journaled; if any step fails the journal is unwound in
/// reverse so the commerce layer ends up as it was before the run.
pub struct Synchronizer<'a> {
    commerce: &'a dyn CommerceLayer,
    journal: Vec<Undo>,
}

/// The document the booking's line item belongs to, if both exist.
pub async fn linked_document(
    commerce: &dyn CommerceLayer,
    booking: &Booking,
) -> Result<Option<CommerceDocument>, CommerceError> {
    let Some(item_id) = booking.line_item_id else {
        return Ok(None);
    };
    let Some(item) = commerce.line_item(item_id).await? else {
        return Ok(None);
    };
    match item.document_id {
        Some(doc_id) => commerce.document(doc_id).await,
        None => Ok(None),
    }
}

impl<'a> Synchronizer<'a> {
    pub fn new(commerce: &'a dyn CommerceLayer) -> Self {
        Self {
            commerce,
            journal: Vec::new(),
        }
    }

    /// Bring the line item and document in line with `booking`, attaching
    /// a new line item reference to it when one is created. With `promote`
    /// a draft document is converted to final.
    pub async fn run(
        mut self,
        booking: &mut Booking,
        promote: bool,
    ) -> Result<SyncReport, EngineError> {
        let original_item = booking.line_item_id;
        match self.apply(booking, promote).await {
            Ok(report) => Ok(report),
            Err(e) => {
                warn!(booking = %booking.id, "synchronization failed, rolling back: {e}");
                self.rollback().await;
                booking.line_item_id = original_item;
                Err(EngineError::SyncFailed(e.to_string()))
            }
        }
    }

    async fn apply(
        &mut self,
        booking: &mut Booking,
        promote: bool,
    ) -> Result<SyncReport, CommerceError> {
        let mut report = SyncReport::default();

        let existing = match booking.line_item_id {
            Some(id) => self.commerce.line_item(id).await?,
            None => None,
        };
        let mut item = match existing {
            Some(item) => item,
            None => {
                let item = LineItem {
                    id: Ulid::new(),
                    product_id: booking.product_id,
                    quantity: booking.quantity,
                    document_id: None,
                };
                self.commerce.insert_line_item(item.clone()).await?;
                self.journal.push(Undo::DeleteItem(item.id));
                booking.line_item_id = Some(item.id);
                report.created_line_item = true;
                debug!(booking = %booking.id, item = %item.id, "created line item");
                item
            }
        };

        if item.product_id != booking.product_id || item.quantity != booking.quantity {
            let previous = item.clone();
            item.product_id = booking.product_id;
            item.quantity = booking.quantity;
            self.commerce.update_line_item(item.clone()).await?;
            self.journal.push(Undo::RestoreItem(previous));
        }

        let document = match item.document_id {
            Some(id) => self.commerce.document(id).await?,
            None => None,
        };
        match document {
            None => {
                let mut doc = CommerceDocument::draft(Ulid::new());
                doc.items.push(item.id);
                doc.customer_id = booking.customer_id;
                if promote {
                    doc.convert_to_final();
                    report.promoted = true;
                }
                self.commerce.insert_document(doc.clone()).await?;
                self.journal.push(Undo::DeleteDocument(doc.id));
                report.created_document = true;

                let previous = item.clone();
                item.document_id = Some(doc.id);
                self.commerce.update_line_item(item.clone()).await?;
                self.journal.push(Undo::RestoreItem(previous));
                debug!(booking = %booking.id, document = %doc.id, "created document");
            }
            Some(mut doc) => {
                let previous = doc.clone();
                if booking.customer_id.is_some() && doc.customer_id.is_none() {
                    doc.customer_id = booking.customer_id;
                }
                if !doc.items.contains(&item.id) {
                    doc.items.push(item.id);
                }
                if promote && doc.is_draft() {
                    doc.convert_to_final();
                    report.promoted = true;
                }
                if doc != previous {
                    self.commerce.update_document(doc).await?;
                    self.journal.push(Undo::RestoreDocument(previous));
                }
            }
        }

        report.writes = self.journal.len();
        Ok(report)
    }

    async fn rollback(&mut self) {
        while let Some(undo) = self.journal.pop() {
            let result = match &undo {
                Undo::DeleteItem(id) => self.commerce.delete_line_item(*id).await,
                Undo::RestoreItem(item) => self.commerce.update_line_item(item.clone()).await,
                Undo::DeleteDocument(id) => self.commerce.delete_document(*id).await,
                Undo::RestoreDocument(doc) => self.commerce.update_document(doc.clone()).await,
            };
            if let Err(e) = result {
                warn!("rollback step {undo:?} failed: {e}");
            }
        }
    }
}

//! Payment receipts.
//!
//! Receipts are best-effort: they are rendered and mailed on a background
//! task after the order has committed, and a failure is only logged.

pub mod pdf;

use std::sync::Arc;

use crate::models::Order;
use crate::services::email::{EmailError, Mailer};

/// Notified once an order has been committed.
///
/// Implementations must return immediately; the caller's response does not
/// wait on them.
pub trait ReceiptNotifier: Send + Sync {
    fn order_placed(&self, order: &Order);
}

/// Renders the PDF receipt and mails it.
///
/// # Errors
///
/// Returns the mailer's error.
pub async fn deliver(mailer: &dyn Mailer, order: &Order, store_name: &str) -> Result<(), EmailError> {
    let document = pdf::render(order, store_name);
    mailer.send_receipt(order, document).await
}

/// [`ReceiptNotifier`] that spawns [`deliver`] on the tokio runtime.
#[derive(Clone)]
pub struct ReceiptService {
    mailer: Arc<dyn Mailer>,
    store_name: String,
}

impl ReceiptService {
    #[must_use]
    pub fn new(mailer: Arc<dyn Mailer>, store_name: impl Into<String>) -> Self {
        Self {
            mailer,
            store_name: store_name.into(),
        }
    }
}

impl ReceiptNotifier for ReceiptService {
    fn order_placed(&self, order: &Order) {
        let mailer = Arc::clone(&self.mailer);
        let store_name = self.store_name.clone();
        let order = order.clone();

        tokio::spawn(async move {
            match deliver(mailer.as_ref(), &order, &store_name).await {
                Ok(()) => tracing::info!(order_id = %order.id, "Receipt sent"),
                Err(e) => tracing::warn!(order_id = %order.id, error = %e, "Receipt email failed"),
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::testing::{RecordingMailer, sample_order};

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not met in time");
    }

    #[tokio::test]
    async fn test_order_placed_mails_pdf() {
        let mailer = Arc::new(RecordingMailer::default());
        let receipts = ReceiptService::new(mailer.clone(), "KEC Pumps");
        let order = sample_order();

        receipts.order_placed(&order);
        wait_for(|| !mailer.receipts().is_empty()).await;

        let (order_id, pdf) = mailer.receipts().remove(0);
        assert_eq!(order_id, order.id);
        assert!(pdf.starts_with(b"%PDF-"));
    }

    #[tokio::test]
    async fn test_mail_failure_is_swallowed() {
        let mailer = Arc::new(RecordingMailer::failing());
        let receipts = ReceiptService::new(mailer.clone(), "KEC Pumps");

        receipts.order_placed(&sample_order());
        wait_for(|| mailer.attempts() > 0).await;
        assert!(mailer.receipts().is_empty());
    }
}

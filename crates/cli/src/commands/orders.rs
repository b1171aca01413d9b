//! Staff order commands.
//!
//! # Usage
//!
//! ```bash
//! kec-cli order set-status 42 processing
//! kec-cli report
//! ```

use rust_decimal::Decimal;
use thiserror::Error;

use kec_core::{OrderId, OrderStatus, money};
use kec_storefront::db::{OrderRepository, RepositoryError, StatusChangeError};
use kec_storefront::models::StatusSummary;

use super::{ConnectError, connect};

/// Errors from order commands.
#[derive(Debug, Error)]
pub enum OrderCommandError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    StatusChange(#[from] StatusChangeError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Move an order to `status`.
pub async fn set_status(id: OrderId, status: OrderStatus) -> Result<(), OrderCommandError> {
    let pool = connect().await?;
    let previous = OrderRepository::new(&pool).set_status(id, status).await?;

    tracing::info!(order_id = %id, from = %previous, to = %status, "Order status updated");
    #[allow(clippy::print_stdout)]
    {
        println!("Order {id}: {previous} -> {status}");
    }
    Ok(())
}

/// Print order counts and paid revenue per status.
pub async fn report() -> Result<(), OrderCommandError> {
    let pool = connect().await?;
    let rows = OrderRepository::new(&pool).status_report().await?;

    #[allow(clippy::print_stdout)]
    {
        print!("{}", render_report(&rows));
    }
    Ok(())
}

/// Format the report as a fixed-width table, listing every status.
fn render_report(rows: &[StatusSummary]) -> String {
    let mut out = format!("{:<12} {:>8} {:>14}\n", "status", "orders", "paid revenue");
    let mut total_orders = 0;
    let mut total_revenue = Decimal::ZERO;

    for status in OrderStatus::ALL {
        let (orders, revenue) = rows
            .iter()
            .find(|r| r.status == status)
            .map_or((0, Decimal::ZERO), |r| (r.orders, r.paid_revenue));
        total_orders += orders;
        total_revenue += revenue;
        out.push_str(&format!(
            "{:<12} {orders:>8} {:>14}\n",
            status.as_str(),
            money::format_amount(revenue)
        ));
    }

    out.push_str(&format!(
        "{:<12} {total_orders:>8} {:>14}\n",
        "total",
        money::format_amount(total_revenue)
    ));
    out
}

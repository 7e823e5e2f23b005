/// Periodic maintenance jobs
///
/// A sweep is a single idempotent statement (or transaction) that brings
/// stored state in line with the clock. Each run reports how many rows it
/// touched.
///
/// # Sweeps
///
/// - [`OverdueInvoiceSweep`]: `sent` invoices whose due date has passed
///   become `overdue`
/// - [`ExpiredInvitationSweep`]: invitations past their expiry lose their
///   token and business memberships
///
/// # Example
///
/// ```no_run
/// use tallyboard_worker::sweeps::{OverdueInvoiceSweep, Sweep};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let touched = OverdueInvoiceSweep.run(&pool).await?;
/// println!("{} invoices now overdue", touched);
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use tallyboard_shared::models::{invoice::Invoice, user::User};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type SweepResult = Result<u64, SweepError>;

/// One maintenance job run by the worker on every tick
#[async_trait]
pub trait Sweep: Send + Sync {
    /// Stable name used in logs
    fn name(&self) -> &'static str;

    /// Runs the sweep once and returns the number of rows changed
    async fn run(&self, pool: &PgPool) -> SweepResult;
}

pub struct OverdueInvoiceSweep;

#[async_trait]
impl Sweep for OverdueInvoiceSweep {
    fn name(&self) -> &'static str {
        "overdue_invoices"
    }

    async fn run(&self, pool: &PgPool) -> SweepResult {
        Ok(Invoice::mark_overdue_past_due(pool).await?)
    }
}

pub struct ExpiredInvitationSweep;

#[async_trait]
impl Sweep for ExpiredInvitationSweep {
    fn name(&self) -> &'static str {
        "expired_invitations"
    }

    async fn run(&self, pool: &PgPool) -> SweepResult {
        Ok(User::expire_invitations(pool).await?)
    }
}

/// Every sweep the worker runs, in order
pub fn default_sweeps() -> Vec<Arc<dyn Sweep>> {
    vec![Arc::new(OverdueInvoiceSweep), Arc::new(ExpiredInvitationSweep)]
}

/// Row fetching for reports
///
/// Each method runs a few tenant-scoped `GROUP BY` queries and hands the
/// grouped rows to the pure aggregation functions in [`crate::reports`].
/// Row counts scale with projects, members and due dates, not with the
/// number of time entries or invoices, so nothing is capped.
///
/// # Example
///
/// ```no_run
/// use tallyboard_shared::reports::service::{ReportRange, Reports};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, business_id: Uuid) -> Result<(), sqlx::Error> {
/// let reports = Reports::new(pool);
/// let dashboard = reports.dashboard(business_id, &ReportRange::default()).await?;
/// println!("{} open projects", dashboard.projects.open);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    dashboard_summary, invoice_report, project_report, time_report, DashboardSummary, InvoiceReport,
    InvoiceRow, ProjectReportRow, TimeReport, TimeRow,
};
use crate::models::project::{Project, ProjectFilter, ProjectWithProgress};
use crate::models::task::Task;

/// Optional window on `started_at` for time-based figures
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ReportRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub struct Reports {
    db: PgPool,
}

impl Reports {
    pub fn new(db: PgPool) -> Self {
        Reports { db }
    }

    /// Every project of the business; reports are never paginated
    async fn projects(&self, business_id: Uuid) -> Result<Vec<ProjectWithProgress>, sqlx::Error> {
        Project::list_by_business(&self.db, business_id, &ProjectFilter::default(), i64::MAX, 0).await
    }

    /// Finished entries only; a running timer has no duration yet
    async fn time_rows(&self, business_id: Uuid, range: &ReportRange) -> Result<Vec<TimeRow>, sqlx::Error> {
        sqlx::query_as::<_, TimeRow>(
            r#"
            SELECT p.id AS project_id, p.name AS project_name,
                   u.id AS user_id, u.name AS user_name,
                   te.billable,
                   COUNT(*) AS entry_count,
                   COALESCE(SUM(te.duration_seconds), 0)::BIGINT AS total_seconds
            FROM time_entries te
            JOIN tasks t ON t.id = te.task_id
            JOIN projects p ON p.id = t.project_id
            JOIN users u ON u.id = te.user_id
            WHERE p.business_id = $1
              AND te.ended_at IS NOT NULL
              AND ($2::timestamptz IS NULL OR te.started_at >= $2)
              AND ($3::timestamptz IS NULL OR te.started_at < $3)
            GROUP BY p.id, p.name, u.id, u.name, te.billable
            "#,
        )
        .bind(business_id)
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.db)
        .await
    }

    async fn invoice_rows(&self, business_id: Uuid) -> Result<Vec<InvoiceRow>, sqlx::Error> {
        sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT i.project_id, i.status, i.due_date,
                   COUNT(*) AS invoice_count,
                   COALESCE(SUM(i.amount_cents), 0)::BIGINT AS amount_cents
            FROM invoices i
            JOIN projects p ON p.id = i.project_id
            WHERE p.business_id = $1
            GROUP BY i.project_id, i.status, i.due_date
            "#,
        )
        .bind(business_id)
        .fetch_all(&self.db)
        .await
    }

    pub async fn dashboard(
        &self,
        business_id: Uuid,
        range: &ReportRange,
    ) -> Result<DashboardSummary, sqlx::Error> {
        let projects = self.projects(business_id).await?;
        let task_counts = Task::count_by_status(&self.db, business_id, None).await?;
        let time = self.time_rows(business_id, range).await?;
        let invoices = self.invoice_rows(business_id).await?;

        Ok(dashboard_summary(&projects, &task_counts, &time, &invoices))
    }

    pub async fn projects_report(
        &self,
        business_id: Uuid,
        range: &ReportRange,
    ) -> Result<Vec<ProjectReportRow>, sqlx::Error> {
        let projects = self.projects(business_id).await?;
        let time = self.time_rows(business_id, range).await?;
        let invoices = self.invoice_rows(business_id).await?;

        Ok(project_report(&projects, &time, &invoices))
    }

    pub async fn time_report(&self, business_id: Uuid, range: &ReportRange) -> Result<TimeReport, sqlx::Error> {
        let rows = self.time_rows(business_id, range).await?;
        Ok(time_report(&rows))
    }

    pub async fn invoice_report(&self, business_id: Uuid, today: NaiveDate) -> Result<InvoiceReport, sqlx::Error> {
        let invoices = self.invoice_rows(business_id).await?;
        Ok(invoice_report(&invoices, today))
    }
}

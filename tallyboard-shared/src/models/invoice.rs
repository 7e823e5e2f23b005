/// Invoices
///
/// An invoice bills one project and is scoped to the project's business.
/// Amounts are integer cents.
///
/// # Lifecycle
///
/// ```text
/// draft ──send──▶ sent ──pay──▶ paid
///                  │             ▲
///                  └──▶ overdue ─┘
/// ```
///
/// `sent → overdue` is applied by the worker sweep once `due_date` has
/// passed. Only drafts can be edited or deleted.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use super::project::Project;
use crate::error::{DomainError, DomainResult};

const INVOICE_COLUMNS: &str = "i.id, i.project_id, i.number, i.amount_cents, i.status, i.due_date, \
    i.issued_date, i.paid_date, i.notes, i.created_at, i.updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invoice_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 4] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Sent,
        InvoiceStatus::Paid,
        InvoiceStatus::Overdue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
        }
    }

    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        matches!(
            (self, next),
            (InvoiceStatus::Draft, InvoiceStatus::Sent)
                | (InvoiceStatus::Sent, InvoiceStatus::Paid)
                | (InvoiceStatus::Sent, InvoiceStatus::Overdue)
                | (InvoiceStatus::Overdue, InvoiceStatus::Paid)
        )
    }

    /// Sent or overdue: billed but not yet paid
    pub fn is_outstanding(&self) -> bool {
        matches!(self, InvoiceStatus::Sent | InvoiceStatus::Overdue)
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub project_id: Uuid,
    pub number: String,
    pub amount_cents: i64,
    pub status: InvoiceStatus,
    pub due_date: NaiveDate,
    pub issued_date: Option<NaiveDate>,
    pub paid_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InvoiceListItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub invoice: Invoice,
    pub project_name: String,
    pub client_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateInvoice {
    pub project_id: Uuid,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateInvoice {
    pub project_id: Option<Uuid>,
    pub amount_cents: Option<i64>,
    pub due_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "crate::serde_util::double_option")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub project_id: Option<Uuid>,
}

/// `INV-2025-0007`
pub fn format_invoice_number(year: i32, sequence: i32) -> String {
    format!("INV-{}-{:04}", year, sequence)
}

fn check_amount(amount_cents: i64) -> DomainResult<()> {
    if amount_cents < 0 {
        return Err(DomainError::Validation(
            "amount_cents must not be negative".to_string(),
        ));
    }
    Ok(())
}

fn check_paid_date(issued_date: Option<NaiveDate>, paid_date: NaiveDate) -> DomainResult<()> {
    if issued_date.is_some_and(|issued| paid_date < issued) {
        return Err(DomainError::Validation(
            "paid_date must not be before issued_date".to_string(),
        ));
    }
    Ok(())
}

impl Invoice {
    async fn check_project(conn: &mut PgConnection, project_id: Uuid, business_id: Uuid) -> DomainResult<()> {
        match Project::find_by_id(&mut *conn, project_id, business_id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::cross_tenant("project", project_id)),
        }
    }

    /// Next free number for the business in `year`
    ///
    /// Takes a transaction-scoped advisory lock on the business, so call it
    /// inside the transaction that inserts the invoice.
    pub async fn next_number(
        conn: &mut PgConnection,
        business_id: Uuid,
        year: i32,
    ) -> Result<String, sqlx::Error> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text))")
            .bind(business_id)
            .execute(&mut *conn)
            .await?;

        let prefix = format!("INV-{}-", year);
        let last: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT MAX(SUBSTRING(i.number FROM LENGTH($2) + 1)::int)
            FROM invoices i
            JOIN projects p ON p.id = i.project_id
            WHERE p.business_id = $1 AND i.number LIKE $2 || '%'
            "#,
        )
        .bind(business_id)
        .bind(&prefix)
        .fetch_one(&mut *conn)
        .await?;

        Ok(format_invoice_number(year, last.unwrap_or(0) + 1))
    }

    /// Creates a draft invoice with the next number for the current year
    ///
    /// # Errors
    ///
    /// - [`DomainError::CrossTenant`] if the project is not in `business_id`
    /// - [`DomainError::Validation`] if the amount is negative
    pub async fn create(pool: &PgPool, business_id: Uuid, data: CreateInvoice) -> DomainResult<Self> {
        check_amount(data.amount_cents)?;

        let mut tx = pool.begin().await?;
        Self::check_project(&mut tx, data.project_id, business_id).await?;

        let number = Self::next_number(&mut tx, business_id, Utc::now().year()).await?;

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (project_id, number, amount_cents, due_date, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, project_id, number, amount_cents, status, due_date,
                      issued_date, paid_date, notes, created_at, updated_at
            "#,
        )
        .bind(data.project_id)
        .bind(&number)
        .bind(data.amount_cents)
        .bind(data.due_date)
        .bind(data.notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(invoice_id = %invoice.id, number = %invoice.number, "Invoice created");

        Ok(invoice)
    }

    pub async fn find_by_id<'e, E>(
        executor: E,
        id: Uuid,
        business_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {} FROM invoices i
             JOIN projects p ON p.id = i.project_id
             WHERE i.id = $1 AND p.business_id = $2",
            INVOICE_COLUMNS
        );

        sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .bind(business_id)
            .fetch_optional(executor)
            .await
    }

    async fn find_for_update(
        conn: &mut PgConnection,
        id: Uuid,
        business_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM invoices i
             JOIN projects p ON p.id = i.project_id
             WHERE i.id = $1 AND p.business_id = $2
             FOR UPDATE OF i",
            INVOICE_COLUMNS
        );

        sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .bind(business_id)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Edits a draft invoice
    ///
    /// # Errors
    ///
    /// - [`DomainError::InvalidTransition`] if the invoice is no longer a draft
    /// - [`DomainError::CrossTenant`] if the new project is not in `business_id`
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        business_id: Uuid,
        data: UpdateInvoice,
    ) -> DomainResult<Option<Self>> {
        if let Some(amount_cents) = data.amount_cents {
            check_amount(amount_cents)?;
        }

        let mut tx = pool.begin().await?;

        let Some(existing) = Self::find_for_update(&mut tx, id, business_id).await? else {
            return Ok(None);
        };
        if existing.status != InvoiceStatus::Draft {
            return Err(DomainError::InvalidTransition {
                entity: "invoice",
                action: "edit",
                from: existing.status.to_string(),
            });
        }
        if let Some(project_id) = data.project_id {
            Self::check_project(&mut tx, project_id, business_id).await?;
        }

        let mut query = String::from("UPDATE invoices SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.project_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(", project_id = ${}", bind_count));
        }
        if data.amount_cents.is_some() {
            bind_count += 1;
            query.push_str(&format!(", amount_cents = ${}", bind_count));
        }
        if data.due_date.is_some() {
            bind_count += 1;
            query.push_str(&format!(", due_date = ${}", bind_count));
        }
        if data.notes.is_some() {
            bind_count += 1;
            query.push_str(&format!(", notes = ${}", bind_count));
        }

        query.push_str(
            " WHERE id = $1 RETURNING id, project_id, number, amount_cents, status, due_date, \
             issued_date, paid_date, notes, created_at, updated_at",
        );

        let mut q = sqlx::query_as::<_, Invoice>(&query).bind(id);

        if let Some(project_id) = data.project_id {
            q = q.bind(project_id);
        }
        if let Some(amount_cents) = data.amount_cents {
            q = q.bind(amount_cents);
        }
        if let Some(due_date) = data.due_date {
            q = q.bind(due_date);
        }
        if let Some(notes) = data.notes {
            q = q.bind(notes);
        }

        let invoice = q.fetch_one(&mut *tx).await?;
        tx.commit().await?;

        Ok(Some(invoice))
    }

    /// Deletes a draft invoice; `Ok(false)` if it is not in this business
    pub async fn delete(pool: &PgPool, id: Uuid, business_id: Uuid) -> DomainResult<bool> {
        let mut tx = pool.begin().await?;

        let Some(existing) = Self::find_for_update(&mut tx, id, business_id).await? else {
            return Ok(false);
        };
        if existing.status != InvoiceStatus::Draft {
            return Err(DomainError::InvalidTransition {
                entity: "invoice",
                action: "delete",
                from: existing.status.to_string(),
            });
        }

        sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(true)
    }

    /// Newest first
    pub async fn list_by_business(
        pool: &PgPool,
        business_id: Uuid,
        filter: &InvoiceFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<InvoiceListItem>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {}, p.name AS project_name, c.name AS client_name
             FROM invoices i
             JOIN projects p ON p.id = i.project_id
             LEFT JOIN clients c ON c.id = p.client_id
             WHERE p.business_id = ",
            INVOICE_COLUMNS
        ));
        qb.push_bind(business_id);

        if let Some(status) = filter.status {
            qb.push(" AND i.status = ").push_bind(status);
        }
        if let Some(project_id) = filter.project_id {
            qb.push(" AND i.project_id = ").push_bind(project_id);
        }

        qb.push(" ORDER BY i.created_at DESC, i.number DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        qb.build_query_as::<InvoiceListItem>().fetch_all(pool).await
    }

    async fn transition(
        pool: &PgPool,
        id: Uuid,
        business_id: Uuid,
        to: InvoiceStatus,
        action: &'static str,
        on: NaiveDate,
    ) -> DomainResult<Option<Self>> {
        let mut tx = pool.begin().await?;

        let Some(existing) = Self::find_for_update(&mut tx, id, business_id).await? else {
            return Ok(None);
        };
        if !existing.status.can_transition_to(to) {
            return Err(DomainError::InvalidTransition {
                entity: "invoice",
                action,
                from: existing.status.to_string(),
            });
        }
        if to == InvoiceStatus::Paid {
            check_paid_date(existing.issued_date, on)?;
        }

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET status = $2,
                issued_date = CASE WHEN $2 = 'sent'::invoice_status THEN $3 ELSE issued_date END,
                paid_date = CASE WHEN $2 = 'paid'::invoice_status THEN $3 ELSE paid_date END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, project_id, number, amount_cents, status, due_date,
                      issued_date, paid_date, notes, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(to)
        .bind(on)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(invoice_id = %id, from = %existing.status, to = %to, "Invoice status changed");

        Ok(Some(invoice))
    }

    /// Draft to sent, stamping `issued_date` with today
    pub async fn mark_sent(pool: &PgPool, id: Uuid, business_id: Uuid) -> DomainResult<Option<Self>> {
        Self::transition(pool, id, business_id, InvoiceStatus::Sent, "send", Utc::now().date_naive()).await
    }

    /// Sent or overdue to paid; `paid_date` defaults to today
    ///
    /// # Errors
    ///
    /// [`DomainError::Validation`] when `paid_date` is before `issued_date`.
    pub async fn mark_paid(
        pool: &PgPool,
        id: Uuid,
        business_id: Uuid,
        paid_date: Option<NaiveDate>,
    ) -> DomainResult<Option<Self>> {
        let on = paid_date.unwrap_or_else(|| Utc::now().date_naive());
        Self::transition(pool, id, business_id, InvoiceStatus::Paid, "pay", on).await
    }

    /// Moves every sent invoice whose due date has passed to overdue
    ///
    /// Runs across all businesses; returns the number of invoices changed.
    pub async fn mark_overdue_past_due(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'overdue', updated_at = NOW()
            WHERE status = 'sent' AND due_date < CURRENT_DATE
            "#,
        )
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Invoice endpoints
///
/// # Endpoints
///
/// - `GET /v1/invoices` - List (`?status=&project_id=`)
/// - `POST /v1/invoices` - Create a draft with the next `INV-YYYY-NNNN` number
/// - `GET /v1/invoices/:id` - Fetch
/// - `PATCH /v1/invoices/:id` - Edit a draft
/// - `DELETE /v1/invoices/:id` - Delete a draft
/// - `POST /v1/invoices/:id/send` - Draft to sent
/// - `POST /v1/invoices/:id/pay` - Sent or overdue to paid
///
/// Billing changes need the admin role; members and viewers can read.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{DeleteResponse, Page, Pagination},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tallyboard_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    models::invoice::{CreateInvoice, Invoice, InvoiceFilter, InvoiceListItem, UpdateInvoice},
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub project_id: Uuid,

    #[validate(range(min = 0, message = "Amount must not be negative"))]
    pub amount_cents: i64,

    pub due_date: NaiveDate,

    #[validate(length(max = 5000, message = "Notes must be at most 5000 characters"))]
    pub notes: Option<String>,
}

impl From<CreateInvoiceRequest> for CreateInvoice {
    fn from(req: CreateInvoiceRequest) -> Self {
        CreateInvoice {
            project_id: req.project_id,
            amount_cents: req.amount_cents,
            due_date: req.due_date,
            notes: req.notes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PayInvoiceRequest {
    /// Defaults to today
    pub paid_date: Option<NaiveDate>,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Invoice not found".to_string())
}

pub async fn list_invoices(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(filter): Query<InvoiceFilter>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Page<InvoiceListItem>>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let invoices =
        Invoice::list_by_business(&state.db, auth.business_id, &filter, page.limit(), page.offset())
            .await?;

    Ok(Json(Page::new(invoices, &page)))
}

/// # Endpoint
///
/// ```text
/// POST /v1/invoices
/// Authorization: Bearer <jwt_token>
///
/// { "project_id": "uuid", "amount_cents": 125000, "due_date": "2026-02-15" }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "id": "uuid",
///   "number": "INV-2026-0001",
///   "amount_cents": 125000,
///   "status": "draft",
///   ...
/// }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: Caller is below admin
/// - `422 Unprocessable Entity`: Negative amount or project from another business
pub async fn create_invoice(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateInvoiceRequest>,
) -> ApiResult<(StatusCode, Json<Invoice>)> {
    req.validate()?;
    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    let invoice = Invoice::create(&state.db, auth.business_id, req.into()).await?;

    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Invoice>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let invoice = Invoice::find_by_id(&state.db, id, auth.business_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(invoice))
}

/// # Errors
///
/// - `409 Conflict`: The invoice is no longer a draft
pub async fn update_invoice(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateInvoice>,
) -> ApiResult<Json<Invoice>> {
    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    let invoice = Invoice::update(&state.db, id, auth.business_id, req)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(invoice))
}

/// # Errors
///
/// - `404 Not Found`: No such invoice in this business
/// - `409 Conflict`: The invoice is no longer a draft
pub async fn delete_invoice(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeleteResponse>> {
    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    if !Invoice::delete(&state.db, id, auth.business_id).await? {
        return Err(not_found());
    }

    Ok(Json(DeleteResponse { deleted: true }))
}

/// # Endpoint
///
/// ```text
/// POST /v1/invoices/:id/send
/// Authorization: Bearer <jwt_token>
/// ```
///
/// Sets `issued_date` to today.
///
/// # Errors
///
/// - `409 Conflict`: Only drafts can be sent
pub async fn send_invoice(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Invoice>> {
    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    let invoice = Invoice::mark_sent(&state.db, id, auth.business_id)
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(invoice_id = %id, number = %invoice.number, "Invoice sent");

    Ok(Json(invoice))
}

/// # Endpoint
///
/// ```text
/// POST /v1/invoices/:id/pay
/// Authorization: Bearer <jwt_token>
///
/// { "paid_date": "2026-02-10" }
/// ```
///
/// The body is optional.
///
/// # Errors
///
/// - `409 Conflict`: Drafts and paid invoices cannot be paid
/// - `422 Unprocessable Entity`: `paid_date` is before the issue date
pub async fn pay_invoice(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    req: Option<Json<PayInvoiceRequest>>,
) -> ApiResult<Json<Invoice>> {
    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    let paid_date = req.and_then(|Json(body)| body.paid_date);

    let invoice = Invoice::mark_paid(&state.db, id, auth.business_id, paid_date)
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(invoice_id = %id, number = %invoice.number, "Invoice paid");

    Ok(Json(invoice))
}

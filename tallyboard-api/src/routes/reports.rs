/// Report endpoints
///
/// - `GET /v1/reports/dashboard` - Project, task, time, and invoice totals
/// - `GET /v1/reports/projects` - Per-project progress, hours, and billing
/// - `GET /v1/reports/time` - Hours by project and by user
/// - `GET /v1/reports/invoices` - Totals by status and aging of unpaid invoices
///
/// Time figures accept `?from=&to=` (RFC 3339) to limit entries by start
/// time. Only finished entries count.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use tallyboard_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    reports::{
        service::{ReportRange, Reports},
        DashboardSummary, InvoiceReport, ProjectReportRow, TimeReport,
    },
};

fn check_range(range: &ReportRange) -> ApiResult<()> {
    if let (Some(from), Some(to)) = (range.from, range.to) {
        if to <= from {
            return Err(ApiError::field("to", "to must be after from"));
        }
    }
    Ok(())
}

/// # Response
///
/// ```json
/// {
///   "projects": { "total": 12, "open": 9, "by_status": [...] },
///   "tasks": { "total": 140, "done": 61, "completion_percent": 43.6, "by_status": [...] },
///   "time": { "total_seconds": 360000, "billable_seconds": 288000, "total_hours": 100.0, ... },
///   "invoices": { "outstanding_cents": 450000, "invoiced_cents": 1250000, ... }
/// }
/// ```
pub async fn dashboard(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(range): Query<ReportRange>,
) -> ApiResult<Json<DashboardSummary>> {
    check_range(&range)?;
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let summary = Reports::new(state.db.clone())
        .dashboard(auth.business_id, &range)
        .await?;

    Ok(Json(summary))
}

pub async fn projects(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(range): Query<ReportRange>,
) -> ApiResult<Json<Vec<ProjectReportRow>>> {
    check_range(&range)?;
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let rows = Reports::new(state.db.clone())
        .projects_report(auth.business_id, &range)
        .await?;

    Ok(Json(rows))
}

pub async fn time(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(range): Query<ReportRange>,
) -> ApiResult<Json<TimeReport>> {
    check_range(&range)?;
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let report = Reports::new(state.db.clone())
        .time_report(auth.business_id, &range)
        .await?;

    Ok(Json(report))
}

/// Aging is measured against today's UTC date
pub async fn invoices(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<InvoiceReport>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let report = Reports::new(state.db.clone())
        .invoice_report(auth.business_id, Utc::now().date_naive())
        .await?;

    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_check_range() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();

        assert!(check_range(&ReportRange::default()).is_ok());
        assert!(check_range(&ReportRange { from: Some(from), to: Some(to) }).is_ok());
        assert!(check_range(&ReportRange { from: Some(to), to: Some(from) }).is_err());
        assert!(check_range(&ReportRange { from: Some(from), to: None }).is_ok());
    }
}

/// Report aggregation
///
/// Reports are computed in two steps: [`service::Reports`] fetches rows for
/// one business, already grouped by the database, and the functions in this
/// module fold them into sums, percentages and buckets. The folding functions are pure so they can be
/// tested without a database.
///
/// Money is integer cents and time is whole seconds throughout; hours are
/// derived only for display.
///
/// # Example
///
/// ```
/// use tallyboard_shared::reports::{progress_percent, seconds_to_hours};
///
/// assert_eq!(progress_percent(1, 3), 33.3);
/// assert_eq!(progress_percent(0, 0), 0.0);
/// assert_eq!(seconds_to_hours(5400), 1.5);
/// ```

pub mod service;

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::invoice::InvoiceStatus;
use crate::models::project::{ProjectStatus, ProjectWithProgress};
use crate::models::task::{TaskStatus, TaskStatusCount};

/// Share of `done` in `total` as a percentage with one decimal
///
/// Zero when `total` is zero, so a project without tasks reads as 0%,
/// never NaN.
pub fn progress_percent(done: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let ratio = done.clamp(0, total) as f64 / total as f64;
    (ratio * 1000.0).round() / 10.0
}

/// Seconds as hours, rounded to two decimals
pub fn seconds_to_hours(seconds: i64) -> f64 {
    (seconds as f64 / 36.0).round() / 100.0
}

/// Finished time entries sharing a project, a user and a billable flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TimeRow {
    pub project_id: Uuid,
    pub project_name: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub billable: bool,
    pub entry_count: i64,
    pub total_seconds: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimeSummary {
    pub entry_count: i64,
    pub total_seconds: i64,
    pub billable_seconds: i64,
    pub total_hours: f64,
    pub billable_hours: f64,
}

pub fn summarize_time(rows: &[TimeRow]) -> TimeSummary {
    let total_seconds: i64 = rows.iter().map(|r| r.total_seconds).sum();
    let billable_seconds: i64 = rows.iter().filter(|r| r.billable).map(|r| r.total_seconds).sum();

    TimeSummary {
        entry_count: rows.iter().map(|r| r.entry_count).sum(),
        total_seconds,
        billable_seconds,
        total_hours: seconds_to_hours(total_seconds),
        billable_hours: seconds_to_hours(billable_seconds),
    }
}

/// Hours logged against one project or by one user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoursBreakdown {
    pub id: Uuid,
    pub name: String,
    pub total_seconds: i64,
    pub billable_seconds: i64,
    pub hours: f64,
}

fn group_hours<'a>(rows: impl Iterator<Item = (Uuid, &'a str, &'a TimeRow)>) -> Vec<HoursBreakdown> {
    let mut groups: HashMap<Uuid, HoursBreakdown> = HashMap::new();

    for (id, name, row) in rows {
        let entry = groups.entry(id).or_insert_with(|| HoursBreakdown {
            id,
            name: name.to_string(),
            total_seconds: 0,
            billable_seconds: 0,
            hours: 0.0,
        });
        entry.total_seconds += row.total_seconds;
        if row.billable {
            entry.billable_seconds += row.total_seconds;
        }
    }

    let mut out: Vec<HoursBreakdown> = groups
        .into_values()
        .map(|mut g| {
            g.hours = seconds_to_hours(g.total_seconds);
            g
        })
        .collect();

    out.sort_by(|a, b| {
        b.total_seconds
            .cmp(&a.total_seconds)
            .then_with(|| a.name.cmp(&b.name))
    });
    out
}

/// Most hours first
pub fn hours_by_project(rows: &[TimeRow]) -> Vec<HoursBreakdown> {
    group_hours(rows.iter().map(|r| (r.project_id, r.project_name.as_str(), r)))
}

/// Most hours first
pub fn hours_by_user(rows: &[TimeRow]) -> Vec<HoursBreakdown> {
    group_hours(rows.iter().map(|r| (r.user_id, r.user_name.as_str(), r)))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AmountBucket {
    pub count: i64,
    pub amount_cents: i64,
}

impl AmountBucket {
    fn add(&mut self, row: &InvoiceRow) {
        self.count += row.invoice_count;
        self.amount_cents += row.amount_cents;
    }
}

/// Invoices sharing a project, a status and a due date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct InvoiceRow {
    pub project_id: Uuid,
    pub status: InvoiceStatus,
    pub due_date: NaiveDate,
    pub invoice_count: i64,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvoiceTotals {
    pub draft: AmountBucket,
    pub sent: AmountBucket,
    pub paid: AmountBucket,
    pub overdue: AmountBucket,
    /// Sent plus overdue
    pub outstanding_cents: i64,
    /// Everything except drafts
    pub invoiced_cents: i64,
}

pub fn invoice_totals(invoices: &[InvoiceRow]) -> InvoiceTotals {
    let mut totals = InvoiceTotals::default();

    for invoice in invoices {
        let bucket = match invoice.status {
            InvoiceStatus::Draft => &mut totals.draft,
            InvoiceStatus::Sent => &mut totals.sent,
            InvoiceStatus::Paid => &mut totals.paid,
            InvoiceStatus::Overdue => &mut totals.overdue,
        };
        bucket.add(invoice);

        if invoice.status.is_outstanding() {
            totals.outstanding_cents += invoice.amount_cents;
        }
        if invoice.status != InvoiceStatus::Draft {
            totals.invoiced_cents += invoice.amount_cents;
        }
    }

    totals
}

/// Outstanding invoices grouped by days past due
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvoiceAging {
    /// Not yet due
    pub current: AmountBucket,
    pub days_1_30: AmountBucket,
    pub days_31_60: AmountBucket,
    pub days_61_90: AmountBucket,
    pub days_over_90: AmountBucket,
}

/// Buckets sent and overdue invoices by how far `today` is past their due date
///
/// Drafts and paid invoices are ignored.
pub fn invoice_aging(invoices: &[InvoiceRow], today: NaiveDate) -> InvoiceAging {
    let mut aging = InvoiceAging::default();

    for invoice in invoices.iter().filter(|i| i.status.is_outstanding()) {
        let days_past_due = (today - invoice.due_date).num_days();
        let bucket = match days_past_due {
            d if d <= 0 => &mut aging.current,
            1..=30 => &mut aging.days_1_30,
            31..=60 => &mut aging.days_31_60,
            61..=90 => &mut aging.days_61_90,
            _ => &mut aging.days_over_90,
        };
        bucket.add(invoice);
    }

    aging
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProjectStatusCount {
    pub status: ProjectStatus,
    pub count: i64,
}

/// Counts for every status, including zeros, in lifecycle order
pub fn project_counts(projects: &[ProjectWithProgress]) -> Vec<ProjectStatusCount> {
    ProjectStatus::ALL
        .iter()
        .map(|&status| ProjectStatusCount {
            status,
            count: projects.iter().filter(|p| p.project.status == status).count() as i64,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSummary {
    pub total: i64,
    pub done: i64,
    pub completion_percent: f64,
    pub by_status: Vec<TaskStatusCount>,
}

/// Fills in statuses missing from a `GROUP BY` result with zero
pub fn summarize_tasks(counts: &[TaskStatusCount]) -> TaskSummary {
    let by_status: Vec<TaskStatusCount> = TaskStatus::ALL
        .iter()
        .map(|&status| TaskStatusCount {
            status,
            count: counts
                .iter()
                .filter(|c| c.status == status)
                .map(|c| c.count)
                .sum(),
        })
        .collect();

    let total = by_status.iter().map(|c| c.count).sum();
    let done = by_status
        .iter()
        .find(|c| c.status == TaskStatus::Done)
        .map(|c| c.count)
        .unwrap_or(0);

    TaskSummary {
        total,
        done,
        completion_percent: progress_percent(done, total),
        by_status,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSummary {
    pub total: i64,
    /// Projects that are neither completed nor archived
    pub open: i64,
    pub by_status: Vec<ProjectStatusCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub projects: ProjectSummary,
    pub tasks: TaskSummary,
    pub time: TimeSummary,
    pub invoices: InvoiceTotals,
}

pub fn dashboard_summary(
    projects: &[ProjectWithProgress],
    task_counts: &[TaskStatusCount],
    time: &[TimeRow],
    invoices: &[InvoiceRow],
) -> DashboardSummary {
    DashboardSummary {
        projects: ProjectSummary {
            total: projects.len() as i64,
            open: projects
                .iter()
                .filter(|p| !p.project.status.is_closed())
                .count() as i64,
            by_status: project_counts(projects),
        },
        tasks: summarize_tasks(task_counts),
        time: summarize_time(time),
        invoices: invoice_totals(invoices),
    }
}

/// One line of the per-project report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectReportRow {
    pub project_id: Uuid,
    pub name: String,
    pub status: ProjectStatus,
    pub due_date: Option<NaiveDate>,
    pub total_tasks: i64,
    pub done_tasks: i64,
    pub progress_percent: f64,
    pub total_seconds: i64,
    pub billable_seconds: i64,
    pub hours: f64,
    pub invoiced_cents: i64,
    pub paid_cents: i64,
}

/// Joins project progress with hours and invoice amounts per project
///
/// Keeps the order of `projects`.
pub fn project_report(
    projects: &[ProjectWithProgress],
    time: &[TimeRow],
    invoices: &[InvoiceRow],
) -> Vec<ProjectReportRow> {
    let hours: HashMap<Uuid, HoursBreakdown> = hours_by_project(time)
        .into_iter()
        .map(|h| (h.id, h))
        .collect();

    projects
        .iter()
        .map(|p| {
            let project = &p.project;
            let logged = hours.get(&project.id);
            let billed = invoices
                .iter()
                .filter(|i| i.project_id == project.id && i.status != InvoiceStatus::Draft);

            let (invoiced_cents, paid_cents) = billed.fold((0, 0), |(inv, paid), i| {
                let paid_amount = if i.status == InvoiceStatus::Paid { i.amount_cents } else { 0 };
                (inv + i.amount_cents, paid + paid_amount)
            });

            ProjectReportRow {
                project_id: project.id,
                name: project.name.clone(),
                status: project.status,
                due_date: project.due_date,
                total_tasks: p.total_tasks,
                done_tasks: p.done_tasks,
                progress_percent: progress_percent(p.done_tasks, p.total_tasks),
                total_seconds: logged.map(|h| h.total_seconds).unwrap_or(0),
                billable_seconds: logged.map(|h| h.billable_seconds).unwrap_or(0),
                hours: logged.map(|h| h.hours).unwrap_or(0.0),
                invoiced_cents,
                paid_cents,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeReport {
    pub summary: TimeSummary,
    pub by_project: Vec<HoursBreakdown>,
    pub by_user: Vec<HoursBreakdown>,
}

pub fn time_report(rows: &[TimeRow]) -> TimeReport {
    TimeReport {
        summary: summarize_time(rows),
        by_project: hours_by_project(rows),
        by_user: hours_by_user(rows),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceReport {
    pub totals: InvoiceTotals,
    pub aging: InvoiceAging,
}

pub fn invoice_report(invoices: &[InvoiceRow], today: NaiveDate) -> InvoiceReport {
    InvoiceReport {
        totals: invoice_totals(invoices),
        aging: invoice_aging(invoices, today),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::Project;
    use chrono::Utc;

    fn time_row(project: (Uuid, &str), user: (Uuid, &str), seconds: i64, billable: bool) -> TimeRow {
        TimeRow {
            project_id: project.0,
            project_name: project.1.to_string(),
            user_id: user.0,
            user_name: user.1.to_string(),
            billable,
            entry_count: 1,
            total_seconds: seconds,
        }
    }

    fn invoice(project_id: Uuid, status: InvoiceStatus, amount_cents: i64, due_date: NaiveDate) -> InvoiceRow {
        InvoiceRow {
            project_id,
            status,
            due_date,
            invoice_count: 1,
            amount_cents,
        }
    }

    fn project(status: ProjectStatus, total: i64, done: i64) -> ProjectWithProgress {
        let now = Utc::now();
        ProjectWithProgress {
            project: Project {
                id: Uuid::new_v4(),
                business_id: Uuid::nil(),
                owner_id: Uuid::nil(),
                client_id: None,
                name: format!("{:?}", status),
                description: None,
                status,
                due_date: None,
                created_at: now,
                updated_at: now,
            },
            total_tasks: total,
            done_tasks: done,
            progress_percent: progress_percent(done, total),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    #[test]
    fn test_progress_percent_zero_tasks() {
        let p = progress_percent(0, 0);
        assert_eq!(p, 0.0);
        assert!(!p.is_nan());
    }

    #[test]
    fn test_progress_percent_rounding_and_bounds() {
        assert_eq!(progress_percent(1, 3), 33.3);
        assert_eq!(progress_percent(2, 3), 66.7);
        assert_eq!(progress_percent(4, 4), 100.0);
        assert_eq!(progress_percent(5, 4), 100.0);
        assert_eq!(progress_percent(-1, 4), 0.0);
    }

    #[test]
    fn test_seconds_to_hours() {
        assert_eq!(seconds_to_hours(0), 0.0);
        assert_eq!(seconds_to_hours(3600), 1.0);
        assert_eq!(seconds_to_hours(900), 0.25);
        assert_eq!(seconds_to_hours(1000), 0.28);
    }

    #[test]
    fn test_summarize_time() {
        let site = (Uuid::new_v4(), "Site");
        let ada = (Uuid::new_v4(), "Ada");
        let rows = vec![
            time_row(site, ada, 3600, true),
            time_row(site, ada, 1800, false),
        ];

        let summary = summarize_time(&rows);
        assert_eq!(summary.entry_count, 2);
        assert_eq!(summary.total_seconds, 5400);
        assert_eq!(summary.billable_seconds, 3600);
        assert_eq!(summary.total_hours, 1.5);
        assert_eq!(summary.billable_hours, 1.0);

        assert_eq!(summarize_time(&[]), TimeSummary::default());
    }

    #[test]
    fn test_summarize_time_counts_grouped_entries() {
        let site = (Uuid::new_v4(), "Site");
        let ada = (Uuid::new_v4(), "Ada");
        let mut many = time_row(site, ada, 12_000 * 60, true);
        many.entry_count = 12_000;

        let summary = summarize_time(&[many, time_row(site, ada, 30, false)]);
        assert_eq!(summary.entry_count, 12_001);
        assert_eq!(summary.total_seconds, 720_030);
        assert_eq!(summary.billable_seconds, 720_000);
    }

    #[test]
    fn test_hours_by_project_and_user() {
        let site = (Uuid::new_v4(), "Site");
        let app = (Uuid::new_v4(), "App");
        let ada = (Uuid::new_v4(), "Ada");
        let bob = (Uuid::new_v4(), "Bob");
        let rows = vec![
            time_row(site, ada, 1200, true),
            time_row(app, ada, 7200, true),
            time_row(site, bob, 1200, false),
        ];

        let by_project = hours_by_project(&rows);
        assert_eq!(by_project.len(), 2);
        assert_eq!(by_project[0].name, "App");
        assert_eq!(by_project[0].total_seconds, 7200);
        assert_eq!(by_project[1].total_seconds, 2400);
        assert_eq!(by_project[1].billable_seconds, 1200);

        let by_user = hours_by_user(&rows);
        assert_eq!(by_user[0].id, ada.0);
        assert_eq!(by_user[0].total_seconds, 8400);
        assert_eq!(by_user[1].name, "Bob");
    }

    #[test]
    fn test_invoice_totals() {
        let p = Uuid::new_v4();
        let invoices = vec![
            invoice(p, InvoiceStatus::Draft, 500, day(1)),
            invoice(p, InvoiceStatus::Sent, 1000, day(1)),
            invoice(p, InvoiceStatus::Overdue, 2000, day(1)),
            invoice(p, InvoiceStatus::Paid, 4000, day(1)),
            invoice(p, InvoiceStatus::Paid, 1, day(1)),
        ];

        let totals = invoice_totals(&invoices);
        assert_eq!(totals.draft, AmountBucket { count: 1, amount_cents: 500 });
        assert_eq!(totals.paid, AmountBucket { count: 2, amount_cents: 4001 });
        assert_eq!(totals.outstanding_cents, 3000);
        assert_eq!(totals.invoiced_cents, 7001);
    }

    #[test]
    fn test_invoice_totals_counts_grouped_invoices() {
        let p = Uuid::new_v4();
        let mut sent = invoice(p, InvoiceStatus::Sent, 11_000 * 100, day(1));
        sent.invoice_count = 11_000;

        let totals = invoice_totals(&[sent.clone(), invoice(p, InvoiceStatus::Draft, 50, day(1))]);
        assert_eq!(totals.sent, AmountBucket { count: 11_000, amount_cents: 1_100_000 });
        assert_eq!(totals.outstanding_cents, 1_100_000);
        assert_eq!(totals.invoiced_cents, 1_100_000);

        let aging = invoice_aging(&[sent], day(15));
        assert_eq!(aging.days_1_30.count, 11_000);
    }

    #[test]
    fn test_invoice_aging_buckets() {
        let p = Uuid::new_v4();
        let today = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let invoices = vec![
            invoice(p, InvoiceStatus::Sent, 100, today),
            invoice(p, InvoiceStatus::Sent, 200, today - chrono::Duration::days(1)),
            invoice(p, InvoiceStatus::Overdue, 300, today - chrono::Duration::days(30)),
            invoice(p, InvoiceStatus::Overdue, 400, today - chrono::Duration::days(31)),
            invoice(p, InvoiceStatus::Overdue, 500, today - chrono::Duration::days(90)),
            invoice(p, InvoiceStatus::Overdue, 600, today - chrono::Duration::days(91)),
            invoice(p, InvoiceStatus::Paid, 9999, today - chrono::Duration::days(200)),
            invoice(p, InvoiceStatus::Draft, 9999, today - chrono::Duration::days(200)),
        ];

        let aging = invoice_aging(&invoices, today);
        assert_eq!(aging.current, AmountBucket { count: 1, amount_cents: 100 });
        assert_eq!(aging.days_1_30, AmountBucket { count: 2, amount_cents: 500 });
        assert_eq!(aging.days_31_60, AmountBucket { count: 1, amount_cents: 400 });
        assert_eq!(aging.days_61_90, AmountBucket { count: 1, amount_cents: 500 });
        assert_eq!(aging.days_over_90, AmountBucket { count: 1, amount_cents: 600 });
    }

    #[test]
    fn test_summarize_tasks_fills_missing_statuses() {
        let counts = vec![
            TaskStatusCount { status: TaskStatus::Todo, count: 3 },
            TaskStatusCount { status: TaskStatus::Done, count: 1 },
        ];

        let summary = summarize_tasks(&counts);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.done, 1);
        assert_eq!(summary.completion_percent, 25.0);
        assert_eq!(summary.by_status.len(), 4);
        assert_eq!(summary.by_status[1].status, TaskStatus::InProgress);
        assert_eq!(summary.by_status[1].count, 0);

        let empty = summarize_tasks(&[]);
        assert_eq!(empty.total, 0);
        assert_eq!(empty.completion_percent, 0.0);
    }

    #[test]
    fn test_dashboard_summary() {
        let projects = vec![
            project(ProjectStatus::Active, 4, 2),
            project(ProjectStatus::Active, 0, 0),
            project(ProjectStatus::Archived, 3, 3),
        ];

        let summary = dashboard_summary(&projects, &[], &[], &[]);
        assert_eq!(summary.projects.total, 3);
        assert_eq!(summary.projects.open, 2);
        let active = summary
            .projects
            .by_status
            .iter()
            .find(|c| c.status == ProjectStatus::Active)
            .unwrap();
        assert_eq!(active.count, 2);
        assert_eq!(summary.projects.by_status.len(), ProjectStatus::ALL.len());
        assert_eq!(summary.invoices.outstanding_cents, 0);
    }

    #[test]
    fn test_project_report_joins_hours_and_invoices() {
        let site = project(ProjectStatus::Active, 0, 0);
        let empty = project(ProjectStatus::Planning, 2, 1);
        let site_ref = (site.project.id, site.project.name.as_str());
        let ada = (Uuid::new_v4(), "Ada");

        let time = vec![time_row(site_ref, ada, 3600, true), time_row(site_ref, ada, 600, false)];
        let invoices = vec![
            invoice(site.project.id, InvoiceStatus::Paid, 1500, day(1)),
            invoice(site.project.id, InvoiceStatus::Sent, 500, day(1)),
            invoice(site.project.id, InvoiceStatus::Draft, 700, day(1)),
        ];

        let rows = project_report(&[site.clone(), empty.clone()], &time, &invoices);
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].project_id, site.project.id);
        assert_eq!(rows[0].progress_percent, 0.0);
        assert_eq!(rows[0].total_seconds, 4200);
        assert_eq!(rows[0].billable_seconds, 3600);
        assert_eq!(rows[0].invoiced_cents, 2000);
        assert_eq!(rows[0].paid_cents, 1500);

        assert_eq!(rows[1].progress_percent, 50.0);
        assert_eq!(rows[1].hours, 0.0);
        assert_eq!(rows[1].invoiced_cents, 0);
    }
}

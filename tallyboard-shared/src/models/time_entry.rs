/// Time entries and the running timer
///
/// A time entry is scoped to a business through its task's project. Entries
/// are either logged manually with a known range, or recorded by the timer:
/// `start_timer` stamps `started_at` with the database clock and
/// `stop_timer` computes the duration in SQL, so the client never reports
/// elapsed time itself.
///
/// A user has at most one running entry (`ended_at IS NULL`), across all
/// businesses; a partial unique index backs this up.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use super::task::Task;
use crate::error::{DomainError, DomainResult};

const TIME_ENTRY_COLUMNS: &str = "te.id, te.task_id, te.user_id, te.description, te.started_at, \
    te.ended_at, te.duration_seconds, te.billable, te.created_at, te.updated_at";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TimeEntry {
    pub id: Uuid,
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub description: Option<String>,
    pub started_at: DateTime<Utc>,
    /// `None` while the timer is running
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: i32,
    pub billable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeEntry {
    pub fn is_running(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Entry with the task, project, and user names used by lists and reports
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TimeEntryListItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub entry: TimeEntry,
    pub task_title: String,
    pub project_id: Uuid,
    pub project_name: String,
    pub user_name: String,
}

/// A running entry with the business its task belongs to
///
/// One timer runs per user across all businesses, so the running entry may
/// sit in a business other than the one the caller is working in.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RunningTimer {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub entry: TimeEntry,
    pub business_id: Uuid,
}

impl RunningTimer {
    pub fn conflict_message(&self, current_business: Uuid) -> String {
        if self.business_id == current_business {
            "A timer is already running".to_string()
        } else {
            format!("A timer is already running in business {}", self.business_id)
        }
    }
}

/// Manual entry; give `ended_at` or `duration_seconds`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTimeEntry {
    pub task_id: Uuid,
    pub description: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i32>,
    pub billable: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartTimer {
    pub task_id: Uuid,
    pub description: Option<String>,
    pub billable: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTimeEntry {
    pub task_id: Option<Uuid>,
    #[serde(default, deserialize_with = "crate::serde_util::double_option")]
    pub description: Option<Option<String>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i32>,
    pub billable: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeEntryFilter {
    pub user_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    /// Inclusive lower bound on `started_at`
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `started_at`
    pub to: Option<DateTime<Utc>>,
    pub billable: Option<bool>,
}

/// Resolves an entry's end and duration from whichever of the two is known
///
/// - with `ended_at`, the duration is the length of the range and any
///   `duration_seconds` is ignored
/// - with only `duration_seconds`, `ended_at` is `started_at + duration`
/// - with neither, the entry is running: `(None, 0)`
///
/// # Errors
///
/// [`DomainError::Validation`] if the range is inverted, the duration is
/// negative, or the range does not fit in `i32` seconds.
pub fn resolve_range(
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    duration_seconds: Option<i32>,
) -> DomainResult<(Option<DateTime<Utc>>, i32)> {
    match (ended_at, duration_seconds) {
        (Some(ended_at), _) => {
            if ended_at < started_at {
                return Err(DomainError::Validation(
                    "ended_at must not be before started_at".to_string(),
                ));
            }
            let seconds = i32::try_from((ended_at - started_at).num_seconds()).map_err(|_| {
                DomainError::Validation("Time entry is too long".to_string())
            })?;
            Ok((Some(ended_at), seconds))
        }
        (None, Some(seconds)) => {
            if seconds < 0 {
                return Err(DomainError::Validation(
                    "duration_seconds must not be negative".to_string(),
                ));
            }
            Ok((Some(started_at + Duration::seconds(i64::from(seconds))), seconds))
        }
        (None, None) => Ok((None, 0)),
    }
}

fn is_running_timer_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.constraint() == Some("idx_time_entries_one_running"))
}

impl TimeEntry {
    async fn check_task(conn: &mut PgConnection, task_id: Uuid, business_id: Uuid) -> DomainResult<()> {
        match Task::find_by_id(&mut *conn, task_id, business_id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::cross_tenant("task", task_id)),
        }
    }

    /// Logs a completed entry for `user_id`
    ///
    /// # Errors
    ///
    /// - [`DomainError::CrossTenant`] if the task is not in `business_id`
    /// - [`DomainError::Validation`] if neither `ended_at` nor
    ///   `duration_seconds` is given, or the range is invalid
    pub async fn create(
        pool: &PgPool,
        business_id: Uuid,
        user_id: Uuid,
        data: CreateTimeEntry,
    ) -> DomainResult<Self> {
        if data.ended_at.is_none() && data.duration_seconds.is_none() {
            return Err(DomainError::Validation(
                "Manual entries need ended_at or duration_seconds; use the timer for running entries"
                    .to_string(),
            ));
        }
        let (ended_at, duration_seconds) =
            resolve_range(data.started_at, data.ended_at, data.duration_seconds)?;

        let mut tx = pool.begin().await?;
        Self::check_task(&mut tx, data.task_id, business_id).await?;

        let entry = sqlx::query_as::<_, TimeEntry>(
            r#"
            INSERT INTO time_entries (task_id, user_id, description, started_at, ended_at, duration_seconds, billable)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, task_id, user_id, description, started_at, ended_at,
                      duration_seconds, billable, created_at, updated_at
            "#,
        )
        .bind(data.task_id)
        .bind(user_id)
        .bind(data.description)
        .bind(data.started_at)
        .bind(ended_at)
        .bind(duration_seconds)
        .bind(data.billable.unwrap_or(true))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(entry)
    }

    /// Starts a timer on a task, stamped with the database clock
    ///
    /// # Errors
    ///
    /// - [`DomainError::CrossTenant`] if the task is not in `business_id`
    /// - [`DomainError::Conflict`] if the user already has a running timer
    pub async fn start_timer(
        pool: &PgPool,
        business_id: Uuid,
        user_id: Uuid,
        data: StartTimer,
    ) -> DomainResult<Self> {
        let mut tx = pool.begin().await?;
        Self::check_task(&mut tx, data.task_id, business_id).await?;

        if let Some(running) = Self::find_running(&mut *tx, user_id).await? {
            return Err(DomainError::Conflict(running.conflict_message(business_id)));
        }

        let entry = sqlx::query_as::<_, TimeEntry>(
            r#"
            INSERT INTO time_entries (task_id, user_id, description, started_at, billable)
            VALUES ($1, $2, $3, NOW(), $4)
            RETURNING id, task_id, user_id, description, started_at, ended_at,
                      duration_seconds, billable, created_at, updated_at
            "#,
        )
        .bind(data.task_id)
        .bind(user_id)
        .bind(data.description)
        .bind(data.billable.unwrap_or(true))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_running_timer_violation(&e) {
                DomainError::Conflict("A timer is already running".to_string())
            } else {
                DomainError::Database(e)
            }
        })?;

        tx.commit().await?;

        info!(entry_id = %entry.id, user_id = %user_id, "Timer started");

        Ok(entry)
    }

    /// Stops the user's running timer, whichever business it was started in
    ///
    /// Returns `Ok(None)` when there is nothing to stop.
    pub async fn stop_timer(pool: &PgPool, user_id: Uuid) -> Result<Option<RunningTimer>, sqlx::Error> {
        let sql = format!(
            "UPDATE time_entries te
             SET ended_at = NOW(),
                 duration_seconds = GREATEST(0, FLOOR(EXTRACT(EPOCH FROM (NOW() - te.started_at))))::int,
                 updated_at = NOW()
             FROM tasks t
             JOIN projects p ON p.id = t.project_id
             WHERE te.task_id = t.id
               AND te.user_id = $1
               AND te.ended_at IS NULL
             RETURNING {}, p.business_id",
            TIME_ENTRY_COLUMNS
        );

        let timer = sqlx::query_as::<_, RunningTimer>(&sql)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

        if let Some(timer) = &timer {
            info!(
                entry_id = %timer.entry.id,
                business_id = %timer.business_id,
                duration_seconds = timer.entry.duration_seconds,
                "Timer stopped"
            );
        }

        Ok(timer)
    }

    /// The user's running entry, in any business
    pub async fn find_running<'e, E>(executor: E, user_id: Uuid) -> Result<Option<RunningTimer>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {}, p.business_id FROM time_entries te
             JOIN tasks t ON t.id = te.task_id
             JOIN projects p ON p.id = t.project_id
             WHERE te.user_id = $1 AND te.ended_at IS NULL",
            TIME_ENTRY_COLUMNS
        );

        sqlx::query_as::<_, RunningTimer>(&sql)
            .bind(user_id)
            .fetch_optional(executor)
            .await
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
            "SELECT {} FROM time_entries te
             JOIN tasks t ON t.id = te.task_id
             JOIN projects p ON p.id = t.project_id
             WHERE te.id = $1 AND p.business_id = $2",
            TIME_ENTRY_COLUMNS
        );

        sqlx::query_as::<_, TimeEntry>(&sql)
            .bind(id)
            .bind(business_id)
            .fetch_optional(executor)
            .await
    }

    /// Edits an entry, keeping `ended_at` and `duration_seconds` consistent
    ///
    /// Changing `started_at` on a finished entry recomputes its duration
    /// against the existing `ended_at`. Returns `Ok(None)` if the entry is not
    /// in this business.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        business_id: Uuid,
        data: UpdateTimeEntry,
    ) -> DomainResult<Option<Self>> {
        let mut tx = pool.begin().await?;

        let Some(existing) = Self::find_by_id(&mut *tx, id, business_id).await? else {
            return Ok(None);
        };

        if let Some(task_id) = data.task_id {
            Self::check_task(&mut tx, task_id, business_id).await?;
        }

        let started_at = data.started_at.unwrap_or(existing.started_at);
        let (ended_at, duration_seconds) = match (data.ended_at, data.duration_seconds) {
            (Some(ended_at), _) => resolve_range(started_at, Some(ended_at), None)?,
            (None, Some(seconds)) => resolve_range(started_at, None, Some(seconds))?,
            (None, None) => resolve_range(started_at, existing.ended_at, None)?,
        };

        let description = match data.description {
            Some(description) => description,
            None => existing.description,
        };

        let entry = sqlx::query_as::<_, TimeEntry>(
            r#"
            UPDATE time_entries
            SET task_id = $2, description = $3, started_at = $4, ended_at = $5,
                duration_seconds = $6, billable = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING id, task_id, user_id, description, started_at, ended_at,
                      duration_seconds, billable, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(data.task_id.unwrap_or(existing.task_id))
        .bind(description)
        .bind(started_at)
        .bind(ended_at)
        .bind(duration_seconds)
        .bind(data.billable.unwrap_or(existing.billable))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(entry))
    }

    pub async fn delete(pool: &PgPool, id: Uuid, business_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM time_entries te
            USING tasks t, projects p
            WHERE te.id = $1 AND t.id = te.task_id AND p.id = t.project_id AND p.business_id = $2
            "#,
        )
        .bind(id)
        .bind(business_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists entries newest first
    pub async fn list_by_business(
        pool: &PgPool,
        business_id: Uuid,
        filter: &TimeEntryFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TimeEntryListItem>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {}, t.title AS task_title, p.id AS project_id, p.name AS project_name,
                    u.name AS user_name
             FROM time_entries te
             JOIN tasks t ON t.id = te.task_id
             JOIN projects p ON p.id = t.project_id
             JOIN users u ON u.id = te.user_id
             WHERE p.business_id = ",
            TIME_ENTRY_COLUMNS
        ));
        qb.push_bind(business_id);

        if let Some(user_id) = filter.user_id {
            qb.push(" AND te.user_id = ").push_bind(user_id);
        }
        if let Some(task_id) = filter.task_id {
            qb.push(" AND te.task_id = ").push_bind(task_id);
        }
        if let Some(project_id) = filter.project_id {
            qb.push(" AND p.id = ").push_bind(project_id);
        }
        if let Some(from) = filter.from {
            qb.push(" AND te.started_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND te.started_at < ").push_bind(to);
        }
        if let Some(billable) = filter.billable {
            qb.push(" AND te.billable = ").push_bind(billable);
        }

        qb.push(" ORDER BY te.started_at DESC, te.id LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        qb.build_query_as::<TimeEntryListItem>().fetch_all(pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_conflict_message_names_other_business() {
        let now = Utc::now();
        let business_id = Uuid::new_v4();
        let timer = RunningTimer {
            entry: TimeEntry {
                id: Uuid::new_v4(),
                task_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                description: None,
                started_at: now,
                ended_at: None,
                duration_seconds: 0,
                billable: true,
                created_at: now,
                updated_at: now,
            },
            business_id,
        };

        assert_eq!(timer.conflict_message(business_id), "A timer is already running");
        assert_eq!(
            timer.conflict_message(Uuid::new_v4()),
            format!("A timer is already running in business {}", business_id)
        );
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, h, m, 0).unwrap()
    }

    #[test]
    fn test_resolve_range_from_end() {
        let (ended, seconds) = resolve_range(at(9, 0), Some(at(10, 30)), None).unwrap();
        assert_eq!(ended, Some(at(10, 30)));
        assert_eq!(seconds, 5400);
    }

    #[test]
    fn test_resolve_range_end_wins_over_duration() {
        let (_, seconds) = resolve_range(at(9, 0), Some(at(9, 15)), Some(1)).unwrap();
        assert_eq!(seconds, 900);
    }

    #[test]
    fn test_resolve_range_from_duration() {
        let (ended, seconds) = resolve_range(at(9, 0), None, Some(1800)).unwrap();
        assert_eq!(ended, Some(at(9, 30)));
        assert_eq!(seconds, 1800);
    }

    #[test]
    fn test_resolve_range_running() {
        assert_eq!(resolve_range(at(9, 0), None, None).unwrap(), (None, 0));
    }

    #[test]
    fn test_resolve_range_rejects_invalid() {
        assert!(matches!(
            resolve_range(at(10, 0), Some(at(9, 0)), None),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            resolve_range(at(10, 0), None, Some(-5)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_length_entry_allowed() {
        let (_, seconds) = resolve_range(at(9, 0), Some(at(9, 0)), None).unwrap();
        assert_eq!(seconds, 0);
    }
}

/// Businesses (tenants)
///
/// Every project, client, task, time entry, and invoice belongs to exactly
/// one business, directly or through its project. A business is created
/// together with its owner's membership in one transaction.
///
/// # Example
///
/// ```no_run
/// use tallyboard_shared::models::business::{Business, CreateBusiness, BusinessPlan};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, owner_id: Uuid) -> Result<(), sqlx::Error> {
/// let business = Business::create_with_owner(&pool, CreateBusiness {
///     name: "Acme Studio".to_string(),
///     owner_id,
///     plan: BusinessPlan::Free,
///     industry: Some("design".to_string()),
/// }).await?;
///
/// assert!(business.slug.starts_with("acme-studio"));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use super::business_member::{BusinessMember, CreateBusinessMember, MemberRole};

const BUSINESS_COLUMNS: &str =
    "id, name, slug, owner_id, plan, industry, status, created_at, updated_at";

/// Longest slug stored, leaving room for a uniqueness suffix
const SLUG_MAX_LENGTH: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "business_plan", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BusinessPlan {
    Free,
    Starter,
    Pro,
    Enterprise,
}

impl BusinessPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessPlan::Free => "free",
            BusinessPlan::Starter => "starter",
            BusinessPlan::Pro => "pro",
            BusinessPlan::Enterprise => "enterprise",
        }
    }
}

impl Default for BusinessPlan {
    fn default() -> Self {
        BusinessPlan::Free
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "business_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BusinessStatus {
    Active,
    Suspended,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Business {
    pub id: Uuid,
    pub name: String,
    /// URL-safe unique handle derived from the name
    pub slug: String,
    pub owner_id: Uuid,
    pub plan: BusinessPlan,
    pub industry: Option<String>,
    pub status: BusinessStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateBusiness {
    pub name: String,
    pub owner_id: Uuid,
    pub plan: BusinessPlan,
    pub industry: Option<String>,
}

/// Settings changes; `industry: Some(None)` clears it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBusiness {
    pub name: Option<String>,
    pub plan: Option<BusinessPlan>,
    #[serde(default, deserialize_with = "crate::serde_util::double_option")]
    pub industry: Option<Option<String>>,
    pub status: Option<BusinessStatus>,
}

/// A business as seen by one of its members
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BusinessSummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub plan: BusinessPlan,
    pub status: BusinessStatus,
    pub role: MemberRole,
}

/// Derives a URL slug from a business name
///
/// Lowercases ASCII alphanumerics, collapses every other run of characters
/// into a single `-`, trims dashes from both ends, and caps the length.
/// Falls back to `"business"` when nothing usable remains.
///
/// ```
/// use tallyboard_shared::models::business::slugify;
///
/// assert_eq!(slugify("Acme & Sons, Ltd."), "acme-sons-ltd");
/// assert_eq!(slugify("  --  "), "business");
/// ```
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.len() > SLUG_MAX_LENGTH {
        slug.truncate(SLUG_MAX_LENGTH);
        while slug.ends_with('-') {
            slug.pop();
        }
    }

    if slug.is_empty() {
        "business".to_string()
    } else {
        slug
    }
}

impl Business {
    /// Picks `base`, or `base-2`, `base-3`, ... if taken
    async fn unique_slug(conn: &mut PgConnection, base: &str) -> Result<String, sqlx::Error> {
        let taken: Vec<String> = sqlx::query_scalar(
            "SELECT slug FROM businesses WHERE slug = $1 OR slug LIKE $1 || '-%'",
        )
        .bind(base)
        .fetch_all(&mut *conn)
        .await?;

        if !taken.iter().any(|s| s == base) {
            return Ok(base.to_string());
        }

        let next = (2..)
            .map(|n| format!("{}-{}", base, n))
            .find(|candidate| !taken.contains(candidate))
            .unwrap_or_else(|| format!("{}-{}", base, Uuid::new_v4().simple()));

        Ok(next)
    }

    /// Inserts the business and its owner membership on an open connection
    ///
    /// Registration uses this inside its own transaction so the user, the
    /// business, and the membership commit together.
    pub async fn create_in(conn: &mut PgConnection, data: CreateBusiness) -> Result<Self, sqlx::Error> {
        let slug = Self::unique_slug(conn, &slugify(&data.name)).await?;

        let sql = format!(
            "INSERT INTO businesses (name, slug, owner_id, plan, industry)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            BUSINESS_COLUMNS
        );

        let business = sqlx::query_as::<_, Business>(&sql)
            .bind(data.name.trim())
            .bind(&slug)
            .bind(data.owner_id)
            .bind(data.plan)
            .bind(data.industry)
            .fetch_one(&mut *conn)
            .await?;

        BusinessMember::create(
            &mut *conn,
            CreateBusinessMember {
                business_id: business.id,
                user_id: data.owner_id,
                role: MemberRole::Owner,
            },
        )
        .await?;

        info!(business_id = %business.id, slug = %business.slug, "Business created");

        Ok(business)
    }

    /// Creates a business and makes `owner_id` its owner, atomically
    pub async fn create_with_owner(pool: &PgPool, data: CreateBusiness) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let business = Self::create_in(&mut tx, data).await?;
        tx.commit().await?;
        Ok(business)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {} FROM businesses WHERE id = $1", BUSINESS_COLUMNS);

        sqlx::query_as::<_, Business>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {} FROM businesses WHERE slug = $1", BUSINESS_COLUMNS);

        sqlx::query_as::<_, Business>(&sql)
            .bind(slug)
            .fetch_optional(pool)
            .await
    }

    /// Updates the `Some` fields of `data`
    ///
    /// The slug is kept stable when the name changes.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateBusiness,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE businesses SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.plan.is_some() {
            bind_count += 1;
            query.push_str(&format!(", plan = ${}", bind_count));
        }
        if data.industry.is_some() {
            bind_count += 1;
            query.push_str(&format!(", industry = ${}", bind_count));
        }
        if data.status.is_some() {
            bind_count += 1;
            query.push_str(&format!(", status = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {}", BUSINESS_COLUMNS));

        let mut q = sqlx::query_as::<_, Business>(&query).bind(id);

        if let Some(name) = data.name {
            q = q.bind(name.trim().to_string());
        }
        if let Some(plan) = data.plan {
            q = q.bind(plan);
        }
        if let Some(industry) = data.industry {
            q = q.bind(industry);
        }
        if let Some(status) = data.status {
            q = q.bind(status);
        }

        q.fetch_optional(pool).await
    }

    /// Deletes the business and, by cascade, everything it owns
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM businesses WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Businesses the user belongs to, with their role in each
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<BusinessSummary>, sqlx::Error> {
        sqlx::query_as::<_, BusinessSummary>(
            r#"
            SELECT b.id, b.name, b.slug, b.plan, b.status, bm.role
            FROM business_members bm
            JOIN businesses b ON b.id = bm.business_id
            WHERE bm.user_id = $1
            ORDER BY bm.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Acme Studio"), "acme-studio");
        assert_eq!(slugify("Acme & Sons, Ltd."), "acme-sons-ltd");
        assert_eq!(slugify("  Leading and trailing  "), "leading-and-trailing");
        assert_eq!(slugify("ALL CAPS 2024"), "all-caps-2024");
    }

    #[test]
    fn test_slugify_drops_non_ascii() {
        assert_eq!(slugify("Café Müller"), "caf-m-ller");
        assert_eq!(slugify("日本"), "business");
        assert_eq!(slugify(""), "business");
    }

    #[test]
    fn test_slugify_caps_length() {
        let slug = slugify(&"word ".repeat(40));
        assert!(slug.len() <= SLUG_MAX_LENGTH);
        assert!(!slug.ends_with('-'));
        assert!(slug.starts_with("word-word"));
    }

    #[test]
    fn test_update_business_industry_clear() {
        let update: UpdateBusiness = serde_json::from_str(r#"{"industry": null}"#).unwrap();
        assert_eq!(update.industry, Some(None));

        let update: UpdateBusiness = serde_json::from_str(r#"{"name": "New"}"#).unwrap();
        assert!(update.industry.is_none());
        assert_eq!(update.name.as_deref(), Some("New"));
    }

    #[test]
    fn test_plan_as_str() {
        assert_eq!(BusinessPlan::default().as_str(), "free");
        assert_eq!(BusinessPlan::Enterprise.as_str(), "enterprise");
    }
}

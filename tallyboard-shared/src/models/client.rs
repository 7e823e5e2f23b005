/// Clients a business bills
///
/// Projects may reference a client; deleting the client leaves the projects
/// in place with `client_id` cleared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

const CLIENT_COLUMNS: &str =
    "id, business_id, name, email, company, phone, notes, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Client {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateClient {
    pub name: String,
    pub email: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

/// `Some(None)` clears an optional field
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateClient {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "crate::serde_util::double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::serde_util::double_option")]
    pub company: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::serde_util::double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::serde_util::double_option")]
    pub notes: Option<Option<String>>,
}

impl Client {
    pub async fn create(
        pool: &PgPool,
        business_id: Uuid,
        data: CreateClient,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO clients (business_id, name, email, company, phone, notes)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            CLIENT_COLUMNS
        );

        sqlx::query_as::<_, Client>(&sql)
            .bind(business_id)
            .bind(data.name.trim())
            .bind(data.email.map(|e| e.trim().to_lowercase()))
            .bind(data.company)
            .bind(data.phone)
            .bind(data.notes)
            .fetch_one(pool)
            .await
    }

    /// `None` when the client does not exist in this business
    pub async fn find_by_id<'e, E>(
        executor: E,
        id: Uuid,
        business_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {} FROM clients WHERE id = $1 AND business_id = $2",
            CLIENT_COLUMNS
        );

        sqlx::query_as::<_, Client>(&sql)
            .bind(id)
            .bind(business_id)
            .fetch_optional(executor)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        business_id: Uuid,
        data: UpdateClient,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE clients SET updated_at = NOW()");
        let mut bind_count = 2;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.email.is_some() {
            bind_count += 1;
            query.push_str(&format!(", email = ${}", bind_count));
        }
        if data.company.is_some() {
            bind_count += 1;
            query.push_str(&format!(", company = ${}", bind_count));
        }
        if data.phone.is_some() {
            bind_count += 1;
            query.push_str(&format!(", phone = ${}", bind_count));
        }
        if data.notes.is_some() {
            bind_count += 1;
            query.push_str(&format!(", notes = ${}", bind_count));
        }

        query.push_str(&format!(
            " WHERE id = $1 AND business_id = $2 RETURNING {}",
            CLIENT_COLUMNS
        ));

        let mut q = sqlx::query_as::<_, Client>(&query).bind(id).bind(business_id);

        if let Some(name) = data.name {
            q = q.bind(name.trim().to_string());
        }
        if let Some(email) = data.email {
            q = q.bind(email.map(|e| e.trim().to_lowercase()));
        }
        if let Some(company) = data.company {
            q = q.bind(company);
        }
        if let Some(phone) = data.phone {
            q = q.bind(phone);
        }
        if let Some(notes) = data.notes {
            q = q.bind(notes);
        }

        q.fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, id: Uuid, business_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1 AND business_id = $2")
            .bind(id)
            .bind(business_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Alphabetical by name
    pub async fn list_by_business(
        pool: &PgPool,
        business_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM clients
             WHERE business_id = $1
             ORDER BY LOWER(name) ASC, created_at ASC
             LIMIT $2 OFFSET $3",
            CLIENT_COLUMNS
        );

        sqlx::query_as::<_, Client>(&sql)
            .bind(business_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}

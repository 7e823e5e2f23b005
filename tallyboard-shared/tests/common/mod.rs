//! Shared fixtures for database integration tests
//!
//! Tests connect to `DATABASE_URL` and skip themselves when it is unset.
//! Every fixture uses fresh random names, so tests can share one database
//! and run in parallel.

#![allow(dead_code)]

use sqlx::PgPool;
use tallyboard_shared::db::migrations::{ensure_database_exists, run_migrations};
use tallyboard_shared::db::pool::{create_pool, DatabaseConfig};
use tallyboard_shared::models::business::{Business, BusinessPlan, CreateBusiness};
use tallyboard_shared::models::project::{CreateProject, Project, ProjectStatus};
use tallyboard_shared::models::user::{CreateUser, User};
use uuid::Uuid;

/// Migrated pool, or `None` when no database is configured
pub async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;

    ensure_database_exists(&url).await.expect("Failed to create database");
    let pool = create_pool(DatabaseConfig::from_url(url))
        .await
        .expect("Failed to create pool");
    run_migrations(&pool).await.expect("Failed to run migrations");

    Some(pool)
}

/// Evaluates to a pool, or returns from the test when there is no database
#[macro_export]
macro_rules! require_db {
    () => {
        match common::test_pool().await {
            Some(pool) => pool,
            None => {
                eprintln!("DATABASE_URL not set, skipping");
                return;
            }
        }
    };
}

pub async fn create_user(pool: &PgPool, name: &str) -> User {
    User::create(
        pool,
        CreateUser {
            name: name.to_string(),
            email: format!("{}-{}@example.com", name.to_lowercase(), Uuid::new_v4().simple()),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$fixture$fixture".to_string(),
        },
    )
    .await
    .expect("Failed to create user")
}

pub async fn create_business(pool: &PgPool, owner: &User, name: &str) -> Business {
    Business::create_with_owner(
        pool,
        CreateBusiness {
            name: name.to_string(),
            owner_id: owner.id,
            plan: BusinessPlan::Free,
            industry: None,
        },
    )
    .await
    .expect("Failed to create business")
}

pub async fn create_project(pool: &PgPool, business: &Business, name: &str) -> Project {
    Project::create_with_owner(
        pool,
        business.id,
        business.owner_id,
        CreateProject {
            name: name.to_string(),
            status: Some(ProjectStatus::Active),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to create project")
}

/// Owner, business, and one active project
pub async fn workspace(pool: &PgPool, label: &str) -> (User, Business, Project) {
    let owner = create_user(pool, label).await;
    let business = create_business(pool, &owner, &format!("{} Studio", label)).await;
    let project = create_project(pool, &business, &format!("{} Website", label)).await;
    (owner, business, project)
}

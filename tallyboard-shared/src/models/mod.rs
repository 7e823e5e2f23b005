/// Database models for Tallyboard
///
/// Each model wraps parameterized SQL for one table. Operations on
/// tenant-owned rows take the caller's `business_id` and filter on it, either
/// directly or through the owning project, so rows of another business read
/// as missing.
///
/// # Models
///
/// - `user`: Accounts, invitations and two-factor state
/// - `business`: Tenants
/// - `business_member`: User-business membership with roles
/// - `client`: Clients a business bills
/// - `project`: Projects and their task progress
/// - `project_member`: Users assigned to a project
/// - `task`: Tasks on the project board
/// - `time_entry`: Logged time and the running timer
/// - `invoice`: Invoices and their lifecycle
///
/// # Example
///
/// ```no_run
/// use tallyboard_shared::models::user::{User, CreateUser};
/// use tallyboard_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::from_url(std::env::var("DATABASE_URL")?)).await?;
///
/// let user = User::create(&pool, CreateUser {
///     name: "Ada Lovelace".to_string(),
///     email: "ada@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
/// }).await?;
/// # Ok(())
/// # }
/// ```

pub mod business;
pub mod business_member;
pub mod client;
pub mod invoice;
pub mod project;
pub mod project_member;
pub mod task;
pub mod time_entry;
pub mod user;

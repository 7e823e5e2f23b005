/// Authentication and authorization primitives
///
/// # Modules
///
/// - [`password`]: Argon2id hashing and strength rules
/// - [`jwt`]: access/refresh tokens scoped to a business
/// - [`middleware`]: bearer-token extraction and the [`middleware::AuthContext`] extractor
/// - [`authorization`]: role checks against business membership
/// - [`totp`]: two-factor enrollment and code verification
/// - [`invitation`]: one-time invitation tokens
///
/// # Example
///
/// ```no_run
/// use tallyboard_shared::auth::password::{hash_password, verify_password};
/// use tallyboard_shared::auth::jwt::issue_token_pair;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("ledger-2024")?;
/// assert!(verify_password("ledger-2024", &hash)?);
///
/// let tokens = issue_token_pair(Uuid::new_v4(), Uuid::new_v4(), "a-development-secret-of-32-bytes!!")?;
/// println!("{}", tokens.access_token);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod invitation;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod totp;

/// Invitation token generation and hashing
///
/// An invitation token is emailed to the invitee exactly once; only its
/// SHA-256 hex digest is stored in `users.invitation_token_hash`. Accepting
/// an invitation hashes the presented token and looks the user up by digest.
///
/// # Format
///
/// `inv_` followed by 40 base62 characters (44 characters total).
///
/// # Example
///
/// ```
/// use tallyboard_shared::auth::invitation::{generate_invitation_token, hash_invitation_token};
///
/// let (token, hash) = generate_invitation_token();
/// assert!(token.starts_with("inv_"));
/// assert_eq!(hash, hash_invitation_token(&token));
/// assert_eq!(hash.len(), 64);
/// ```

use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

const TOKEN_PREFIX: &str = "inv_";
const TOKEN_RANDOM_LENGTH: usize = 40;

/// Total length of a well-formed token
pub const INVITATION_TOKEN_LENGTH: usize = TOKEN_PREFIX.len() + TOKEN_RANDOM_LENGTH;

/// Returns `(plaintext_token, sha256_hex)`
pub fn generate_invitation_token() -> (String, String) {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_RANDOM_LENGTH)
        .map(char::from)
        .collect();

    let token = format!("{}{}", TOKEN_PREFIX, random);
    let hash = hash_invitation_token(&token);
    (token, hash)
}

pub fn hash_invitation_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Cheap shape check before hitting the database
pub fn is_well_formed(token: &str) -> bool {
    token.len() == INVITATION_TOKEN_LENGTH
        && token.starts_with(TOKEN_PREFIX)
        && token[TOKEN_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric())
}

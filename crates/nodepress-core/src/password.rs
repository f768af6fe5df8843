//! Password hashing for stored user accounts.
//!
//! Hashes are bcrypt strings (`$2b$<cost>$<salt+hash>`), which carry their
//! own cost, so the cost can be raised without invalidating existing
//! accounts. Hashing is CPU-bound: async callers run it on a blocking
//! thread.

use crate::error::UserError;

/// Default bcrypt cost for new hashes.
pub const DEFAULT_COST: u32 = 10;

const MIN_COST: u32 = 4;
const MAX_COST: u32 = 31;

/// Turns plaintext passwords into stored hashes and checks them.
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password with a fresh salt.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Password`] if the hash could not be produced.
    fn hash(&self, plaintext: &str) -> Result<String, UserError>;

    /// Check a plaintext password against a stored hash. Malformed hashes
    /// never verify.
    fn verify(&self, plaintext: &str, encoded: &str) -> bool;
}

/// bcrypt with a configurable cost.
#[derive(Debug, Clone, Copy)]
pub struct BcryptPasswordHasher {
    cost: u32,
}

impl Default for BcryptPasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_COST)
    }
}

impl BcryptPasswordHasher {
    /// A hasher producing hashes at `cost`, clamped to bcrypt's 4..=31.
    #[must_use]
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(MIN_COST, MAX_COST),
        }
    }

    #[must_use]
    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl PasswordHasher for BcryptPasswordHasher {
    fn hash(&self, plaintext: &str) -> Result<String, UserError> {
        bcrypt::hash(plaintext, self.cost).map_err(|e| UserError::Password {
            reason: e.to_string(),
        })
    }

    fn verify(&self, plaintext: &str, encoded: &str) -> bool {
        bcrypt::verify(plaintext, encoded).unwrap_or(false)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fast() -> BcryptPasswordHasher {
        BcryptPasswordHasher::new(MIN_COST)
    }

    #[test]
    fn hash_verifies_original_only() {
        let hasher = fast();
        let stored = hasher.hash("correct horse").unwrap();
        assert!(hasher.verify("correct horse", &stored));
        assert!(!hasher.verify("correct horse ", &stored));
    }

    #[test]
    fn hashes_are_salted() {
        let hasher = fast();
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn encoding_carries_cost() {
        let stored = fast().hash("pw").unwrap();
        assert!(stored.starts_with("$2b$04$"));
        assert_eq!(stored.len(), 60);
    }

    #[test]
    fn cost_is_clamped() {
        assert_eq!(BcryptPasswordHasher::new(0).cost(), 4);
        assert_eq!(BcryptPasswordHasher::new(99).cost(), 31);
        assert_eq!(BcryptPasswordHasher::default().cost(), DEFAULT_COST);
    }

    #[test]
    fn verify_uses_stored_cost() {
        let stored = BcryptPasswordHasher::new(5).hash("pw").unwrap();
        assert!(fast().verify("pw", &stored));
    }

    #[test]
    fn malformed_hashes_never_verify() {
        let hasher = fast();
        for bad in ["", "plain", "$2b$04$short", "sha256$1$00$00"] {
            assert!(!hasher.verify("pw", bad), "{bad} verified");
        }
    }
}

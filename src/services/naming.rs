//! Storage key derivation.
//!
//! Two mutually exclusive naming policies exist; one is chosen at startup:
//!
//! - `CollisionAvoiding`: the key is the original filename. If that key is
//!   already taken, a 4-character token is spliced in before the extension
//!   (`report.pdf` -> `report-Xk3_.pdf`).
//! - `OwnerScoped`: the key is `filename-ownerId-timestampMillis` and uploads
//!   require a caller identity.

use crate::models::file::CallerIdentity;
use rand::Rng;
use std::{fmt, str::FromStr};

/// Length of a disambiguation token.
pub const TOKEN_LEN: usize = 4;

/// URL-safe token alphabet (`A-Za-z0-9_-`).
pub const TOKEN_ALPHABET: &[u8; 64] =
    b"useandom-26T198340PX75pxJACKVERYMINDBUSHWOLF_GQZbfghjklqvwyzrict";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NamingStrategy {
    #[default]
    CollisionAvoiding,
    OwnerScoped,
}

impl NamingStrategy {
    pub fn requires_owner(self) -> bool {
        matches!(self, NamingStrategy::OwnerScoped)
    }

    /// Base key before any collision handling.
    ///
    /// `owner` is only consulted by `OwnerScoped`; callers enforce its
    /// presence beforehand.
    pub fn base_key(
        self,
        original_name: &str,
        owner: Option<&CallerIdentity>,
        timestamp_millis: i64,
    ) -> String {
        match (self, owner) {
            (NamingStrategy::OwnerScoped, Some(owner)) => {
                owner_scoped_key(original_name, &owner.owner_id, timestamp_millis)
            }
            _ => original_name.to_string(),
        }
    }

    /// Key used when the base key is already taken.
    ///
    /// The token goes into the original name, so the extension survives, and
    /// the strategy's scoping is applied on top.
    pub fn collision_key(
        self,
        original_name: &str,
        owner: Option<&CallerIdentity>,
        timestamp_millis: i64,
        token: &str,
    ) -> String {
        self.base_key(
            &disambiguated_key(original_name, token),
            owner,
            timestamp_millis,
        )
    }
}

impl fmt::Display for NamingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamingStrategy::CollisionAvoiding => f.write_str("collision-avoiding"),
            NamingStrategy::OwnerScoped => f.write_str("owner-scoped"),
        }
    }
}

impl FromStr for NamingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "collision-avoiding" | "collision" => Ok(NamingStrategy::CollisionAvoiding),
            "owner-scoped" | "owner" => Ok(NamingStrategy::OwnerScoped),
            other => Err(format!(
                "unknown naming strategy `{}` (expected `collision-avoiding` or `owner-scoped`)",
                other
            )),
        }
    }
}

/// `filename-ownerId-timestamp`.
pub fn owner_scoped_key(original_name: &str, owner_id: &str, timestamp_millis: i64) -> String {
    format!("{}-{}-{}", original_name, owner_id, timestamp_millis)
}

/// Splice `token` in front of the extension of `name`.
///
/// The split happens at the last `.`; the extension keeps its leading period.
/// Names without a period get the token appended.
pub fn disambiguated_key(name: &str, token: &str) -> String {
    match name.rfind('.') {
        Some(idx) => {
            let (stem, extension) = name.split_at(idx);
            format!("{}-{}{}", stem, token, extension)
        }
        None => format!("{}-{}", name, token),
    }
}

/// Supplies disambiguation tokens.
///
/// Tokens are short and may repeat; uniqueness comes from the existence
/// check in the file service, not from the generator.
pub trait TokenGenerator: Send + Sync {
    fn token(&self) -> String;
}

/// Random [`TOKEN_LEN`]-character tokens from [`TOKEN_ALPHABET`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomToken;

impl TokenGenerator for RandomToken {
    fn token(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..TOKEN_LEN)
            .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
            .collect()
    }
}

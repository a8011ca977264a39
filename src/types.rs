//! Shared types used by the collaborators around the engine.
//!
//! The access list, token registry and staging store all key their state by
//! the same chat user identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Chat user identity. Chat platforms hand these out as signed 64-bit ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserKey(pub i64);

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserKey {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(UserKey)
    }
}

/// Who may talk to the bot.
///
/// Only listed users are admitted. An empty list admits nobody.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessList {
    allowed: Vec<UserKey>,
}

impl AccessList {
    pub fn new(allowed: impl IntoIterator<Item = UserKey>) -> Self {
        let mut allowed: Vec<UserKey> = allowed.into_iter().collect();
        allowed.sort_unstable();
        allowed.dedup();
        Self { allowed }
    }

    pub fn from_config(config: &crate::config::AccessConfig) -> Self {
        Self::new(config.allowed_users.iter().copied().map(UserKey))
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn is_allowed(&self, user: UserKey) -> bool {
        self.allowed.binary_search(&user).is_ok()
    }
}

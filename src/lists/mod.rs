//! Remote list service abstraction.
//!
//! Lists are named remote collections of user ids owned by the configured
//! account. The reconciliation engine only ever checks membership, adds a
//! member, or creates a list; it never enumerates a list's full membership.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ListError;

pub mod admin;
pub mod http;

pub use admin::create_list;
pub use http::HttpListService;

/// Result of a membership lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Member,
    NotMember,
}

/// Visibility of a newly created list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListMode {
    #[default]
    Public,
    Private,
}

impl ListMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListMode::Public => "public",
            ListMode::Private => "private",
        }
    }
}

impl fmt::Display for ListMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListMode {
    type Err = ListError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "public" => Ok(ListMode::Public),
            "private" => Ok(ListMode::Private),
            _ => Err(ListError::InvalidMode {
                mode: s.to_string(),
            }),
        }
    }
}

/// Operations the engine needs from the remote list service.
///
/// Implementations enforce their own request timeouts; callers never wrap
/// these futures in a deadline.
#[async_trait]
pub trait ListService: Send + Sync {
    /// Check whether `user_id` is a member of `list_id`.
    ///
    /// A remote not-found answer is reported as `Ok(Membership::NotMember)`.
    async fn membership(&self, list_id: &str, user_id: i64) -> Result<Membership, ListError>;

    /// Add `user_id` to `list_id`.
    async fn add_member(&self, list_id: &str, user_id: i64) -> Result<(), ListError>;

    /// Create a new list owned by the configured account.
    async fn create_list(&self, name: &str, mode: ListMode) -> Result<(), ListError>;
}

/// Type alias for a shared list service
pub type SharedListService = Arc<dyn ListService>;

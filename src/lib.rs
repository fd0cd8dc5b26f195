//! # autolists
//!
//! autolists watches a timeline of status posts, matches each post against
//! operator-defined rules, and keeps remote list membership in line with the
//! matches: every author whose post matches a rule is added to the rule's
//! list, once.
//!
//! ## Architecture Overview
//!
//! ### Rules
//! - A **rule** is an `(enabled, list, pattern)` triple; patterns are regular
//!   expressions searched anywhere in the post text
//! - The rule store publishes immutable, versioned snapshots over a `watch`
//!   channel and can reload them from a JSON file
//!
//! ### Event Processing
//! - The first batch fetched after startup is the backlog: its ids are recorded
//!   and never trigger reconciliation
//! - Every later status is matched against the latest rule snapshot; each
//!   `(list, author)` pair is claimed at most once per process lifetime
//!
//! ### Reconciliation
//! - Claimed pairs are dispatched as independent tasks that check membership,
//!   add the author if needed, and retry the whole sequence with a fixed backoff
//! - Outcomes are reported through the notification sink and metrics
//!
//! ## Configuration
//!
//! The service is configured via environment variables. Key variables include:
//! - `LIST_API_BASE`: Base URL of the remote list API
//! - `LIST_OWNER`: Account owning the managed lists
//! - `RULES_PATH`: JSON rule file
//!
//! ## Error Handling
//!
//! All error strings use the format: `error-autolists-<domain>-<number> <message>: <details>`

/// Configuration management for the autolists service.
///
/// Configuration is loaded from environment variables and validated through
/// newtype wrappers.
pub mod config;

pub(crate) mod constants;

pub mod errors;

/// Feed events and the timeline poller that produces them.
pub mod feed;

/// Remote list service abstraction and its HTTP implementation.
pub mod lists;

/// Metrics collection and monitoring for service observability.
pub mod metrics;

/// Operator notifications.
pub mod notify;

/// Backlog suppression, rule evaluation and dedup claims.
pub mod processor;

/// Match rules, compiled rule snapshots and the rule store.
pub mod rules;

/// Reconciliation workers and their dispatch.
pub mod tasks;

#[cfg(test)]
pub mod test_helpers;

//! Core business logic - the account aggregate and everything it owns.
//!
//! Every public operation takes the store handle and the caller's
//! [`guard::RequestContext`] explicitly. Operations that write more than one
//! record run inside a single store transaction; single-record edits rely on
//! the `version` column to detect lost updates.

/// Account workflows: create with nested children, edit, cascading delete
pub mod account;
/// Bill repository and batch operations
pub mod bill;
/// Request context and ownership checks
pub mod guard;
/// Registration, login and session tokens
pub mod identity;
pub(crate) mod links;
/// Note repository
pub mod note;
/// One-off payment repository and batch operations
pub mod payment;
/// Payday schedule repository
pub mod payday;
/// User reads, edits and the cascading user delete
pub mod user;
pub(crate) mod validation;

use crate::errors::{EntityKind, Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Result of a batch update.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdated<M> {
    /// The updated records after the write
    pub records: Vec<M>,
    /// Number of rows the update touched
    pub updated_count: u64,
}

/// Removes repeated ids, keeping first-seen order.
pub(crate) fn unique_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Fails with one `NotFound` naming every requested id that was not found.
pub(crate) fn ensure_all_found(
    entity: EntityKind,
    requested: &[Uuid],
    found: impl IntoIterator<Item = Uuid>,
) -> Result<()> {
    let found: HashSet<Uuid> = found.into_iter().collect();
    let missing: Vec<String> = requested
        .iter()
        .filter(|id| !found.contains(id))
        .map(ToString::to_string)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::NotFound {
            entity,
            id: missing.join(", "),
        })
    }
}

/// Deserializes a field so that "absent" (`None`) and "explicitly null"
/// (`Some(None)`) stay distinguishable. Use with `#[serde(default)]`.
pub(crate) fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

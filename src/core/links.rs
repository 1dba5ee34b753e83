//! Maintenance of an account's child reference lists.
//!
//! Every bill, one-off payment and note has exactly one row in
//! `account_children` while it exists. Callers run these helpers inside the
//! same transaction as the child insert or delete.

use crate::{
    entities::{AccountChild, ChildKind, account_child},
    errors::Result,
};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Appends `child_id` to the end of the account's `kind` list.
pub(crate) async fn append_child<C>(
    conn: &C,
    account_id: Uuid,
    kind: ChildKind,
    child_id: Uuid,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let entry = account_child::ActiveModel {
        account_id: Set(account_id),
        kind: Set(kind),
        child_id: Set(child_id),
        ..Default::default()
    };
    AccountChild::insert(entry).exec(conn).await?;
    Ok(())
}

/// Removes the given children from whichever list holds them.
///
/// Ids that are not listed are ignored.
pub(crate) async fn remove_children<C>(conn: &C, child_ids: &[Uuid]) -> Result<u64>
where
    C: ConnectionTrait,
{
    if child_ids.is_empty() {
        return Ok(0);
    }
    let result = AccountChild::delete_many()
        .filter(account_child::Column::ChildId.is_in(child_ids.iter().copied()))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Removes every list entry of an account.
pub(crate) async fn clear_account<C>(conn: &C, account_id: Uuid) -> Result<u64>
where
    C: ConnectionTrait,
{
    let result = AccountChild::delete_many()
        .filter(account_child::Column::AccountId.eq(account_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Ids in the account's `kind` list, in list order.
pub(crate) async fn child_ids<C>(conn: &C, account_id: Uuid, kind: ChildKind) -> Result<Vec<Uuid>>
where
    C: ConnectionTrait,
{
    let entries = AccountChild::find()
        .filter(account_child::Column::AccountId.eq(account_id))
        .filter(account_child::Column::Kind.eq(kind))
        .order_by_asc(account_child::Column::Id)
        .all(conn)
        .await?;
    Ok(entries.into_iter().map(|entry| entry.child_id).collect())
}

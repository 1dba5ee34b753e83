//! Bill business logic - Recurring outgoings owned by an account.
//!
//! Bills share their name namespace with one-off payments in the same account.
//! Single edits are guarded by the bill's `version`. A batch resolves and
//! access-checks every id and writes them all inside one transaction, so it
//! either touches every requested bill or none.

use crate::{
    core::{
        BatchUpdated, account::load_account, ensure_all_found, guard::RequestContext, links,
        unique_ids,
        validation::{ensure_unique_name, validate_amount, validate_text},
    },
    entities::{Bill, ChildKind, bill},
    errors::{EntityKind, Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Deserialize;
use tracing::{debug, info, instrument};

/// Input for a new bill.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBill {
    /// Display name, unique among the account's bills and one-off payments
    pub name: String,
    /// Amount due
    pub amount: f64,
    /// Whether it is already paid; defaults to `false`
    #[serde(default)]
    pub paid: bool,
}

/// Fields that may be changed on a single bill.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillChanges {
    /// New name
    pub name: Option<String>,
    /// New amount
    pub amount: Option<f64>,
    /// New paid flag
    pub paid: Option<bool>,
}

impl BillChanges {
    /// True when no field was supplied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.amount.is_none() && self.paid.is_none()
    }
}

/// Fields applied to every bill of a batch. Names are not batch-editable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillBatchChanges {
    /// New amount for every bill
    pub amount: Option<f64>,
    /// New paid flag for every bill
    pub paid: Option<bool>,
}

impl BillBatchChanges {
    /// True when no field was supplied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.amount.is_none() && self.paid.is_none()
    }
}

/// Validates and stores a bill, then appends it to the account's bill list.
pub(crate) async fn insert_bill<C>(conn: &C, account_id: Uuid, new_bill: NewBill) -> Result<bill::Model>
where
    C: ConnectionTrait,
{
    validate_text("name", &new_bill.name)?;
    validate_amount("amount", new_bill.amount)?;
    ensure_unique_name(conn, account_id, &new_bill.name, None).await?;

    let name = new_bill.name.clone();
    let created = bill::ActiveModel {
        id: Set(Uuid::new_v4()),
        account_id: Set(account_id),
        name: Set(new_bill.name),
        amount: Set(new_bill.amount),
        paid: Set(new_bill.paid),
        version: Set(0),
    }
    .insert(conn)
    .await
    .map_err(|e| Error::from_write(EntityKind::Bill, &name, e))?;

    links::append_child(conn, account_id, ChildKind::Bill, created.id).await?;
    Ok(created)
}

async fn load_bill<C>(conn: &C, bill_id: Uuid) -> Result<bill::Model>
where
    C: ConnectionTrait,
{
    Bill::find_by_id(bill_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found(EntityKind::Bill, bill_id))
}

/// Creates a bill in the caller's account.
#[instrument(skip(db, ctx, new_bill), fields(name = %new_bill.name))]
pub async fn create_bill(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    account_id: Uuid,
    new_bill: NewBill,
) -> Result<bill::Model> {
    ctx.require_account_access(account_id)?;

    let txn = db.begin().await?;
    load_account(&txn, account_id).await?;
    let created = insert_bill(&txn, account_id, new_bill).await?;
    txn.commit().await?;

    info!(bill_id = %created.id, %account_id, "Created bill");
    Ok(created)
}

/// Loads a bill from the caller's account.
pub async fn find_bill(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    bill_id: Uuid,
) -> Result<bill::Model> {
    ctx.require_authenticated()?;
    let found = load_bill(db, bill_id).await?;
    ctx.require_account_access(found.account_id)?;
    Ok(found)
}

/// Lists the bills of the caller's account, cheapest first.
pub async fn list_bills(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    account_id: Uuid,
) -> Result<Vec<bill::Model>> {
    ctx.require_account_access(account_id)?;
    let bills = Bill::find()
        .filter(bill::Column::AccountId.eq(account_id))
        .order_by_asc(bill::Column::Amount)
        .all(db)
        .await?;
    if bills.is_empty() {
        return Err(Error::CollectionEmpty {
            entity: EntityKind::Bill,
            scope: Some(account_id),
        });
    }
    Ok(bills)
}

/// Applies the supplied fields to one bill.
#[instrument(skip(db, ctx, changes))]
pub async fn edit_bill(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    bill_id: Uuid,
    changes: BillChanges,
) -> Result<bill::Model> {
    ctx.require_authenticated()?;
    if changes.is_empty() {
        return Err(Error::NoFieldsProvided {
            entity: EntityKind::Bill,
        });
    }

    let current = load_bill(db, bill_id).await?;
    ctx.require_account_access(current.account_id)?;
    apply_bill_changes(db, &current, changes).await
}

/// Writes `changes` over the `current` snapshot. Fails with `UpdateFailed` if
/// the stored bill has moved past the snapshot's version.
pub(crate) async fn apply_bill_changes<C>(
    conn: &C,
    current: &bill::Model,
    changes: BillChanges,
) -> Result<bill::Model>
where
    C: ConnectionTrait,
{
    let mut update = bill::ActiveModel {
        version: Set(current.version + 1),
        ..Default::default()
    };
    let mut key = current.name.clone();
    if let Some(name) = changes.name {
        validate_text("name", &name)?;
        if name != current.name {
            ensure_unique_name(conn, current.account_id, &name, Some(current.id)).await?;
        }
        key.clone_from(&name);
        update.name = Set(name);
    }
    if let Some(amount) = changes.amount {
        validate_amount("amount", amount)?;
        update.amount = Set(amount);
    }
    if let Some(paid) = changes.paid {
        update.paid = Set(paid);
    }

    let result = Bill::update_many()
        .set(update)
        .filter(bill::Column::Id.eq(current.id))
        .filter(bill::Column::Version.eq(current.version))
        .exec(conn)
        .await
        .map_err(|e| Error::from_write(EntityKind::Bill, &key, e))?;
    if result.rows_affected == 0 {
        return Err(Error::UpdateFailed {
            entity: EntityKind::Bill,
        });
    }

    debug!(bill_id = %current.id, version = current.version + 1, "Updated bill");
    load_bill(conn, current.id).await
}

/// Deletes a bill and drops it from the account's list.
#[instrument(skip(db, ctx))]
pub async fn delete_bill(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    bill_id: Uuid,
) -> Result<bill::Model> {
    ctx.require_authenticated()?;
    let current = load_bill(db, bill_id).await?;
    ctx.require_account_access(current.account_id)?;

    let txn = db.begin().await?;
    remove_bill(&txn, &current).await?;
    txn.commit().await?;

    info!(%bill_id, "Deleted bill");
    Ok(current)
}

pub(crate) async fn remove_bill<C>(conn: &C, current: &bill::Model) -> Result<()>
where
    C: ConnectionTrait,
{
    links::remove_children(conn, &[current.id]).await?;
    let result = Bill::delete_many()
        .filter(bill::Column::Id.eq(current.id))
        .filter(bill::Column::Version.eq(current.version))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::DeleteFailed {
            entity: EntityKind::Bill,
        });
    }
    Ok(())
}

/// Fails with one `NotFound` for all missing ids, then checks the caller owns
/// each bill's account. Runs on the batch transaction.
async fn resolve_batch<C>(conn: &C, ctx: &RequestContext, ids: &[Uuid]) -> Result<()>
where
    C: ConnectionTrait,
{
    let found = Bill::find()
        .filter(bill::Column::Id.is_in(ids.iter().copied()))
        .all(conn)
        .await?;
    ensure_all_found(EntityKind::Bill, ids, found.iter().map(|b| b.id))?;
    for owned in &found {
        ctx.require_account_access(owned.account_id)?;
    }
    Ok(())
}

/// Applies `update` to every resolved bill, failing unless each one was hit.
pub(crate) async fn update_resolved<C>(
    conn: &C,
    ids: &[Uuid],
    update: bill::ActiveModel,
) -> Result<u64>
where
    C: ConnectionTrait,
{
    let result = Bill::update_many()
        .set(update)
        .col_expr(bill::Column::Version, Expr::col(bill::Column::Version).add(1))
        .filter(bill::Column::Id.is_in(ids.iter().copied()))
        .exec(conn)
        .await?;
    if result.rows_affected != ids.len() as u64 {
        return Err(Error::UpdateFailed {
            entity: EntityKind::Bill,
        });
    }
    Ok(result.rows_affected)
}

/// Deletes every resolved bill and its list entry, failing unless each one
/// was removed.
pub(crate) async fn delete_resolved<C>(conn: &C, ids: &[Uuid]) -> Result<u64>
where
    C: ConnectionTrait,
{
    links::remove_children(conn, ids).await?;
    let result = Bill::delete_many()
        .filter(bill::Column::Id.is_in(ids.iter().copied()))
        .exec(conn)
        .await?;
    if result.rows_affected != ids.len() as u64 {
        return Err(Error::DeleteFailed {
            entity: EntityKind::Bill,
        });
    }
    Ok(result.rows_affected)
}

/// Applies the same amount and/or paid flag to several bills at once.
///
/// Any missing id fails the whole batch with one `NotFound` listing them all.
#[instrument(skip(db, ctx, bill_ids, changes), fields(count = bill_ids.len()))]
pub async fn batch_update_bills(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    bill_ids: &[Uuid],
    changes: BillBatchChanges,
) -> Result<BatchUpdated<bill::Model>> {
    ctx.require_authenticated()?;
    if changes.is_empty() {
        return Err(Error::NoFieldsProvided {
            entity: EntityKind::Bill,
        });
    }

    let mut update = bill::ActiveModel {
        ..Default::default()
    };
    if let Some(amount) = changes.amount {
        validate_amount("amount", amount)?;
        update.amount = Set(amount);
    }
    if let Some(paid) = changes.paid {
        update.paid = Set(paid);
    }

    let ids = unique_ids(bill_ids);
    if ids.is_empty() {
        return Ok(BatchUpdated {
            records: Vec::new(),
            updated_count: 0,
        });
    }

    let txn = db.begin().await?;
    resolve_batch(&txn, ctx, &ids).await?;
    let updated_count = update_resolved(&txn, &ids, update).await?;
    let records = Bill::find()
        .filter(bill::Column::Id.is_in(ids))
        .order_by_asc(bill::Column::Amount)
        .all(&txn)
        .await?;
    txn.commit().await?;

    info!(updated = updated_count, "Batch updated bills");
    Ok(BatchUpdated {
        records,
        updated_count,
    })
}

/// Deletes several bills at once, returning how many were removed.
#[instrument(skip(db, ctx, bill_ids), fields(count = bill_ids.len()))]
pub async fn batch_delete_bills(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    bill_ids: &[Uuid],
) -> Result<u64> {
    ctx.require_authenticated()?;
    let ids = unique_ids(bill_ids);
    if ids.is_empty() {
        return Ok(0);
    }

    let txn = db.begin().await?;
    resolve_batch(&txn, ctx, &ids).await?;
    let deleted = delete_resolved(&txn, &ids).await?;
    txn.commit().await?;

    info!(deleted, "Batch deleted bills");
    Ok(deleted)
}

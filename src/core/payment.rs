//! One-off payment business logic.
//!
//! Payments follow the same rules as bills: a name unique across the account's
//! bills and payments, version-guarded edits and all-or-nothing batches.

use crate::{
    core::{
        BatchUpdated, account::load_account, ensure_all_found, guard::RequestContext, links,
        unique_ids,
        validation::{ensure_unique_name, validate_amount, validate_text},
    },
    entities::{ChildKind, OneOffPayment, one_off_payment},
    errors::{EntityKind, Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Deserialize;
use tracing::{debug, info, instrument};

/// Input for a new one-off payment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOneOffPayment {
    /// Display name, unique among the account's bills and one-off payments
    pub name: String,
    /// Amount due
    pub amount: f64,
}

/// Fields that may be changed on a single payment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneOffPaymentChanges {
    /// New name
    pub name: Option<String>,
    /// New amount
    pub amount: Option<f64>,
}

/// Fields applied to every payment of a batch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentBatchChanges {
    /// Amount set on every payment; required
    pub amount: Option<f64>,
}

pub(crate) async fn insert_payment<C>(
    conn: &C,
    account_id: Uuid,
    new_payment: NewOneOffPayment,
) -> Result<one_off_payment::Model>
where
    C: ConnectionTrait,
{
    validate_text("name", &new_payment.name)?;
    validate_amount("amount", new_payment.amount)?;
    ensure_unique_name(conn, account_id, &new_payment.name, None).await?;

    let name = new_payment.name.clone();
    let created = one_off_payment::ActiveModel {
        id: Set(Uuid::new_v4()),
        account_id: Set(account_id),
        name: Set(new_payment.name),
        amount: Set(new_payment.amount),
        version: Set(0),
    }
    .insert(conn)
    .await
    .map_err(|e| Error::from_write(EntityKind::OneOffPayment, &name, e))?;

    links::append_child(conn, account_id, ChildKind::OneOffPayment, created.id).await?;
    Ok(created)
}

async fn load_payment<C>(conn: &C, payment_id: Uuid) -> Result<one_off_payment::Model>
where
    C: ConnectionTrait,
{
    OneOffPayment::find_by_id(payment_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found(EntityKind::OneOffPayment, payment_id))
}

/// Adds a payment to an account and appends it to the account's list.
#[instrument(skip(db, ctx, new_payment), fields(name = %new_payment.name))]
pub async fn create_payment(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    account_id: Uuid,
    new_payment: NewOneOffPayment,
) -> Result<one_off_payment::Model> {
    ctx.require_account_access(account_id)?;

    let txn = db.begin().await?;
    load_account(&txn, account_id).await?;
    let created = insert_payment(&txn, account_id, new_payment).await?;
    txn.commit().await?;

    info!(payment_id = %created.id, %account_id, "Created one-off payment");
    Ok(created)
}

/// Fetches one payment from the caller's account.
pub async fn find_payment(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    payment_id: Uuid,
) -> Result<one_off_payment::Model> {
    ctx.require_authenticated()?;
    let found = load_payment(db, payment_id).await?;
    ctx.require_account_access(found.account_id)?;
    Ok(found)
}

/// Payments of the caller's account, cheapest first.
pub async fn list_payments(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    account_id: Uuid,
) -> Result<Vec<one_off_payment::Model>> {
    ctx.require_account_access(account_id)?;
    let payments = OneOffPayment::find()
        .filter(one_off_payment::Column::AccountId.eq(account_id))
        .order_by_asc(one_off_payment::Column::Amount)
        .all(db)
        .await?;
    if payments.is_empty() {
        return Err(Error::CollectionEmpty {
            entity: EntityKind::OneOffPayment,
            scope: Some(account_id),
        });
    }
    Ok(payments)
}

/// Applies the supplied fields to one payment.
#[instrument(skip(db, ctx, changes))]
pub async fn edit_payment(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    payment_id: Uuid,
    changes: OneOffPaymentChanges,
) -> Result<one_off_payment::Model> {
    ctx.require_authenticated()?;
    if changes.name.is_none() && changes.amount.is_none() {
        return Err(Error::NoFieldsProvided {
            entity: EntityKind::OneOffPayment,
        });
    }

    let current = load_payment(db, payment_id).await?;
    ctx.require_account_access(current.account_id)?;
    apply_payment_changes(db, &current, changes).await
}

/// Writes `changes` over the `current` snapshot, guarded by its version.
pub(crate) async fn apply_payment_changes<C>(
    conn: &C,
    current: &one_off_payment::Model,
    changes: OneOffPaymentChanges,
) -> Result<one_off_payment::Model>
where
    C: ConnectionTrait,
{
    let mut update = one_off_payment::ActiveModel {
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

    let result = OneOffPayment::update_many()
        .set(update)
        .filter(one_off_payment::Column::Id.eq(current.id))
        .filter(one_off_payment::Column::Version.eq(current.version))
        .exec(conn)
        .await
        .map_err(|e| Error::from_write(EntityKind::OneOffPayment, &key, e))?;
    if result.rows_affected == 0 {
        return Err(Error::UpdateFailed {
            entity: EntityKind::OneOffPayment,
        });
    }

    debug!(payment_id = %current.id, "Updated one-off payment");
    load_payment(conn, current.id).await
}

/// Deletes a payment and drops it from the account's list.
#[instrument(skip(db, ctx))]
pub async fn delete_payment(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    payment_id: Uuid,
) -> Result<one_off_payment::Model> {
    ctx.require_authenticated()?;
    let current = load_payment(db, payment_id).await?;
    ctx.require_account_access(current.account_id)?;

    let txn = db.begin().await?;
    links::remove_children(&txn, &[current.id]).await?;
    let result = OneOffPayment::delete_many()
        .filter(one_off_payment::Column::Id.eq(current.id))
        .filter(one_off_payment::Column::Version.eq(current.version))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::DeleteFailed {
            entity: EntityKind::OneOffPayment,
        });
    }
    txn.commit().await?;

    info!(%payment_id, "Deleted one-off payment");
    Ok(current)
}

/// Fails with one `NotFound` for all missing ids, then checks the caller owns
/// each payment's account.
async fn resolve_batch<C>(conn: &C, ctx: &RequestContext, ids: &[Uuid]) -> Result<()>
where
    C: ConnectionTrait,
{
    let found = OneOffPayment::find()
        .filter(one_off_payment::Column::Id.is_in(ids.iter().copied()))
        .all(conn)
        .await?;
    ensure_all_found(EntityKind::OneOffPayment, ids, found.iter().map(|p| p.id))?;
    for owned in &found {
        ctx.require_account_access(owned.account_id)?;
    }
    Ok(())
}

pub(crate) async fn update_resolved<C>(conn: &C, ids: &[Uuid], amount: f64) -> Result<u64>
where
    C: ConnectionTrait,
{
    let result = OneOffPayment::update_many()
        .col_expr(one_off_payment::Column::Amount, Expr::value(amount))
        .col_expr(
            one_off_payment::Column::Version,
            Expr::col(one_off_payment::Column::Version).add(1),
        )
        .filter(one_off_payment::Column::Id.is_in(ids.iter().copied()))
        .exec(conn)
        .await?;
    if result.rows_affected != ids.len() as u64 {
        return Err(Error::UpdateFailed {
            entity: EntityKind::OneOffPayment,
        });
    }
    Ok(result.rows_affected)
}

pub(crate) async fn delete_resolved<C>(conn: &C, ids: &[Uuid]) -> Result<u64>
where
    C: ConnectionTrait,
{
    links::remove_children(conn, ids).await?;
    let result = OneOffPayment::delete_many()
        .filter(one_off_payment::Column::Id.is_in(ids.iter().copied()))
        .exec(conn)
        .await?;
    if result.rows_affected != ids.len() as u64 {
        return Err(Error::DeleteFailed {
            entity: EntityKind::OneOffPayment,
        });
    }
    Ok(result.rows_affected)
}

/// Sets the same amount on several payments at once.
#[instrument(skip(db, ctx, payment_ids, changes), fields(count = payment_ids.len()))]
pub async fn batch_update_payments(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    payment_ids: &[Uuid],
    changes: PaymentBatchChanges,
) -> Result<BatchUpdated<one_off_payment::Model>> {
    ctx.require_authenticated()?;
    let Some(amount) = changes.amount else {
        return Err(Error::NoFieldsProvided {
            entity: EntityKind::OneOffPayment,
        });
    };
    validate_amount("amount", amount)?;
    let ids = unique_ids(payment_ids);
    if ids.is_empty() {
        return Ok(BatchUpdated {
            records: Vec::new(),
            updated_count: 0,
        });
    }

    let txn = db.begin().await?;
    resolve_batch(&txn, ctx, &ids).await?;
    let updated_count = update_resolved(&txn, &ids, amount).await?;
    let records = OneOffPayment::find()
        .filter(one_off_payment::Column::Id.is_in(ids))
        .order_by_asc(one_off_payment::Column::Name)
        .all(&txn)
        .await?;
    txn.commit().await?;

    info!(updated = updated_count, "Batch updated one-off payments");
    Ok(BatchUpdated {
        records,
        updated_count,
    })
}

/// Deletes several payments at once, returning how many were removed.
#[instrument(skip(db, ctx, payment_ids), fields(count = payment_ids.len()))]
pub async fn batch_delete_payments(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    payment_ids: &[Uuid],
) -> Result<u64> {
    ctx.require_authenticated()?;
    let ids = unique_ids(payment_ids);
    if ids.is_empty() {
        return Ok(0);
    }

    let txn = db.begin().await?;
    resolve_batch(&txn, ctx, &ids).await?;
    let deleted = delete_resolved(&txn, &ids).await?;
    txn.commit().await?;

    info!(deleted, "Batch deleted one-off payments");
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::bill::create_bill;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_payment_lifecycle() -> Result<()> {
        let (db, ctx, aggregate) = setup_with_account("a@x.com").await?;

        let empty = list_payments(&db, &ctx, aggregate.id).await;
        assert_eq!(empty.unwrap_err().code(), "PAYMENTS_NOT_FOUND");

        let boiler = create_payment(&db, &ctx, aggregate.id, new_payment("Boiler", 250.0)).await?;
        let edited = edit_payment(
            &db,
            &ctx,
            boiler.id,
            OneOffPaymentChanges {
                name: Some("Boiler service".to_string()),
                amount: None,
            },
        )
        .await?;
        assert_eq!(edited.name, "Boiler service");
        assert_eq!(edited.version, 1);

        delete_payment(&db, &ctx, boiler.id).await?;
        let gone = find_payment(&db, &ctx, boiler.id).await;
        assert_eq!(gone.unwrap_err().code(), "PAYMENT_NOT_FOUND");
        assert!(
            links::child_ids(&db, aggregate.id, ChildKind::OneOffPayment)
                .await?
                .is_empty()
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_payment_name_collides_with_bill() -> Result<()> {
        let (db, ctx, aggregate) = setup_with_account("a@x.com").await?;
        create_bill(&db, &ctx, aggregate.id, new_bill("Rent", 800.0)).await?;
        let car = create_payment(&db, &ctx, aggregate.id, new_payment("Car tax", 180.0)).await?;

        let clash = create_payment(&db, &ctx, aggregate.id, new_payment("Rent", 5.0)).await;
        assert_eq!(clash.unwrap_err().code(), "BILL_EXISTS");

        let rename = edit_payment(
            &db,
            &ctx,
            car.id,
            OneOffPaymentChanges {
                name: Some("Rent".to_string()),
                amount: None,
            },
        )
        .await;
        assert_eq!(rename.unwrap_err().code(), "BILL_EXISTS");

        let empty = edit_payment(&db, &ctx, car.id, OneOffPaymentChanges::default()).await;
        assert_eq!(empty.unwrap_err().code(), "NO_VALID_FIELDS_PROVIDED");
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_payment_edit_fails() -> Result<()> {
        let (db, ctx, aggregate) = setup_with_account("a@x.com").await?;
        let car = create_payment(&db, &ctx, aggregate.id, new_payment("Car tax", 180.0)).await?;

        let change = OneOffPaymentChanges {
            name: None,
            amount: Some(190.0),
        };
        apply_payment_changes(&db, &car, change.clone()).await?;
        let lost = apply_payment_changes(&db, &car, change).await;
        assert_eq!(lost.unwrap_err().code(), "PAYMENT_UPDATE_FAILED");
        Ok(())
    }

    #[tokio::test]
    async fn test_payment_batches() -> Result<()> {
        let (db, ctx, aggregate) = setup_with_account("a@x.com").await?;
        let a = create_payment(&db, &ctx, aggregate.id, new_payment("Gift", 30.0)).await?;
        let b = create_payment(&db, &ctx, aggregate.id, new_payment("Repairs", 90.0)).await?;

        let updated = batch_update_payments(
            &db,
            &ctx,
            &[a.id, b.id],
            PaymentBatchChanges { amount: Some(50.0) },
        )
        .await?;
        assert_eq!(updated.updated_count, 2);
        assert!(updated.records.iter().all(|p| p.amount == 50.0 && p.version == 1));

        let nothing = batch_update_payments(&db, &ctx, &[a.id], PaymentBatchChanges::default()).await;
        assert_eq!(nothing.unwrap_err().code(), "NO_VALID_FIELDS_PROVIDED");

        let missing = Uuid::new_v4();
        let partial = batch_delete_payments(&db, &ctx, &[a.id, missing]).await;
        assert_eq!(partial.unwrap_err().code(), "PAYMENT_NOT_FOUND");
        assert_eq!(list_payments(&db, &ctx, aggregate.id).await?.len(), 2);

        assert_eq!(batch_delete_payments(&db, &ctx, &[a.id, b.id, a.id]).await?, 2);
        let empty = list_payments(&db, &ctx, aggregate.id).await;
        assert_eq!(empty.unwrap_err().code(), "PAYMENTS_NOT_FOUND");
        Ok(())
    }

    #[tokio::test]
    async fn test_payments_in_other_accounts_are_forbidden() -> Result<()> {
        let (db, ctx, aggregate) = setup_with_account("a@x.com").await?;
        let gift = create_payment(&db, &ctx, aggregate.id, new_payment("Gift", 30.0)).await?;

        let intruder = create_test_user(&db, "b@x.com").await?;
        let intruder_ctx = context_for(&db, &intruder).await?;
        assert!(matches!(
            find_payment(&db, &intruder_ctx, gift.id).await,
            Err(Error::Forbidden)
        ));
        assert!(matches!(
            batch_update_payments(
                &db,
                &intruder_ctx,
                &[gift.id],
                PaymentBatchChanges { amount: Some(1.0) }
            )
            .await,
            Err(Error::Forbidden)
        ));
        assert!(matches!(
            delete_payment(&db, &RequestContext::anonymous(), gift.id).await,
            Err(Error::AuthInvalid)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_payment_batch_rolls_back_when_a_row_vanishes() -> Result<()> {
        let (db, ctx, aggregate) = setup_with_account("a@x.com").await?;
        let gift = create_payment(&db, &ctx, aggregate.id, new_payment("Gift", 30.0)).await?;
        let repairs = create_payment(&db, &ctx, aggregate.id, new_payment("Repairs", 90.0)).await?;
        delete_payment(&db, &ctx, repairs.id).await?;

        let txn = db.begin().await?;
        let err = update_resolved(&txn, &[gift.id, repairs.id], 50.0)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PAYMENT_UPDATE_FAILED");
        txn.rollback().await?;

        let txn = db.begin().await?;
        let err = delete_resolved(&txn, &[gift.id, repairs.id])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PAYMENT_DELETE_FAILED");
        txn.rollback().await?;

        let gift = find_payment(&db, &ctx, gift.id).await?;
        assert_eq!(gift.amount, 30.0);
        assert_eq!(gift.version, 0);
        assert_eq!(
            links::child_ids(&db, aggregate.id, ChildKind::OneOffPayment).await?,
            vec![gift.id]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_payment_rename_conflict_at_write_reports_new_name() -> Result<()> {
        let (db, ctx, aggregate) = setup_with_account("a@x.com").await?;
        let gift = create_payment(&db, &ctx, aggregate.id, new_payment("Gift", 30.0)).await?;
        // Another writer takes the name between the uniqueness check and the write
        db.execute_unprepared(
            "CREATE TRIGGER claim_payment_name BEFORE UPDATE OF name ON one_off_payments \
             WHEN NEW.name = 'Repairs' AND OLD.name <> 'Repairs' BEGIN \
             INSERT INTO one_off_payments (id, account_id, name, amount, version) \
             VALUES (randomblob(16), NEW.account_id, NEW.name, 1.0, 0); END",
        )
        .await?;

        let renamed = edit_payment(
            &db,
            &ctx,
            gift.id,
            OneOffPaymentChanges {
                name: Some("Repairs".to_string()),
                amount: None,
            },
        )
        .await;
        match renamed.unwrap_err() {
            Error::Exists { entity, key } => {
                assert_eq!(entity, EntityKind::OneOffPayment);
                assert_eq!(key, "Repairs");
            }
            other => panic!("unexpected error: {other}"),
        }
        Ok(())
    }
}

//! Account business logic - The aggregate root and its multi-record workflows.
//!
//! Creating an account links it to its user and creates any nested bills,
//! one-off payments and payday in the same store transaction. Deleting an
//! account removes every child first, then the list entries, then the owner's
//! back-reference, then the account itself. A failure at any step rolls back
//! everything written so far.

use crate::{
    core::{
        bill::{self, NewBill},
        guard::RequestContext,
        links,
        payday::{self, NewPayday},
        payment::{self, NewOneOffPayment},
        validation::validate_amount,
    },
    entities::{
        Account, Bill, ChildKind, Note, OneOffPayment, Payday, User, account, bill as bill_entity,
        note, one_off_payment, payday as payday_entity, user,
    },
    errors::{EntityKind, Error, Result},
};
use sea_orm::{Condition, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Input for creating an account together with its initial children.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    /// The owning user; must be the caller
    #[serde(rename = "user")]
    pub user_id: Uuid,
    /// Opening bank balance
    pub bank_balance: f64,
    /// Monthly income
    pub monthly_income: f64,
    /// Bills created with the account
    #[serde(default)]
    pub bills: Vec<NewBill>,
    /// One-off payments created with the account
    #[serde(default)]
    pub one_off_payments: Vec<NewOneOffPayment>,
    /// Optional payday schedule
    #[serde(default)]
    pub payday: Option<NewPayday>,
}

/// Fields that may be changed on an account. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountChanges {
    /// New bank balance
    pub bank_balance: Option<f64>,
    /// New monthly income
    pub monthly_income: Option<f64>,
}

impl AccountChanges {
    /// True when no field was supplied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bank_balance.is_none() && self.monthly_income.is_none()
    }
}

/// An account with its owner and children populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAggregate {
    /// Account id
    pub id: Uuid,
    /// Current bank balance
    pub bank_balance: f64,
    /// Monthly income
    pub monthly_income: f64,
    /// `bank_balance + monthly_income`
    pub bank_payday_total: f64,
    /// Account version
    pub version: i32,
    /// The owning user
    pub user: Option<user::Model>,
    /// Bills, cheapest first
    pub bills: Vec<bill_entity::Model>,
    /// One-off payments, cheapest first
    pub one_off_payments: Vec<one_off_payment::Model>,
    /// Notes in the order they were added
    pub notes: Vec<note::Model>,
    /// Payday schedule, if set
    pub payday: Option<payday_entity::Model>,
}

/// What a cascading account delete removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDeletion {
    /// The deleted account
    pub account_id: Uuid,
    /// Bills deleted
    pub bills: u64,
    /// One-off payments deleted
    pub one_off_payments: u64,
    /// Notes deleted
    pub notes: u64,
    /// Paydays deleted (0 or 1)
    pub paydays: u64,
}

pub(crate) async fn load_account<C>(conn: &C, account_id: Uuid) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    Account::find_by_id(account_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found(EntityKind::Account, account_id))
}

pub(crate) async fn load_aggregate<C>(conn: &C, account: account::Model) -> Result<AccountAggregate>
where
    C: ConnectionTrait,
{
    let owner = match account.user_id {
        Some(user_id) => User::find_by_id(user_id).one(conn).await?,
        None => None,
    };

    let bills = Bill::find()
        .filter(bill_entity::Column::AccountId.eq(account.id))
        .order_by_asc(bill_entity::Column::Amount)
        .all(conn)
        .await?;

    let one_off_payments = OneOffPayment::find()
        .filter(one_off_payment::Column::AccountId.eq(account.id))
        .order_by_asc(one_off_payment::Column::Amount)
        .all(conn)
        .await?;

    let note_order: HashMap<Uuid, usize> = links::child_ids(conn, account.id, ChildKind::Note)
        .await?
        .into_iter()
        .enumerate()
        .map(|(position, id)| (id, position))
        .collect();
    let mut notes = Note::find()
        .filter(note::Column::AccountId.eq(account.id))
        .all(conn)
        .await?;
    notes.sort_by_key(|n| note_order.get(&n.id).copied().unwrap_or(usize::MAX));

    let payday = Payday::find()
        .filter(payday_entity::Column::AccountId.eq(account.id))
        .one(conn)
        .await?;

    Ok(AccountAggregate {
        id: account.id,
        bank_balance: account.bank_balance,
        monthly_income: account.monthly_income,
        bank_payday_total: account.bank_payday_total(),
        version: account.version,
        user: owner,
        bills,
        one_off_payments,
        notes,
        payday,
    })
}

/// Creates an account for the calling user with its nested children.
///
/// Fails with `Forbidden` unless the caller is `user`, `NotFound(User)` if the
/// user does not exist and `Exists(Account)` if they already own one. The first
/// nested bill or payment whose name is taken aborts the whole creation.
#[instrument(skip(db, ctx, new_account), fields(user_id = %new_account.user_id))]
pub async fn create_account(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    new_account: NewAccount,
) -> Result<AccountAggregate> {
    ctx.require_self(new_account.user_id)?;
    validate_amount("bankBalance", new_account.bank_balance)?;
    validate_amount("monthlyIncome", new_account.monthly_income)?;

    let txn = db.begin().await?;

    let owner = User::find_by_id(new_account.user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found(EntityKind::User, new_account.user_id))?;
    if let Some(existing) = owner.account_id {
        return Err(Error::Exists {
            entity: EntityKind::Account,
            key: existing.to_string(),
        });
    }

    let owner_key = owner.id.to_string();
    let created = account::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(Some(owner.id)),
        bank_balance: Set(new_account.bank_balance),
        monthly_income: Set(new_account.monthly_income),
        payday_id: Set(None),
        version: Set(0),
    }
    .insert(&txn)
    .await
    .map_err(|e| Error::from_write(EntityKind::Account, &owner_key, e))?;

    let linked = User::update_many()
        .set(user::ActiveModel {
            account_id: Set(Some(created.id)),
            version: Set(owner.version + 1),
            ..Default::default()
        })
        .filter(user::Column::Id.eq(owner.id))
        .filter(user::Column::Version.eq(owner.version))
        .exec(&txn)
        .await?;
    if linked.rows_affected == 0 {
        return Err(Error::UpdateFailed {
            entity: EntityKind::User,
        });
    }

    for new_bill in new_account.bills {
        bill::insert_bill(&txn, created.id, new_bill).await?;
    }
    for new_payment in new_account.one_off_payments {
        payment::insert_payment(&txn, created.id, new_payment).await?;
    }
    if let Some(new_payday) = new_account.payday {
        payday::insert_payday(&txn, created.id, new_payday).await?;
    }

    let account = load_account(&txn, created.id).await?;
    let aggregate = load_aggregate(&txn, account).await?;
    txn.commit().await?;

    info!(
        account_id = %aggregate.id,
        bills = aggregate.bills.len(),
        one_off_payments = aggregate.one_off_payments.len(),
        "Created account"
    );
    Ok(aggregate)
}

/// Loads the caller's account with everything it owns.
pub async fn find_account(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    account_id: Uuid,
) -> Result<AccountAggregate> {
    ctx.require_account_access(account_id)?;
    let account = load_account(db, account_id).await?;
    load_aggregate(db, account).await
}

/// Lists every account. Requires an authenticated caller.
pub async fn list_accounts(
    db: &DatabaseConnection,
    ctx: &RequestContext,
) -> Result<Vec<account::Model>> {
    ctx.require_authenticated()?;
    let accounts = Account::find().all(db).await?;
    if accounts.is_empty() {
        return Err(Error::CollectionEmpty {
            entity: EntityKind::Account,
            scope: None,
        });
    }
    Ok(accounts)
}

/// Changes the balance and/or income of the caller's account.
#[instrument(skip(db, ctx, changes))]
pub async fn edit_account(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    account_id: Uuid,
    changes: AccountChanges,
) -> Result<account::Model> {
    ctx.require_authenticated()?;
    if changes.is_empty() {
        return Err(Error::NoFieldsProvided {
            entity: EntityKind::Account,
        });
    }
    ctx.require_account_access(account_id)?;

    let current = load_account(db, account_id).await?;
    apply_account_changes(db, &current, changes).await
}

/// Writes `changes` over `current`, guarded by the loaded version.
pub(crate) async fn apply_account_changes<C>(
    conn: &C,
    current: &account::Model,
    changes: AccountChanges,
) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    let mut update = account::ActiveModel {
        version: Set(current.version + 1),
        ..Default::default()
    };
    if let Some(balance) = changes.bank_balance {
        validate_amount("bankBalance", balance)?;
        update.bank_balance = Set(balance);
    }
    if let Some(income) = changes.monthly_income {
        validate_amount("monthlyIncome", income)?;
        update.monthly_income = Set(income);
    }

    let result = Account::update_many()
        .set(update)
        .filter(account::Column::Id.eq(current.id))
        .filter(account::Column::Version.eq(current.version))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::UpdateFailed {
            entity: EntityKind::Account,
        });
    }

    debug!(account_id = %current.id, version = current.version + 1, "Updated account");
    load_account(conn, current.id).await
}

/// Deletes the caller's account and everything it owns.
///
/// The owning user survives with its `account` reference cleared.
#[instrument(skip(db, ctx))]
pub async fn delete_account(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    account_id: Uuid,
) -> Result<AccountDeletion> {
    ctx.require_account_access(account_id)?;

    let txn = db.begin().await?;
    let account = load_account(&txn, account_id).await?;
    let deletion = cascade_delete_account(&txn, &account, true).await?;
    txn.commit().await?;

    info!(
        %account_id,
        bills = deletion.bills,
        one_off_payments = deletion.one_off_payments,
        notes = deletion.notes,
        paydays = deletion.paydays,
        "Deleted account"
    );
    Ok(deletion)
}

/// Deletes an account's children, list entries and the account itself.
///
/// With `clear_owner` the owning user's back-reference is reset; the user
/// delete workflow passes `false` because it removes the user next. Must run
/// inside a transaction.
pub(crate) async fn cascade_delete_account<C>(
    conn: &C,
    account: &account::Model,
    clear_owner: bool,
) -> Result<AccountDeletion>
where
    C: ConnectionTrait,
{
    let bill_ids = links::child_ids(conn, account.id, ChildKind::Bill).await?;
    let payment_ids = links::child_ids(conn, account.id, ChildKind::OneOffPayment).await?;
    let note_ids = links::child_ids(conn, account.id, ChildKind::Note).await?;

    let bills = Bill::delete_many()
        .filter(
            Condition::any()
                .add(bill_entity::Column::Id.is_in(bill_ids))
                .add(bill_entity::Column::AccountId.eq(account.id)),
        )
        .exec(conn)
        .await?
        .rows_affected;

    let notes = Note::delete_many()
        .filter(
            Condition::any()
                .add(note::Column::Id.is_in(note_ids))
                .add(note::Column::AccountId.eq(account.id)),
        )
        .exec(conn)
        .await?
        .rows_affected;

    let one_off_payments = OneOffPayment::delete_many()
        .filter(
            Condition::any()
                .add(one_off_payment::Column::Id.is_in(payment_ids))
                .add(one_off_payment::Column::AccountId.eq(account.id)),
        )
        .exec(conn)
        .await?
        .rows_affected;

    let mut payday_match = Condition::any().add(payday_entity::Column::AccountId.eq(account.id));
    if let Some(payday_id) = account.payday_id {
        payday_match = payday_match.add(payday_entity::Column::Id.eq(payday_id));
    }
    let paydays = Payday::delete_many()
        .filter(payday_match)
        .exec(conn)
        .await?
        .rows_affected;

    links::clear_account(conn, account.id).await?;

    if clear_owner {
        User::update_many()
            .set(user::ActiveModel {
                account_id: Set(None),
                ..Default::default()
            })
            .col_expr(user::Column::Version, Expr::col(user::Column::Version).add(1))
            .filter(user::Column::AccountId.eq(account.id))
            .exec(conn)
            .await?;
    }

    let deleted = Account::delete_many()
        .filter(account::Column::Id.eq(account.id))
        .filter(account::Column::Version.eq(account.version))
        .exec(conn)
        .await?;
    if deleted.rows_affected == 0 {
        return Err(Error::DeleteFailed {
            entity: EntityKind::Account,
        });
    }

    Ok(AccountDeletion {
        account_id: account.id,
        bills,
        one_off_payments,
        notes,
        paydays,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::{bill as bill_ops, note as note_ops, payment as payment_ops};
    use crate::entities::{AccountChild, PayFrequency, PaydayType};
    use crate::test_utils::*;
    use sea_orm::PaginatorTrait;

    #[tokio::test]
    async fn test_create_account_links_user_both_ways() -> Result<()> {
        let (db, ctx, aggregate) = setup_with_account("a@x.com").await?;

        let owner = aggregate.user.clone().unwrap();
        assert_eq!(owner.account_id, Some(aggregate.id));
        assert_eq!(owner.version, 1);
        assert_eq!(aggregate.version, 0);

        let stored = load_account(&db, aggregate.id).await?;
        assert_eq!(stored.user_id, Some(owner.id));
        assert_eq!(ctx.account_id(), Some(aggregate.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_account_with_children() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "a@x.com").await?;
        let ctx = context_for(&db, &user).await?;

        let aggregate = create_account(
            &db,
            &ctx,
            NewAccount {
                user_id: user.id,
                bank_balance: 500.0,
                monthly_income: 2000.0,
                bills: vec![new_bill("Rent", 800.0), new_bill("Phone", 20.0)],
                one_off_payments: vec![new_payment("Birthday gift", 45.0)],
                payday: Some(new_payday(PaydayType::LastFriday)),
            },
        )
        .await?;

        assert_eq!(aggregate.bank_payday_total, 2500.0);
        let bill_names: Vec<_> = aggregate.bills.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(bill_names, vec!["Phone", "Rent"]);
        assert_eq!(aggregate.one_off_payments.len(), 1);
        let payday = aggregate.payday.unwrap();
        assert_eq!(payday.frequency, PayFrequency::Monthly);

        let account = load_account(&db, aggregate.id).await?;
        assert_eq!(account.payday_id, Some(payday.id));
        assert_eq!(
            links::child_ids(&db, aggregate.id, ChildKind::Bill)
                .await?
                .len(),
            2
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_create_account_rolls_back_on_name_collision() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "a@x.com").await?;
        let ctx = context_for(&db, &user).await?;

        let result = create_account(
            &db,
            &ctx,
            NewAccount {
                user_id: user.id,
                bank_balance: 0.0,
                monthly_income: 0.0,
                bills: vec![new_bill("Gym", 30.0)],
                one_off_payments: vec![new_payment("Gym", 12.0)],
                payday: None,
            },
        )
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.code(), "BILL_EXISTS");

        // Nothing from the failed attempt survives
        assert_eq!(Account::find().count(&db).await?, 0);
        assert_eq!(Bill::find().count(&db).await?, 0);
        assert_eq!(AccountChild::find().count(&db).await?, 0);
        let user = User::find_by_id(user.id).one(&db).await?.unwrap();
        assert_eq!(user.account_id, None);
        assert_eq!(user.version, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_account_rejects_second_account_and_other_users() -> Result<()> {
        let (db, ctx, aggregate) = setup_with_account("a@x.com").await?;
        let owner = aggregate.user.unwrap();

        let again = create_account(&db, &ctx, new_account(owner.id)).await;
        assert_eq!(again.unwrap_err().code(), "ACCOUNT_EXISTS");

        let other = create_test_user(&db, "b@x.com").await?;
        let for_other = create_account(&db, &ctx, new_account(other.id)).await;
        assert!(matches!(for_other, Err(Error::Forbidden)));

        let anonymous = create_account(&db, &RequestContext::anonymous(), new_account(other.id)).await;
        assert!(matches!(anonymous, Err(Error::AuthInvalid)));
        Ok(())
    }

    #[tokio::test]
    async fn test_edit_account() -> Result<()> {
        let (db, ctx, aggregate) = setup_with_account("a@x.com").await?;

        let empty = edit_account(&db, &ctx, aggregate.id, AccountChanges::default()).await;
        let err = empty.unwrap_err();
        assert_eq!(err.code(), "NO_VALID_FIELDS_PROVIDED");

        let updated = edit_account(
            &db,
            &ctx,
            aggregate.id,
            AccountChanges {
                bank_balance: Some(42.0),
                monthly_income: None,
            },
        )
        .await?;
        assert_eq!(updated.bank_balance, 42.0);
        assert_eq!(updated.monthly_income, aggregate.monthly_income);
        assert_eq!(updated.version, aggregate.version + 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_edit_account_from_stale_version_fails() -> Result<()> {
        let (db, _ctx, aggregate) = setup_with_account("a@x.com").await?;
        let snapshot = load_account(&db, aggregate.id).await?;

        let changes = AccountChanges {
            bank_balance: None,
            monthly_income: Some(3000.0),
        };
        apply_account_changes(&db, &snapshot, changes.clone()).await?;
        let second = apply_account_changes(&db, &snapshot, changes).await;
        assert_eq!(second.unwrap_err().code(), "ACCOUNT_UPDATE_FAILED");
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_account_cascades() -> Result<()> {
        let (db, ctx, aggregate) = setup_with_account("a@x.com").await?;
        let account_id = aggregate.id;

        bill_ops::create_bill(&db, &ctx, account_id, new_bill("Rent", 800.0)).await?;
        bill_ops::create_bill(&db, &ctx, account_id, new_bill("Water", 30.0)).await?;
        note_ops::create_note(&db, &ctx, account_id, new_note("Check the meter")).await?;
        payment_ops::create_payment(&db, &ctx, account_id, new_payment("Boiler", 250.0)).await?;
        crate::core::payday::create_payday(&db, &ctx, account_id, new_payday(PaydayType::LastDay))
            .await?;

        let deletion = delete_account(&db, &ctx, account_id).await?;
        assert_eq!(
            deletion,
            AccountDeletion {
                account_id,
                bills: 2,
                one_off_payments: 1,
                notes: 1,
                paydays: 1,
            }
        );

        assert_eq!(Account::find().count(&db).await?, 0);
        assert_eq!(
            Bill::find()
                .filter(bill_entity::Column::AccountId.eq(account_id))
                .count(&db)
                .await?,
            0
        );
        assert_eq!(
            Note::find()
                .filter(note::Column::AccountId.eq(account_id))
                .count(&db)
                .await?,
            0
        );
        assert_eq!(
            OneOffPayment::find()
                .filter(one_off_payment::Column::AccountId.eq(account_id))
                .count(&db)
                .await?,
            0
        );
        assert_eq!(Payday::find().count(&db).await?, 0);
        assert_eq!(AccountChild::find().count(&db).await?, 0);

        let owner = User::find_by_id(aggregate.user.unwrap().id)
            .one(&db)
            .await?
            .unwrap();
        assert_eq!(owner.account_id, None);

        let gone = find_account(&db, &ctx, account_id).await;
        assert_eq!(gone.unwrap_err().code(), "ACCOUNT_NOT_FOUND");
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_account_leaves_other_accounts_alone() -> Result<()> {
        let (db, ctx, mine) = setup_with_account("a@x.com").await?;
        let theirs_user = create_test_user(&db, "b@x.com").await?;
        let theirs_ctx = context_for(&db, &theirs_user).await?;
        let theirs = create_account(&db, &theirs_ctx, new_account(theirs_user.id)).await?;
        let theirs_ctx = context_for(&db, &theirs_user).await?;
        bill_ops::create_bill(&db, &theirs_ctx, theirs.id, new_bill("Rent", 700.0)).await?;

        let forbidden = delete_account(&db, &ctx, theirs.id).await;
        assert!(matches!(forbidden, Err(Error::Forbidden)));

        delete_account(&db, &ctx, mine.id).await?;
        let survivor = find_account(&db, &theirs_ctx, theirs.id).await?;
        assert_eq!(survivor.bills.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_register_create_and_duplicate_bill() -> Result<()> {
        let db = setup_test_db().await?;
        let auth = test_auth_settings();
        let payload =
            crate::core::identity::register_and_login(&db, &auth, new_user("a@x.com")).await?;
        let header = format!("Bearer {}", payload.token);
        let ctx = RequestContext::from_authorization(&db, &auth, Some(&header)).await?;

        let aggregate = create_account(
            &db,
            &ctx,
            NewAccount {
                bills: vec![new_bill("Rent", 800.0)],
                ..new_account(payload.user.id)
            },
        )
        .await?;
        let ctx = RequestContext::from_authorization(&db, &auth, Some(&header)).await?;

        let duplicate = bill_ops::create_bill(&db, &ctx, aggregate.id, new_bill("Rent", 900.0)).await;
        let err = duplicate.unwrap_err();
        assert_eq!(err.code(), "BILL_EXISTS");
        assert_eq!(err.to_body().code, "BILL_EXISTS");

        let untouched = find_account(&db, &ctx, aggregate.id).await?;
        assert_eq!(untouched.bills.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_accounts() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "a@x.com").await?;
        let ctx = context_for(&db, &user).await?;

        let empty = list_accounts(&db, &ctx).await;
        assert_eq!(empty.unwrap_err().code(), "ACCOUNTS_NOT_FOUND");

        create_account(&db, &ctx, new_account(user.id)).await?;
        assert_eq!(list_accounts(&db, &ctx).await?.len(), 1);

        let anonymous = list_accounts(&db, &RequestContext::anonymous()).await;
        assert!(matches!(anonymous, Err(Error::AuthInvalid)));
        Ok(())
    }
}

//! Payday business logic - The single pay schedule of an account.
//!
//! An account has at most one payday, referenced from `accounts.payday_id`.
//! Schedule rules are checked on create and on the merged result of every edit:
//!
//! - `SET_DAY` needs a `dayOfMonth` between 1 and 31
//! - `SET_WEEKDAY` needs a `weekday`
//! - `firstPayDate`, when given, is a `YYYY-MM-DD` calendar date

use crate::{
    core::{account::load_account, guard::RequestContext, present},
    entities::{
        Account, BankHolidayRegion, PayFrequency, Payday, PaydayType, Weekday, account, payday,
    },
    errors::{EntityKind, Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use tracing::{info, instrument};

/// Input for a new payday schedule.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayday {
    /// How often pay arrives
    pub frequency: PayFrequency,
    /// Rule for picking the date
    #[serde(rename = "type")]
    pub payday_type: PaydayType,
    /// Day of month for `SET_DAY`
    #[serde(default)]
    pub day_of_month: Option<i32>,
    /// Weekday for `SET_WEEKDAY`
    #[serde(default)]
    pub weekday: Option<Weekday>,
    /// First known pay date, `YYYY-MM-DD`
    #[serde(default)]
    pub first_pay_date: Option<String>,
    /// Bank holiday calendar
    #[serde(default)]
    pub bank_holiday_region: Option<BankHolidayRegion>,
}

/// Fields that may be changed on a payday.
///
/// The optional schedule fields distinguish "leave alone" (`None`) from
/// "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaydayChanges {
    /// New frequency
    pub frequency: Option<PayFrequency>,
    /// New rule
    #[serde(rename = "type")]
    pub payday_type: Option<PaydayType>,
    /// New day of month, or `Some(None)` to clear it
    #[serde(default, deserialize_with = "present")]
    pub day_of_month: Option<Option<i32>>,
    /// New weekday, or `Some(None)` to clear it
    #[serde(default, deserialize_with = "present")]
    pub weekday: Option<Option<Weekday>>,
    /// New first pay date, or `Some(None)` to clear it
    #[serde(default, deserialize_with = "present")]
    pub first_pay_date: Option<Option<String>>,
    /// New region, or `Some(None)` to clear it
    #[serde(default, deserialize_with = "present")]
    pub bank_holiday_region: Option<Option<BankHolidayRegion>>,
}

impl PaydayChanges {
    /// True when no field was supplied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.frequency.is_none()
            && self.payday_type.is_none()
            && self.day_of_month.is_none()
            && self.weekday.is_none()
            && self.first_pay_date.is_none()
            && self.bank_holiday_region.is_none()
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidInput {
        message: message.into(),
    }
}

/// Checks the schedule rules for a complete payday definition.
pub(crate) fn validate_schedule(
    payday_type: PaydayType,
    day_of_month: Option<i32>,
    weekday: Option<Weekday>,
    first_pay_date: Option<&str>,
) -> Result<()> {
    if let Some(day) = day_of_month {
        if !(1..=31).contains(&day) {
            return Err(invalid(format!(
                "dayOfMonth must be between 1 and 31, got {day}"
            )));
        }
    }

    match payday_type {
        PaydayType::SetDay if day_of_month.is_none() => {
            return Err(invalid("dayOfMonth is required when type is SET_DAY"));
        }
        PaydayType::SetWeekday if weekday.is_none() => {
            return Err(invalid("weekday is required when type is SET_WEEKDAY"));
        }
        _ => {}
    }

    if let Some(date) = first_pay_date {
        let well_formed =
            date.len() == 10 && NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok();
        if !well_formed {
            return Err(invalid(format!(
                "firstPayDate must be a YYYY-MM-DD date, got '{date}'"
            )));
        }
    }
    Ok(())
}

/// Stores a payday for `account_id` and points the account at it.
pub(crate) async fn insert_payday<C>(
    conn: &C,
    account_id: Uuid,
    new_payday: NewPayday,
) -> Result<payday::Model>
where
    C: ConnectionTrait,
{
    validate_schedule(
        new_payday.payday_type,
        new_payday.day_of_month,
        new_payday.weekday,
        new_payday.first_pay_date.as_deref(),
    )?;

    let key = account_id.to_string();
    let existing = Payday::find()
        .filter(payday::Column::AccountId.eq(account_id))
        .one(conn)
        .await?;
    if existing.is_some() {
        return Err(Error::Exists {
            entity: EntityKind::Payday,
            key,
        });
    }

    let created = payday::ActiveModel {
        id: Set(Uuid::new_v4()),
        account_id: Set(account_id),
        frequency: Set(new_payday.frequency),
        payday_type: Set(new_payday.payday_type),
        day_of_month: Set(new_payday.day_of_month),
        weekday: Set(new_payday.weekday),
        first_pay_date: Set(new_payday.first_pay_date),
        bank_holiday_region: Set(new_payday.bank_holiday_region),
        version: Set(0),
    }
    .insert(conn)
    .await
    .map_err(|e| Error::from_write(EntityKind::Payday, &key, e))?;

    Account::update_many()
        .set(account::ActiveModel {
            payday_id: Set(Some(created.id)),
            ..Default::default()
        })
        .filter(account::Column::Id.eq(account_id))
        .exec(conn)
        .await?;

    Ok(created)
}

async fn load_payday<C>(conn: &C, payday_id: Uuid) -> Result<payday::Model>
where
    C: ConnectionTrait,
{
    Payday::find_by_id(payday_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found(EntityKind::Payday, payday_id))
}

/// Sets the pay schedule of the caller's account.
///
/// Fails with `Exists(Payday)` when the account already has one.
#[instrument(skip(db, ctx, new_payday))]
pub async fn create_payday(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    account_id: Uuid,
    new_payday: NewPayday,
) -> Result<payday::Model> {
    ctx.require_account_access(account_id)?;

    let txn = db.begin().await?;
    load_account(&txn, account_id).await?;
    let created = insert_payday(&txn, account_id, new_payday).await?;
    txn.commit().await?;

    info!(payday_id = %created.id, %account_id, "Created payday");
    Ok(created)
}

/// Fetches one payday from the caller's account.
pub async fn find_payday(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    payday_id: Uuid,
) -> Result<payday::Model> {
    ctx.require_authenticated()?;
    let found = load_payday(db, payday_id).await?;
    ctx.require_account_access(found.account_id)?;
    Ok(found)
}

/// Paydays visible to the caller: at most the one on their own account.
pub async fn list_paydays(
    db: &DatabaseConnection,
    ctx: &RequestContext,
) -> Result<Vec<payday::Model>> {
    let account_id = ctx.own_account()?;
    let paydays = Payday::find()
        .filter(payday::Column::AccountId.eq(account_id))
        .all(db)
        .await?;
    if paydays.is_empty() {
        return Err(Error::CollectionEmpty {
            entity: EntityKind::Payday,
            scope: Some(account_id),
        });
    }
    Ok(paydays)
}

/// Applies the supplied schedule fields, re-checking the rules on the result.
#[instrument(skip(db, ctx, changes))]
pub async fn edit_payday(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    payday_id: Uuid,
    changes: PaydayChanges,
) -> Result<payday::Model> {
    ctx.require_authenticated()?;
    if changes.is_empty() {
        return Err(Error::NoFieldsProvided {
            entity: EntityKind::Payday,
        });
    }

    let current = load_payday(db, payday_id).await?;
    ctx.require_account_access(current.account_id)?;
    apply_payday_changes(db, &current, changes).await
}

pub(crate) async fn apply_payday_changes<C>(
    conn: &C,
    current: &payday::Model,
    changes: PaydayChanges,
) -> Result<payday::Model>
where
    C: ConnectionTrait,
{
    let merged = payday::Model {
        frequency: changes.frequency.unwrap_or(current.frequency),
        payday_type: changes.payday_type.unwrap_or(current.payday_type),
        day_of_month: changes.day_of_month.unwrap_or(current.day_of_month),
        weekday: changes.weekday.unwrap_or(current.weekday),
        first_pay_date: changes
            .first_pay_date
            .unwrap_or_else(|| current.first_pay_date.clone()),
        bank_holiday_region: changes
            .bank_holiday_region
            .unwrap_or(current.bank_holiday_region),
        version: current.version + 1,
        ..current.clone()
    };
    validate_schedule(
        merged.payday_type,
        merged.day_of_month,
        merged.weekday,
        merged.first_pay_date.as_deref(),
    )?;

    let result = Payday::update_many()
        .set(payday::ActiveModel {
            frequency: Set(merged.frequency),
            payday_type: Set(merged.payday_type),
            day_of_month: Set(merged.day_of_month),
            weekday: Set(merged.weekday),
            first_pay_date: Set(merged.first_pay_date.clone()),
            bank_holiday_region: Set(merged.bank_holiday_region),
            version: Set(merged.version),
            ..Default::default()
        })
        .filter(payday::Column::Id.eq(current.id))
        .filter(payday::Column::Version.eq(current.version))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::UpdateFailed {
            entity: EntityKind::Payday,
        });
    }
    Ok(merged)
}

/// Deletes a payday and clears the account's reference to it.
#[instrument(skip(db, ctx))]
pub async fn delete_payday(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    payday_id: Uuid,
) -> Result<payday::Model> {
    ctx.require_authenticated()?;
    let current = load_payday(db, payday_id).await?;
    ctx.require_account_access(current.account_id)?;

    let txn = db.begin().await?;
    // Only unlink when the account still points here
    Account::update_many()
        .set(account::ActiveModel {
            payday_id: Set(None),
            ..Default::default()
        })
        .filter(account::Column::Id.eq(current.account_id))
        .filter(account::Column::PaydayId.eq(current.id))
        .exec(&txn)
        .await?;
    let result = Payday::delete_many()
        .filter(payday::Column::Id.eq(current.id))
        .filter(payday::Column::Version.eq(current.version))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::DeleteFailed {
            entity: EntityKind::Payday,
        });
    }
    txn.commit().await?;

    info!(%payday_id, "Deleted payday");
    Ok(current)
}

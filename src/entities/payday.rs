//! Payday entity - When and how often an account's income arrives.
//!
//! Each account has at most one payday (`account_id` is unique). The schedule
//! enums are stored as their wire strings.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How often pay arrives
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayFrequency {
    #[sea_orm(string_value = "WEEKLY")]
    Weekly,
    #[sea_orm(string_value = "FORTNIGHTLY")]
    Fortnightly,
    #[sea_orm(string_value = "FOUR_WEEKLY")]
    FourWeekly,
    #[sea_orm(string_value = "MONTHLY")]
    Monthly,
    #[sea_orm(string_value = "QUARTERLY")]
    Quarterly,
    #[sea_orm(string_value = "BIANNUAL")]
    Biannual,
    #[sea_orm(string_value = "ANNUAL")]
    Annual,
}

/// Rule used to pick the pay date within a period
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaydayType {
    /// Last day of the month
    #[sea_orm(string_value = "LAST_DAY")]
    LastDay,
    /// Last Friday of the month
    #[sea_orm(string_value = "LAST_FRIDAY")]
    LastFriday,
    /// A fixed day of the month, see `day_of_month`
    #[sea_orm(string_value = "SET_DAY")]
    SetDay,
    /// A fixed weekday, see `weekday`
    #[sea_orm(string_value = "SET_WEEKDAY")]
    SetWeekday,
}

/// Working days a payday can fall on
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Weekday {
    #[sea_orm(string_value = "MONDAY")]
    Monday,
    #[sea_orm(string_value = "TUESDAY")]
    Tuesday,
    #[sea_orm(string_value = "WEDNESDAY")]
    Wednesday,
    #[sea_orm(string_value = "THURSDAY")]
    Thursday,
    #[sea_orm(string_value = "FRIDAY")]
    Friday,
}

/// UK bank holiday calendar used to shift pay dates
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BankHolidayRegion {
    #[sea_orm(string_value = "ENGLAND_AND_WALES")]
    EnglandAndWales,
    #[sea_orm(string_value = "SCOTLAND")]
    Scotland,
    #[sea_orm(string_value = "NORTHERN_IRELAND")]
    NorthernIreland,
}

/// Payday database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "paydays")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique identifier for the payday
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Owning account; one payday per account
    #[sea_orm(unique)]
    #[serde(rename = "account")]
    pub account_id: Uuid,
    /// How often pay arrives
    pub frequency: PayFrequency,
    /// Rule used to pick the pay date
    #[sea_orm(column_name = "type")]
    #[serde(rename = "type")]
    pub payday_type: PaydayType,
    /// Day of month (1-31), required for `SET_DAY`
    pub day_of_month: Option<i32>,
    /// Weekday, required for `SET_WEEKDAY`
    pub weekday: Option<Weekday>,
    /// First known pay date as `YYYY-MM-DD`
    pub first_pay_date: Option<String>,
    /// Bank holiday calendar
    pub bank_holiday_region: Option<BankHolidayRegion>,
    /// Optimistic concurrency counter
    pub version: i32,
}

/// References to other tables are plain id columns
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

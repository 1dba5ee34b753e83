//! Account entity - The aggregate root owning bills, payments, notes and a payday.
//!
//! Bills, one-off payments and notes are listed through `account_children`;
//! the single payday is referenced directly by `payday_id`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique identifier for the account
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Owning user; at most one account per user
    #[sea_orm(unique)]
    #[serde(rename = "user")]
    pub user_id: Option<Uuid>,
    /// Current bank balance
    pub bank_balance: f64,
    /// Income received each month
    pub monthly_income: f64,
    /// Payday schedule for this account
    #[serde(rename = "payday")]
    pub payday_id: Option<Uuid>,
    /// Optimistic concurrency counter
    pub version: i32,
}

impl Model {
    /// Balance expected after the next payday lands.
    #[must_use]
    pub fn bank_payday_total(&self) -> f64 {
        self.bank_balance + self.monthly_income
    }
}

/// References to other tables are plain id columns
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

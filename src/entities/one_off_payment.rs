//! One-off payment entity - A single planned outgoing owned by an account.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One-off payment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "one_off_payments")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique identifier for the payment
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Owning account
    #[sea_orm(indexed)]
    #[serde(rename = "account")]
    pub account_id: Uuid,
    /// Display name, unique among the account's bills and payments
    pub name: String,
    /// Amount due
    pub amount: f64,
    /// Optimistic concurrency counter
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

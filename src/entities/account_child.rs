//! Account child list - The ordered reference lists of an account.
//!
//! One row per bill, one-off payment or note owned by an account. Row `id`
//! order is list order. A child id appears at most once.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Which of the account's lists a child belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChildKind {
    /// Entry in `bills`
    #[sea_orm(string_value = "BILL")]
    Bill,
    /// Entry in `oneOffPayments`
    #[sea_orm(string_value = "ONE_OFF_PAYMENT")]
    OneOffPayment,
    /// Entry in `notes`
    #[sea_orm(string_value = "NOTE")]
    Note,
}

/// Account child list database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "account_children")]
pub struct Model {
    /// Insertion sequence, doubles as list position
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning account
    #[sea_orm(indexed)]
    pub account_id: Uuid,
    /// List the child belongs to
    pub kind: ChildKind,
    /// Id of the bill, payment or note
    #[sea_orm(unique)]
    pub child_id: Uuid,
}

/// References to other tables are plain id columns
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Input checks shared by the repository operations.
//!
//! Bill and one-off payment names share one namespace per account: a name may
//! not be reused by either type. Notes are unique by body among notes only.

use crate::{
    entities::{Bill, Note, OneOffPayment, bill, note, one_off_payment},
    errors::{EntityKind, Error, Result},
};
use sea_orm::prelude::*;

/// Rejects blank names and bodies.
pub(crate) fn validate_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput {
            message: format!("{field} cannot be empty"),
        });
    }
    Ok(())
}

/// Rejects NaN and infinite money values.
pub(crate) fn validate_amount(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::InvalidInput {
            message: format!("{field} must be a finite number, got {value}"),
        });
    }
    Ok(())
}

/// Fails with `Exists` when `name` is already used by a one-off payment or a
/// bill in the account. `exclude` skips the record being renamed.
///
/// Payments are checked before bills, so the reported entity is the one the
/// name collided with.
pub(crate) async fn ensure_unique_name<C>(
    conn: &C,
    account_id: Uuid,
    name: &str,
    exclude: Option<Uuid>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut payments = OneOffPayment::find()
        .filter(one_off_payment::Column::AccountId.eq(account_id))
        .filter(one_off_payment::Column::Name.eq(name));
    let mut bills = Bill::find()
        .filter(bill::Column::AccountId.eq(account_id))
        .filter(bill::Column::Name.eq(name));
    if let Some(id) = exclude {
        payments = payments.filter(one_off_payment::Column::Id.ne(id));
        bills = bills.filter(bill::Column::Id.ne(id));
    }

    if payments.one(conn).await?.is_some() {
        return Err(Error::Exists {
            entity: EntityKind::OneOffPayment,
            key: name.to_string(),
        });
    }
    if bills.one(conn).await?.is_some() {
        return Err(Error::Exists {
            entity: EntityKind::Bill,
            key: name.to_string(),
        });
    }
    Ok(())
}

/// Fails with `Exists` when another note in the account has the same body.
pub(crate) async fn ensure_unique_note_body<C>(
    conn: &C,
    account_id: Uuid,
    body: &str,
    exclude: Option<Uuid>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut query = Note::find()
        .filter(note::Column::AccountId.eq(account_id))
        .filter(note::Column::Body.eq(body));
    if let Some(id) = exclude {
        query = query.filter(note::Column::Id.ne(id));
    }
    if query.one(conn).await?.is_some() {
        return Err(Error::Exists {
            entity: EntityKind::Note,
            key: body.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_text() {
        assert!(validate_text("name", "Rent").is_ok());
        assert!(matches!(
            validate_text("name", "   "),
            Err(Error::InvalidInput { message: _ })
        ));
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount("amount", -12.5).is_ok());
        assert!(validate_amount("amount", f64::NAN).is_err());
        assert!(validate_amount("amount", f64::INFINITY).is_err());
    }
}

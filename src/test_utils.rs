//! Shared test utilities for the payday planner core.
//!
//! Provides an in-memory store with every table created, plus builders for
//! users, request contexts and account children with sensible defaults.

use crate::{
    config::settings::AuthSettings,
    core::{
        account::{AccountAggregate, NewAccount, create_account},
        bill::NewBill,
        guard::RequestContext,
        identity::{NewUser, create_user, issue_token},
        note::NewNote,
        payday::NewPayday,
        payment::NewOneOffPayment,
    },
    entities::{PayFrequency, PaydayType, Weekday, user},
    errors::Result,
};
use sea_orm::DatabaseConnection;
use tracing_subscriber::EnvFilter;

/// Password given to every user created through [`create_test_user`].
pub const TEST_PASSWORD: &str = "correct horse battery staple";

pub(crate) fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    init_test_tracing();
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Auth settings with a fixed key, a one hour lifetime and the cheapest
/// bcrypt cost so hashing does not slow the suite down.
pub fn test_auth_settings() -> AuthSettings {
    AuthSettings {
        jwt_key: "test-signing-key".to_string(),
        token_ttl_hours: 1,
        bcrypt_cost: 4,
    }
}

/// Registration input for `email` using [`TEST_PASSWORD`].
pub fn new_user(email: &str) -> NewUser {
    NewUser {
        first_name: "Alex".to_string(),
        surname: "Taylor".to_string(),
        email: email.to_string(),
        password: TEST_PASSWORD.to_string(),
    }
}

/// Registers a user with default names and [`TEST_PASSWORD`].
pub async fn create_test_user(db: &DatabaseConnection, email: &str) -> Result<user::Model> {
    create_user(db, &test_auth_settings(), new_user(email)).await
}

/// Resolves a request context the way a transport would, from a freshly
/// issued bearer token.
pub async fn context_for(db: &DatabaseConnection, user: &user::Model) -> Result<RequestContext> {
    let auth = test_auth_settings();
    let token = issue_token(&auth, user.id, &user.email)?;
    let header = format!("Bearer {token}");
    RequestContext::from_authorization(db, &auth, Some(&header)).await
}

/// An account input without children.
pub fn new_account(user_id: uuid::Uuid) -> NewAccount {
    NewAccount {
        user_id,
        bank_balance: 1000.0,
        monthly_income: 2500.0,
        bills: Vec::new(),
        one_off_payments: Vec::new(),
        payday: None,
    }
}

/// Creates a database, a user and an empty account for them.
///
/// The returned context is re-resolved after the account exists, so it
/// carries the account link.
pub async fn setup_with_account(
    email: &str,
) -> Result<(DatabaseConnection, RequestContext, AccountAggregate)> {
    let db = setup_test_db().await?;
    let user = create_test_user(&db, email).await?;
    let ctx = context_for(&db, &user).await?;
    let aggregate = create_account(&db, &ctx, new_account(user.id)).await?;
    let ctx = context_for(&db, &user).await?;
    Ok((db, ctx, aggregate))
}

/// An unpaid bill.
pub fn new_bill(name: &str, amount: f64) -> NewBill {
    NewBill {
        name: name.to_string(),
        amount,
        paid: false,
    }
}

/// A one-off payment input.
pub fn new_payment(name: &str, amount: f64) -> NewOneOffPayment {
    NewOneOffPayment {
        name: name.to_string(),
        amount,
    }
}

/// A note input with the given body.
pub fn new_note(body: &str) -> NewNote {
    NewNote {
        body: body.to_string(),
    }
}

/// A monthly payday of the given type, filling in whatever the type requires
/// (the 25th for `SET_DAY`, Friday for `SET_WEEKDAY`).
pub fn new_payday(payday_type: PaydayType) -> NewPayday {
    NewPayday {
        frequency: PayFrequency::Monthly,
        payday_type,
        day_of_month: (payday_type == PaydayType::SetDay).then_some(25),
        weekday: (payday_type == PaydayType::SetWeekday).then_some(Weekday::Friday),
        first_pay_date: Some("2024-01-25".to_string()),
        bank_holiday_region: None,
    }
}

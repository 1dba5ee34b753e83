//! Database configuration module.
//!
//! This module handles the store connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`; the composite unique keys that scope
//! names to an account are added as explicit indexes. No foreign keys are
//! declared, so the same bootstrap works on any backend `SeaORM` supports.

use crate::config::settings::DatabaseSettings;
use crate::entities::{
    Account, AccountChild, Bill, Note, OneOffPayment, Payday, User, bill, note, one_off_payment,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::{debug, info, instrument};

/// Opens the store described by the settings.
///
/// The returned handle is pooled and cheap to clone; it is passed explicitly
/// to every operation and closed at shutdown.
#[instrument(skip(settings))]
pub async fn create_connection(settings: &DatabaseSettings) -> Result<DatabaseConnection> {
    debug!("Connecting to database");
    Database::connect(&settings.url).await.map_err(Into::into)
}

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all tables and indexes if they do not exist yet.
///
/// Safe to call on every start.
#[instrument(skip(db))]
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table(db, &schema, User).await?;
    create_table(db, &schema, Account).await?;
    create_table(db, &schema, AccountChild).await?;
    create_table(db, &schema, Bill).await?;
    create_table(db, &schema, OneOffPayment).await?;
    create_table(db, &schema, Payday).await?;
    create_table(db, &schema, Note).await?;

    // Single-column indexes declared with `#[sea_orm(indexed)]`
    for entity_indexes in [
        schema.create_index_from_entity(AccountChild),
        schema.create_index_from_entity(Bill),
        schema.create_index_from_entity(OneOffPayment),
        schema.create_index_from_entity(Note),
    ] {
        for mut index in entity_indexes {
            index.if_not_exists();
            db.execute(builder.build(&index)).await?;
        }
    }

    let scoped_keys = [
        Index::create()
            .name("idx_bills_name_account")
            .table(Bill)
            .col(bill::Column::Name)
            .col(bill::Column::AccountId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_one_off_payments_name_account")
            .table(OneOffPayment)
            .col(one_off_payment::Column::Name)
            .col(one_off_payment::Column::AccountId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_notes_body_account")
            .table(Note)
            .col(note::Column::Body)
            .col(note::Column::AccountId)
            .unique()
            .if_not_exists()
            .to_owned(),
    ];
    for index in &scoped_keys {
        db.execute(builder.build(index)).await?;
    }

    info!("Database tables ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AccountModel, BillModel, UserModel};
    use sea_orm::QuerySelect;

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<UserModel> = User::find().limit(1).all(&db).await?;
        let _: Vec<AccountModel> = Account::find().limit(1).all(&db).await?;
        let _: Vec<BillModel> = Bill::find().limit(1).all(&db).await?;
        let _ = AccountChild::find().limit(1).all(&db).await?;
        let _ = OneOffPayment::find().limit(1).all(&db).await?;
        let _ = Payday::find().limit(1).all(&db).await?;
        let _ = Note::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_connection_from_settings() -> Result<()> {
        let settings = DatabaseSettings {
            url: "sqlite::memory:".to_string(),
        };
        let db = create_connection(&settings).await?;
        create_tables(&db).await?;
        db.close().await?;
        Ok(())
    }
}

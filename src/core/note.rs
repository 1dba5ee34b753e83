//! Note business logic - Free-text reminders on an account.

use crate::{
    core::{
        account::load_account,
        guard::RequestContext,
        links,
        validation::{ensure_unique_note_body, validate_text},
    },
    entities::{ChildKind, Note, note},
    errors::{EntityKind, Error, Result},
};
use chrono::Utc;
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Input for a new note.
#[derive(Debug, Clone, Deserialize)]
pub struct NewNote {
    /// Note text, unique among the account's notes
    pub body: String,
}

/// Fields that may be changed on a note.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteChanges {
    /// New text
    pub body: Option<String>,
}

async fn load_note<C>(conn: &C, note_id: Uuid) -> Result<note::Model>
where
    C: ConnectionTrait,
{
    Note::find_by_id(note_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found(EntityKind::Note, note_id))
}

/// Adds a note to the end of the caller's account notes.
#[instrument(skip(db, ctx, new_note))]
pub async fn create_note(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    account_id: Uuid,
    new_note: NewNote,
) -> Result<note::Model> {
    ctx.require_account_access(account_id)?;
    validate_text("body", &new_note.body)?;

    let txn = db.begin().await?;
    load_account(&txn, account_id).await?;
    ensure_unique_note_body(&txn, account_id, &new_note.body, None).await?;

    let now = Utc::now();
    let body = new_note.body.clone();
    let created = note::ActiveModel {
        id: Set(Uuid::new_v4()),
        account_id: Set(account_id),
        body: Set(new_note.body),
        created_at: Set(now),
        updated_at: Set(now),
        version: Set(0),
    }
    .insert(&txn)
    .await
    .map_err(|e| Error::from_write(EntityKind::Note, &body, e))?;
    links::append_child(&txn, account_id, ChildKind::Note, created.id).await?;
    txn.commit().await?;

    info!(note_id = %created.id, %account_id, "Created note");
    Ok(created)
}

/// Fetches one note from the caller's account.
pub async fn find_note(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    note_id: Uuid,
) -> Result<note::Model> {
    ctx.require_authenticated()?;
    let found = load_note(db, note_id).await?;
    ctx.require_account_access(found.account_id)?;
    Ok(found)
}

/// Notes of the caller's account, in the account's list order.
pub async fn list_notes(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    account_id: Uuid,
) -> Result<Vec<note::Model>> {
    ctx.require_account_access(account_id)?;
    let order: HashMap<Uuid, usize> = links::child_ids(db, account_id, ChildKind::Note)
        .await?
        .into_iter()
        .enumerate()
        .map(|(position, id)| (id, position))
        .collect();
    let mut notes = Note::find()
        .filter(note::Column::AccountId.eq(account_id))
        .all(db)
        .await?;
    notes.sort_by_key(|n| order.get(&n.id).copied().unwrap_or(usize::MAX));
    if notes.is_empty() {
        return Err(Error::CollectionEmpty {
            entity: EntityKind::Note,
            scope: Some(account_id),
        });
    }
    Ok(notes)
}

/// Replaces a note's body and refreshes `updated_at`.
#[instrument(skip(db, ctx, changes))]
pub async fn edit_note(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    note_id: Uuid,
    changes: NoteChanges,
) -> Result<note::Model> {
    ctx.require_authenticated()?;
    let Some(body) = changes.body else {
        return Err(Error::NoFieldsProvided {
            entity: EntityKind::Note,
        });
    };
    validate_text("body", &body)?;

    let current = load_note(db, note_id).await?;
    ctx.require_account_access(current.account_id)?;
    if body != current.body {
        ensure_unique_note_body(db, current.account_id, &body, Some(current.id)).await?;
    }

    let result = Note::update_many()
        .set(note::ActiveModel {
            body: Set(body.clone()),
            updated_at: Set(Utc::now()),
            version: Set(current.version + 1),
            ..Default::default()
        })
        .filter(note::Column::Id.eq(current.id))
        .filter(note::Column::Version.eq(current.version))
        .exec(db)
        .await
        .map_err(|e| Error::from_write(EntityKind::Note, &body, e))?;
    if result.rows_affected == 0 {
        return Err(Error::UpdateFailed {
            entity: EntityKind::Note,
        });
    }

    debug!(%note_id, "Updated note");
    load_note(db, note_id).await
}

/// Deletes a note and drops it from the account's list.
#[instrument(skip(db, ctx))]
pub async fn delete_note(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    note_id: Uuid,
) -> Result<note::Model> {
    ctx.require_authenticated()?;
    let current = load_note(db, note_id).await?;
    ctx.require_account_access(current.account_id)?;

    let txn = db.begin().await?;
    links::remove_children(&txn, &[current.id]).await?;
    let result = Note::delete_many()
        .filter(note::Column::Id.eq(current.id))
        .filter(note::Column::Version.eq(current.version))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::DeleteFailed {
            entity: EntityKind::Note,
        });
    }
    txn.commit().await?;

    info!(%note_id, "Deleted note");
    Ok(current)
}

//! Code for creating the task table and managing the tasks each user owns.

use std::fmt::Display;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    upload::task_upload_path,
    user::{UserID, Username},
};

/// An alias for integer task IDs.
pub type TaskId = i64;

/// A unit of work owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// The ID of the task.
    pub id: TaskId,
    /// The ID of the user that owns the task.
    pub owner: UserID,
    /// The username of the user that owns the task.
    pub owner_username: Username,
    /// A short description of the work, between 10 and 200 characters.
    pub title: String,
    /// A longer description of the work. Empty when the task has none.
    pub description: String,
    /// The storage path of the task's attachment, if one has been uploaded.
    pub attachment: Option<String>,
    /// When the task was created.
    pub created_at: OffsetDateTime,
}

impl Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} | {}", self.owner_username, self.title)
    }
}

/// Create the task table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_task_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS task (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
            title TEXT NOT NULL
                CONSTRAINT task_title_length CHECK (length(title) BETWEEN 10 AND 200),
            description TEXT NOT NULL DEFAULT ''
                CONSTRAINT task_description_length CHECK (length(description) <= 2000),
            attachment TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_task_user_id ON task(user_id);",
    )?;

    Ok(())
}

/// Create a task owned by the user with `owner`, and insert it into the
/// database.
///
/// Pass an empty string for `description` when the task has none.
///
/// # Errors
///
/// This function will return a:
/// - [Error::InvalidTitleLength] if `title` is shorter than 10 or longer than 200 characters,
/// - [Error::DescriptionTooLong] if `description` is longer than 2000 characters,
/// - [Error::InvalidOwner] if `owner` does not refer to a registered user,
/// - or [Error::SqlError] if an SQL related error occurred.
pub fn create_task(
    owner: UserID,
    title: &str,
    description: &str,
    connection: &Connection,
) -> Result<Task, Error> {
    connection.execute(
        "INSERT INTO task (user_id, title, description, created_at) VALUES (?1, ?2, ?3, ?4)",
        (
            owner.as_i64(),
            title,
            description,
            OffsetDateTime::now_utc(),
        ),
    )?;

    get_task(connection.last_insert_rowid(), connection)
}

/// Get the task from the database with an ID equal to `id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `id` does not refer to a task in the database.
/// - there was an error trying to access the database.
pub fn get_task(id: TaskId, connection: &Connection) -> Result<Task, Error> {
    connection
        .prepare(
            "SELECT task.id, task.user_id, user.username, task.title, task.description,
                    task.attachment, task.created_at
             FROM task INNER JOIN user ON user.id = task.user_id
             WHERE task.id = :id",
        )?
        .query_row(&[(":id", &id)], map_row)
        .map_err(|error| error.into())
}

/// Retrieve the tasks owned by the user with `owner`, newest first.
///
/// Tasks created at the same instant are returned in reverse insertion order.
///
/// # Errors
///
/// This function will return an [Error::SqlError] if an SQL related error occurred.
pub fn find_tasks_by_owner(owner: UserID, connection: &Connection) -> Result<Vec<Task>, Error> {
    connection
        .prepare(
            "SELECT task.id, task.user_id, user.username, task.title, task.description,
                    task.attachment, task.created_at
             FROM task INNER JOIN user ON user.id = task.user_id
             WHERE task.user_id = :user_id
             ORDER BY task.created_at DESC, task.id DESC",
        )?
        .query_map(&[(":user_id", &owner.as_i64())], map_row)?
        .map(|maybe_task| maybe_task.map_err(|error| error.into()))
        .collect()
}

/// Record an attachment against the task with `id`.
///
/// The attachment is stored under a freshly generated path rather than
/// `original_filename`, so the stored path reveals nothing about the uploaded
/// file. Returns the updated task, whose `attachment` field holds the
/// generated path.
///
/// # Errors
///
/// This function will return an error if there is an SQL error or if the task doesn't exist.
pub fn set_task_attachment(
    id: TaskId,
    original_filename: &str,
    connection: &Connection,
) -> Result<Task, Error> {
    let stored_path = task_upload_path(original_filename);

    let rows_affected = connection.execute(
        "UPDATE task SET attachment = ?1 WHERE id = ?2",
        (&stored_path, id),
    )?;

    if rows_affected == 0 {
        return Err(Error::AttachMissingTask);
    }

    get_task(id, connection)
}

/// Delete the task with `id` from the database.
///
/// # Errors
///
/// This function will return an error if there is an SQL error or if the task doesn't exist.
pub fn delete_task(id: TaskId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM task WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingTask);
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<Task, rusqlite::Error> {
    let id = row.get(0)?;
    let owner = UserID::new(row.get(1)?);

    let raw_username: String = row.get(2)?;
    let owner_username = Username::new_unchecked(&raw_username);

    let title = row.get(3)?;
    let description = row.get(4)?;
    let attachment = row.get(5)?;
    let created_at = row.get(6)?;

    Ok(Task {
        id,
        owner,
        owner_username,
        title,
        description,
        attachment,
        created_at,
    })
}

//! Taskboard is a library for managing user accounts and the tasks they own.
//!
//! This library provides the account and task data model, the validation
//! rules for usernames, passwords, and task fields, and an SQLite layer that
//! persists both record types.

#![warn(missing_docs)]

mod db;
mod password;
mod task;
mod upload;
mod user;

pub use db::initialize as initialize_db;
pub use password::{Password, PasswordHash};
pub use task::{
    Task, TaskId, create_task, delete_task, find_tasks_by_owner, get_task, set_task_attachment,
};
pub use upload::{TASK_UPLOAD_DIR, task_upload_path};
pub use user::{
    User, UserID, Username, create_superuser, create_user, delete_user, get_user_by_id,
    get_user_by_username,
};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// An empty string was used to create a username.
    #[error("users must have an username")]
    EmptyUsername,

    /// An empty string was used to create a password.
    #[error("users must provide a password")]
    EmptyPassword,

    /// A username that does not match the required pattern was used to create
    /// a user account.
    #[error("username {0:?} must start with a/A and ends with 0/1")]
    InvalidUsername(String),

    /// A username longer than 256 characters was used to create a user
    /// account.
    #[error("username must be at most 256 characters")]
    UsernameTooLong,

    /// The username used to create a user account is already taken.
    #[error("the username is already taken")]
    DuplicateUsername,

    /// A task title shorter than 10 or longer than 200 characters was used to
    /// create a task.
    #[error("task title must be between 10 and 200 characters")]
    InvalidTitleLength,

    /// A task description longer than 2000 characters was used to create a
    /// task.
    #[error("task description must be at most 2000 characters")]
    DescriptionTooLong,

    /// The owner ID used to create a task did not match a registered user.
    #[error("the task owner does not refer to a registered user")]
    InvalidOwner,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Tried to delete a user that does not exist
    #[error("tried to delete a user that is not in the database")]
    DeleteMissingUser,

    /// Tried to delete a task that does not exist
    #[error("tried to delete a task that is not in the database")]
    DeleteMissingTask,

    /// Tried to attach a file to a task that does not exist
    #[error("tried to attach a file to a task that is not in the database")]
    AttachMissingTask,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("user.username") =>
            {
                Error::DuplicateUsername
            }
            // Code 275 occurs when a CHECK constraint failed. The check
            // constraints are named so that the failing rule can be reported.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 275 && desc.contains("user_username_length") =>
            {
                Error::UsernameTooLong
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 275 && desc.contains("task_title_length") =>
            {
                Error::InvalidTitleLength
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 275 && desc.contains("task_description_length") =>
            {
                Error::DescriptionTooLong
            }
            // Code 787 occurs when a FOREIGN KEY constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(_))
                if sql_error.extended_code == 787 =>
            {
                Error::InvalidOwner
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

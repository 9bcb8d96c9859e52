/*! Code for initialising the application's SQLite database. */

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{Error, task::create_task_table, user::create_user_table};

/// Create the application's database tables if they do not already exist.
///
/// This also turns on foreign key enforcement for `connection`, which SQLite
/// leaves off by default. Foreign keys must be enforced for deleting a user to
/// cascade to the tasks they own.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    // Foreign key enforcement is a per-connection setting and cannot be
    // changed inside a transaction, so it is applied before the tables are
    // created.
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_task_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

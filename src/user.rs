//! Code for creating the user table and managing user accounts in the database.

use std::fmt::Display;

use regex::Regex;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, Password, PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The regex pattern that usernames must match: start with 'a' or 'A' and end
/// with '0' or '1', with no whitespace in between.
const USERNAME_PATTERN: &str = r"^[aA][.^\S]*[01]$";

/// The name a user logs in with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Username(String);

impl Username {
    /// Create a username.
    ///
    /// The username pattern, length limit, and uniqueness rules are enforced
    /// when the account is written to the database, not here.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyUsername] if `username` is an empty string.
    pub fn new(username: &str) -> Result<Self, Error> {
        if username.is_empty() {
            Err(Error::EmptyUsername)
        } else {
            Ok(Self(username.to_string()))
        }
    }

    /// Create a username without validation.
    ///
    /// The caller should ensure that the string is not empty.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if the non-empty invariant is violated it will cause incorrect behaviour but not affect memory safety.
    pub fn new_unchecked(username: &str) -> Self {
        Self(username.to_string())
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user account and its authorisation flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The name the user logs in with. Unique across all accounts.
    pub username: Username,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// When the account was created. Set when the row is first written and
    /// never updated afterwards.
    pub join_date: OffsetDateTime,
    /// Whether the account can log in. New accounts are active.
    pub is_active: bool,
    /// Whether the account can access administrative pages.
    pub is_staff: bool,
    /// Whether the account bypasses permission checks.
    pub is_superuser: bool,
}

impl Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.username.fmt(f)
    }
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE
                    CONSTRAINT user_username_length CHECK (length(username) <= 256),
                password TEXT NOT NULL,
                join_date TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                is_staff INTEGER NOT NULL DEFAULT 0,
                is_superuser INTEGER NOT NULL DEFAULT 0
                )",
        (),
    )?;

    Ok(())
}

/// Create a user account with `username` and a salted hash of `password`, and
/// insert it into the database.
///
/// New accounts are active, and are not staff or superusers.
///
/// # Errors
///
/// This function will return a:
/// - [Error::EmptyUsername] if `username` is an empty string,
/// - [Error::EmptyPassword] if `password` is an empty string,
/// - [Error::InvalidUsername] if `username` does not match the username pattern,
/// - [Error::UsernameTooLong] if `username` is longer than 256 characters,
/// - [Error::DuplicateUsername] if `username` is already taken,
/// - [Error::HashingError] if `password` could not be hashed,
/// - or [Error::SqlError] if an SQL related error occurred.
pub fn create_user(username: &str, password: &str, connection: &Connection) -> Result<User, Error> {
    let username = Username::new(username)?;
    let password = Password::new(password)?;
    let password_hash = PasswordHash::new(password, PasswordHash::DEFAULT_COST)?;

    insert_user(username, password_hash, connection)
}

/// Create a user account that has the staff and superuser flags set.
///
/// The account is created the same way as [create_user] and then elevated with
/// a separate update statement, so the flags are not part of the insert.
///
/// # Errors
///
/// This function will return the same errors as [create_user].
pub fn create_superuser(
    username: &str,
    password: &str,
    connection: &Connection,
) -> Result<User, Error> {
    let user = create_user(username, password, connection)?;

    connection.execute(
        "UPDATE user SET is_staff = 1, is_superuser = 1 WHERE id = ?1",
        [user.id.as_i64()],
    )?;

    get_user_by_id(user.id, connection)
}

/// Insert a user row with `username` and `password_hash`, leaving the account
/// flags at their defaults.
///
/// # Errors
///
/// This function will return a:
/// - [Error::InvalidUsername] if `username` does not match the username pattern,
/// - [Error::UsernameTooLong] if `username` is longer than 256 characters,
/// - [Error::DuplicateUsername] if `username` is already taken,
/// - or [Error::SqlError] if an SQL related error occurred.
pub(crate) fn insert_user(
    username: Username,
    password_hash: PasswordHash,
    connection: &Connection,
) -> Result<User, Error> {
    // SQLite cannot check the username pattern, so it is enforced here before
    // the row is written.
    let pattern = Regex::new(USERNAME_PATTERN).unwrap();
    if !pattern.is_match(username.as_ref()) {
        return Err(Error::InvalidUsername(username.as_ref().to_string()));
    }

    connection.execute(
        "INSERT INTO user (username, password, join_date) VALUES (?1, ?2, ?3)",
        (
            username.as_ref(),
            password_hash.as_ref(),
            OffsetDateTime::now_utc(),
        ),
    )?;

    let id = UserID::new(connection.last_insert_rowid());

    // Read the row back so the returned user carries the database defaults.
    get_user_by_id(id, connection)
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the database.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "SELECT id, username, password, join_date, is_active, is_staff, is_superuser
             FROM user WHERE id = :id",
        )?
        .query_row(&[(":id", &user_id.as_i64())], map_row)
        .map_err(|error| error.into())
}

/// Get the user from the database with a username equal to `username`.
///
/// # Errors
///
/// This function will return an error if:
/// - `username` does not belong to a registered user.
/// - there was an error trying to access the database.
pub fn get_user_by_username(username: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "SELECT id, username, password, join_date, is_active, is_staff, is_superuser
             FROM user WHERE username = :username",
        )?
        .query_row(&[(":username", &username)], map_row)
        .map_err(|error| error.into())
}

/// Delete the user with `user_id` from the database.
///
/// Deleting a user also deletes all of the tasks they own.
///
/// # Errors
///
/// This function will return an error if there is an SQL error or if the user doesn't exist.
pub fn delete_user(user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM user WHERE id = ?1", [user_id.as_i64()])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingUser);
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<User, rusqlite::Error> {
    let id = UserID::new(row.get(0)?);

    let raw_username: String = row.get(1)?;
    let username = Username::new_unchecked(&raw_username);

    let raw_password_hash: String = row.get(2)?;
    let password_hash = PasswordHash::new_unchecked(&raw_password_hash);

    let join_date = row.get(3)?;
    let is_active = row.get(4)?;
    let is_staff = row.get(5)?;
    let is_superuser = row.get(6)?;

    Ok(User {
        id,
        username,
        password_hash,
        join_date,
        is_active,
        is_staff,
        is_superuser,
    })
}


#[cfg(test)]
mod user_query_tests {
    use rusqlite::Connection;
    use time::{Duration, OffsetDateTime};

    use crate::{
        Error, PasswordHash,
        db::initialize,
        user::{UserID, create_superuser, create_user, get_user_by_username},
    };

    use super::{User, Username, delete_user, get_user_by_id, insert_user};

    fn get_db_connection() -> Connection {
        let connection =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        initialize(&connection).expect("Could not initialise database");

        connection
    }

    fn insert_test_user(username: &str, connection: &Connection) -> User {
        insert_user(
            Username::new_unchecked(username),
            PasswordHash::new_unchecked("hunter2"),
            connection,
        )
        .expect("Could not insert test user")
    }

    #[test]
    fn create_user_succeeds() {
        let connection = get_db_connection();

        let user = create_user("alice1", "hunter2", &connection).unwrap();

        assert!(user.id.as_i64() > 0);
        assert_eq!(user.username, Username::new_unchecked("alice1"));
        assert!(user.is_active);
        assert!(!user.is_staff);
        assert!(!user.is_superuser);
    }

    #[test]
    fn create_user_does_not_store_plaintext_password() {
        let connection = get_db_connection();
        let password = "correct horse battery staple";

        let user = create_user("alice1", password, &connection).unwrap();

        assert!(user.password_hash.verify(password).unwrap());
        assert_ne!(user.password_hash.as_ref(), password);

        let json = serde_json::to_string(&user).expect("Could not serialise user");
        assert!(!json.contains(password));
    }

    #[test]
    fn create_user_fails_on_empty_username() {
        let connection = get_db_connection();

        let result = create_user("", "hunter2", &connection);

        assert_eq!(result, Err(Error::EmptyUsername));
    }

    #[test]
    fn create_user_fails_on_empty_password() {
        let connection = get_db_connection();

        let result = create_user("alice1", "", &connection);

        assert_eq!(result, Err(Error::EmptyPassword));
    }

    #[test]
    fn create_user_fails_on_duplicate_username() {
        let connection = get_db_connection();
        insert_test_user("alice1", &connection);

        let result = create_user("alice1", "hunter2", &connection);

        assert_eq!(result, Err(Error::DuplicateUsername));
    }

    #[test]
    fn insert_user_rejects_usernames_that_do_not_match_pattern() {
        let connection = get_db_connection();

        for username in ["bob1", "alice", "a b1", " "] {
            let result = insert_user(
                Username::new_unchecked(username),
                PasswordHash::new_unchecked("hunter2"),
                &connection,
            );

            assert_eq!(result, Err(Error::InvalidUsername(username.to_string())));
        }
    }

    #[test]
    fn insert_user_accepts_usernames_that_match_pattern() {
        let connection = get_db_connection();

        for username in ["a1", "A0", "a.^middle-part1"] {
            let user = insert_test_user(username, &connection);

            assert_eq!(user.username, Username::new_unchecked(username));
        }
    }

    #[test]
    fn insert_user_enforces_username_length_limit() {
        let connection = get_db_connection();

        let longest_valid_username = format!("a{}1", "b".repeat(254));
        assert!(
            insert_user(
                Username::new_unchecked(&longest_valid_username),
                PasswordHash::new_unchecked("hunter2"),
                &connection,
            )
            .is_ok()
        );

        let overlong_username = format!("a{}1", "b".repeat(255));
        let result = insert_user(
            Username::new_unchecked(&overlong_username),
            PasswordHash::new_unchecked("hunter2"),
            &connection,
        );

        assert_eq!(result, Err(Error::UsernameTooLong));
    }

    #[test]
    fn create_superuser_sets_staff_and_superuser_flags() {
        let connection = get_db_connection();

        let superuser = create_superuser("admin0", "hunter2", &connection).unwrap();

        assert!(superuser.is_active);
        assert!(superuser.is_staff);
        assert!(superuser.is_superuser);
        assert_eq!(
            Ok(superuser.clone()),
            get_user_by_id(superuser.id, &connection)
        );
    }

    #[test]
    fn join_date_is_set_when_user_is_inserted() {
        let connection = get_db_connection();

        let user = insert_test_user("alice1", &connection);

        let elapsed = OffsetDateTime::now_utc() - user.join_date;
        assert!(
            elapsed >= Duration::ZERO && elapsed < Duration::minutes(1),
            "Want join date within the last minute, got {}",
            user.join_date
        );
    }

    #[test]
    fn get_user_by_id_fails_with_non_existent_id() {
        let connection = get_db_connection();

        let result = get_user_by_id(UserID::new(42), &connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn get_user_by_username_succeeds() {
        let connection = get_db_connection();
        let inserted_user = insert_test_user("alice1", &connection);

        let retrieved_user = get_user_by_username("alice1", &connection);

        assert_eq!(Ok(inserted_user), retrieved_user);
    }

    #[test]
    fn get_user_by_username_fails_with_unknown_username() {
        let connection = get_db_connection();
        insert_test_user("alice1", &connection);

        let result = get_user_by_username("annie0", &connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn delete_user_succeeds() {
        let connection = get_db_connection();
        let user = insert_test_user("alice1", &connection);

        assert_eq!(Ok(()), delete_user(user.id, &connection));
        assert_eq!(Err(Error::NotFound), get_user_by_id(user.id, &connection));
    }

    #[test]
    fn delete_user_fails_with_non_existent_id() {
        let connection = get_db_connection();

        let result = delete_user(UserID::new(42), &connection);

        assert_eq!(result, Err(Error::DeleteMissingUser));
    }

    #[test]
    fn user_display_shows_username() {
        let connection = get_db_connection();

        let user = insert_test_user("alice1", &connection);

        assert_eq!("alice1", user.to_string());
    }
}

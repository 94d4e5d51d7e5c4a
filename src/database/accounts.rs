use super::store::{Account, AccountStore, StoreError};
use super::{is_constraint_violation, now_timestamp, Database};
use async_trait::async_trait;
use sqlite::{Connection, State};

pub(super) fn insert_account(
    conn: &Connection,
    email: &str,
    password_hash: &str,
) -> Result<i64, StoreError> {
    let created_at = now_timestamp();
    let mut statement = conn.prepare(
        "INSERT INTO users (email, password_hash, subscribed, created_at) VALUES (?, ?, 0, ?)",
    )?;
    statement.bind((1, email))?;
    statement.bind((2, password_hash))?;
    statement.bind((3, created_at.as_str()))?;

    match statement.next() {
        Ok(_) => {}
        Err(e) if is_constraint_violation(&e) => {
            return Err(StoreError::DuplicateAccount(email.to_string()))
        }
        Err(e) => return Err(e.into()),
    }

    let mut statement = conn.prepare("SELECT id FROM users WHERE email = ?")?;
    statement.bind((1, email))?;
    match statement.next()? {
        State::Row => Ok(statement.read::<i64, _>(0)?),
        State::Done => Err(StoreError::NoSuchAccount(email.to_string())),
    }
}

pub(super) fn account_exists(conn: &Connection, email: &str) -> Result<bool, StoreError> {
    let mut statement = conn.prepare("SELECT 1 FROM users WHERE email = ?")?;
    statement.bind((1, email))?;
    Ok(statement.next()? == State::Row)
}

fn select_account(conn: &Connection, email: &str) -> Result<Option<Account>, StoreError> {
    let mut statement =
        conn.prepare("SELECT id, email, password_hash, subscribed FROM users WHERE email = ?")?;
    statement.bind((1, email))?;

    if statement.next()? == State::Done {
        return Ok(None);
    }

    Ok(Some(Account {
        id: statement.read::<i64, _>("id")?,
        email: statement.read::<String, _>("email")?,
        password_hash: statement.read::<String, _>("password_hash")?,
        subscribed: statement.read::<i64, _>("subscribed")? != 0,
    }))
}

#[async_trait]
impl AccountStore for Database {
    async fn add_account(&self, email: &str, password_hash: &str) -> Result<i64, StoreError> {
        let conn = self.conn.lock().await;
        insert_account(&conn, email, password_hash)
    }

    async fn account_exists(&self, email: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        account_exists(&conn, email)
    }

    async fn get_account(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let conn = self.conn.lock().await;
        select_account(&conn, email)
    }

    async fn credentials_match(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        let mut statement =
            conn.prepare("SELECT 1 FROM users WHERE email = ? AND password_hash = ?")?;
        statement.bind((1, email))?;
        statement.bind((2, password_hash))?;
        Ok(statement.next()? == State::Row)
    }

    async fn set_subscribed(&self, email: &str, subscribed: bool) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let mut statement = conn.prepare("UPDATE users SET subscribed = ? WHERE email = ?")?;
        statement.bind((1, i64::from(subscribed)))?;
        statement.bind((2, email))?;
        statement.next()?;
        drop(statement);

        // Matched rows count even when the flag already had this value
        if conn.change_count() == 0 {
            return Err(StoreError::NoSuchAccount(email.to_string()));
        }
        Ok(())
    }

    async fn list_subscribed_emails(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock().await;
        let mut statement =
            conn.prepare("SELECT email FROM users WHERE subscribed = 1 ORDER BY id")?;

        let mut emails = Vec::new();
        while statement.next()? == State::Row {
            emails.push(statement.read::<String, _>(0)?);
        }
        Ok(emails)
    }
}

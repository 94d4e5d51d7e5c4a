use super::accounts::insert_account;
use super::store::{PendingRegistration, PendingRegistrationStore, RedeemError, StoreError};
use super::{
    format_timestamp, is_constraint_violation, new_token, now_timestamp, transaction, Database,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use sqlite::{Connection, State};
use std::time::Duration;

fn select_by_token(
    conn: &Connection,
    token: &str,
) -> Result<Option<PendingRegistration>, StoreError> {
    let mut statement =
        conn.prepare("SELECT email, password_hash, token FROM unverified_users WHERE token = ?")?;
    statement.bind((1, token))?;

    if statement.next()? == State::Done {
        return Ok(None);
    }

    Ok(Some(PendingRegistration {
        email: statement.read::<String, _>("email")?,
        password_hash: statement.read::<String, _>("password_hash")?,
        token: statement.read::<String, _>("token")?,
    }))
}

/// Returns the number of rows removed (0 or 1).
fn delete_by_token(conn: &Connection, token: &str) -> Result<usize, StoreError> {
    let mut statement = conn.prepare("DELETE FROM unverified_users WHERE token = ?")?;
    statement.bind((1, token))?;
    statement.next()?;
    drop(statement);
    Ok(conn.change_count())
}

fn delete_created_before(conn: &Connection, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
    let cutoff = format_timestamp(cutoff);
    let mut statement = conn.prepare("DELETE FROM unverified_users WHERE created_at < ?")?;
    statement.bind((1, cutoff.as_str()))?;
    statement.next()?;
    drop(statement);
    Ok(conn.change_count())
}

#[async_trait]
impl PendingRegistrationStore for Database {
    async fn token_exists(&self, token: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        Ok(select_by_token(&conn, token)?.is_some())
    }

    async fn has_token(&self, email: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        let mut statement = conn.prepare("SELECT 1 FROM unverified_users WHERE email = ?")?;
        statement.bind((1, email))?;
        Ok(statement.next()? == State::Row)
    }

    async fn create_token(&self, email: &str, password_hash: &str) -> Result<String, StoreError> {
        let conn = self.conn.lock().await;
        let token = new_token();
        let created_at = now_timestamp();

        let mut statement = conn.prepare(
            "INSERT INTO unverified_users (email, password_hash, token, created_at) \
             VALUES (?, ?, ?, ?)",
        )?;
        statement.bind((1, email))?;
        statement.bind((2, password_hash))?;
        statement.bind((3, token.as_str()))?;
        statement.bind((4, created_at.as_str()))?;

        match statement.next() {
            Ok(_) => Ok(token),
            Err(e) if is_constraint_violation(&e) => {
                Err(StoreError::PendingRegistrationExists(email.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn refresh_token(&self, email: &str, password_hash: &str) -> Result<String, StoreError> {
        let conn = self.conn.lock().await;
        let token = new_token();
        let created_at = now_timestamp();

        let mut statement = conn.prepare(
            "UPDATE unverified_users SET token = ?, password_hash = ?, created_at = ? \
             WHERE email = ?",
        )?;
        statement.bind((1, token.as_str()))?;
        statement.bind((2, password_hash))?;
        statement.bind((3, created_at.as_str()))?;
        statement.bind((4, email))?;
        statement.next()?;
        drop(statement);

        if conn.change_count() == 0 {
            return Err(StoreError::NoPendingRegistration(email.to_string()));
        }
        Ok(token)
    }

    async fn delete_token(&self, token: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        match delete_by_token(&conn, token)? {
            0 => Err(StoreError::UnknownToken),
            _ => Ok(()),
        }
    }

    async fn resolve_token(&self, token: &str) -> Result<Option<PendingRegistration>, StoreError> {
        let conn = self.conn.lock().await;
        select_by_token(&conn, token)
    }

    async fn redeem_token(&self, token: &str) -> Result<PendingRegistration, RedeemError> {
        let conn = self.conn.lock().await;

        transaction(&conn, |conn| {
            let pending = select_by_token(conn, token)?.ok_or(RedeemError::InvalidToken)?;

            match delete_by_token(conn, token) {
                Ok(1) => {}
                Ok(_) => return Err(RedeemError::DeletionFailed(StoreError::UnknownToken)),
                Err(e) => return Err(RedeemError::DeletionFailed(e)),
            }

            insert_account(conn, &pending.email, &pending.password_hash)
                .map_err(RedeemError::AccountCreationFailed)?;

            debug!("Promoted pending registration for {}", pending.email);
            Ok(pending)
        })
    }

    async fn purge_stale(&self, older_than: Duration) -> Result<usize, StoreError> {
        let cutoff = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let conn = self.conn.lock().await;
        delete_created_before(&conn, cutoff)
    }
}

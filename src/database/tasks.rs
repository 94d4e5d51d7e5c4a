use super::store::{StoreError, TaskListItem, TaskStore};
use super::{is_constraint_violation, transaction, Database};
use async_trait::async_trait;
use sqlite::{Connection, State};

fn next_position(conn: &Connection, email: &str) -> Result<i64, StoreError> {
    let mut statement =
        conn.prepare("SELECT COALESCE(MAX(position), 0) + 1 FROM tasks WHERE email = ?")?;
    statement.bind((1, email))?;
    statement.next()?;
    Ok(statement.read::<i64, _>(0)?)
}

#[async_trait]
impl TaskStore for Database {
    async fn list_tasks(&self, email: &str) -> Result<Vec<TaskListItem>, StoreError> {
        let conn = self.conn.lock().await;
        let mut statement =
            conn.prepare("SELECT position, value FROM tasks WHERE email = ? ORDER BY position")?;
        statement.bind((1, email))?;

        let mut items = Vec::new();
        while statement.next()? == State::Row {
            items.push(TaskListItem {
                position: statement.read::<i64, _>(0)?,
                value: statement.read::<String, _>(1)?,
            });
        }
        Ok(items)
    }

    async fn add_task(&self, email: &str, value: &str) -> Result<TaskListItem, StoreError> {
        let conn = self.conn.lock().await;
        let position = next_position(&conn, email)?;

        let mut statement =
            conn.prepare("INSERT INTO tasks (email, position, value) VALUES (?, ?, ?)")?;
        statement.bind((1, email))?;
        statement.bind((2, position))?;
        statement.bind((3, value))?;

        match statement.next() {
            Ok(_) => Ok(TaskListItem {
                position,
                value: value.to_string(),
            }),
            // Foreign key: tasks only belong to confirmed accounts
            Err(e) if is_constraint_violation(&e) => {
                Err(StoreError::NoSuchAccount(email.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_task(&self, email: &str, position: i64) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;

        transaction(&conn, |conn| {
            let mut statement = conn.prepare("DELETE FROM tasks WHERE email = ? AND position = ?")?;
            statement.bind((1, email))?;
            statement.bind((2, position))?;
            statement.next()?;
            drop(statement);

            if conn.change_count() == 0 {
                return Ok(false);
            }

            let mut statement = conn.prepare(
                "UPDATE tasks SET position = position - 1 WHERE email = ? AND position > ?",
            )?;
            statement.bind((1, email))?;
            statement.bind((2, position))?;
            statement.next()?;
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::AccountStore;

    async fn db_with_account() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        db.add_account("a@x.com", "digest").await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_tasks_are_appended_in_order() {
        let db = db_with_account().await;

        db.add_task("a@x.com", "buy milk").await.unwrap();
        let second = db.add_task("a@x.com", "call mom").await.unwrap();

        assert_eq!(second.position, 2);
        let items = db.list_tasks("a@x.com").await.unwrap();
        assert_eq!(
            items,
            vec![
                TaskListItem {
                    position: 1,
                    value: "buy milk".into()
                },
                TaskListItem {
                    position: 2,
                    value: "call mom".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_remove_renumbers() {
        let db = db_with_account().await;
        for value in ["one", "two", "three"] {
            db.add_task("a@x.com", value).await.unwrap();
        }

        assert!(db.remove_task("a@x.com", 1).await.unwrap());
        assert!(!db.remove_task("a@x.com", 7).await.unwrap());

        let items = db.list_tasks("a@x.com").await.unwrap();
        let positions: Vec<i64> = items.iter().map(|i| i.position).collect();
        let values: Vec<&str> = items.iter().map(|i| i.value.as_str()).collect();
        assert_eq!(positions, vec![1, 2]);
        assert_eq!(values, vec!["two", "three"]);

        let added = db.add_task("a@x.com", "four").await.unwrap();
        assert_eq!(added.position, 3);
    }

    #[tokio::test]
    async fn test_lists_are_per_account() {
        let db = db_with_account().await;
        db.add_account("b@x.com", "digest").await.unwrap();
        db.add_task("a@x.com", "mine").await.unwrap();

        assert!(db.list_tasks("b@x.com").await.unwrap().is_empty());
        assert!(!db.remove_task("b@x.com", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_task_requires_account() {
        let db = Database::open_in_memory().await.unwrap();
        let err = db.add_task("ghost@x.com", "boo").await.unwrap_err();
        assert!(matches!(err, StoreError::NoSuchAccount(_)));
    }
}

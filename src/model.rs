use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{query, query_as, SqliteConnection, SqliteExecutor};

use crate::{
    hashid::HashidCodec,
    schema::{TaskFields, TaskGroup},
};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub api_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub async fn create(
        executor: impl SqliteExecutor<'_>,
        username: &str,
        api_token: &str,
    ) -> Result<Self, sqlx::Error> {
        query_as::<_, User>(
            "INSERT INTO users (username, api_token, created_at) VALUES (?, ?, ?) \
             RETURNING id, username, api_token, created_at",
        )
        .bind(username)
        .bind(api_token)
        .bind(Utc::now())
        .fetch_one(executor)
        .await
    }

    pub async fn find(
        executor: impl SqliteExecutor<'_>,
        id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        query_as::<_, User>("SELECT id, username, api_token, created_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_username(
        executor: impl SqliteExecutor<'_>,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        query_as::<_, User>(
            "SELECT id, username, api_token, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_token(
        executor: impl SqliteExecutor<'_>,
        api_token: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        query_as::<_, User>(
            "SELECT id, username, api_token, created_at FROM users WHERE api_token = ?",
        )
        .bind(api_token)
        .fetch_optional(executor)
        .await
    }

    pub async fn set_token(
        executor: impl SqliteExecutor<'_>,
        id: i64,
        api_token: &str,
    ) -> Result<(), sqlx::Error> {
        query("UPDATE users SET api_token = ? WHERE id = ?")
            .bind(api_token)
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }
}

/// The authenticated principal of one API request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

/// A browser login written by the UI.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub session_key: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub async fn create(
        executor: impl SqliteExecutor<'_>,
        session_key: &str,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        query_as::<_, Session>(
            "INSERT INTO sessions (session_key, user_id, expires_at) VALUES (?, ?, ?) \
             RETURNING session_key, user_id, expires_at",
        )
        .bind(session_key)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(executor)
        .await
    }

    pub async fn find(
        executor: impl SqliteExecutor<'_>,
        session_key: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        query_as::<_, Session>(
            "SELECT session_key, user_id, expires_at FROM sessions WHERE session_key = ?",
        )
        .bind(session_key)
        .fetch_optional(executor)
        .await
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Task {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub description: String,
    pub due_on: Option<NaiveDate>,
    pub show_on: Option<NaiveDate>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Public representation of a task.
#[derive(Debug, Serialize)]
pub struct TaskView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub due_on: Option<NaiveDate>,
    pub show_on: Option<NaiveDate>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub async fn insert(
        executor: impl SqliteExecutor<'_>,
        owner_id: i64,
        fields: &TaskFields,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        query_as::<_, Task>(
            "INSERT INTO tasks (owner_id, title, description, due_on, show_on, completed, completed_at, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING id, owner_id, title, description, due_on, show_on, completed, completed_at, created_at",
        )
        .bind(owner_id)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.due_on)
        .bind(fields.show_on)
        .bind(fields.completed)
        .bind(fields.completed.then_some(now))
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Only ever finds tasks belonging to `owner_id`.
    pub async fn find_owned(
        executor: impl SqliteExecutor<'_>,
        owner_id: i64,
        id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        query_as::<_, Task>(
            "SELECT id, owner_id, title, description, due_on, show_on, completed, completed_at, created_at \
             FROM tasks WHERE id = ? AND owner_id = ?",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(executor)
        .await
    }

    /// Like `find_owned`, but as a no-op write: inside a transaction the
    /// first statement takes SQLite's write lock, so concurrent writers wait
    /// on the busy timeout instead of failing to upgrade a read lock.
    pub async fn lock_owned(
        executor: impl SqliteExecutor<'_>,
        owner_id: i64,
        id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        query_as::<_, Task>(
            "UPDATE tasks SET title = title WHERE id = ? AND owner_id = ? \
             RETURNING id, owner_id, title, description, due_on, show_on, completed, completed_at, created_at",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn list_owned(
        executor: impl SqliteExecutor<'_>,
        owner_id: i64,
        group: Option<TaskGroup>,
        today: NaiveDate,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let filter = match group {
            None => "",
            Some(TaskGroup::Current) => "AND completed = 0 AND (show_on IS NULL OR show_on <= ?)",
            Some(TaskGroup::Future) => "AND completed = 0 AND show_on > ?",
            Some(TaskGroup::Complete) => "AND completed = 1",
        };
        let sql = format!(
            "SELECT id, owner_id, title, description, due_on, show_on, completed, completed_at, created_at \
             FROM tasks WHERE owner_id = ? {filter} ORDER BY id"
        );

        let mut tasks = query_as::<_, Task>(&sql).bind(owner_id);
        if matches!(group, Some(TaskGroup::Current | TaskGroup::Future)) {
            tasks = tasks.bind(today);
        }
        tasks.fetch_all(executor).await
    }

    pub async fn update(
        executor: impl SqliteExecutor<'_>,
        id: i64,
        fields: &TaskFields,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Self, sqlx::Error> {
        query_as::<_, Task>(
            "UPDATE tasks SET title = ?, description = ?, due_on = ?, show_on = ?, completed = ?, completed_at = ? \
             WHERE id = ? \
             RETURNING id, owner_id, title, description, due_on, show_on, completed, completed_at, created_at",
        )
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.due_on)
        .bind(fields.show_on)
        .bind(fields.completed)
        .bind(completed_at)
        .bind(id)
        .fetch_one(executor)
        .await
    }

    pub async fn delete(executor: impl SqliteExecutor<'_>, id: i64) -> Result<u64, sqlx::Error> {
        let result = query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub fn fields(&self) -> TaskFields {
        TaskFields {
            title: self.title.clone(),
            description: self.description.clone(),
            due_on: self.due_on,
            show_on: self.show_on,
            completed: self.completed,
        }
    }

    /// Completion timestamp after `fields` replace the stored values.
    pub fn completed_at_after(&self, fields: &TaskFields, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match (self.completed, fields.completed) {
            (_, false) => None,
            (false, true) => Some(now),
            (true, true) => self.completed_at.or(Some(now)),
        }
    }

    pub fn to_view(&self, hashids: &HashidCodec) -> TaskView {
        TaskView {
            id: hashids.encode(self.id),
            title: self.title.clone(),
            description: self.description.clone(),
            due_on: self.due_on,
            show_on: self.show_on,
            completed: self.completed,
            completed_at: self.completed_at,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Note {
    pub id: i64,
    pub task_id: i64,
    pub text: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct NoteView {
    pub task: String,
    pub text: String,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub async fn get_or_create(
        conn: &mut SqliteConnection,
        task_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        query("INSERT INTO notes (task_id, text, updated_at) VALUES (?, '', ?) ON CONFLICT (task_id) DO NOTHING")
            .bind(task_id)
            .bind(now)
            .execute(&mut *conn)
            .await?;

        query_as::<_, Note>("SELECT id, task_id, text, updated_at FROM notes WHERE task_id = ?")
            .bind(task_id)
            .fetch_one(&mut *conn)
            .await
    }

    pub async fn update_text(
        executor: impl SqliteExecutor<'_>,
        id: i64,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        query_as::<_, Note>(
            "UPDATE notes SET text = ?, updated_at = ? WHERE id = ? RETURNING id, task_id, text, updated_at",
        )
        .bind(text)
        .bind(now)
        .bind(id)
        .fetch_one(executor)
        .await
    }

    pub fn to_view(&self, hashids: &HashidCodec) -> NoteView {
        NoteView {
            task: hashids.encode(self.task_id),
            text: self.text.clone(),
            updated_at: self.updated_at,
        }
    }
}

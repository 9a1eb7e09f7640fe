use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Pool, Sqlite};

const SCHEMA: [&str; 5] = [
    r#"CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        api_token TEXT UNIQUE,
        created_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS sessions (
        session_key TEXT PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        expires_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        due_on TEXT,
        show_on TEXT,
        completed BOOLEAN NOT NULL DEFAULT 0,
        completed_at TEXT,
        created_at TEXT NOT NULL
    );"#,
    "CREATE INDEX IF NOT EXISTS tasks_owner_id ON tasks (owner_id);",
    r#"CREATE TABLE IF NOT EXISTS notes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        task_id INTEGER NOT NULL UNIQUE REFERENCES tasks (id) ON DELETE CASCADE,
        text TEXT NOT NULL DEFAULT '',
        updated_at TEXT NOT NULL
    );"#,
];

/// Opens the pool, creating the database file and tables on first run.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<Pool<Sqlite>, sqlx::Error> {
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        tracing::info!(database_url, "creating database");
        Sqlite::create_database(database_url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    tracing::info!(database_url, "connected to the database");

    create_tables(&pool).await?;
    Ok(pool)
}

pub async fn create_tables(pool: &Pool<Sqlite>) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::debug!("tables ready");
    Ok(())
}

/// A private in-memory database for tests. One connection that never idles
/// out, because every SQLite memory connection is its own database.
#[cfg(test)]
pub async fn memory_pool() -> Pool<Sqlite> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    create_tables(&pool).await.unwrap();
    pool
}

use sqlx::SqliteConnection;

use crate::{error::ApiError, hashid::HashidCodec, model::CurrentUser, model::Task};

/// Finds a task by its public id among the caller's own tasks. Undecodable
/// ids, missing rows and other people's tasks all come back as `NotFound`.
pub async fn task_or_404(
    conn: &mut SqliteConnection,
    hashids: &HashidCodec,
    user: &CurrentUser,
    hashid: &str,
) -> Result<Task, ApiError> {
    let id = hashids.decode(hashid).ok_or(ApiError::NotFound)?;
    Task::find_owned(conn, user.id, id)
        .await?
        .ok_or(ApiError::NotFound)
}

/// `task_or_404` for handlers that go on to write: the lookup itself locks
/// the database for writing, so it must be the first statement of the
/// transaction.
pub async fn task_for_update(
    conn: &mut SqliteConnection,
    hashids: &HashidCodec,
    user: &CurrentUser,
    hashid: &str,
) -> Result<Task, ApiError> {
    let id = hashids.decode(hashid).ok_or(ApiError::NotFound)?;
    Task::lock_owned(conn, user.id, id)
        .await?
        .ok_or(ApiError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::memory_pool, model::User, schema::TaskFields};
    use chrono::Utc;

    fn fields(title: &str) -> TaskFields {
        TaskFields {
            title: title.to_owned(),
            description: String::new(),
            due_on: None,
            show_on: None,
            completed: false,
        }
    }

    #[tokio::test]
    async fn finds_only_the_callers_tasks() {
        let pool = memory_pool().await;
        let hashids = HashidCodec::new("test");
        let ada: CurrentUser = User::create(&pool, "ada", "a").await.unwrap().into();
        let bob: CurrentUser = User::create(&pool, "bob", "b").await.unwrap().into();
        let task = Task::insert(&pool, ada.id, &fields("mine"), Utc::now()).await.unwrap();
        let hashid = hashids.encode(task.id);
        let mut conn = pool.acquire().await.unwrap();

        let found = task_or_404(&mut conn, &hashids, &ada, &hashid).await.unwrap();
        assert_eq!(found.title, "mine");

        let foreign = task_or_404(&mut conn, &hashids, &bob, &hashid).await;
        assert!(matches!(foreign, Err(ApiError::NotFound)));
    }

    #[tokio::test]
    async fn locking_lookup_is_scoped_the_same_way() {
        let pool = memory_pool().await;
        let hashids = HashidCodec::new("test");
        let ada: CurrentUser = User::create(&pool, "ada", "a").await.unwrap().into();
        let bob: CurrentUser = User::create(&pool, "bob", "b").await.unwrap().into();
        let task = Task::insert(&pool, ada.id, &fields("mine"), Utc::now()).await.unwrap();
        let hashid = hashids.encode(task.id);
        let mut tx = pool.begin().await.unwrap();

        let found = task_for_update(&mut tx, &hashids, &ada, &hashid).await.unwrap();
        assert_eq!(found.title, "mine");
        assert_eq!(found.created_at, task.created_at);

        let foreign = task_for_update(&mut tx, &hashids, &bob, &hashid).await;
        assert!(matches!(foreign, Err(ApiError::NotFound)));
        let garbled = task_for_update(&mut tx, &hashids, &ada, "nope").await;
        assert!(matches!(garbled, Err(ApiError::NotFound)));
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn bad_ids_are_not_found() {
        let pool = memory_pool().await;
        let hashids = HashidCodec::new("test");
        let ada: CurrentUser = User::create(&pool, "ada", "a").await.unwrap().into();
        let mut conn = pool.acquire().await.unwrap();

        for hashid in ["", "1", "zzzzzzzzzzz", hashids.encode(999).as_str()] {
            let result = task_or_404(&mut conn, &hashids, &ada, hashid).await;
            assert!(matches!(result, Err(ApiError::NotFound)), "{hashid}");
        }
    }
}

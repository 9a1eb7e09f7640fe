//! Personal task tracking over a token-authenticated JSON API.

use sqlx::{Pool, Sqlite};

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod hashid;
pub mod lookup;
pub mod middleware;
pub mod model;
pub mod route;
pub mod schema;

// Struct representing the application state
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub hashids: hashid::HashidCodec,
    pub session_cookie: String,
    pub max_body_bytes: usize,
}

use std::{net::SocketAddr, sync::Arc};

use anyhow::{bail, Context};
use axum::Server;
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use sqlx::{Pool, Sqlite};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use busyb::{
    auth::generate_secret,
    config::Config,
    db,
    hashid::HashidCodec,
    model::{Session, User},
    route::create_app,
    AppState,
};

#[derive(Parser)]
#[command(name = "busyb")]
#[command(about = "Personal task tracker API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (the default)
    Serve,
    /// Create a user and print their API token
    CreateUser { username: String },
    /// Replace a user's API token and print the new one
    RotateToken { username: String },
    /// Open a browser session for a user and print the session key
    OpenSession {
        username: String,
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
}

// Entry point of the application
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let pool = db::connect(&config.database_url, config.max_connections)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, pool).await,
        Commands::CreateUser { username } => {
            let user = User::create(&pool, &username, &generate_secret()?).await?;
            tracing::info!(user = user.id, "user created");
            print_token(&user.username, &user.api_token.unwrap_or_default());
            Ok(())
        }
        Commands::RotateToken { username } => {
            let user = find_user(&pool, &username).await?;
            let token = generate_secret()?;
            User::set_token(&pool, user.id, &token).await?;
            tracing::info!(user = user.id, "api token rotated");
            print_token(&user.username, &token);
            Ok(())
        }
        Commands::OpenSession { username, hours } => {
            let user = find_user(&pool, &username).await?;
            let Some(expires_at) = session_expiry(Utc::now(), hours) else {
                bail!("--hours {hours} is out of range");
            };
            let session = Session::create(&pool, &generate_secret()?, user.id, expires_at).await?;
            println!("{}={}", config.session_cookie, session.session_key);
            println!("expires {}", session.expires_at);
            Ok(())
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("busyb=debug,tower_http=debug,info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn find_user(pool: &Pool<Sqlite>, username: &str) -> anyhow::Result<User> {
    match User::find_by_username(pool, username).await? {
        Some(user) => Ok(user),
        None => bail!("no user named {username}"),
    }
}

fn session_expiry(now: DateTime<Utc>, hours: i64) -> Option<DateTime<Utc>> {
    now.checked_add_signed(Duration::try_hours(hours)?)
}

fn print_token(username: &str, token: &str) {
    println!("{username}: Authorization: Token {token}");
}

async fn serve(config: Config, pool: Pool<Sqlite>) -> anyhow::Result<()> {
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_address()))?;

    let app_state = Arc::new(AppState {
        db: pool,
        hashids: HashidCodec::new(&config.hashid_salt),
        session_cookie: config.session_cookie.clone(),
        max_body_bytes: config.max_body_bytes,
    });
    let app = create_app(app_state, config.cors_origin.clone());

    tracing::info!("busyb listening on http://{addr}");
    Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn session_expiry_is_hours_from_now() {
        let now = Utc::now();
        assert_eq!(session_expiry(now, 24), Some(now + Duration::hours(24)));
    }

    #[rstest]
    #[case(9_999_999_999_999)]
    #[case(i64::MAX)]
    #[case(i64::MIN)]
    fn out_of_range_session_length_is_refused(#[case] hours: i64) {
        assert_eq!(session_expiry(Utc::now(), hours), None);
    }
}

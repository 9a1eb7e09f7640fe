use axum::http::{
    header::{AUTHORIZATION, COOKIE},
    HeaderMap,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use ring::rand::{SecureRandom, SystemRandom};
use sqlx::{Pool, Sqlite};
use thiserror::Error;

use crate::model::{CurrentUser, Session, User};

const TOKEN_SCHEME: &str = "Token ";
const SECRET_BYTES: usize = 30;

#[derive(Debug, Error)]
#[error("system randomness is unavailable")]
pub struct RandomnessUnavailable;

/// A fresh API token or session key.
pub fn generate_secret() -> Result<String, RandomnessUnavailable> {
    let mut bytes = [0u8; SECRET_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| RandomnessUnavailable)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    User(CurrentUser),
    Anonymous,
}

impl Identity {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

/// Credential carried by an `Authorization: Token <credential>` header value.
pub fn token_credential(header: &str) -> Option<&str> {
    header
        .strip_prefix(TOKEN_SCHEME)
        .filter(|credential| !credential.is_empty())
}

pub fn session_key<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Resolves the caller from a live session cookie, then from a token header.
/// Unknown sessions and tokens fall through to `Anonymous`.
pub async fn resolve_identity(
    pool: &Pool<Sqlite>,
    headers: &HeaderMap,
    cookie_name: &str,
) -> Result<Identity, sqlx::Error> {
    if let Some(key) = session_key(headers, cookie_name) {
        match Session::find(pool, key).await? {
            Some(session) if session.is_live(Utc::now()) => {
                if let Some(user) = User::find(pool, session.user_id).await? {
                    return Ok(Identity::User(user.into()));
                }
            }
            Some(_) => tracing::debug!("session expired"),
            None => tracing::debug!("unknown session"),
        }
    }

    let Some(header) = headers.get(AUTHORIZATION) else {
        tracing::debug!("no credentials supplied");
        return Ok(Identity::Anonymous);
    };
    let Some(credential) = header.to_str().ok().and_then(token_credential) else {
        tracing::debug!("unsupported authorization scheme");
        return Ok(Identity::Anonymous);
    };

    match User::find_by_token(pool, credential).await? {
        Some(user) => Ok(Identity::User(user.into())),
        None => {
            tracing::debug!("unknown api token");
            Ok(Identity::Anonymous)
        }
    }
}

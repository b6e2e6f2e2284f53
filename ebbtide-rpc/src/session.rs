//! Session token handshake and Basic-auth gate.
//!
//! Transmission clients expect a CSRF-style dance: any request without the
//! current session token is answered 409 carrying a fresh token in the
//! `X-Transmission-Session-Id` header, and the client retries with it.

use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use parking_lot::Mutex;
use rand::distr::Alphanumeric;
use rand::{Rng, rng};

use ebbtide_core::config::RpcConfig;

/// Header carrying the session token, both directions.
pub const SESSION_HEADER: &str = "x-transmission-session-id";

const TOKEN_LENGTH: usize = 48;

/// Process-lifetime session token state.
///
/// A single current token is valid at a time; any mismatch re-mints it.
/// One local automation client is the design assumption, so the token churn
/// from competing clients is accepted.
#[derive(Debug, Default)]
pub struct SessionTokens {
    current: Mutex<Option<String>>,
}

impl SessionTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// The token a passing request presented. Empty until the first
    /// handshake completes.
    pub fn current(&self) -> Option<String> {
        self.current.lock().clone()
    }

    /// Validates the presented token, minting a fresh one on mismatch.
    ///
    /// Returns the fresh token as `Err` so the caller can attach it to the
    /// 409 response.
    pub fn check(&self, presented: Option<&str>) -> Result<(), String> {
        let mut current = self.current.lock();
        match (&*current, presented) {
            (Some(token), Some(presented)) if token == presented => Ok(()),
            _ => {
                let fresh = mint_token();
                *current = Some(fresh.clone());
                Err(fresh)
            }
        }
    }
}

fn mint_token() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Enforces the session handshake; answers the 409 renewal on mismatch.
pub fn check_session(tokens: &SessionTokens, headers: &HeaderMap) -> Result<(), Response> {
    let presented = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok());
    match tokens.check(presented) {
        Ok(()) => Ok(()),
        Err(fresh) => {
            tracing::debug!("session token mismatch, renewing");
            Err((StatusCode::CONFLICT, [(SESSION_HEADER, fresh)], "").into_response())
        }
    }
}

/// Enforces Basic auth when credentials are configured.
///
/// Auth is checked before the session handshake, so an unauthorized client
/// never learns a valid token.
pub fn check_basic_auth(config: &RpcConfig, headers: &HeaderMap) -> Result<(), Response> {
    let (Some(username), Some(password)) = (&config.username, &config.password) else {
        return Ok(());
    };

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .and_then(|encoded| BASE64.decode(encoded.trim()).ok())
        .and_then(|decoded| String::from_utf8(decoded).ok())
        .and_then(|credentials| {
            credentials
                .split_once(':')
                .map(|(user, pass)| user == username && pass == password)
        })
        .unwrap_or(false);

    if authorized {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Basic realm=\"Transmission\"")],
            "401: Unauthorized",
        )
            .into_response())
    }
}

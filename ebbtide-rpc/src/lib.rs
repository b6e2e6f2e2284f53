//! Ebbtide RPC - Transmission-compatible protocol facade
//!
//! Exposes the reconciler to Transmission-speaking automation clients over
//! a single HTTP endpoint: Basic-auth gate, `X-Transmission-Session-Id`
//! handshake with 409 renewal, then JSON method dispatch. Foreign numeric
//! ids are positional (the snapshot ordinal); the durable identity rides in
//! `hashString`.

pub mod methods;
pub mod server;
pub mod session;

// Re-export main types
pub use server::{AppState, router, run_server};
pub use session::{SESSION_HEADER, SessionTokens};

//! Typed query-layer error (§7). `BadParameter` maps to 400 and
//! `Storage` to 500 in `api::routes`, mirroring the teacher's
//! `.map_err(|_| StatusCode::BAD_REQUEST)` handler idiom formalized into
//! a proper error type. The storage layer itself standardizes on
//! `anyhow::Result`, so `Storage` wraps `anyhow::Error` rather than
//! `rusqlite::Error` directly — see DESIGN.md.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("bad parameter: {0}")]
    BadParameter(String),
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

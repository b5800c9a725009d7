//! Read-only HTTP surface over `query::*` (§4.9, §6). Thin on purpose —
//! no auth, no CORS policy, no caching layer.

pub mod routes;

pub use routes::{router, AppState};

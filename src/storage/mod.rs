//! The two logical SQL stores (§6): `primary` owns raw/aggregated
//! market rows, the live view, and collector status; `unified` owns
//! the unified funding table, MA tables, and the arbitrage table.
//!
//! Both wrap a single `rusqlite::Connection` behind
//! `Arc<parking_lot::Mutex<_>>` the way `signals::DbSignalStorage` does
//! in the teacher crate, which makes the "single writer per table"
//! ownership rule in spec §3 structural rather than just documented:
//! every write to a given store serializes through its one connection.

pub mod cache;
pub mod primary;
pub mod unified;

pub use cache::CacheBackend;
pub use primary::PrimaryStore;
pub use unified::UnifiedStore;

use rusqlite::Connection;

/// Pragmas shared by both stores: WAL for concurrent reads during
/// writes, a modest page cache, and in-memory temp storage. Lifted
/// directly from the teacher's `SCHEMA_SQL` pragma block.
pub(crate) const COMMON_PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA cache_size = -32000;
PRAGMA temp_store = MEMORY;
"#;

pub(crate) fn open(path: &str) -> rusqlite::Result<Connection> {
    let flags = rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
        | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
        | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX;
    Connection::open_with_flags(path, flags)
}

/// Common shape for a logical SQL store (§6): schema bootstrap plus
/// pragma application over a fresh `rusqlite::Connection`. The teacher
/// doesn't introduce a generic store trait either — two concrete
/// structs is the idiom there too — so this only factors out the one
/// thing `PrimaryStore` and `UnifiedStore` do verbatim identically;
/// everything else (queries, upserts) stays on the concrete types.
pub(crate) trait SqlStore {
    const SCHEMA_SQL: &'static str;

    fn bootstrap(path: &str) -> rusqlite::Result<Connection> {
        let conn = open(path)?;
        conn.execute_batch(COMMON_PRAGMAS)?;
        conn.execute_batch(Self::SCHEMA_SQL)?;
        Ok(conn)
    }
}

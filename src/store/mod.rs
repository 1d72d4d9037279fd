//! Backing store interface
//!
//! The protocol core only ever talks to the database through [`Store`].
//! [`SqliteStore`] is the embedded implementation used by the binary.
//!
//! # Example
//! ```no_run
//! use cortex_mcp::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::open("data.db")?;
//! store.execute("CREATE TABLE notes (id INTEGER, body TEXT)")?;
//! let rows = store.fetch("SELECT * FROM notes")?;
//! # Ok::<(), cortex_mcp::error::StoreError>(())
//! ```

mod row;
mod sqlite;

pub use row::{Row, Value};
pub use sqlite::SqliteStore;

use crate::error::StoreError;

/// Narrow collaborator interface consumed by the tool handlers.
///
/// Implementations are shared by every transport worker at once, so they
/// must be `Send + Sync` and serialise access internally if the engine
/// needs it.
pub trait Store: Send + Sync {
    /// Run a mutating or DDL statement. Never returns row data.
    fn execute(&self, sql: &str) -> Result<(), StoreError>;

    /// Run a query and collect every row in order.
    fn fetch(&self, sql: &str) -> Result<Vec<Row>, StoreError>;

    /// First row of a query, if any.
    fn fetchone(&self, sql: &str) -> Result<Option<Row>, StoreError> {
        Ok(self.fetch(sql)?.into_iter().next())
    }

    /// Release the underlying connection. Idempotent.
    fn close(&self) -> Result<(), StoreError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

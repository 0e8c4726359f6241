pub mod connection;
pub mod error_context;
pub mod gateway;
pub mod identifiers;
pub mod mysql;

pub use gateway::{BulkLoad, Cursor, DatabaseGateway, LoadMode, Row, SqlValue};
pub use identifiers::quote_identifier;
pub use mysql::{LoadStrategy, MySqlGateway};

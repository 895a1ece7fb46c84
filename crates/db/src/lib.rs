pub mod connection;
pub mod fixtures;
pub mod source;

pub use connection::{connect, connect_with_settings, AccessMode, DbPool};
pub use fixtures::{SeedResult, StaffConnectSeed, VerificationResult};
pub use source::{DataSource, DataSourceError, QueryOutput, SqliteDataSource};

//! Draw history sources and integrity checks.

pub mod csv_source;
pub mod integrity;
pub mod source;
pub mod synthetic;

pub use csv_source::{ColumnMapping, CsvDataSource};
pub use integrity::{check_integrity, IntegrityReport};
pub use source::{next_round, DataSource, DataSourceError, StaticDataSource};
pub use synthetic::SyntheticDataSource;

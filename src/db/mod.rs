pub mod catalog;
pub mod csv_log;
pub mod interactions;

pub use catalog::Catalog;
pub use csv_log::CsvLog;
pub use interactions::InteractionLogs;

//! In-memory tables and their CSV representation.

pub mod csv_io;
pub mod stats;
pub mod table;

pub use csv_io::{read_csv, write_csv};
pub use table::{DataTable, MISSING_MARKERS, Value};

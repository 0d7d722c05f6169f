//! Record reader and writer over the live schema.

pub mod reader;
mod validation;
pub mod writer;
pub use reader::{Page, PageResult, RecordReader, Row};
pub use validation::{parse_datetime, RecordValidator};
pub use writer::{InsertOutcome, RecordWriter};

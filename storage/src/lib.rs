//! Binary file I/O: market-data readers and the order-record writer
//!
//! All streams are little-endian packed records behind a fixed 24-byte file
//! header. Readers are lazy, finite and non-restartable; the writer appends
//! one fixed-layout record per simulated lifecycle event.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod reader;
pub mod writer;

pub use error::StorageError;
pub use reader::{BookEventReader, FileHeader, FillsReader, TopsReader};
pub use writer::{
    BookEventWriter, FillsWriter, OrderRecordReader, OrderRecordWriter, TopsWriter, RECORD_LEN,
};

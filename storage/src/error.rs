//! Typed errors for the binary streams

use thiserror::Error;

/// Errors raised by the file readers and the record writer.
///
/// Everything here is fatal to the run: a malformed or truncated input means
/// the stream cannot be trusted past the failure point.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// File ended before a complete header could be read
    #[error("truncated file header in {what} stream")]
    TruncatedHeader {
        /// Which stream the header belonged to
        what: &'static str,
    },

    /// File ended in the middle of a record
    #[error("truncated {what} record after {complete} complete records")]
    Truncated {
        /// Record type that was being read
        what: &'static str,
        /// Number of records read successfully before the failure
        complete: u64,
    },

    /// Book-event header carried a tag outside 1..=10
    #[error("unknown book event type {tag} at seq_no {seq_no}")]
    UnknownEventType {
        /// The offending tag byte
        tag: u8,
        /// Sequence number from the event header
        seq_no: u64,
    },

    /// Order record carried a lifecycle tag outside 1..=4
    #[error("unknown order record event type {0}")]
    UnknownRecordKind(u8),
}

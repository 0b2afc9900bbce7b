//! Lazy readers for the three input stream formats
//!
//! Each reader opens its file, consumes the 24-byte header eagerly and then
//! yields records one at a time. Clean EOF on a record boundary ends the
//! stream; EOF inside a record, and any unknown book-event tag, is a fatal
//! `StorageError` that poisons the stream.

use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use common::{
    BookEvent, BookEventBody, BookTop, BookTopLevel, PublicFill, Px, Qty, Side, Ts,
};

use crate::error::StorageError;

/// Encoded size of a `book_top` record
pub(crate) const TOP_LEN: usize = 88;
/// Encoded size of a `book_fill_snapshot` record
pub(crate) const FILL_LEN: usize = 90;
/// Encoded size of a book-event header
pub(crate) const EVENT_HDR_LEN: usize = 17;
/// Encoded size of the file header
pub(crate) const FILE_HDR_LEN: usize = 24;

/// Fixed 24-byte header at the front of every input stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Originating feed identifier
    pub feed_id: u64,
    /// Trading date as YYYYMMDD
    pub dateint: u32,
    /// Record count claimed by the producer
    pub count: u32,
    /// Symbol index this stream covers
    pub symbol_idx: u64,
}

impl FileHeader {
    fn read_from(rd: &mut impl Read, what: &'static str) -> Result<Self, StorageError> {
        let mut buf = [0u8; FILE_HDR_LEN];
        if !fill_buf(rd, &mut buf)?.is_full() {
            return Err(StorageError::TruncatedHeader { what });
        }
        let mut cur = &buf[..];
        Ok(Self {
            feed_id: cur.read_u64::<LittleEndian>()?,
            dateint: cur.read_u32::<LittleEndian>()?,
            count: cur.read_u32::<LittleEndian>()?,
            symbol_idx: cur.read_u64::<LittleEndian>()?,
        })
    }
}

/// Outcome of trying to fill a whole record buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fill {
    /// Buffer completely filled
    Full,
    /// EOF before the first byte: clean end of stream
    CleanEof,
    /// EOF mid-record: the file is truncated
    Partial,
}

impl Fill {
    pub(crate) fn is_full(self) -> bool {
        matches!(self, Self::Full)
    }
}

pub(crate) fn fill_buf(rd: &mut impl Read, buf: &mut [u8]) -> Result<Fill, StorageError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = rd.read(&mut buf[filled..])?;
        if n == 0 {
            return Ok(if filled == 0 { Fill::CleanEof } else { Fill::Partial });
        }
        filled += n;
    }
    Ok(Fill::Full)
}

fn decode_level(cur: &mut &[u8]) -> Result<BookTopLevel, StorageError> {
    Ok(BookTopLevel {
        bid_px: Px::from_nanos(cur.read_i64::<LittleEndian>()?),
        ask_px: Px::from_nanos(cur.read_i64::<LittleEndian>()?),
        bid_qty: Qty::from_shares(cur.read_u32::<LittleEndian>()?),
        ask_qty: Qty::from_shares(cur.read_u32::<LittleEndian>()?),
    })
}

pub(crate) fn decode_top(buf: &[u8]) -> Result<BookTop, StorageError> {
    let mut cur = buf;
    Ok(BookTop {
        ts: Ts::from_nanos(cur.read_u64::<LittleEndian>()?),
        seqno: cur.read_u64::<LittleEndian>()?,
        top: decode_level(&mut cur)?,
        second: decode_level(&mut cur)?,
        third: decode_level(&mut cur)?,
    })
}

pub(crate) fn decode_fill(buf: &[u8]) -> Result<PublicFill, StorageError> {
    let mut cur = buf;
    Ok(PublicFill {
        ts: Ts::from_nanos(cur.read_u64::<LittleEndian>()?),
        seq_no: cur.read_u64::<LittleEndian>()?,
        resting_order_id: cur.read_u64::<LittleEndian>()?,
        was_hidden: cur.read_u8()? != 0,
        trade_price: Px::from_nanos(cur.read_i64::<LittleEndian>()?),
        trade_qty: Qty::from_shares(cur.read_u32::<LittleEndian>()?),
        execution_id: cur.read_u64::<LittleEndian>()?,
        resting_original_qty: Qty::from_shares(cur.read_u32::<LittleEndian>()?),
        resting_order_remaining_qty: Qty::from_shares(cur.read_u32::<LittleEndian>()?),
        resting_order_last_update_ts: Ts::from_nanos(cur.read_u64::<LittleEndian>()?),
        resting_side_is_bid: cur.read_u8()? != 0,
        resting_side_price: Px::from_nanos(cur.read_i64::<LittleEndian>()?),
        resting_side_qty: Qty::from_shares(cur.read_u32::<LittleEndian>()?),
        opposing_side_price: Px::from_nanos(cur.read_i64::<LittleEndian>()?),
        opposing_side_qty: Qty::from_shares(cur.read_u32::<LittleEndian>()?),
        resting_side_number_of_orders: cur.read_u32::<LittleEndian>()?,
    })
}

/// Payload size for a book-event tag, `None` for unknown tags
pub(crate) const fn event_payload_len(tag: u8) -> Option<usize> {
    match tag {
        1 => Some(21),  // add_order
        2 => Some(8),   // delete_order
        3 => Some(28),  // replace_order
        4 => Some(12),  // amend_order
        5 => Some(12),  // reduce_order
        6 => Some(20),  // execute_order
        7 => Some(28),  // execute_order_at_price
        8 => Some(0),   // clear_book
        9 => Some(1),   // session_event
        10 => Some(29), // hidden_trade
        _ => None,
    }
}

pub(crate) fn decode_event_body(tag: u8, buf: &[u8]) -> Result<BookEventBody, StorageError> {
    let mut cur = buf;
    Ok(match tag {
        1 => BookEventBody::AddOrder {
            price: Px::from_nanos(cur.read_i64::<LittleEndian>()?),
            order_id: cur.read_u64::<LittleEndian>()?,
            qty: Qty::from_shares(cur.read_u32::<LittleEndian>()?),
            side: Side::from_is_bid(cur.read_u8()? != 0),
        },
        2 => BookEventBody::DeleteOrder {
            order_id: cur.read_u64::<LittleEndian>()?,
        },
        3 => BookEventBody::ReplaceOrder {
            price: Px::from_nanos(cur.read_i64::<LittleEndian>()?),
            orig_order_id: cur.read_u64::<LittleEndian>()?,
            new_order_id: cur.read_u64::<LittleEndian>()?,
            qty: Qty::from_shares(cur.read_u32::<LittleEndian>()?),
        },
        4 => BookEventBody::AmendOrder {
            order_id: cur.read_u64::<LittleEndian>()?,
            new_qty: Qty::from_shares(cur.read_u32::<LittleEndian>()?),
        },
        5 => BookEventBody::ReduceOrder {
            order_id: cur.read_u64::<LittleEndian>()?,
            cxled_qty: Qty::from_shares(cur.read_u32::<LittleEndian>()?),
        },
        6 => BookEventBody::ExecuteOrder {
            order_id: cur.read_u64::<LittleEndian>()?,
            traded_qty: Qty::from_shares(cur.read_u32::<LittleEndian>()?),
            execution_id: cur.read_u64::<LittleEndian>()?,
        },
        7 => BookEventBody::ExecuteOrderAtPrice {
            order_id: cur.read_u64::<LittleEndian>()?,
            traded_qty: Qty::from_shares(cur.read_u32::<LittleEndian>()?),
            execution_id: cur.read_u64::<LittleEndian>()?,
            exec_price: Px::from_nanos(cur.read_i64::<LittleEndian>()?),
        },
        8 => BookEventBody::ClearBook,
        9 => BookEventBody::SessionEvent {
            allow_crossed_book: cur.read_u8()? != 0,
        },
        10 => BookEventBody::HiddenTrade {
            fill_px: Px::from_nanos(cur.read_i64::<LittleEndian>()?),
            resting_order_id: cur.read_u64::<LittleEndian>()?,
            fill_qty: Qty::from_shares(cur.read_u32::<LittleEndian>()?),
            resting_side: Side::from_is_bid(cur.read_u8()? != 0),
            execution_id: cur.read_u64::<LittleEndian>()?,
        },
        // Callers dispatch through event_payload_len first.
        _ => unreachable!("tag {tag} has no payload length"),
    })
}

/// Streaming reader for a `book_top` file
#[derive(Debug)]
pub struct TopsReader {
    rd: BufReader<File>,
    header: FileHeader,
    complete: u64,
    done: bool,
}

impl TopsReader {
    /// Open the file and consume its header
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let mut rd = BufReader::new(File::open(path)?);
        let header = FileHeader::read_from(&mut rd, "book_top")?;
        Ok(Self {
            rd,
            header,
            complete: 0,
            done: false,
        })
    }

    /// File header read at open
    #[must_use]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }
}

impl Iterator for TopsReader {
    type Item = Result<BookTop, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut buf = [0u8; TOP_LEN];
        match fill_buf(&mut self.rd, &mut buf) {
            Ok(Fill::Full) => {
                self.complete += 1;
                Some(decode_top(&buf))
            }
            Ok(Fill::CleanEof) => {
                self.done = true;
                None
            }
            Ok(Fill::Partial) => {
                self.done = true;
                Some(Err(StorageError::Truncated {
                    what: "book_top",
                    complete: self.complete,
                }))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Streaming reader for a `book_fill_snapshot` file
pub struct FillsReader {
    rd: BufReader<File>,
    header: FileHeader,
    complete: u64,
    done: bool,
}

impl FillsReader {
    /// Open the file and consume its header
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let mut rd = BufReader::new(File::open(path)?);
        let header = FileHeader::read_from(&mut rd, "book_fill_snapshot")?;
        Ok(Self {
            rd,
            header,
            complete: 0,
            done: false,
        })
    }

    /// File header read at open
    #[must_use]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }
}

impl Iterator for FillsReader {
    type Item = Result<PublicFill, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut buf = [0u8; FILL_LEN];
        match fill_buf(&mut self.rd, &mut buf) {
            Ok(Fill::Full) => {
                self.complete += 1;
                Some(decode_fill(&buf))
            }
            Ok(Fill::CleanEof) => {
                self.done = true;
                None
            }
            Ok(Fill::Partial) => {
                self.done = true;
                Some(Err(StorageError::Truncated {
                    what: "book_fill_snapshot",
                    complete: self.complete,
                }))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Streaming reader for a tagged book-events file
pub struct BookEventReader {
    rd: BufReader<File>,
    header: FileHeader,
    complete: u64,
    done: bool,
}

impl BookEventReader {
    /// Open the file and consume its header
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let mut rd = BufReader::new(File::open(path)?);
        let header = FileHeader::read_from(&mut rd, "book_event")?;
        Ok(Self {
            rd,
            header,
            complete: 0,
            done: false,
        })
    }

    /// File header read at open
    #[must_use]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    fn read_event(&mut self) -> Result<Option<BookEvent>, StorageError> {
        let mut hdr = [0u8; EVENT_HDR_LEN];
        match fill_buf(&mut self.rd, &mut hdr)? {
            Fill::CleanEof => return Ok(None),
            Fill::Partial => {
                return Err(StorageError::Truncated {
                    what: "book_event header",
                    complete: self.complete,
                })
            }
            Fill::Full => {}
        }
        let mut cur = &hdr[..];
        let ts = Ts::from_nanos(cur.read_u64::<LittleEndian>()?);
        let seq_no = cur.read_u64::<LittleEndian>()?;
        let tag = cur.read_u8()?;

        let len = event_payload_len(tag)
            .ok_or(StorageError::UnknownEventType { tag, seq_no })?;
        let mut payload = [0u8; 32];
        let payload = &mut payload[..len];
        if !fill_buf(&mut self.rd, payload)?.is_full() {
            return Err(StorageError::Truncated {
                what: "book_event payload",
                complete: self.complete,
            });
        }
        let body = decode_event_body(tag, payload)?;
        Ok(Some(BookEvent { ts, seq_no, body }))
    }
}

impl Iterator for BookEventReader {
    type Item = Result<BookEvent, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_event() {
            Ok(Some(ev)) => {
                self.complete += 1;
                Some(Ok(ev))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

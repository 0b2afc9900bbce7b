//! Record writers: the lifecycle-record output stream plus input-format
//! writers used by tests, fixtures and tooling

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use common::{
    BookEvent, BookEventBody, BookTop, BookTopLevel, OrderRecord, PublicFill, Px, Qty,
    RecordKind, Symbol, Ts,
};

use crate::error::StorageError;
use crate::reader::{fill_buf, FileHeader, Fill};

/// Encoded size of one output `OrderRecord`.
///
/// Layout (little-endian, packed): `timestamp u64, event_type u8,
/// order_id u64, symbol_id u32, price i64, old_price i64, quantity u32,
/// old_quantity u32, is_bid u8`. `old_price`/`old_quantity` are zero except
/// on replace (`event_type = 4`) records. Readers reject any other layout.
pub const RECORD_LEN: usize = 46;

/// Appending writer for the simulated order lifecycle stream.
///
/// One `write_record` call serializes one complete record; there is no
/// rewriting and no seeking. The stream is flushed on `finish` and
/// best-effort on drop.
pub struct OrderRecordWriter<W: Write> {
    w: W,
    records: u64,
}

impl OrderRecordWriter<BufWriter<File>> {
    /// Create (truncate) the output file
    pub fn create(path: &Path) -> Result<Self, StorageError> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> OrderRecordWriter<W> {
    /// Wrap an arbitrary byte sink
    pub fn new(w: W) -> Self {
        Self { w, records: 0 }
    }

    /// Append one lifecycle record
    pub fn write_record(&mut self, rec: &OrderRecord) -> Result<(), StorageError> {
        self.w.write_u64::<LittleEndian>(rec.timestamp.as_nanos())?;
        self.w.write_u8(rec.kind as u8)?;
        self.w.write_u64::<LittleEndian>(rec.order_id)?;
        self.w.write_u32::<LittleEndian>(rec.symbol.as_u32())?;
        self.w.write_i64::<LittleEndian>(rec.price.as_nanos())?;
        self.w.write_i64::<LittleEndian>(rec.old_price.as_nanos())?;
        self.w.write_u32::<LittleEndian>(rec.quantity.as_shares())?;
        self.w
            .write_u32::<LittleEndian>(rec.old_quantity.as_shares())?;
        self.w.write_u8(u8::from(rec.is_bid))?;
        self.records += 1;
        Ok(())
    }

    /// Records written so far
    #[must_use]
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Flush buffered bytes to the sink
    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.w.flush()?;
        Ok(())
    }
}

impl<W: Write> Drop for OrderRecordWriter<W> {
    fn drop(&mut self) {
        let _ = self.w.flush();
    }
}

/// Reader for a lifecycle-record stream, used by tests and tooling
pub struct OrderRecordReader {
    rd: BufReader<File>,
    complete: u64,
    done: bool,
}

impl OrderRecordReader {
    /// Open an output file produced by [`OrderRecordWriter`]
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Ok(Self {
            rd: BufReader::new(File::open(path)?),
            complete: 0,
            done: false,
        })
    }

    fn read_record(&mut self) -> Result<Option<OrderRecord>, StorageError> {
        let mut buf = [0u8; RECORD_LEN];
        match fill_buf(&mut self.rd, &mut buf)? {
            Fill::CleanEof => return Ok(None),
            Fill::Partial => {
                return Err(StorageError::Truncated {
                    what: "order record",
                    complete: self.complete,
                })
            }
            Fill::Full => {}
        }
        let mut cur = &buf[..];
        let timestamp = Ts::from_nanos(cur.read_u64::<LittleEndian>()?);
        let tag = cur.read_u8()?;
        let kind = RecordKind::from_u8(tag).ok_or(StorageError::UnknownRecordKind(tag))?;
        Ok(Some(OrderRecord {
            timestamp,
            kind,
            order_id: cur.read_u64::<LittleEndian>()?,
            symbol: Symbol::new(cur.read_u32::<LittleEndian>()?),
            price: Px::from_nanos(cur.read_i64::<LittleEndian>()?),
            old_price: Px::from_nanos(cur.read_i64::<LittleEndian>()?),
            quantity: Qty::from_shares(cur.read_u32::<LittleEndian>()?),
            old_quantity: Qty::from_shares(cur.read_u32::<LittleEndian>()?),
            is_bid: cur.read_u8()? != 0,
        }))
    }
}

impl Iterator for OrderRecordReader {
    type Item = Result<OrderRecord, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(rec)) => {
                self.complete += 1;
                Some(Ok(rec))
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

fn write_header(w: &mut impl Write, hdr: &FileHeader) -> Result<(), StorageError> {
    w.write_u64::<LittleEndian>(hdr.feed_id)?;
    w.write_u32::<LittleEndian>(hdr.dateint)?;
    w.write_u32::<LittleEndian>(hdr.count)?;
    w.write_u64::<LittleEndian>(hdr.symbol_idx)?;
    Ok(())
}

fn write_level(w: &mut impl Write, level: &BookTopLevel) -> Result<(), StorageError> {
    w.write_i64::<LittleEndian>(level.bid_px.as_nanos())?;
    w.write_i64::<LittleEndian>(level.ask_px.as_nanos())?;
    w.write_u32::<LittleEndian>(level.bid_qty.as_shares())?;
    w.write_u32::<LittleEndian>(level.ask_qty.as_shares())?;
    Ok(())
}

/// Writer for `book_top` files
pub struct TopsWriter {
    w: BufWriter<File>,
}

impl TopsWriter {
    /// Create the file and write its header
    pub fn create(path: &Path, hdr: &FileHeader) -> Result<Self, StorageError> {
        let mut w = BufWriter::new(File::create(path)?);
        write_header(&mut w, hdr)?;
        Ok(Self { w })
    }

    /// Append one snapshot
    pub fn append(&mut self, top: &BookTop) -> Result<(), StorageError> {
        self.w.write_u64::<LittleEndian>(top.ts.as_nanos())?;
        self.w.write_u64::<LittleEndian>(top.seqno)?;
        write_level(&mut self.w, &top.top)?;
        write_level(&mut self.w, &top.second)?;
        write_level(&mut self.w, &top.third)?;
        Ok(())
    }

    /// Flush buffered bytes
    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.w.flush()?;
        Ok(())
    }
}

/// Writer for `book_fill_snapshot` files
pub struct FillsWriter {
    w: BufWriter<File>,
}

impl FillsWriter {
    /// Create the file and write its header
    pub fn create(path: &Path, hdr: &FileHeader) -> Result<Self, StorageError> {
        let mut w = BufWriter::new(File::create(path)?);
        write_header(&mut w, hdr)?;
        Ok(Self { w })
    }

    /// Append one public fill
    pub fn append(&mut self, fill: &PublicFill) -> Result<(), StorageError> {
        let w = &mut self.w;
        w.write_u64::<LittleEndian>(fill.ts.as_nanos())?;
        w.write_u64::<LittleEndian>(fill.seq_no)?;
        w.write_u64::<LittleEndian>(fill.resting_order_id)?;
        w.write_u8(u8::from(fill.was_hidden))?;
        w.write_i64::<LittleEndian>(fill.trade_price.as_nanos())?;
        w.write_u32::<LittleEndian>(fill.trade_qty.as_shares())?;
        w.write_u64::<LittleEndian>(fill.execution_id)?;
        w.write_u32::<LittleEndian>(fill.resting_original_qty.as_shares())?;
        w.write_u32::<LittleEndian>(fill.resting_order_remaining_qty.as_shares())?;
        w.write_u64::<LittleEndian>(fill.resting_order_last_update_ts.as_nanos())?;
        w.write_u8(u8::from(fill.resting_side_is_bid))?;
        w.write_i64::<LittleEndian>(fill.resting_side_price.as_nanos())?;
        w.write_u32::<LittleEndian>(fill.resting_side_qty.as_shares())?;
        w.write_i64::<LittleEndian>(fill.opposing_side_price.as_nanos())?;
        w.write_u32::<LittleEndian>(fill.opposing_side_qty.as_shares())?;
        w.write_u32::<LittleEndian>(fill.resting_side_number_of_orders)?;
        Ok(())
    }

    /// Flush buffered bytes
    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.w.flush()?;
        Ok(())
    }
}

/// Writer for tagged book-event files
pub struct BookEventWriter {
    w: BufWriter<File>,
}

impl BookEventWriter {
    /// Create the file and write its header
    pub fn create(path: &Path, hdr: &FileHeader) -> Result<Self, StorageError> {
        let mut w = BufWriter::new(File::create(path)?);
        write_header(&mut w, hdr)?;
        Ok(Self { w })
    }

    /// Append one event: 17-byte header then the tag's payload
    pub fn append(&mut self, ev: &BookEvent) -> Result<(), StorageError> {
        let w = &mut self.w;
        w.write_u64::<LittleEndian>(ev.ts.as_nanos())?;
        w.write_u64::<LittleEndian>(ev.seq_no)?;
        w.write_u8(ev.body.tag())?;
        match ev.body {
            BookEventBody::AddOrder {
                price,
                order_id,
                qty,
                side,
            } => {
                w.write_i64::<LittleEndian>(price.as_nanos())?;
                w.write_u64::<LittleEndian>(order_id)?;
                w.write_u32::<LittleEndian>(qty.as_shares())?;
                w.write_u8(u8::from(side.is_bid()))?;
            }
            BookEventBody::DeleteOrder { order_id } => {
                w.write_u64::<LittleEndian>(order_id)?;
            }
            BookEventBody::ReplaceOrder {
                price,
                orig_order_id,
                new_order_id,
                qty,
            } => {
                w.write_i64::<LittleEndian>(price.as_nanos())?;
                w.write_u64::<LittleEndian>(orig_order_id)?;
                w.write_u64::<LittleEndian>(new_order_id)?;
                w.write_u32::<LittleEndian>(qty.as_shares())?;
            }
            BookEventBody::AmendOrder { order_id, new_qty } => {
                w.write_u64::<LittleEndian>(order_id)?;
                w.write_u32::<LittleEndian>(new_qty.as_shares())?;
            }
            BookEventBody::ReduceOrder {
                order_id,
                cxled_qty,
            } => {
                w.write_u64::<LittleEndian>(order_id)?;
                w.write_u32::<LittleEndian>(cxled_qty.as_shares())?;
            }
            BookEventBody::ExecuteOrder {
                order_id,
                traded_qty,
                execution_id,
            } => {
                w.write_u64::<LittleEndian>(order_id)?;
                w.write_u32::<LittleEndian>(traded_qty.as_shares())?;
                w.write_u64::<LittleEndian>(execution_id)?;
            }
            BookEventBody::ExecuteOrderAtPrice {
                order_id,
                traded_qty,
                execution_id,
                exec_price,
            } => {
                w.write_u64::<LittleEndian>(order_id)?;
                w.write_u32::<LittleEndian>(traded_qty.as_shares())?;
                w.write_u64::<LittleEndian>(execution_id)?;
                w.write_i64::<LittleEndian>(exec_price.as_nanos())?;
            }
            BookEventBody::ClearBook => {}
            BookEventBody::SessionEvent { allow_crossed_book } => {
                w.write_u8(u8::from(allow_crossed_book))?;
            }
            BookEventBody::HiddenTrade {
                fill_px,
                resting_order_id,
                fill_qty,
                resting_side,
                execution_id,
            } => {
                w.write_i64::<LittleEndian>(fill_px.as_nanos())?;
                w.write_u64::<LittleEndian>(resting_order_id)?;
                w.write_u32::<LittleEndian>(fill_qty.as_shares())?;
                w.write_u8(u8::from(resting_side.is_bid()))?;
                w.write_u64::<LittleEndian>(execution_id)?;
            }
        }
        Ok(())
    }

    /// Flush buffered bytes
    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.w.flush()?;
        Ok(())
    }
}

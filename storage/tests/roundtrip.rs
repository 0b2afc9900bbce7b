//! File-backed tests for the binary readers and writers

use std::fs::OpenOptions;
use std::io::Write;

use common::{
    BookEvent, BookEventBody, BookTop, BookTopLevel, OrderRecord, PublicFill, Px, Qty,
    RecordKind, Side, Symbol, Ts,
};
use storage::{
    BookEventReader, BookEventWriter, FileHeader, FillsReader, FillsWriter, OrderRecordReader,
    OrderRecordWriter, StorageError, TopsReader, TopsWriter,
};
use tempfile::TempDir;

fn header(symbol_idx: u64, count: u32) -> FileHeader {
    FileHeader {
        feed_id: 12,
        dateint: 20240517,
        count,
        symbol_idx,
    }
}

fn level(bid: i64, ask: i64, bid_qty: u32, ask_qty: u32) -> BookTopLevel {
    BookTopLevel::new(
        Px::from_nanos(bid),
        Px::from_nanos(ask),
        Qty::from_shares(bid_qty),
        Qty::from_shares(ask_qty),
    )
}

fn sample_top(ts: u64, seqno: u64) -> BookTop {
    BookTop {
        ts: Ts::from_nanos(ts),
        seqno,
        top: level(99_000_000_000, 101_000_000_000, 10, 20),
        second: level(98_000_000_000, 102_000_000_000, 5, 5),
        third: BookTopLevel::EMPTY,
    }
}

fn sample_fill(ts: u64, seq_no: u64) -> PublicFill {
    PublicFill {
        ts: Ts::from_nanos(ts),
        seq_no,
        resting_order_id: 31,
        was_hidden: false,
        trade_price: Px::from_nanos(99_000_000_000),
        trade_qty: Qty::from_shares(3),
        execution_id: 900,
        resting_original_qty: Qty::from_shares(10),
        resting_order_remaining_qty: Qty::from_shares(7),
        resting_order_last_update_ts: Ts::from_nanos(ts - 100),
        resting_side_is_bid: true,
        resting_side_price: Px::from_nanos(99_000_000_000),
        resting_side_qty: Qty::from_shares(7),
        opposing_side_price: Px::from_nanos(101_000_000_000),
        opposing_side_qty: Qty::from_shares(20),
        resting_side_number_of_orders: 2,
    }
}

#[test]
fn tops_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tops.bin");

    let mut w = TopsWriter::create(&path, &header(7, 3)).unwrap();
    for i in 0..3 {
        w.append(&sample_top(1_000_000 + i * 200_000, i + 1)).unwrap();
    }
    w.flush().unwrap();

    let mut r = TopsReader::open(&path).unwrap();
    assert_eq!(r.header().symbol_idx, 7);
    assert_eq!(r.header().dateint, 20240517);

    let tops: Vec<BookTop> = (&mut r).map(Result::unwrap).collect();
    assert_eq!(tops.len(), 3);
    assert_eq!(tops[0], sample_top(1_000_000, 1));
    assert_eq!(tops[2].seqno, 3);
    // The stream is not restartable: once exhausted it stays exhausted.
    assert!(r.next().is_none());
}

#[test]
fn fills_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fills.bin");

    let mut w = FillsWriter::create(&path, &header(7, 2)).unwrap();
    w.append(&sample_fill(2_000_000, 1)).unwrap();
    w.append(&sample_fill(2_400_000, 2)).unwrap();
    w.flush().unwrap();

    let fills: Vec<PublicFill> = FillsReader::open(&path)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(fills.len(), 2);
    assert_eq!(fills[0], sample_fill(2_000_000, 1));
    assert_eq!(fills[1].seq_no, 2);
}

#[test]
fn book_events_round_trip_all_tags() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("events.bin");

    let bodies = [
        BookEventBody::AddOrder {
            price: Px::from_nanos(99),
            order_id: 1,
            qty: Qty::from_shares(5),
            side: Side::Bid,
        },
        BookEventBody::DeleteOrder { order_id: 1 },
        BookEventBody::ReplaceOrder {
            price: Px::from_nanos(101),
            orig_order_id: 2,
            new_order_id: 3,
            qty: Qty::from_shares(4),
        },
        BookEventBody::AmendOrder {
            order_id: 3,
            new_qty: Qty::from_shares(6),
        },
        BookEventBody::ReduceOrder {
            order_id: 3,
            cxled_qty: Qty::from_shares(1),
        },
        BookEventBody::ExecuteOrder {
            order_id: 3,
            traded_qty: Qty::from_shares(2),
            execution_id: 55,
        },
        BookEventBody::ExecuteOrderAtPrice {
            order_id: 3,
            traded_qty: Qty::from_shares(1),
            execution_id: 56,
            exec_price: Px::from_nanos(100),
        },
        BookEventBody::ClearBook,
        BookEventBody::SessionEvent {
            allow_crossed_book: true,
        },
        BookEventBody::HiddenTrade {
            fill_px: Px::from_nanos(100),
            resting_order_id: 9,
            fill_qty: Qty::from_shares(1),
            resting_side: Side::Ask,
            execution_id: 57,
        },
    ];

    let mut w = BookEventWriter::create(&path, &header(4, bodies.len() as u32)).unwrap();
    for (i, body) in bodies.iter().enumerate() {
        w.append(&BookEvent {
            ts: Ts::from_nanos(1_000 * (i as u64 + 1)),
            seq_no: i as u64 + 1,
            body: *body,
        })
        .unwrap();
    }
    w.flush().unwrap();

    let mut r = BookEventReader::open(&path).unwrap();
    assert_eq!(r.header().symbol_idx, 4);
    let events: Vec<BookEvent> = (&mut r).map(Result::unwrap).collect();
    assert_eq!(events.len(), bodies.len());
    for (i, ev) in events.iter().enumerate() {
        assert_eq!(ev.seq_no, i as u64 + 1);
        assert_eq!(ev.body, bodies[i]);
        assert_eq!(ev.body.tag(), i as u8 + 1);
    }
}

#[test]
fn short_header_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.bin");
    std::fs::write(&path, [0u8; 10]).unwrap();

    match TopsReader::open(&path) {
        Err(StorageError::TruncatedHeader { what }) => assert_eq!(what, "book_top"),
        other => panic!("expected truncated header, got {other:?}"),
    }
}

#[test]
fn truncated_record_is_fatal_after_clean_prefix() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tops.bin");

    let mut w = TopsWriter::create(&path, &header(7, 2)).unwrap();
    w.append(&sample_top(1_000_000, 1)).unwrap();
    w.flush().unwrap();
    drop(w);

    // Append half a record.
    let mut f = OpenOptions::new().append(true).open(&path).unwrap();
    f.write_all(&[0u8; 40]).unwrap();
    drop(f);

    let mut r = TopsReader::open(&path).unwrap();
    assert!(r.next().unwrap().is_ok());
    match r.next() {
        Some(Err(StorageError::Truncated { what, complete })) => {
            assert_eq!(what, "book_top");
            assert_eq!(complete, 1);
        }
        other => panic!("expected truncation, got {other:?}"),
    }
    // The error poisons the stream.
    assert!(r.next().is_none());
}

#[test]
fn unknown_event_tag_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("events.bin");

    let mut w = BookEventWriter::create(&path, &header(4, 1)).unwrap();
    w.append(&BookEvent {
        ts: Ts::from_nanos(1_000),
        seq_no: 1,
        body: BookEventBody::DeleteOrder { order_id: 1 },
    })
    .unwrap();
    w.flush().unwrap();
    drop(w);

    // A 17-byte event header with tag 11, which no payload table covers.
    let mut f = OpenOptions::new().append(true).open(&path).unwrap();
    let mut hdr = Vec::new();
    hdr.extend_from_slice(&2_000u64.to_le_bytes());
    hdr.extend_from_slice(&2u64.to_le_bytes());
    hdr.push(11);
    f.write_all(&hdr).unwrap();
    drop(f);

    let mut r = BookEventReader::open(&path).unwrap();
    assert!(r.next().unwrap().is_ok());
    match r.next() {
        Some(Err(StorageError::UnknownEventType { tag, seq_no })) => {
            assert_eq!(tag, 11);
            assert_eq!(seq_no, 2);
        }
        other => panic!("expected unknown event type, got {other:?}"),
    }
    assert!(r.next().is_none());
}

#[test]
fn order_records_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("orders.bin");

    let add = OrderRecord {
        timestamp: Ts::from_nanos(10_007_000),
        kind: RecordKind::Add,
        order_id: 1,
        symbol: Symbol::new(7),
        price: Px::from_nanos(100_000_000_000),
        old_price: Px::ZERO,
        quantity: Qty::from_shares(10),
        old_quantity: Qty::ZERO,
        is_bid: true,
    };
    let replace = OrderRecord {
        timestamp: Ts::from_nanos(10_009_000),
        kind: RecordKind::Replace,
        order_id: 1,
        symbol: Symbol::new(7),
        price: Px::from_nanos(101_000_000_000),
        old_price: Px::from_nanos(100_000_000_000),
        quantity: Qty::from_shares(8),
        old_quantity: Qty::from_shares(10),
        is_bid: true,
    };

    let mut w = OrderRecordWriter::create(&path).unwrap();
    w.write_record(&add).unwrap();
    w.write_record(&replace).unwrap();
    assert_eq!(w.records(), 2);
    w.flush().unwrap();
    drop(w);

    let recs: Vec<OrderRecord> = OrderRecordReader::open(&path)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(recs, vec![add, replace]);

    let len = std::fs::metadata(&path).unwrap().len();
    assert_eq!(len, 2 * storage::RECORD_LEN as u64);
}

#[test]
fn order_record_reader_rejects_unknown_kind() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("orders.bin");

    // Hand-craft a record with event_type 9.
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1_000u64.to_le_bytes());
    bytes.push(9);
    bytes.extend_from_slice(&1u64.to_le_bytes());
    bytes.extend_from_slice(&7u32.to_le_bytes());
    bytes.extend_from_slice(&100i64.to_le_bytes());
    bytes.extend_from_slice(&0i64.to_le_bytes());
    bytes.extend_from_slice(&10u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.push(1);
    assert_eq!(bytes.len(), storage::RECORD_LEN);
    std::fs::write(&path, &bytes).unwrap();

    let mut r = OrderRecordReader::open(&path).unwrap();
    match r.next() {
        Some(Err(StorageError::UnknownRecordKind(9))) => {}
        other => panic!("expected unknown record kind, got {other:?}"),
    }
}

mod common;

use std::sync::{Arc, Barrier, mpsc};
use std::thread;
use std::time::Duration;
use paste::paste;
use drizzle_db::storage::bufferpool::BufferPool;
use drizzle_db::storage::transaction::{Transaction, TransactionId};
use drizzle_db::types::{DbError, DbResult, PageId, Permission, RecordId};
use drizzle_db::with_write_pages;
use common::*;

// latch both pages for writing, in order
fn write_both(pool: &BufferPool, txn: TransactionId, a: PageId, b: PageId) -> DbResult<usize> {
    with_write_pages!(pool, txn, [(a, pa), (b, pb)], {
        Ok(pa.num_slots() + pb.num_slots())
    })
}

/// `holder` owns page B while another transaction sits in `with_write_pages!`
/// holding A's latch and waiting for B; finishing `holder` must not wait on A
fn finish_while_writer_waits(commit: bool) {
    let (engine, _dir) = setup_engine(4);
    let table_id = engine.create_table("wide", wide_schema()).unwrap();
    let schema = engine.catalog.get_schema(table_id).unwrap();
    insert_committed(&engine, table_id, vec![wide_row(&schema, 0), wide_row(&schema, 1)]);

    let pool = Arc::clone(&engine.buffer_pool);
    let page_a = PageId::new(table_id, 0);
    let page_b = PageId::new(table_id, 1);

    let holder = Transaction::begin();
    let mut stored = wide_row(&schema, 1);
    stored.set_record_id(Some(RecordId::new(page_b, 0)));
    pool.delete_row(holder.id(), &stored).unwrap();

    let (writer_tx, writer_rx) = mpsc::channel();
    let writer_pool = Arc::clone(&pool);
    let writer = thread::spawn(move || {
        let txn = Transaction::begin();
        let result = write_both(&writer_pool, txn.id(), page_a, page_b);
        txn.commit(&writer_pool).unwrap();
        writer_tx.send(result.map_err(|e| e.to_string())).unwrap();
    });
    assert!(writer_rx.recv_timeout(Duration::from_millis(150)).is_err());

    let (done_tx, done_rx) = mpsc::channel();
    let finish_pool = Arc::clone(&pool);
    thread::spawn(move || {
        let result = if commit { holder.commit(&finish_pool) } else { holder.abort(&finish_pool) };
        done_tx.send(result.is_ok()).unwrap();
    });

    assert!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap());
    assert_eq!(writer_rx.recv_timeout(Duration::from_secs(5)).unwrap(), Ok(2));
    writer.join().unwrap();

    let expected = if commit { vec![0] } else { vec![0, 1] };
    assert_eq!(first_ints(&scan_committed(&engine, table_id)), expected);
}

#[test]
fn test_commit_while_writer_waits_mid_macro() {
    finish_while_writer_waits(true);
}

#[test]
fn test_abort_while_writer_waits_mid_macro() {
    finish_while_writer_waits(false);
}

#[test]
fn test_shared_locks_block_exclusive_until_released() {
    let (engine, _dir) = setup_engine(4);
    let table_id = engine.create_table("pairs", pair_schema()).unwrap();
    let schema = engine.catalog.get_schema(table_id).unwrap();
    insert_committed(&engine, table_id, vec![int_row(&schema, &[1, 1])]);

    let pool = Arc::clone(&engine.buffer_pool);
    let page_id = PageId::new(table_id, 0);
    let reader1 = Transaction::begin();
    let reader2 = Transaction::begin();
    drop(pool.get_page(reader1.id(), page_id, Permission::ReadOnly).unwrap());
    drop(pool.get_page(reader2.id(), page_id, Permission::ReadOnly).unwrap());

    let (tx, rx) = mpsc::channel();
    let writer_pool = Arc::clone(&pool);
    let writer = thread::spawn(move || {
        let txn = Transaction::begin();
        let granted = writer_pool.get_page(txn.id(), page_id, Permission::ReadWrite).map(drop);
        tx.send(granted.is_ok()).unwrap();
        txn.commit(&writer_pool).unwrap();
    });

    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    reader1.commit(&pool).unwrap();
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    reader2.commit(&pool).unwrap();

    assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
    writer.join().unwrap();
}

#[test]
fn test_crossed_exclusive_locks_abort_exactly_one() {
    let (engine, _dir) = setup_engine(4);
    let table_id = engine.create_table("wide", wide_schema()).unwrap();
    let schema = engine.catalog.get_schema(table_id).unwrap();
    insert_committed(&engine, table_id, vec![wide_row(&schema, 0), wide_row(&schema, 1)]);

    let pool = Arc::clone(&engine.buffer_pool);
    let page_a = PageId::new(table_id, 0);
    let page_b = PageId::new(table_id, 1);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = [(page_a, page_b), (page_b, page_a)]
        .into_iter()
        .map(|(first, second)| {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let txn = Transaction::begin();
                drop(pool.get_page(txn.id(), first, Permission::ReadWrite).unwrap());
                barrier.wait();

                match pool.get_page(txn.id(), second, Permission::ReadWrite) {
                    Ok(guard) => {
                        drop(guard);
                        txn.commit(&pool).unwrap();
                        false
                    }
                    Err(DbError::TransactionAborted(..)) => {
                        txn.abort(&pool).unwrap();
                        true
                    }
                    Err(e) => panic!("unexpected error: {e}"),
                }
            })
        })
        .collect();

    let aborted = handles.into_iter()
        .map(|h| h.join().unwrap())
        .filter(|aborted| *aborted)
        .count();
    assert_eq!(aborted, 1);
}

#[test]
fn test_concurrent_inserts_are_all_visible() {
    let (engine, _dir) = setup_engine(16);
    let table_id = engine.create_table("pairs", pair_schema()).unwrap();
    let schema = engine.catalog.get_schema(table_id).unwrap();
    let pool = Arc::clone(&engine.buffer_pool);

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let pool = Arc::clone(&pool);
            let schema = Arc::clone(&schema);
            thread::spawn(move || {
                let txn = Transaction::begin();
                for i in 0..50 {
                    pool.insert_row(txn.id(), table_id, int_row(&schema, &[worker * 100 + i, worker])).unwrap();
                }
                txn.commit(&pool).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut ids = first_ints(&scan_committed(&engine, table_id));
    ids.sort();
    let mut expected: Vec<i32> = (0..4).flat_map(|w| (0..50).map(move |i| w * 100 + i)).collect();
    expected.sort();
    assert_eq!(ids, expected);
}

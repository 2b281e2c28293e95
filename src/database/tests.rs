use super::Database;
use crate::exec::{
    AggOp, Aggregate, Delete, Filter, Insert, Join, JoinPredicate, Op, OpIterator, Predicate,
    SeqScan,
};
use crate::storage::{HeapFile, HeapPage, PageId, Permissions};
use crate::tuple::{Field, Tuple, TupleDesc, Type};
use crate::txn::{Transaction, TransactionId};

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn int_desc(cols: usize) -> TupleDesc {
    TupleDesc::of_types(&vec![Type::Int; cols])
}

fn int_tuple(cols: usize, values: &[i32]) -> Tuple {
    Tuple::new(
        int_desc(cols),
        values.iter().map(|&v| Field::Int(v)).collect(),
    )
    .unwrap()
}

fn create_table(db: &Database, dir: &TempDir, name: &str, cols: usize) -> i32 {
    let file = HeapFile::open(dir.path().join(format!("{}.dat", name)), int_desc(cols)).unwrap();
    let id = file.id();
    db.catalog().add_table(file, name, "");
    id
}

fn insert_committed(db: &Database, table_id: i32, cols: usize, rows: &[&[i32]]) {
    let txn = Transaction::new();
    for row in rows {
        db.buffer_pool()
            .insert_tuple(txn.id(), table_id, &int_tuple(cols, row))
            .unwrap();
    }
    txn.commit(db.buffer_pool()).unwrap();
}

fn scan_ints(db: &Database, table_id: i32) -> Vec<i32> {
    let txn = Transaction::new();
    let mut scan = SeqScan::new(Arc::clone(db.buffer_pool()), txn.id(), table_id, "t").unwrap();
    scan.open().unwrap();
    let mut out = Vec::new();
    while let Some(t) = scan.next().unwrap() {
        match t.field(0).unwrap() {
            Field::Int(v) => out.push(*v),
            _ => unreachable!(),
        }
    }
    scan.close();
    txn.commit(db.buffer_pool()).unwrap();
    out.sort_unstable();
    out
}

fn ungrouped_agg(db: &Database, table_id: i32, op: AggOp) -> i32 {
    let txn = Transaction::new();
    let scan = Box::new(SeqScan::new(Arc::clone(db.buffer_pool()), txn.id(), table_id, "t").unwrap());
    let mut agg = Aggregate::new(scan, 0, None, op).unwrap();
    agg.open().unwrap();
    let result = match agg.next().unwrap().unwrap().field(0).unwrap() {
        Field::Int(v) => *v,
        _ => unreachable!(),
    };
    agg.close();
    txn.commit(db.buffer_pool()).unwrap();
    result
}

// S1: single transaction inserts, commits, and the table answers scans
// and aggregates over exactly that multiset.
#[test]
fn test_insert_scan_and_aggregates() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new();
    let table = create_table(&db, &dir, "t", 1);

    insert_committed(&db, table, 1, &[&[3], &[1], &[4], &[1], &[5]]);

    assert_eq!(scan_ints(&db, table), vec![1, 1, 3, 4, 5]);
    assert_eq!(ungrouped_agg(&db, table, AggOp::Count), 5);
    assert_eq!(ungrouped_agg(&db, table, AggOp::Sum), 14);
    assert_eq!(ungrouped_agg(&db, table, AggOp::Max), 5);
    assert_eq!(ungrouped_agg(&db, table, AggOp::Min), 1);
}

// S2: an aborted insert leaves no trace.
#[test]
fn test_abort_discards_insert() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new();
    let table = create_table(&db, &dir, "t", 1);

    let txn = Transaction::new();
    db.buffer_pool()
        .insert_tuple(txn.id(), table, &int_tuple(1, &[9]))
        .unwrap();
    txn.abort(db.buffer_pool()).unwrap();

    assert_eq!(scan_ints(&db, table), Vec::<i32>::new());
}

// Invariant 5: aborting a transaction restores the pre-transaction view.
#[test]
fn test_abort_purity_preserves_baseline() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new();
    let table = create_table(&db, &dir, "t", 1);
    insert_committed(&db, table, 1, &[&[3], &[1], &[4]]);
    let baseline = scan_ints(&db, table);

    let txn = Transaction::new();
    for v in [10, 20, 30] {
        db.buffer_pool()
            .insert_tuple(txn.id(), table, &int_tuple(1, &[v]))
            .unwrap();
    }
    txn.abort(db.buffer_pool()).unwrap();

    assert_eq!(scan_ints(&db, table), baseline);
}

// Invariant 1: scans return exactly inserts minus deletes, as a multiset.
#[test]
fn test_insert_delete_multiset() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new();
    let table = create_table(&db, &dir, "t", 1);
    insert_committed(&db, table, 1, &[&[3], &[1], &[4], &[1], &[5], &[9]]);

    // delete every 1 through the operator pipeline
    let txn = Transaction::new();
    let scan = Box::new(SeqScan::new(Arc::clone(db.buffer_pool()), txn.id(), table, "t").unwrap());
    let ones = Box::new(Filter::new(
        Predicate::new(0, Op::Equals, Field::Int(1)),
        scan,
    ));
    let mut delete = Delete::new(Arc::clone(db.buffer_pool()), txn.id(), ones);
    delete.open().unwrap();
    let deleted = delete.next().unwrap().unwrap();
    assert_eq!(deleted.fields(), &[Field::Int(2)]);
    delete.close();
    txn.commit(db.buffer_pool()).unwrap();

    assert_eq!(scan_ints(&db, table), vec![3, 4, 5, 9]);
}

// Invariant 6 (NO STEAL): uncommitted tuples never reach disk.
#[test]
fn test_no_steal_keeps_dirty_pages_off_disk() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new();
    let table = create_table(&db, &dir, "t", 1);

    let txn = Transaction::new();
    for v in 0..5 {
        db.buffer_pool()
            .insert_tuple(txn.id(), table, &int_tuple(1, &[v]))
            .unwrap();
    }

    // the file grew (empty pages are appended eagerly) but holds no tuples
    let file = db.catalog().table_file(table).unwrap();
    for n in 0..file.num_pages().unwrap() {
        let on_disk = file.read_page(PageId::new(table, n)).unwrap();
        assert_eq!(on_disk.iter().count(), 0);
    }

    txn.commit(db.buffer_pool()).unwrap();
    let mut total = 0;
    for n in 0..file.num_pages().unwrap() {
        total += file.read_page(PageId::new(table, n)).unwrap().iter().count();
    }
    assert_eq!(total, 5);
}

// S3: a sole shared holder upgrades in place; a reader arriving after the
// upgrade waits until the writer completes.
#[test]
fn test_lock_upgrade_then_blocked_reader() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new();
    let table = create_table(&db, &dir, "t", 1);
    insert_committed(&db, table, 1, &[&[1]]);

    let pid = PageId::new(table, 0);
    let a = TransactionId::new();
    db.buffer_pool()
        .get_page(a, pid, Permissions::ReadOnly)
        .unwrap();
    db.buffer_pool()
        .get_page(a, pid, Permissions::ReadWrite)
        .unwrap();
    assert!(db.lock_manager().is_write_locked(pid));

    let pool = Arc::clone(db.buffer_pool());
    let reader = thread::spawn(move || {
        let b = TransactionId::new();
        let result = pool.get_page(b, pid, Permissions::ReadOnly);
        pool.transaction_complete(b, result.is_ok());
        result.is_ok()
    });

    thread::sleep(Duration::from_millis(30));
    db.buffer_pool().transaction_complete(a, true);
    assert!(reader.join().unwrap());
}

// S4: two transactions waiting on each other's exclusive pages; the
// timeout breaks the deadlock and the survivor can finish.
#[test]
fn test_deadlock_resolved_by_timeout() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new();
    let table = create_table(&db, &dir, "t", 1);
    let file = db.catalog().table_file(table).unwrap();
    for n in 0..2 {
        file.write_page(&HeapPage::empty(PageId::new(table, n), int_desc(1)))
            .unwrap();
    }

    let p1 = PageId::new(table, 0);
    let p2 = PageId::new(table, 1);
    let a = TransactionId::new();
    let b = TransactionId::new();

    db.buffer_pool()
        .get_page(a, p1, Permissions::ReadWrite)
        .unwrap();
    db.buffer_pool()
        .get_page(b, p2, Permissions::ReadWrite)
        .unwrap();

    let pool_a = Arc::clone(db.buffer_pool());
    let wait_a = thread::spawn(move || pool_a.get_page(a, p2, Permissions::ReadOnly).is_ok());
    let pool_b = Arc::clone(db.buffer_pool());
    let wait_b = thread::spawn(move || pool_b.get_page(b, p1, Permissions::ReadOnly).is_ok());

    let a_ok = wait_a.join().unwrap();
    let b_ok = wait_b.join().unwrap();
    assert!(!a_ok || !b_ok, "a deadlock must abort at least one waiter");

    db.buffer_pool().transaction_complete(a, a_ok);
    db.buffer_pool().transaction_complete(b, b_ok);

    // all locks are gone: a fresh transaction can write both pages
    let c = TransactionId::new();
    db.buffer_pool()
        .get_page(c, p1, Permissions::ReadWrite)
        .unwrap();
    db.buffer_pool()
        .get_page(c, p2, Permissions::ReadWrite)
        .unwrap();
    db.buffer_pool().transaction_complete(c, true);
}

// S5: a capacity-2 pool reading three clean pages keeps two of them,
// dropping the oldest.
#[test]
fn test_eviction_keeps_pool_at_capacity() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let db = Database::with_pool_capacity(2);
    let table = create_table(&db, &dir, "t", 1);
    let file = db.catalog().table_file(table).unwrap();
    for n in 0..3 {
        file.write_page(&HeapPage::empty(PageId::new(table, n), int_desc(1)))
            .unwrap();
    }

    let txn = Transaction::new();
    for n in 0..3 {
        db.buffer_pool()
            .get_page(txn.id(), PageId::new(table, n), Permissions::ReadOnly)
            .unwrap();
    }

    assert_eq!(db.buffer_pool().cached_pages(), 2);
    assert!(!db.buffer_pool().is_cached(PageId::new(table, 0)));
    assert!(db.buffer_pool().is_cached(PageId::new(table, 2)));
    txn.commit(db.buffer_pool()).unwrap();
}

// S6: grouped aggregation.
#[test]
fn test_group_by_sum() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new();
    let table = create_table(&db, &dir, "s", 2);
    insert_committed(&db, table, 2, &[&[1, 10], &[1, 20], &[2, 30]]);

    let txn = Transaction::new();
    let scan = Box::new(SeqScan::new(Arc::clone(db.buffer_pool()), txn.id(), table, "s").unwrap());
    let mut agg = Aggregate::new(scan, 1, Some(0), AggOp::Sum).unwrap();
    agg.open().unwrap();

    let mut groups = Vec::new();
    while let Some(t) = agg.next().unwrap() {
        match (t.field(0).unwrap(), t.field(1).unwrap()) {
            (Field::Int(k), Field::Int(v)) => groups.push((*k, *v)),
            _ => unreachable!(),
        }
    }
    agg.close();
    txn.commit(db.buffer_pool()).unwrap();

    groups.sort_unstable();
    assert_eq!(groups, vec![(1, 30), (2, 30)]);
}

// Serializability smoke test: within a transaction, reads observe the
// transaction's own earlier writes.
#[test]
fn test_reads_see_own_writes() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new();
    let table = create_table(&db, &dir, "t", 1);

    let txn = Transaction::new();
    db.buffer_pool()
        .insert_tuple(txn.id(), table, &int_tuple(1, &[42]))
        .unwrap();

    let mut scan = SeqScan::new(Arc::clone(db.buffer_pool()), txn.id(), table, "t").unwrap();
    scan.open().unwrap();
    let t = scan.next().unwrap().unwrap();
    assert_eq!(t.field(0).unwrap(), &Field::Int(42));
    scan.close();
    txn.commit(db.buffer_pool()).unwrap();
}

// End-to-end operator pipeline: join two tables and project one column.
#[test]
fn test_join_through_tables() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new();
    let left = create_table(&db, &dir, "l", 2);
    let right = create_table(&db, &dir, "r", 1);
    insert_committed(&db, left, 2, &[&[1, 100], &[2, 200], &[3, 300]]);
    insert_committed(&db, right, 1, &[&[2], &[3], &[4]]);

    let txn = Transaction::new();
    let l = Box::new(SeqScan::new(Arc::clone(db.buffer_pool()), txn.id(), left, "l").unwrap());
    let r = Box::new(SeqScan::new(Arc::clone(db.buffer_pool()), txn.id(), right, "r").unwrap());
    let mut join = Join::new(JoinPredicate::new(0, Op::Equals, 0), l, r);
    join.open().unwrap();

    let mut matched = Vec::new();
    while let Some(t) = join.next().unwrap() {
        assert_eq!(t.fields().len(), 3);
        match t.field(1).unwrap() {
            Field::Int(v) => matched.push(*v),
            _ => unreachable!(),
        }
    }
    join.close();
    txn.commit(db.buffer_pool()).unwrap();

    matched.sort_unstable();
    assert_eq!(matched, vec![200, 300]);
}

// Insert operator drives mutation through the pool, so abort undoes it.
#[test]
fn test_insert_operator_respects_abort() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new();
    let source = create_table(&db, &dir, "src", 1);
    let sink = create_table(&db, &dir, "dst", 1);
    insert_committed(&db, source, 1, &[&[7], &[8]]);

    let txn = Transaction::new();
    let scan = Box::new(SeqScan::new(Arc::clone(db.buffer_pool()), txn.id(), source, "s").unwrap());
    let mut insert = Insert::new(Arc::clone(db.buffer_pool()), txn.id(), scan, sink).unwrap();
    insert.open().unwrap();
    let t = insert.next().unwrap().unwrap();
    assert_eq!(t.fields(), &[Field::Int(2)]);
    insert.close();
    txn.abort(db.buffer_pool()).unwrap();

    assert_eq!(scan_ints(&db, sink), Vec::<i32>::new());
    assert_eq!(scan_ints(&db, source), vec![7, 8]);
}

// Concurrent committed writers: all rows survive, none duplicated.
#[test]
fn test_concurrent_inserts_all_land() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Database::new());
    let table = create_table(&db, &dir, "t", 1);

    let mut handles = Vec::new();
    for worker in 0..4 {
        let db = Arc::clone(&db);
        handles.push(thread::spawn(move || {
            for i in 0..10 {
                let value = worker * 100 + i;
                // retry on lock-timeout aborts: each attempt is a fresh
                // transaction, as the abort contract requires
                loop {
                    let txn = Transaction::new();
                    let result =
                        db.buffer_pool()
                            .insert_tuple(txn.id(), table, &int_tuple(1, &[value]));
                    match result {
                        Ok(()) => {
                            txn.commit(db.buffer_pool()).unwrap();
                            break;
                        }
                        Err(err) if err.is_aborted() => {
                            txn.abort(db.buffer_pool()).unwrap();
                        }
                        Err(err) => panic!("unexpected error: {err}"),
                    }
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let mut expected: Vec<i32> = (0..4).flat_map(|w| (0..10).map(move |i| w * 100 + i)).collect();
    expected.sort_unstable();
    assert_eq!(scan_ints(&db, table), expected);
}

// A lock-timeout abort raised inside a scan surfaces through the
// operator layer, where the boundary must roll the transaction back.
#[test]
fn test_scan_abort_propagates_to_operator_layer() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new();
    let table = create_table(&db, &dir, "t", 1);
    insert_committed(&db, table, 1, &[&[1]]);

    // writer parks on the only page
    let writer = TransactionId::new();
    db.buffer_pool()
        .get_page(writer, PageId::new(table, 0), Permissions::ReadWrite)
        .unwrap();

    let reader = Transaction::new();
    let mut scan = SeqScan::new(Arc::clone(db.buffer_pool()), reader.id(), table, "t").unwrap();
    scan.open().unwrap();
    let err = scan.next().unwrap_err();
    assert!(err.is_aborted());
    scan.close();
    reader.abort(db.buffer_pool()).unwrap();

    db.buffer_pool().transaction_complete(writer, true);
}

// Schema file loading wires tables straight into a usable database.
#[test]
fn test_load_schema_end_to_end() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("catalog.txt"),
        "events (id int pk, tag string)\n",
    )
    .unwrap();

    let db = Database::new();
    db.load_schema(dir.path().join("catalog.txt")).unwrap();
    let table = db.catalog().table_id("events").unwrap();

    let desc = db.catalog().tuple_desc(table).unwrap();
    let txn = Transaction::new();
    let tuple = Tuple::new(
        desc,
        vec![Field::Int(1), Field::Text("boot".to_string())],
    )
    .unwrap();
    db.buffer_pool()
        .insert_tuple(txn.id(), table, &tuple)
        .unwrap();
    txn.commit(db.buffer_pool()).unwrap();

    let txn = Transaction::new();
    let mut scan = SeqScan::new(Arc::clone(db.buffer_pool()), txn.id(), table, "e").unwrap();
    assert_eq!(scan.tuple_desc().field_name(0).unwrap(), Some("e.id"));
    scan.open().unwrap();
    let row = scan.next().unwrap().unwrap();
    assert_eq!(row.field(1).unwrap(), &Field::Text("boot".to_string()));
    assert!(scan.next().unwrap().is_none());
    scan.close();
    txn.commit(db.buffer_pool()).unwrap();
}

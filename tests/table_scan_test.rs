use std::sync::Arc;

use anyhow::Result;

mod common;
use common::{test_dir, TestDb};

use centauridb::common::value::Value;
use centauridb::record::layout::Layout;
use centauridb::record::record_page::RecordPage;
use centauridb::record::schema::Schema;
use centauridb::record::table_scan::TableScan;

fn test_layout() -> Arc<Layout> {
    let mut schema = Schema::new();
    schema.add_int_field("a");
    schema.add_string_field("b", 9);
    Arc::new(Layout::new(schema))
}

#[test]
fn test_insert_scan_and_delete() -> Result<()> {
    let dir = test_dir();
    let db = TestDb::new(dir.path())?;
    let mut tx = db.new_tx()?;

    let layout = test_layout();
    let mut ts = TableScan::new(&mut tx, "t", layout.clone())?;

    // Enough records to spill over several blocks (slot is 21 bytes, so a
    // 400-byte block holds 19 of them).
    for i in 0..50 {
        ts.insert(&mut tx)?;
        ts.set_int(&mut tx, "a", i)?;
        ts.set_string(&mut tx, "b", &format!("rec{}", i))?;
    }

    ts.before_first(&mut tx)?;
    let mut seen = Vec::new();
    while ts.next(&mut tx)? {
        seen.push(ts.get_int(&mut tx, "a")?);
        assert_eq!(
            ts.get_string(&mut tx, "b")?,
            format!("rec{}", seen.last().copied().unwrap_or_default())
        );
    }
    assert_eq!(seen, (0..50).collect::<Vec<_>>());
    assert!(tx.size("t.tbl")? > 1);

    // Delete the even records.
    ts.before_first(&mut tx)?;
    while ts.next(&mut tx)? {
        if ts.get_int(&mut tx, "a")? % 2 == 0 {
            ts.delete(&mut tx)?;
        }
    }

    ts.before_first(&mut tx)?;
    let mut remaining = 0;
    while ts.next(&mut tx)? {
        assert_eq!(ts.get_int(&mut tx, "a")? % 2, 1);
        remaining += 1;
    }
    assert_eq!(remaining, 25);

    ts.close(&mut tx)?;
    tx.commit()?;
    Ok(())
}

#[test]
fn test_insert_reuses_deleted_slots() -> Result<()> {
    let dir = test_dir();
    let db = TestDb::new(dir.path())?;
    let mut tx = db.new_tx()?;

    let layout = test_layout();
    let mut ts = TableScan::new(&mut tx, "t", layout.clone())?;
    for i in 0..10 {
        ts.insert(&mut tx)?;
        ts.set_int(&mut tx, "a", i)?;
        ts.set_string(&mut tx, "b", "x")?;
    }
    let blocks_before = tx.size("t.tbl")?;

    ts.before_first(&mut tx)?;
    while ts.next(&mut tx)? {
        ts.delete(&mut tx)?;
    }

    ts.before_first(&mut tx)?;
    for i in 0..10 {
        ts.insert(&mut tx)?;
        ts.set_int(&mut tx, "a", 100 + i)?;
        ts.set_string(&mut tx, "b", "y")?;
    }
    assert_eq!(tx.size("t.tbl")?, blocks_before);

    ts.close(&mut tx)?;
    tx.commit()?;
    Ok(())
}

#[test]
fn test_move_to_rid() -> Result<()> {
    let dir = test_dir();
    let db = TestDb::new(dir.path())?;
    let mut tx = db.new_tx()?;

    let layout = test_layout();
    let mut ts = TableScan::new(&mut tx, "t", layout.clone())?;
    let mut rids = Vec::new();
    for i in 0..40 {
        ts.insert(&mut tx)?;
        ts.set_int(&mut tx, "a", i)?;
        ts.set_string(&mut tx, "b", "x")?;
        rids.push(ts.rid()?);
    }

    for (i, rid) in rids.iter().enumerate() {
        ts.move_to_rid(&mut tx, *rid)?;
        assert_eq!(ts.get_int(&mut tx, "a")?, i as i32);
    }

    ts.close(&mut tx)?;
    tx.commit()?;
    Ok(())
}

#[test]
fn test_typed_value_access() -> Result<()> {
    let dir = test_dir();
    let db = TestDb::new(dir.path())?;
    let mut tx = db.new_tx()?;

    let layout = test_layout();
    let mut ts = TableScan::new(&mut tx, "t", layout.clone())?;
    ts.insert(&mut tx)?;
    ts.set_val(&mut tx, "a", &Value::Int(5))?;
    ts.set_val(&mut tx, "b", &Value::from("hello"))?;

    assert_eq!(ts.get_val(&mut tx, "a")?, Value::Int(5));
    assert_eq!(ts.get_val(&mut tx, "b")?, Value::from("hello"));
    assert!(ts.has_field("a"));
    assert!(!ts.has_field("zzz"));

    ts.close(&mut tx)?;
    tx.commit()?;
    Ok(())
}

#[test]
fn test_record_page_slot_protocol() -> Result<()> {
    let dir = test_dir();
    let db = TestDb::new(dir.path())?;
    let mut tx = db.new_tx()?;

    let layout = test_layout();
    let block = tx.append("rp.tbl")?;
    let rp = RecordPage::new(&mut tx, block.clone(), layout.clone())?;
    rp.format(&mut tx)?;

    // Fill every slot.
    let mut slot = rp.insert_after(&mut tx, -1)?;
    let mut count = 0;
    while slot >= 0 {
        rp.set_int(&mut tx, slot, "a", slot)?;
        rp.set_string(&mut tx, slot, "b", &format!("s{}", slot))?;
        count += 1;
        slot = rp.insert_after(&mut tx, slot)?;
    }
    // 400-byte block, 21-byte slots.
    assert_eq!(count, 19);

    // Walk the used slots and delete one.
    let first = rp.next_after(&mut tx, -1)?;
    assert_eq!(first, 0);
    rp.delete(&mut tx, 0)?;
    assert_eq!(rp.next_after(&mut tx, -1)?, 1);

    // The freed slot is the next insertion point.
    assert_eq!(rp.insert_after(&mut tx, -1)?, 0);

    tx.commit()?;
    Ok(())
}

use std::sync::Arc;

use anyhow::Result;

mod common;
use common::{test_dir, TestDb};

use centauridb::common::value::Value;
use centauridb::index::btree::BTreeIndex;
use centauridb::index::Index;
use centauridb::record::layout::Layout;
use centauridb::record::rid::Rid;
use centauridb::record::schema::Schema;

fn int_leaf_layout() -> Arc<Layout> {
    let mut schema = Schema::new();
    schema.add_int_field("block");
    schema.add_int_field("id");
    schema.add_int_field("dataval");
    Arc::new(Layout::new(schema))
}

fn varchar_leaf_layout() -> Arc<Layout> {
    let mut schema = Schema::new();
    schema.add_int_field("block");
    schema.add_int_field("id");
    schema.add_string_field("dataval", 8);
    Arc::new(Layout::new(schema))
}

#[test]
fn test_search_after_many_inserts() -> Result<()> {
    let dir = test_dir();
    let db = TestDb::new(dir.path())?;
    let mut tx = db.new_tx()?;

    let mut index = BTreeIndex::new(&mut tx, "idx", int_leaf_layout())?;
    for i in 0..200 {
        index.insert(&mut tx, &Value::Int(i), Rid::new(i / 10 + 1, i % 10 + 1))?;
    }

    for i in 0..200 {
        index.before_first(&mut tx, &Value::Int(i))?;
        assert!(index.next(&mut tx)?, "key {} not found", i);
        assert_eq!(index.data_rid(&mut tx)?, Rid::new(i / 10 + 1, i % 10 + 1));
    }
    index.close(&mut tx)?;
    tx.commit()?;
    Ok(())
}

#[test]
fn test_duplicate_keys_spill_into_overflow() -> Result<()> {
    let dir = test_dir();
    let db = TestDb::new(dir.path())?;
    let mut tx = db.new_tx()?;

    let mut index = BTreeIndex::new(&mut tx, "idx", int_leaf_layout())?;
    let mut expected = Vec::new();
    for i in 0..100 {
        let rid = Rid::new(i / 10 + 1, i % 10 + 1);
        index.insert(&mut tx, &Value::Int(42), rid)?;
        expected.push(rid);
    }

    index.before_first(&mut tx, &Value::Int(42))?;
    let mut found = Vec::new();
    while index.next(&mut tx)? {
        found.push(index.data_rid(&mut tx)?);
    }
    index.close(&mut tx)?;

    assert_eq!(found.len(), 100);
    expected.sort_by_key(|r| (r.block_number(), r.slot()));
    found.sort_by_key(|r| (r.block_number(), r.slot()));
    assert_eq!(found, expected);
    tx.commit()?;
    Ok(())
}

#[test]
fn test_duplicates_do_not_bleed_into_other_keys() -> Result<()> {
    let dir = test_dir();
    let db = TestDb::new(dir.path())?;
    let mut tx = db.new_tx()?;

    let mut index = BTreeIndex::new(&mut tx, "idx", int_leaf_layout())?;
    for i in 0..60 {
        index.insert(&mut tx, &Value::Int(5), Rid::new(1, i))?;
    }
    index.insert(&mut tx, &Value::Int(3), Rid::new(2, 0))?;
    index.insert(&mut tx, &Value::Int(9), Rid::new(3, 0))?;

    for (key, rid) in [(3, Rid::new(2, 0)), (9, Rid::new(3, 0))] {
        index.before_first(&mut tx, &Value::Int(key))?;
        assert!(index.next(&mut tx)?);
        assert_eq!(index.data_rid(&mut tx)?, rid);
        assert!(!index.next(&mut tx)?);
    }

    index.before_first(&mut tx, &Value::Int(5))?;
    let mut count = 0;
    while index.next(&mut tx)? {
        count += 1;
    }
    assert_eq!(count, 60);

    index.close(&mut tx)?;
    tx.commit()?;
    Ok(())
}

#[test]
fn test_delete_removes_single_entry() -> Result<()> {
    let dir = test_dir();
    let db = TestDb::new(dir.path())?;
    let mut tx = db.new_tx()?;

    let mut index = BTreeIndex::new(&mut tx, "idx", int_leaf_layout())?;
    for i in 0..20 {
        index.insert(&mut tx, &Value::Int(i), Rid::new(0, i))?;
    }
    index.delete(&mut tx, &Value::Int(7), Rid::new(0, 7))?;

    index.before_first(&mut tx, &Value::Int(7))?;
    assert!(!index.next(&mut tx)?);

    // Neighbors survive.
    index.before_first(&mut tx, &Value::Int(6))?;
    assert!(index.next(&mut tx)?);
    index.before_first(&mut tx, &Value::Int(8))?;
    assert!(index.next(&mut tx)?);

    index.close(&mut tx)?;
    tx.commit()?;
    Ok(())
}

#[test]
fn test_varchar_keys() -> Result<()> {
    let dir = test_dir();
    let db = TestDb::new(dir.path())?;
    let mut tx = db.new_tx()?;

    let mut index = BTreeIndex::new(&mut tx, "idx", varchar_leaf_layout())?;
    for i in 0..80 {
        let key = Value::Varchar(format!("key{:04}", i));
        index.insert(&mut tx, &key, Rid::new(1, i))?;
    }

    for i in 0..80 {
        let key = Value::Varchar(format!("key{:04}", i));
        index.before_first(&mut tx, &key)?;
        assert!(index.next(&mut tx)?, "key{:04} not found", i);
        assert_eq!(index.data_rid(&mut tx)?, Rid::new(1, i));
    }

    index.close(&mut tx)?;
    tx.commit()?;
    Ok(())
}

#[test]
fn test_index_survives_commit_boundaries() -> Result<()> {
    let dir = test_dir();
    let db = TestDb::new(dir.path())?;

    {
        let mut tx = db.new_tx()?;
        let mut index = BTreeIndex::new(&mut tx, "idx", int_leaf_layout())?;
        for i in 0..50 {
            index.insert(&mut tx, &Value::Int(i), Rid::new(0, i))?;
        }
        index.close(&mut tx)?;
        tx.commit()?;
    }

    let mut tx = db.new_tx()?;
    let mut index = BTreeIndex::new(&mut tx, "idx", int_leaf_layout())?;
    for i in 0..50 {
        index.before_first(&mut tx, &Value::Int(i))?;
        assert!(index.next(&mut tx)?);
        assert_eq!(index.data_rid(&mut tx)?, Rid::new(0, i));
    }
    index.close(&mut tx)?;
    tx.commit()?;
    Ok(())
}

#[test]
fn test_search_cost_formula() {
    // One leaf access plus the directory height.
    assert_eq!(BTreeIndex::search_cost(1, 24), 1);
    assert_eq!(BTreeIndex::search_cost(30, 10), 3);
    assert_eq!(BTreeIndex::search_cost(200, 24), 3);
}

use std::collections::HashMap;

use crate::storage::file::page;
use crate::record::schema::{FieldType, Schema};

/// Offset of the first field within a slot; byte 0 holds the usage flag.
const FLAG_BYTES: usize = 4;

/// The physical layout of a record according to its schema: a byte offset
/// for each field and the total slot size. Computed once when a table is
/// created, or rebuilt from catalog metadata.
#[derive(Debug, Clone)]
pub struct Layout {
    schema: Schema,
    offsets: HashMap<String, usize>,
    slot_size: usize,
}

impl Layout {
    /// Assigns each field its offset, in schema order, after the flag word.
    pub fn new(schema: Schema) -> Self {
        let mut offsets = HashMap::new();
        let mut pos = FLAG_BYTES;
        for name in schema.fields() {
            offsets.insert(name.clone(), pos);
            pos += Self::length_in_bytes(&schema, name);
        }
        Self {
            schema,
            offsets,
            slot_size: pos,
        }
    }

    /// Rebuilds a layout from previously computed metadata.
    pub fn from_metadata(schema: Schema, offsets: HashMap<String, usize>, slot_size: usize) -> Self {
        Self {
            schema,
            offsets,
            slot_size,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Byte offset of the field within a slot.
    pub fn offset(&self, name: &str) -> Option<usize> {
        self.offsets.get(name).copied()
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    fn length_in_bytes(schema: &Schema, name: &str) -> usize {
        match schema.field_type(name) {
            Some(FieldType::Integer) => 4,
            Some(FieldType::Varchar) => page::max_length(schema.length(name).unwrap_or(0)),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_follow_schema_order() {
        let mut schema = Schema::new();
        schema.add_int_field("a");
        schema.add_string_field("b", 9);
        schema.add_int_field("c");
        let layout = Layout::new(schema);

        assert_eq!(layout.offset("a"), Some(4));
        assert_eq!(layout.offset("b"), Some(8));
        // varchar(9) occupies 4 + 9 bytes
        assert_eq!(layout.offset("c"), Some(21));
        assert_eq!(layout.slot_size(), 25);
    }

    #[test]
    fn test_unknown_field_has_no_offset() {
        let layout = Layout::new(Schema::new());
        assert_eq!(layout.offset("nope"), None);
        assert_eq!(layout.slot_size(), 4);
    }
}

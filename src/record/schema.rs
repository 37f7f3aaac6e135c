use std::collections::HashMap;

/// The two field types records can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Varchar,
}

#[derive(Debug, Clone, Copy)]
struct FieldInfo {
    field_type: FieldType,
    length: usize,
}

/// The record schema of a table: the name and type of each field, in
/// declaration order, plus the declared length of varchar fields.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<String>,
    info: HashMap<String, FieldInfo>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field. The length only matters for varchar fields.
    pub fn add_field(&mut self, name: &str, field_type: FieldType, length: usize) {
        self.fields.push(name.to_string());
        self.info
            .insert(name.to_string(), FieldInfo { field_type, length });
    }

    pub fn add_int_field(&mut self, name: &str) {
        self.add_field(name, FieldType::Integer, 0);
    }

    /// Adds a varchar field; `length` is the declared character count, as
    /// in `varchar(8)`.
    pub fn add_string_field(&mut self, name: &str, length: usize) {
        self.add_field(name, FieldType::Varchar, length);
    }

    /// Copies the named field's declaration from another schema.
    pub fn add(&mut self, name: &str, other: &Schema) {
        if let Some(info) = other.info.get(name) {
            self.add_field(name, info.field_type, info.length);
        }
    }

    /// Copies every field of the other schema into this one.
    pub fn add_all(&mut self, other: &Schema) {
        for name in other.fields() {
            self.add(name, other);
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.info.contains_key(name)
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.info.get(name).map(|i| i.field_type)
    }

    /// Declared length of a varchar field; meaningless for integers.
    pub fn length(&self, name: &str) -> Option<usize> {
        self.info.get(name).map(|i| i.length)
    }
}

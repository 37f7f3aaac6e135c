use byteorder::{BigEndian, ByteOrder};

/// Number of bytes needed to store a string of the given character length:
/// a 4-byte length prefix plus one byte per character (single-byte encoding
/// is assumed when sizing fixed-width fields).
pub fn max_length(strlen: usize) -> usize {
    4 + strlen
}

/// A fixed-size byte buffer holding the contents of one disk block.
///
/// Integers are stored as 4-byte big-endian values. Byte arrays and strings
/// are stored with a 4-byte big-endian length prefix followed by the payload.
#[derive(Debug)]
pub struct Page {
    contents: Vec<u8>,
}

impl Page {
    /// Creates a zeroed page of the given block size.
    pub fn new(block_size: usize) -> Self {
        Self {
            contents: vec![0; block_size],
        }
    }

    /// Wraps an existing byte buffer, used for building log records.
    pub fn from_bytes(contents: Vec<u8>) -> Self {
        Self { contents }
    }

    pub fn get_int(&self, offset: usize) -> i32 {
        BigEndian::read_i32(&self.contents[offset..offset + 4])
    }

    pub fn set_int(&mut self, offset: usize, val: i32) {
        BigEndian::write_i32(&mut self.contents[offset..offset + 4], val);
    }

    pub fn get_bytes(&self, offset: usize) -> Vec<u8> {
        let len = BigEndian::read_u32(&self.contents[offset..offset + 4]) as usize;
        self.contents[offset + 4..offset + 4 + len].to_vec()
    }

    pub fn set_bytes(&mut self, offset: usize, bytes: &[u8]) {
        BigEndian::write_u32(&mut self.contents[offset..offset + 4], bytes.len() as u32);
        self.contents[offset + 4..offset + 4 + bytes.len()].copy_from_slice(bytes);
    }

    pub fn get_string(&self, offset: usize) -> String {
        String::from_utf8_lossy(&self.get_bytes(offset)).into_owned()
    }

    pub fn set_string(&mut self, offset: usize, val: &str) {
        self.set_bytes(offset, val.as_bytes());
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn contents_mut(&mut self) -> &mut [u8] {
        &mut self.contents
    }

    /// Consumes the page, yielding the underlying buffer.
    pub fn into_contents(self) -> Vec<u8> {
        self.contents
    }
}

// Canonical encoding used for hashing and signing
//
// Version 1 layout: compact JSON with a fixed key order declared by each
// type, no whitespace, strings escaped as JSON, integers in decimal, amounts as
// bare decimal literals without exponent or trailing fractional zeros, absent
// optionals written as `null`. Field order never depends on map iteration.

use crate::core::Amount;

/// Types with a fixed, documented byte encoding
pub trait Canonical {
    fn write_canonical(&self, out: &mut CanonicalWriter);

    fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = CanonicalWriter::new();
        self.write_canonical(&mut out);
        out.into_bytes()
    }
}

impl<T: Canonical> Canonical for [T] {
    fn write_canonical(&self, out: &mut CanonicalWriter) {
        out.begin_array();
        for item in self {
            out.element(item);
        }
        out.end_array();
    }
}

/// Append-only writer for canonical objects and arrays
pub struct CanonicalWriter {
    buf: Vec<u8>,
    // one entry per open container: has it received an item yet
    open: Vec<bool>,
}

impl CanonicalWriter {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            open: Vec::new(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn begin_object(&mut self) -> &mut Self {
        self.buf.push(b'{');
        self.open.push(false);
        self
    }

    pub fn end_object(&mut self) -> &mut Self {
        self.open.pop();
        self.buf.push(b'}');
        self
    }

    pub fn begin_array(&mut self) -> &mut Self {
        self.buf.push(b'[');
        self.open.push(false);
        self
    }

    pub fn end_array(&mut self) -> &mut Self {
        self.open.pop();
        self.buf.push(b']');
        self
    }

    pub fn field_str(&mut self, key: &str, value: &str) -> &mut Self {
        self.key(key);
        self.string(value);
        self
    }

    pub fn field_opt_str(&mut self, key: &str, value: Option<&str>) -> &mut Self {
        self.key(key);
        match value {
            Some(v) => self.string(v),
            None => self.buf.extend_from_slice(b"null"),
        }
        self
    }

    pub fn field_u64(&mut self, key: &str, value: u64) -> &mut Self {
        self.key(key);
        self.buf.extend_from_slice(value.to_string().as_bytes());
        self
    }

    pub fn field_amount(&mut self, key: &str, value: Amount) -> &mut Self {
        self.key(key);
        self.buf
            .extend_from_slice(value.to_decimal_string().as_bytes());
        self
    }

    pub fn field<T: Canonical + ?Sized>(&mut self, key: &str, value: &T) -> &mut Self {
        self.key(key);
        value.write_canonical(self);
        self
    }

    pub fn element<T: Canonical + ?Sized>(&mut self, value: &T) -> &mut Self {
        self.separator();
        value.write_canonical(self);
        self
    }

    fn key(&mut self, key: &str) {
        self.separator();
        self.string(key);
        self.buf.push(b':');
    }

    fn separator(&mut self) {
        if let Some(seen) = self.open.last_mut() {
            if *seen {
                self.buf.push(b',');
            }
            *seen = true;
        }
    }

    fn string(&mut self, value: &str) {
        let quoted = serde_json::Value::String(value.to_string()).to_string();
        self.buf.extend_from_slice(quoted.as_bytes());
    }
}

impl Default for CanonicalWriter {
    fn default() -> Self {
        Self::new()
    }
}

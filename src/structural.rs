//! Schema-independent deep value operations: clone, equality, content hash.
//!
//! `hash_value` is a deterministic 64-bit FNV-1a fingerprint with explicit
//! kind tags and separators, insensitive to object key insertion order, and
//! consistent with `equal`: equal values always fingerprint identically.
//! Downstream collections use it as a map/set key.

use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// CLONE
// ————————————————————————————————————————————————————————————————————————————

/// Deep copy. Buffers and dates copy by content; symbol and opaque handles
/// keep their identity (they are not content-copyable).
pub fn clone_value(value: &Value) -> Value {
    // `Value` owns its containers, so the derived clone already deep-copies
    // content and Arc-clones the identity handles.
    value.clone()
}

// ————————————————————————————————————————————————————————————————————————————
// EQUAL
// ————————————————————————————————————————————————————————————————————————————

/// Structural equality: identical key sets for objects (order ignored),
/// order- and length-sensitive arrays, identity for symbols and opaques.
pub fn equal(a: &Value, b: &Value) -> bool {
    a == b
}

// ————————————————————————————————————————————————————————————————————————————
// HASH
// ————————————————————————————————————————————————————————————————————————————

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

struct Fnv(u64);

impl Fnv {
    fn new() -> Self {
        Fnv(FNV_OFFSET)
    }

    fn byte(&mut self, b: u8) {
        self.0 ^= u64::from(b);
        self.0 = self.0.wrapping_mul(FNV_PRIME);
    }

    fn bytes(&mut self, bs: &[u8]) {
        for &b in bs {
            self.byte(b);
        }
    }

    fn u64(&mut self, x: u64) {
        self.bytes(&x.to_le_bytes());
    }
}

// Kind tags keep e.g. Bytes([1]) and Array([1]) apart.
mod tag {
    pub const NULL: u8 = 0x01;
    pub const UNDEFINED: u8 = 0x02;
    pub const BOOL: u8 = 0x03;
    pub const NUMBER: u8 = 0x04;
    pub const BIGINT: u8 = 0x05;
    pub const STRING: u8 = 0x06;
    pub const SYMBOL: u8 = 0x07;
    pub const DATE: u8 = 0x08;
    pub const BYTES: u8 = 0x09;
    pub const ARRAY: u8 = 0x0a;
    pub const OBJECT: u8 = 0x0b;
    pub const FUNC: u8 = 0x0c;
    pub const ITER: u8 = 0x0d;
    pub const SEP: u8 = 0xff;
}

/// Deterministic content fingerprint with `equal(a, b) => hash(a) == hash(b)`.
pub fn hash_value(value: &Value) -> u64 {
    let mut h = Fnv::new();
    hash_into(value, &mut h);
    h.0
}

fn hash_into(value: &Value, h: &mut Fnv) {
    match value {
        Value::Null => h.byte(tag::NULL),
        Value::Undefined => h.byte(tag::UNDEFINED),
        Value::Bool(b) => {
            h.byte(tag::BOOL);
            h.byte(u8::from(*b));
        }
        Value::Number(n) => {
            h.byte(tag::NUMBER);
            // canonicalize: -0.0 == 0.0 under equal, and all NaN payloads
            // compare equal under OrderedFloat
            let canonical = if n.0 == 0.0 {
                0.0f64
            } else if n.0.is_nan() {
                f64::NAN
            } else {
                n.0
            };
            h.u64(canonical.to_bits());
        }
        Value::BigInt(i) => {
            h.byte(tag::BIGINT);
            h.bytes(&i.to_le_bytes());
        }
        Value::String(s) => {
            h.byte(tag::STRING);
            h.bytes(s.as_bytes());
            h.byte(tag::SEP);
        }
        Value::Symbol(s) => {
            h.byte(tag::SYMBOL);
            h.u64(s.id());
        }
        Value::Date(d) => {
            h.byte(tag::DATE);
            h.u64(d.timestamp_millis() as u64);
        }
        Value::Bytes(bs) => {
            h.byte(tag::BYTES);
            h.u64(bs.len() as u64);
            h.bytes(bs);
        }
        Value::Array(xs) => {
            h.byte(tag::ARRAY);
            h.u64(xs.len() as u64);
            for x in xs {
                hash_into(x, h);
                h.byte(tag::SEP);
            }
        }
        Value::Object(m) => {
            // sort keys so insertion order cannot leak into the fingerprint
            h.byte(tag::OBJECT);
            h.u64(m.len() as u64);
            let mut keys: Vec<&String> = m.keys().collect();
            keys.sort_unstable();
            for k in keys {
                h.bytes(k.as_bytes());
                h.byte(tag::SEP);
                hash_into(&m[k.as_str()], h);
                h.byte(tag::SEP);
            }
        }
        Value::Func(o) => {
            h.byte(tag::FUNC);
            h.u64(o.id());
        }
        Value::Iter(o) => {
            h.byte(tag::ITER);
            h.u64(o.id());
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

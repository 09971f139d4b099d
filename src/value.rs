use serde::{Deserialize, Serialize};

/// A single attribute value read out of an ESE record.
///
/// The source database is untyped at the column level (every column is one
/// of a handful of physical storage kinds); `Value` mirrors that rather than
/// trying to recover AD's richer LDAP syntax types.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    Bytes(Vec<u8>),
    Str(String),
    IntList(Vec<i32>),
}

impl Value {
    /// Interprets the value as a single integer, for columns such as
    /// `object_class` that are sometimes stored as a scalar and sometimes as
    /// a one-element list.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I32(v) => Some(*v as i64),
            Value::I64(v) => Some(*v),
            Value::U32(v) => Some(*v as i64),
            Value::U64(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Expands this value into the list of object-class IDs it represents,
    /// per spec: a scalar becomes a singleton, a list passes through, and
    /// anything else (including absence) becomes empty.
    pub fn as_int_list(&self) -> Vec<i64> {
        match self {
            Value::IntList(v) => v.iter().map(|x| *x as i64).collect(),
            Value::I32(_) | Value::I64(_) | Value::U32(_) | Value::U64(_) => {
                self.as_i64().into_iter().collect()
            }
            _ => Vec::new(),
        }
    }

    /// True if this is a "truthy" flag value (used for `is_deleted`).
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::I32(v) => *v != 0,
            Value::I64(v) => *v != 0,
            Value::U32(v) => *v != 0,
            Value::U64(v) => *v != 0,
            Value::Bytes(b) => !b.is_empty(),
            Value::Str(s) => !s.is_empty(),
            Value::IntList(l) => !l.is_empty(),
        }
    }

    /// Renders the value the way `serialize_record` does: bytes become a hex
    /// string, everything else passes through unchanged.
    pub fn into_serializable(self) -> Value {
        match self {
            Value::Bytes(b) => Value::Str(hex::encode(b)),
            other => other,
        }
    }
}

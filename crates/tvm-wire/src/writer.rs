use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};
use tvm_core::Value;

use crate::{
    data_type::{DataType, VALUE_NULL, VALUE_PRESENT},
    error::{Result, WireError},
    reader::MAX_DEPTH,
};

/// Writes fully-qualified values: a type code, a value flag, then the payload.
///
/// Containers are written as a big-endian `i32` count followed by their elements, in
/// the container's own order.
#[derive(Debug)]
pub struct WireWriter<W: Write> {
    inner: W,
}

impl<W: Write> WireWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write(&mut self, value: &Value) -> Result<()> {
        self.value(value, 0)
    }

    fn value(&mut self, value: &Value, depth: usize) -> Result<()> {
        let nested = depth + 1;
        if matches!(value, Value::List(_) | Value::Map(_) | Value::Path(_)) && nested > MAX_DEPTH {
            return Err(WireError::DepthExceeded(MAX_DEPTH));
        }

        match value {
            Value::Null => self.header(DataType::UnspecifiedNull, VALUE_NULL),
            Value::Bool(b) => {
                self.header(DataType::Boolean, VALUE_PRESENT)?;
                self.inner.write_u8(u8::from(*b))?;
                Ok(())
            }
            Value::Int(i) => {
                self.header(DataType::Long, VALUE_PRESENT)?;
                self.inner.write_i64::<BigEndian>(*i)?;
                Ok(())
            }
            Value::Str(s) => {
                self.header(DataType::String, VALUE_PRESENT)?;
                self.string(s)
            }
            Value::List(values) => {
                self.header(DataType::List, VALUE_PRESENT)?;
                self.length(values.len())?;
                values.iter().try_for_each(|value| self.value(value, nested))
            }
            Value::Map(tuple) => {
                self.header(DataType::Map, VALUE_PRESENT)?;
                self.length(tuple.len())?;
                for (key, value) in tuple.entries() {
                    self.value(key, nested)?;
                    self.value(value, nested)?;
                }
                Ok(())
            }
            Value::Path(path) => {
                self.header(DataType::Path, VALUE_PRESENT)?;
                self.length(path.size())?;
                for (label, object) in path.iter() {
                    match label {
                        Some(label) => self.value(&Value::from(label), nested)?,
                        None => self.value(&Value::Null, nested)?,
                    }
                    self.value(object, nested)?;
                }
                Ok(())
            }
            Value::Structure(_) => Err(WireError::Unsupported(value.type_name())),
        }
    }

    fn header(&mut self, data_type: DataType, flag: u8) -> Result<()> {
        self.inner.write_u8(data_type.code())?;
        self.inner.write_u8(flag)?;
        Ok(())
    }

    fn length(&mut self, length: usize) -> Result<()> {
        let length = i32::try_from(length).map_err(|_| WireError::LengthOverflow(length))?;
        self.inner.write_i32::<BigEndian>(length)?;
        Ok(())
    }

    fn string(&mut self, s: &str) -> Result<()> {
        self.length(s.len())?;
        self.inner.write_all(s.as_bytes())?;
        Ok(())
    }
}

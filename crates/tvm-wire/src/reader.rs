use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};
use tvm_core::{Path, Tuple, Value};

use crate::{
    data_type::{DataType, VALUE_NULL, VALUE_PRESENT},
    error::{Result, WireError},
};

/// Upper bound on capacity reserved from a length prefix before any element is read.
const MAX_PREALLOCATION: usize = 1024;

/// Deepest container nesting accepted on either side of the wire.
pub const MAX_DEPTH: usize = 128;

/// Reads values written by [`WireWriter`](crate::WireWriter).
#[derive(Debug)]
pub struct WireReader<R: Read> {
    inner: R,
}

impl<R: Read> WireReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn read(&mut self) -> Result<Value> {
        self.value(0)
    }

    fn value(&mut self, depth: usize) -> Result<Value> {
        let data_type = DataType::try_from(self.inner.read_u8()?)?;
        match self.inner.read_u8()? {
            VALUE_NULL => return Ok(Value::Null),
            VALUE_PRESENT => {}
            flag => return Err(WireError::InvalidFlag(flag)),
        }

        let nested = depth + 1;
        if data_type.is_container() && nested > MAX_DEPTH {
            return Err(WireError::DepthExceeded(MAX_DEPTH));
        }

        match data_type {
            DataType::UnspecifiedNull => Err(WireError::InvalidFlag(VALUE_PRESENT)),
            DataType::Boolean => Ok(Value::Bool(self.inner.read_u8()? != 0)),
            DataType::Long => Ok(Value::Int(self.inner.read_i64::<BigEndian>()?)),
            DataType::String => self.string().map(Value::from),
            DataType::List => {
                let length = self.length()?;
                let mut values = Vec::with_capacity(length.min(MAX_PREALLOCATION));
                for _ in 0..length {
                    values.push(self.value(nested)?);
                }
                Ok(Value::List(values))
            }
            DataType::Map => {
                let length = self.length()?;
                let mut tuple = Tuple::with_capacity(length.min(MAX_PREALLOCATION));
                for _ in 0..length {
                    let key = self.value(nested)?;
                    let value = self.value(nested)?;
                    tuple.set(key, value);
                }
                Ok(Value::Map(tuple))
            }
            DataType::Path => {
                let length = self.length()?;
                let mut path = Path::new();
                for _ in 0..length {
                    let label = match self.value(nested)? {
                        Value::Null => None,
                        Value::Str(label) => Some(label),
                        other => {
                            return Err(WireError::UnexpectedType {
                                expected: "string",
                                found: other.type_name(),
                            });
                        }
                    };
                    path.add(label, self.value(nested)?);
                }
                Ok(Value::Path(path))
            }
        }
    }

    fn length(&mut self) -> Result<usize> {
        let length = self.inner.read_i32::<BigEndian>()?;
        usize::try_from(length).map_err(|_| WireError::NegativeLength(length))
    }

    fn string(&mut self) -> Result<String> {
        let length = self.length()?;
        let mut bytes = Vec::with_capacity(length.min(MAX_PREALLOCATION));
        (&mut self.inner).take(length as u64).read_to_end(&mut bytes)?;
        if bytes.len() < length {
            return Err(WireError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        Ok(String::from_utf8(bytes)?)
    }
}

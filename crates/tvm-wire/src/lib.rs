//! Binary codec for [`Value`]s crossing a process boundary.
//!
//! Every value is written fully qualified: a one-byte type code, a one-byte value flag
//! and the payload. Lists, maps and paths carry a big-endian `i32` count followed by
//! that many self-describing elements; maps are written in entry order and read back
//! in the order their pairs are encountered.
//!
//! ```rs
//! let bytes = tvm_wire::to_bytes(&value)?;
//! assert_eq!(tvm_wire::from_bytes(&bytes)?, value);
//! ```
mod data_type;
mod error;
mod reader;
mod writer;

use std::io::Cursor;

use tvm_core::Value;

pub use data_type::DataType;
pub use error::{Result, WireError};
pub use reader::{MAX_DEPTH, WireReader};
pub use writer::WireWriter;

pub fn to_bytes(value: &Value) -> Result<Vec<u8>> {
    let mut writer = WireWriter::new(Vec::new());
    writer.write(value)?;
    Ok(writer.into_inner())
}

/// Decodes exactly one value from `bytes`.
pub fn from_bytes(bytes: &[u8]) -> Result<Value> {
    let mut reader = WireReader::new(Cursor::new(bytes));
    let value = reader.read()?;
    let consumed = reader.into_inner().position() as usize;
    match bytes.len() - consumed {
        0 => Ok(value),
        trailing => Err(WireError::TrailingBytes(trailing)),
    }
}

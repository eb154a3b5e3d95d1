use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WireError>;

#[derive(Debug, Error, Diagnostic)]
pub enum WireError {
    #[error("Unknown type code 0x{0:02x}")]
    #[diagnostic(code(tvm_wire::unknown_type))]
    UnknownType(u8),

    #[error("Invalid value flag 0x{0:02x}")]
    #[diagnostic(code(tvm_wire::invalid_flag))]
    InvalidFlag(u8),

    #[error("Negative length {0}")]
    #[diagnostic(code(tvm_wire::negative_length))]
    NegativeLength(i32),

    #[error("Length {0} does not fit in a 32-bit signed prefix")]
    #[diagnostic(code(tvm_wire::length_overflow))]
    LengthOverflow(usize),

    #[error("Values of type {0} cannot be encoded")]
    #[diagnostic(
        code(tvm_wire::unsupported),
        help("Structure handles are bound to one execution and never cross the wire.")
    )]
    Unsupported(&'static str),

    #[error("Expected {expected}, got {found}")]
    #[diagnostic(code(tvm_wire::unexpected_type))]
    UnexpectedType { expected: &'static str, found: &'static str },

    #[error("Containers nested deeper than {0} levels")]
    #[diagnostic(code(tvm_wire::depth_exceeded))]
    DepthExceeded(usize),

    #[error("{0} trailing bytes after the value")]
    #[diagnostic(code(tvm_wire::trailing_bytes))]
    TrailingBytes(usize),

    #[error("Invalid UTF-8 in string: {0}")]
    #[diagnostic(code(tvm_wire::invalid_utf8))]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error(transparent)]
    #[diagnostic(code(tvm_wire::io))]
    Io(#[from] std::io::Error),
}

use crate::error::WireError;

/// Type code written ahead of every fully-qualified value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataType {
    Long = 0x02,
    String = 0x03,
    List = 0x09,
    Map = 0x0a,
    Path = 0x0e,
    Boolean = 0x27,
    UnspecifiedNull = 0xfe,
}

impl DataType {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether the payload holds further fully-qualified values.
    pub fn is_container(self) -> bool {
        matches!(self, DataType::List | DataType::Map | DataType::Path)
    }
}

impl TryFrom<u8> for DataType {
    type Error = WireError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x02 => Ok(DataType::Long),
            0x03 => Ok(DataType::String),
            0x09 => Ok(DataType::List),
            0x0a => Ok(DataType::Map),
            0x0e => Ok(DataType::Path),
            0x27 => Ok(DataType::Boolean),
            0xfe => Ok(DataType::UnspecifiedNull),
            _ => Err(WireError::UnknownType(code)),
        }
    }
}

/// Flag following the type code: whether a payload follows.
pub(crate) const VALUE_PRESENT: u8 = 0x00;
pub(crate) const VALUE_NULL: u8 = 0x01;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DataType::Long)]
    #[case(DataType::String)]
    #[case(DataType::List)]
    #[case(DataType::Map)]
    #[case(DataType::Path)]
    #[case(DataType::Boolean)]
    #[case(DataType::UnspecifiedNull)]
    fn test_code_is_recognized(#[case] data_type: DataType) {
        assert_eq!(DataType::try_from(data_type.code()).ok(), Some(data_type));
    }

    #[test]
    fn test_unknown_code() {
        assert!(matches!(DataType::try_from(0x42), Err(WireError::UnknownType(0x42))));
    }
}

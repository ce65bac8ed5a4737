//! ## [Property Data Types](https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/MS-OXCDATA/0c77892e-288e-435a-9c49-be1c20c7afdb)

use super::*;

#[repr(u16)]
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum PropertyType {
    /// `PtypNull`: a placeholder
    #[default]
    Null = 0x0001,
    /// `PtypInteger16`
    Integer16 = 0x0002,
    /// `PtypInteger32`
    Integer32 = 0x0003,
    /// `PtypFloating32`
    Floating32 = 0x0004,
    /// `PtypFloating64`
    Floating64 = 0x0005,
    /// `PtypCurrency`: 64-bit scaled integer, four decimal places
    Currency = 0x0006,
    /// `PtypFloatingTime`: days since 1899-12-30 with a day fraction
    FloatingTime = 0x0007,
    /// `PtypErrorCode`
    ErrorCode = 0x000A,
    /// `PtypBoolean`
    Boolean = 0x000B,
    /// `PtypObject`: reference to a sub-node carrying the real payload
    Object = 0x000D,
    /// `PtypInteger64`
    Integer64 = 0x0014,
    /// `PtypString8`: 8-bit characters in an externally specified codepage
    String8 = 0x001E,
    /// `PtypString`: UTF-16LE
    Unicode = 0x001F,
    /// `PtypTime`: 100-ns intervals since 1601-01-01 UTC
    Time = 0x0040,
    /// `PtypGuid`
    Guid = 0x0048,
    /// `PtypBinary`
    Binary = 0x0102,

    /// `PtypMultipleInteger16`
    MultipleInteger16 = 0x1002,
    /// `PtypMultipleInteger32`
    MultipleInteger32 = 0x1003,
    /// `PtypMultipleFloating32`
    MultipleFloating32 = 0x1004,
    /// `PtypMultipleFloating64`
    MultipleFloating64 = 0x1005,
    /// `PtypMultipleCurrency`
    MultipleCurrency = 0x1006,
    /// `PtypMultipleFloatingTime`
    MultipleFloatingTime = 0x1007,
    /// `PtypMultipleInteger64`
    MultipleInteger64 = 0x1014,
    /// `PtypMultipleString8`
    MultipleString8 = 0x101E,
    /// `PtypMultipleString`
    MultipleUnicode = 0x101F,
    /// `PtypMultipleTime`
    MultipleTime = 0x1040,
    /// `PtypMultipleGuid`
    MultipleGuid = 0x1048,
    /// `PtypMultipleBinary`
    MultipleBinary = 0x1102,
}

impl TryFrom<u16> for PropertyType {
    type Error = LtpError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x0001 => Ok(Self::Null),
            0x0002 => Ok(Self::Integer16),
            0x0003 => Ok(Self::Integer32),
            0x0004 => Ok(Self::Floating32),
            0x0005 => Ok(Self::Floating64),
            0x0006 => Ok(Self::Currency),
            0x0007 => Ok(Self::FloatingTime),
            0x000A => Ok(Self::ErrorCode),
            0x000B => Ok(Self::Boolean),
            0x000D => Ok(Self::Object),
            0x0014 => Ok(Self::Integer64),
            0x001E => Ok(Self::String8),
            0x001F => Ok(Self::Unicode),
            0x0040 => Ok(Self::Time),
            0x0048 => Ok(Self::Guid),
            0x0102 => Ok(Self::Binary),

            0x1002 => Ok(Self::MultipleInteger16),
            0x1003 => Ok(Self::MultipleInteger32),
            0x1004 => Ok(Self::MultipleFloating32),
            0x1005 => Ok(Self::MultipleFloating64),
            0x1006 => Ok(Self::MultipleCurrency),
            0x1007 => Ok(Self::MultipleFloatingTime),
            0x1014 => Ok(Self::MultipleInteger64),
            0x101E => Ok(Self::MultipleString8),
            0x101F => Ok(Self::MultipleUnicode),
            0x1040 => Ok(Self::MultipleTime),
            0x1048 => Ok(Self::MultipleGuid),
            0x1102 => Ok(Self::MultipleBinary),

            invalid => Err(LtpError::InvalidPropertyType(invalid)),
        }
    }
}

impl From<PropertyType> for u16 {
    fn from(value: PropertyType) -> Self {
        value as u16
    }
}

impl PropertyType {
    /// Width of a fixed-size value, or `None` for variable-size and
    /// multi-valued types.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            Self::Null => Some(0),
            Self::Boolean => Some(1),
            Self::Integer16 => Some(2),
            Self::Integer32 | Self::Floating32 | Self::ErrorCode => Some(4),
            Self::Floating64
            | Self::Currency
            | Self::FloatingTime
            | Self::Integer64
            | Self::Time => Some(8),
            Self::Guid => Some(16),
            _ => None,
        }
    }

    /// Fixed types no wider than four bytes are stored inline in a
    /// property record; everything else is reached through an HNID.
    pub fn fits_inline(&self) -> bool {
        matches!(self.fixed_size(), Some(size) if size <= 4)
    }
}

//! ## [Lists, Tables, and Properties (LTP) Layer](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/4c24c7d2-5c5a-4b99-88b2-f4b84cc293ae)

use std::io;
use thiserror::Error;

pub mod heap;
pub mod prop_context;
pub mod prop_type;
pub mod table_context;
pub mod tree;

#[derive(Error, Debug)]
pub enum LtpError {
    #[error("Node Database error: {0}")]
    NodeDatabaseError(#[from] crate::ndb::NdbError),
    #[error("Invalid HNHDR bSig: 0x{0:02X}")]
    InvalidHeapSignature(u8),
    #[error("Invalid HNHDR bClientSig: 0x{0:02X}")]
    InvalidHeapClientSignature(u8),
    #[error("Empty HN data tree")]
    EmptyHeapNode,
    #[error("Invalid HID hidType: 0x{0:02X}")]
    InvalidHeapIdType(u8),
    #[error("HID block index not found: 0x{0:04X}")]
    HeapPageNotFound(u16),
    #[error("HID allocation index not found: 0x{0:04X}")]
    HeapAllocNotFound(u16),
    #[error("Invalid HNPAGEMAP rgibAlloc entry: 0x{0:04X}")]
    InvalidHeapAllocOffset(u16),
    #[error("Invalid BTHHEADER bType: 0x{0:02X}")]
    InvalidHeapTreeSignature(u8),
    #[error("Invalid BTHHEADER cbKey: {0}")]
    InvalidHeapTreeKeySize(u8),
    #[error("Invalid BTHHEADER cbEnt: {0}")]
    InvalidHeapTreeDataSize(u8),
    #[error("Invalid BTHHEADER bIdxLevels: {0}")]
    InvalidHeapTreeDepth(u8),
    #[error("Invalid wPropType: 0x{0:04X}")]
    InvalidPropertyType(u16),
    #[error("Invalid value size for {0:?}: {1}")]
    InvalidValueSize(prop_type::PropertyType, usize),
    #[error("Invalid multi-value offset 0x{0:X}")]
    InvalidMultiValueOffset(u32),
    #[error("External value reference missing: 0x{0:08X}")]
    ExternalValueMissing(u32),
    #[error("Invalid TCINFO bType: 0x{0:02X}")]
    InvalidTableSignature(u8),
    #[error("Invalid TCINFO rgib: {0}")]
    InvalidTableRowSize(u16),
    #[error("Invalid TCOLDESC iBit: {0}")]
    InvalidTableColumnBit(u8),
    #[error("Table row not found: {0}")]
    TableRowNotFound(usize),
}

impl From<LtpError> for io::Error {
    fn from(err: LtpError) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

pub type LtpResult<T> = Result<T, LtpError>;

#![doc = include_str!("../README.md")]

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor};
use thiserror::Error;

mod crc;
mod dictionary;

use dictionary::{DictionaryReference, TokenDictionary};

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0:?}")]
    IoError(#[from] io::Error),
    #[error("COMPSIZE mismatch: {0}")]
    CompressedSizeMismatch(u32),
    #[error("COMPRESSED CRC mismatch: 0x{0:08X}")]
    CompressedCrcMismatch(u32),
    #[error("Invalid COMPTYPE: 0x{0:08X}")]
    InvalidCompressionType(u32),
    #[error("Compressed RTF header truncated: {0}")]
    HeaderTooShort(usize),
}

pub type Result<T> = std::result::Result<T, Error>;

const COMPRESSED: u32 = 0x75465A4C;
const UNCOMPRESSED: u32 = 0x414C454D;

pub fn decompress_rtf(data: &[u8]) -> Result<String> {
    let total_size = data.len();
    if total_size < 16 {
        return Err(Error::HeaderTooShort(total_size));
    }

    let mut cursor = Cursor::new(&data[..16]);

    // COMPSIZE
    let compressed_size = cursor.read_u32::<LittleEndian>()?;
    if compressed_size as usize + size_of_val(&compressed_size) != total_size {
        return Err(Error::CompressedSizeMismatch(compressed_size));
    }

    // RAWSIZE
    let raw_size = cursor.read_u32::<LittleEndian>()?;

    // COMPTYPE
    let compression_type = cursor.read_u32::<LittleEndian>()?;

    // CRC
    let crc = cursor.read_u32::<LittleEndian>()?;

    match compression_type {
        COMPRESSED => {
            let compressed_crc = crc::calculate_crc(0, &data[16..]);
            if crc != compressed_crc {
                return Err(Error::CompressedCrcMismatch(crc));
            }

            let mut dictionary = TokenDictionary::default();
            let mut output = Vec::with_capacity(raw_size as usize);

            let mut cursor = Cursor::new(&data[16..]);
            'decompress: while let Ok(control) = cursor.read_u8() {
                for i in 0..8 {
                    let bit = control & (0x01 << i);
                    if bit == 0 {
                        let Ok(byte) = cursor.read_u8() else {
                            break 'decompress;
                        };
                        output.push(byte);
                        dictionary.write_byte(byte);
                    } else {
                        let reference = DictionaryReference::read(&mut cursor)?;
                        let Some(mut reference) = dictionary.read_reference(reference) else {
                            break 'decompress;
                        };
                        output.append(&mut reference);
                    }
                }
            }

            let buffer: Vec<_> = output.into_iter().map(u16::from).collect();
            Ok(String::from_utf16_lossy(&buffer))
        }
        UNCOMPRESSED => {
            let end = (raw_size as usize + 16).min(total_size);
            let data: Vec<_> = data[16..end].iter().copied().map(u16::from).collect();
            Ok(String::from_utf16_lossy(&data))
        }
        invalid => Err(Error::InvalidCompressionType(invalid)),
    }
}

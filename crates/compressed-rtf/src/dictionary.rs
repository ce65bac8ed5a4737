//! [Dictionary](https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/ms-oxrtfcp/4238b0e2-7147-42da-88c9-ea45a1243e67)

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{self, Read};

const INITIAL_DICTIONARY: &[u8] = b"{\\rtf1\\ansi\\mac\\deff0\\deftab720{\\fonttbl;}{\\f0\\fnil \\froman \\fswiss \\fmodern \\fscript \\fdecor MS Sans SerifSymbolArialTimes New RomanCourier{\\colortbl\\red0\\green0\\blue0\r\n\\par \\pard\\plain\\f0\\fs20\\b\\i\\u\\tab\\tx";

const DICTIONARY_SIZE: usize = 4096;

pub struct TokenDictionary {
    buffer: [u8; DICTIONARY_SIZE],
    write_offset: usize,
}

impl TokenDictionary {
    /// Copy a previously written token out of the sliding window, echoing each
    /// byte back into the window as it goes. A reference that points at the
    /// current write offset is the end-of-input marker and yields `None`.
    pub fn read_reference(&mut self, reference: DictionaryReference) -> Option<Vec<u8>> {
        let (offset, length) = (reference.offset() as usize, reference.length() as usize);
        if offset == self.write_offset {
            return None;
        }

        let mut result = Vec::with_capacity(length);

        let mut read_offset = offset;
        for _ in 0..length {
            let byte = self.buffer[read_offset];
            result.push(byte);
            read_offset = (read_offset + 1) % DICTIONARY_SIZE;
            self.write_byte(byte);
        }

        Some(result)
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.buffer[self.write_offset] = byte;
        self.write_offset = (self.write_offset + 1) % DICTIONARY_SIZE;
    }
}

impl Default for TokenDictionary {
    fn default() -> Self {
        let mut buffer = [0; DICTIONARY_SIZE];
        buffer[..INITIAL_DICTIONARY.len()].copy_from_slice(INITIAL_DICTIONARY);
        Self {
            buffer,
            write_offset: INITIAL_DICTIONARY.len(),
        }
    }
}

/// [Dictionary Reference](https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/ms-oxrtfcp/b12474df-e0ef-4731-9315-454a49a984d8)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DictionaryReference(u16);

impl DictionaryReference {
    pub fn offset(&self) -> u16 {
        (self.0 & 0xFFF0) >> 4
    }

    pub fn length(&self) -> u8 {
        (self.0 & 0x0F) as u8 + 2
    }

    pub fn read(f: &mut dyn Read) -> io::Result<Self> {
        Ok(Self(f.read_u16::<BigEndian>()?))
    }
}

//! [HEADER](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/c9876f5a-664b-46a3-9887-ba63f113abf5)

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Seek, SeekFrom};

use super::*;
use crate::source::ByteSource;

/// `dwMagic`, little-endian on disk: `!BDN`.
const HEADER_MAGIC: u32 = u32::from_be_bytes(*b"NDB!");

/// `wMagicClient`, little-endian on disk: `SM`.
const HEADER_MAGIC_CLIENT: u16 = u16::from_be_bytes(*b"MS");

/// Everything variant-dependent lives in the header is read through here.
const HEADER_SIZE: usize = 514;

/// `wVer`: the on-disk format variant.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Version {
    /// wVer 14 or 15: ANSI file with 32-bit block ids and byte indices.
    Ansi,
    /// wVer 23: Unicode file with 64-bit block ids and byte indices.
    Unicode,
    /// wVer 36: Unicode file with 4096-byte pages (Outlook 2013 OST).
    Unicode4k,
}

impl TryFrom<u16> for Version {
    type Error = NdbError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            14..=15 => Ok(Version::Ansi),
            23 => Ok(Version::Unicode),
            36 => Ok(Version::Unicode4k),
            _ => Err(NdbError::InvalidVersion(value)),
        }
    }
}

impl Version {
    pub fn is_wide(&self) -> bool {
        !matches!(self, Version::Ansi)
    }

    pub(crate) fn page_size(&self) -> usize {
        match self {
            Version::Ansi | Version::Unicode => 512,
            Version::Unicode4k => 4096,
        }
    }

    /// Offset of the BTPAGE metadata (`cEnt`/`cEntMax`/`cbEnt`/`cLevel`)
    /// within a page.
    pub(crate) fn page_metadata_offset(&self) -> usize {
        match self {
            Version::Ansi => 496,
            Version::Unicode => 488,
            Version::Unicode4k => 4096 - 24,
        }
    }

    /// `cEnt` and `cEntMax` widen to 16 bits in 4K pages.
    pub(crate) fn has_wide_page_counts(&self) -> bool {
        matches!(self, Version::Unicode4k)
    }

    pub(crate) fn node_entry_size(&self) -> usize {
        if self.is_wide() {
            32
        } else {
            16
        }
    }

    pub(crate) fn block_entry_size(&self) -> usize {
        if self.is_wide() {
            24
        } else {
            12
        }
    }

    pub(crate) fn branch_entry_size(&self) -> usize {
        if self.is_wide() {
            24
        } else {
            12
        }
    }
}

/// `bCryptMethod`
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum CryptMethod {
    /// `NDB_CRYPT_NONE`: data blocks are not encoded
    #[default]
    None,
    /// `NDB_CRYPT_PERMUTE`: encoded with the
    /// [Permutation algorithm](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/5faf4800-645d-49d1-9457-2ac40eb467bd)
    Permute,
}

impl TryFrom<u8> for CryptMethod {
    type Error = NdbError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(CryptMethod::None),
            0x01 => Ok(CryptMethod::Permute),
            // NDB_CRYPT_CYCLIC
            0x02 => Err(NdbError::CyclicEncodingRejected),
            _ => Err(NdbError::InvalidCryptMethod(value)),
        }
    }
}

/// The variant-dependent facts the rest of the decoder needs from the
/// first [`HEADER_SIZE`] bytes of the file.
#[derive(Clone, Debug)]
pub struct Header {
    version: Version,
    crypt_method: CryptMethod,
    node_btree: u64,
    block_btree: u64,
}

impl Header {
    pub fn read(source: &dyn ByteSource) -> io::Result<Self> {
        let buffer = source.read_vec_at(0, HEADER_SIZE)?;
        let mut cursor = Cursor::new(buffer.as_slice());

        // dwMagic
        let magic = cursor.read_u32::<LittleEndian>()?;
        if magic != HEADER_MAGIC {
            return Err(NdbError::InvalidHeaderMagic(magic).into());
        }

        // dwCRCPartial
        let _crc_partial = cursor.read_u32::<LittleEndian>()?;

        // wMagicClient
        let magic = cursor.read_u16::<LittleEndian>()?;
        if magic != HEADER_MAGIC_CLIENT {
            return Err(NdbError::InvalidHeaderClientMagic(magic).into());
        }

        // wVer
        let version = Version::try_from(cursor.read_u16::<LittleEndian>()?)?;

        let (node_btree, block_btree) = match version {
            Version::Ansi => {
                // ROOT BREFNBT.ib
                cursor.seek(SeekFrom::Start(188))?;
                let node_btree = u64::from(cursor.read_u32::<LittleEndian>()?);
                // ROOT BREFBBT.ib
                cursor.seek(SeekFrom::Start(196))?;
                let block_btree = u64::from(cursor.read_u32::<LittleEndian>()?);
                (node_btree, block_btree)
            }
            Version::Unicode | Version::Unicode4k => {
                // ROOT BREFNBT.ib
                cursor.seek(SeekFrom::Start(224))?;
                let node_btree = cursor.read_u64::<LittleEndian>()?;
                // ROOT BREFBBT.ib
                cursor.seek(SeekFrom::Start(240))?;
                let block_btree = cursor.read_u64::<LittleEndian>()?;
                (node_btree, block_btree)
            }
        };

        // bCryptMethod
        let crypt_offset = if version.is_wide() { 513 } else { 461 };
        let crypt_method = CryptMethod::try_from(buffer[crypt_offset])?;

        Ok(Self {
            version,
            crypt_method,
            node_btree,
            block_btree,
        })
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn crypt_method(&self) -> CryptMethod {
        self.crypt_method
    }

    /// File offset of the node B-tree root page.
    pub fn node_btree(&self) -> u64 {
        self.node_btree
    }

    /// File offset of the block B-tree root page.
    pub fn block_btree(&self) -> u64 {
        self.block_btree
    }

    pub fn decode_blocks(&self) -> bool {
        self.crypt_method == CryptMethod::Permute
    }

    #[cfg(test)]
    pub(crate) fn new(
        version: Version,
        crypt_method: CryptMethod,
        node_btree: u64,
        block_btree: u64,
    ) -> Self {
        Self {
            version,
            crypt_method,
            node_btree,
            block_btree,
        }
    }
}

//! ## [HN (Heap-on-Node)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/77ce49a3-3772-4d8d-bb2c-2f7520a238a6)
//!
//! A paged allocation container laid over a node's data. Each data leaf
//! of the node is one heap page; every page ends in a page map that
//! delimits its allocations, and page 0 additionally names the client
//! layer (PC or TC) and its root allocation.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor};

use super::*;
use crate::ndb::{block_id::BlockId, NodeDatabase};

/// `bSig` of the heap header.
const HEAP_SIGNATURE: u8 = 0xEC;

/// `bClientSig` values this decoder understands.
pub const HEAP_CLIENT_TABLE: u8 = 0x7C;
pub const HEAP_CLIENT_TREE: u8 = 0xB5;
pub const HEAP_CLIENT_PROPERTIES: u8 = 0xBC;

/// [HID](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/85b9e985-ea53-447f-b70c-eb82bfbdcbc9):
/// `{ hidType: 5 bits (always 0), hidIndex: 11 bits, hidBlockIndex: 16 bits }`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct HeapId(u32);

impl HeapId {
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// One-based allocation index within the page.
    pub fn index(&self) -> u16 {
        ((self.0 >> 5) & 0x7FF) as u16
    }

    /// Which data leaf of the node the allocation lives in.
    pub fn page(&self) -> u16 {
        (self.0 >> 16) as u16
    }

    fn id_type(&self) -> u8 {
        (self.0 & 0x1F) as u8
    }
}

impl From<u32> for HeapId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<HeapId> for u32 {
    fn from(value: HeapId) -> Self {
        value.0
    }
}

/// One node's heap, with every page loaded and decoded.
#[derive(Debug)]
pub struct HeapNode {
    pages: Vec<Vec<u8>>,
    client_signature: u8,
    user_root: HeapId,
}

impl HeapNode {
    pub fn read(ndb: &NodeDatabase, block: BlockId) -> io::Result<Self> {
        Self::from_pages(ndb.leaf_payloads(block)?)
    }

    pub fn from_pages(pages: Vec<Vec<u8>>) -> io::Result<Self> {
        let Some(first) = pages.first() else {
            return Err(LtpError::EmptyHeapNode.into());
        };

        let mut cursor = Cursor::new(first.as_slice());

        // ibHnpm
        let _page_map_offset = cursor.read_u16::<LittleEndian>()?;

        // bSig
        let signature = cursor.read_u8()?;
        if signature != HEAP_SIGNATURE {
            return Err(LtpError::InvalidHeapSignature(signature).into());
        }

        // bClientSig
        let client_signature = cursor.read_u8()?;

        // hidUserRoot
        let user_root = HeapId::from(cursor.read_u32::<LittleEndian>()?);

        // rgbFillLevel is maintenance state for writers; nothing to read

        Ok(Self {
            pages,
            client_signature,
            user_root,
        })
    }

    pub fn client_signature(&self) -> u8 {
        self.client_signature
    }

    pub fn user_root(&self) -> HeapId {
        self.user_root
    }

    /// Resolve a heap id to the bytes of its allocation.
    pub fn find_entry(&self, heap_id: HeapId) -> io::Result<&[u8]> {
        if heap_id.id_type() != 0 {
            return Err(LtpError::InvalidHeapIdType(heap_id.id_type()).into());
        }

        let page = self
            .pages
            .get(usize::from(heap_id.page()))
            .ok_or(LtpError::HeapPageNotFound(heap_id.page()))?;

        // every page header starts with ibHnpm
        let mut cursor = Cursor::new(page.as_slice());
        let page_map_offset = cursor.read_u16::<LittleEndian>()?;

        let mut cursor = Cursor::new(
            page.get(usize::from(page_map_offset)..)
                .ok_or(LtpError::InvalidHeapAllocOffset(page_map_offset))?,
        );

        // cAlloc, cFree
        let alloc_count = cursor.read_u16::<LittleEndian>()?;
        let _free_count = cursor.read_u16::<LittleEndian>()?;

        let index = heap_id.index();
        if index < 1 || index > alloc_count {
            return Err(LtpError::HeapAllocNotFound(index).into());
        }

        // rgibAlloc has cAlloc + 1 entries delimiting the allocations
        let mut offsets = Vec::with_capacity(usize::from(alloc_count) + 1);
        for _ in 0..=alloc_count {
            offsets.push(cursor.read_u16::<LittleEndian>()?);
        }

        let start = usize::from(offsets[usize::from(index) - 1]);
        let end = usize::from(offsets[usize::from(index)]);
        if start > end || end > page.len() {
            return Err(LtpError::InvalidHeapAllocOffset(offsets[usize::from(index)]).into());
        }

        Ok(&page[start..end])
    }
}

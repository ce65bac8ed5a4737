//! ## [BTree-on-Heap (BTH)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/2dd1a95a-c8b1-4ac5-87d1-10cb8de64053)

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor};

use super::{heap::*, *};

/// [BTHHEADER](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/8e4ae05c-3c24-4103-b7e5-ffef6f244834)
#[derive(Clone, Copy, Debug)]
pub struct HeapTreeHeader {
    key_size: u8,
    entry_size: u8,
    levels: u8,
    root: HeapId,
}

impl HeapTreeHeader {
    pub fn read(f: &mut dyn io::Read) -> io::Result<Self> {
        // bType
        let signature = f.read_u8()?;
        if signature != HEAP_CLIENT_TREE {
            return Err(LtpError::InvalidHeapTreeSignature(signature).into());
        }

        // cbKey
        let key_size = f.read_u8()?;
        match key_size {
            2 | 4 | 8 | 16 => {}
            invalid => return Err(LtpError::InvalidHeapTreeKeySize(invalid).into()),
        }

        // cbEnt
        let entry_size = f.read_u8()?;
        if !(1..=32).contains(&entry_size) {
            return Err(LtpError::InvalidHeapTreeDataSize(entry_size).into());
        }

        // bIdxLevels
        let levels = f.read_u8()?;
        if levels > 8 {
            return Err(LtpError::InvalidHeapTreeDepth(levels).into());
        }

        // hidRoot
        let root = HeapId::from(f.read_u32::<LittleEndian>()?);

        Ok(Self {
            key_size,
            entry_size,
            levels,
            root,
        })
    }

    pub fn key_size(&self) -> u8 {
        self.key_size
    }

    pub fn entry_size(&self) -> u8 {
        self.entry_size
    }

    pub fn record_size(&self) -> usize {
        usize::from(self.key_size) + usize::from(self.entry_size)
    }
}

/// A BTree-on-Heap rooted at an allocation of `heap`. Leaf records are
/// returned as raw `cbKey + cbEnt` slices for the caller to type.
#[derive(Debug)]
pub struct HeapTree<'h> {
    heap: &'h HeapNode,
    header: HeapTreeHeader,
}

impl<'h> HeapTree<'h> {
    pub fn open(heap: &'h HeapNode, header_id: HeapId) -> io::Result<Self> {
        let mut cursor = Cursor::new(heap.find_entry(header_id)?);
        let header = HeapTreeHeader::read(&mut cursor)?;
        Ok(Self { heap, header })
    }

    pub fn header(&self) -> &HeapTreeHeader {
        &self.header
    }

    /// All leaf records in key order.
    pub fn leaf_records(&self) -> io::Result<Vec<Vec<u8>>> {
        if self.header.root.is_null() {
            return Ok(Vec::new());
        }

        // descend the index levels; intermediate records are
        // { key[cbKey], hidNextLevel }
        let mut level = self.header.levels;
        let mut current = vec![self.header.root];

        while level > 0 {
            let mut next_level = Vec::new();
            for heap_id in current {
                let data = self.heap.find_entry(heap_id)?;
                let record_size = usize::from(self.header.key_size) + 4;
                for record in data.chunks_exact(record_size) {
                    let mut cursor = Cursor::new(&record[usize::from(self.header.key_size)..]);
                    next_level.push(HeapId::from(cursor.read_u32::<LittleEndian>()?));
                }
            }
            current = next_level;
            level -= 1;
        }

        let mut records = Vec::new();
        for heap_id in current {
            let data = self.heap.find_entry(heap_id)?;
            for record in data.chunks_exact(self.header.record_size()) {
                records.push(record.to_vec());
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ltp::heap::tests::{build_heap_page, heap_id};

    fn tree_header(key_size: u8, entry_size: u8, levels: u8, root: HeapId) -> Vec<u8> {
        let mut data = vec![HEAP_CLIENT_TREE, key_size, entry_size, levels];
        data.extend_from_slice(&u32::from(root).to_le_bytes());
        data
    }

    #[test]
    fn test_single_level_records() {
        // two records of key u16 + entry 6 bytes
        let mut records = Vec::new();
        records.extend_from_slice(&0x3001_u16.to_le_bytes());
        records.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
        records.extend_from_slice(&0x3602_u16.to_le_bytes());
        records.extend_from_slice(&[7, 8, 9, 10, 11, 12]);

        let page = build_heap_page(
            Some((HEAP_CLIENT_PROPERTIES, u32::from(heap_id(0, 1)))),
            &[tree_header(2, 6, 0, heap_id(0, 2)), records],
        );
        let heap = HeapNode::from_pages(vec![page]).unwrap();

        let tree = HeapTree::open(&heap, heap.user_root()).unwrap();
        assert_eq!(tree.header().key_size(), 2);
        assert_eq!(tree.header().entry_size(), 6);

        let records = tree.leaf_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][..2], &0x3001_u16.to_le_bytes());
        assert_eq!(&records[1][2..], &[7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_two_level_tree() {
        // index record pointing at the leaf allocation
        let mut index = Vec::new();
        index.extend_from_slice(&0x0000_u32.to_le_bytes());
        index.extend_from_slice(&u32::from(heap_id(0, 3)).to_le_bytes());

        let mut leaf = Vec::new();
        leaf.extend_from_slice(&0x0001_u32.to_le_bytes());
        leaf.extend_from_slice(&0x00AA_u32.to_le_bytes());

        let page = build_heap_page(
            Some((HEAP_CLIENT_TABLE, u32::from(heap_id(0, 1)))),
            &[tree_header(4, 4, 1, heap_id(0, 2)), index, leaf],
        );
        let heap = HeapNode::from_pages(vec![page]).unwrap();

        let tree = HeapTree::open(&heap, heap.user_root()).unwrap();
        let records = tree.leaf_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0][..4], &0x0001_u32.to_le_bytes());
    }

    #[test]
    fn test_null_root_is_empty() {
        let page = build_heap_page(
            Some((HEAP_CLIENT_PROPERTIES, u32::from(heap_id(0, 1)))),
            &[tree_header(2, 6, 0, HeapId::default())],
        );
        let heap = HeapNode::from_pages(vec![page]).unwrap();

        let tree = HeapTree::open(&heap, heap.user_root()).unwrap();
        assert!(tree.leaf_records().unwrap().is_empty());
    }

    #[test]
    fn test_bad_signature() {
        let page = build_heap_page(
            Some((HEAP_CLIENT_PROPERTIES, u32::from(heap_id(0, 1)))),
            &[vec![0xBC, 2, 6, 0, 0, 0, 0, 0]],
        );
        let heap = HeapNode::from_pages(vec![page]).unwrap();

        let err = HeapTree::open(&heap, heap.user_root()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}

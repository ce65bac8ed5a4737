//! [Sub-node BTree](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/5182eb24-4b0b-4816-aa3f-719cc6e6b018)
//!
//! A node's secondary descriptor table: a per-node map from local node id
//! to a data block and optional nested sub-node block. Property and table
//! contexts resolve their external value references through it, and
//! attachments keep embedded messages here.

use byteorder::{LittleEndian, ReadBytesExt};
use std::{
    collections::BTreeMap,
    io::{self, Cursor},
};

use super::{block_id::BlockId, header::Version, node_id::NodeId, page::BlockBTree, *};
use crate::source::ByteSource;

/// `btype` of an SLBLOCK/SIBLOCK.
const BLOCK_TYPE_SUB_NODE: u8 = 0x02;

/// SLENTRY
#[derive(Clone, Copy, Debug)]
pub struct SubNodeEntry {
    node: NodeId,
    data: BlockId,
    sub_node: Option<BlockId>,
}

impl SubNodeEntry {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn data(&self) -> BlockId {
        self.data
    }

    pub fn sub_node(&self) -> Option<BlockId> {
        self.sub_node
    }
}

/// The fully expanded sub-node map of one node. Empty when the owning
/// NBT entry carries no sub-node block.
#[derive(Default, Debug)]
pub struct SubNodeMap {
    entries: BTreeMap<u32, SubNodeEntry>,
}

impl SubNodeMap {
    pub fn read(
        source: &dyn ByteSource,
        version: Version,
        block_btree: &BlockBTree,
        block: BlockId,
    ) -> io::Result<Self> {
        let mut entries = BTreeMap::new();
        Self::expand(source, version, block_btree, block, 0, &mut entries)?;
        Ok(Self { entries })
    }

    fn expand(
        source: &dyn ByteSource,
        version: Version,
        block_btree: &BlockBTree,
        block: BlockId,
        depth: u8,
        entries: &mut BTreeMap<u32, SubNodeEntry>,
    ) -> io::Result<()> {
        // an SIBLOCK over SLBLOCKs is the deepest shape
        if depth > 1 {
            return Err(NdbError::InvalidSubNodeBlockLevel {
                level: depth,
                block: u64::from(block),
            }
            .into());
        }

        let entry = block_btree.find(block)?;
        let buffer = source.read_vec_at(entry.file_offset(), usize::from(entry.size()))?;
        let mut cursor = Cursor::new(buffer.as_slice());

        // btype
        let block_type = cursor.read_u8()?;
        if block_type != BLOCK_TYPE_SUB_NODE {
            return Err(NdbError::InvalidSubNodeBlockType {
                kind: block_type,
                block: u64::from(block),
            }
            .into());
        }

        // cLevel: 0 is an SLBLOCK of leaf entries, 1 an SIBLOCK of SLBLOCKs
        let level = cursor.read_u8()?;
        if level > 1 {
            return Err(NdbError::InvalidSubNodeBlockLevel {
                level,
                block: u64::from(block),
            }
            .into());
        }

        // cEnt
        let entry_count = cursor.read_u16::<LittleEndian>()?;

        // dwPadding
        if version.is_wide() {
            let _padding = cursor.read_u32::<LittleEndian>()?;
        }

        for _ in 0..entry_count {
            if level == 0 {
                // SLENTRY { nid, bidData, bidSub }
                let (node, data, sub_node) = if version.is_wide() {
                    let node = NodeId::from(cursor.read_u64::<LittleEndian>()? as u32);
                    let data = cursor.read_u64::<LittleEndian>()?;
                    let sub_node = cursor.read_u64::<LittleEndian>()?;
                    (node, data, sub_node)
                } else {
                    let node = NodeId::read(&mut cursor)?;
                    let data = u64::from(cursor.read_u32::<LittleEndian>()?);
                    let sub_node = u64::from(cursor.read_u32::<LittleEndian>()?);
                    (node, data, sub_node)
                };

                entries.insert(
                    u32::from(node),
                    SubNodeEntry {
                        node,
                        data: BlockId::from(data),
                        sub_node: (sub_node != 0).then_some(BlockId::from(sub_node)),
                    },
                );
            } else {
                // SIENTRY { nid, bid }
                let child = if version.is_wide() {
                    let _node = cursor.read_u64::<LittleEndian>()?;
                    cursor.read_u64::<LittleEndian>()?
                } else {
                    let _node = cursor.read_u32::<LittleEndian>()?;
                    u64::from(cursor.read_u32::<LittleEndian>()?)
                };

                Self::expand(
                    source,
                    version,
                    block_btree,
                    BlockId::from(child),
                    depth + 1,
                    entries,
                )?;
            }
        }

        Ok(())
    }

    pub fn find(&self, node: NodeId) -> NdbResult<&SubNodeEntry> {
        self.entries
            .get(&u32::from(node))
            .ok_or(NdbError::SubNodeNotFound(u32::from(node)))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubNodeEntry> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndb::page::tests::put_page_metadata;
    use crate::ndb::page::PageKind;
    use crate::source::MemorySource;

    fn build_file(blocks: &[(u64, Vec<u8>)]) -> MemorySource {
        let mut page = vec![0_u8; 512];
        let mut offset = 512_u64;
        let mut body = Vec::new();

        for (index, (bid, data)) in blocks.iter().enumerate() {
            let at = index * 24;
            page[at..at + 8].copy_from_slice(&bid.to_le_bytes());
            page[at + 8..at + 16].copy_from_slice(&offset.to_le_bytes());
            page[at + 16..at + 18].copy_from_slice(&(data.len() as u16).to_le_bytes());
            page[at + 18..at + 20].copy_from_slice(&1_u16.to_le_bytes());

            body.extend_from_slice(data);
            offset += data.len() as u64;
        }
        put_page_metadata(
            &mut page,
            Version::Unicode,
            blocks.len(),
            24,
            0,
            PageKind::BlockBTree,
        );

        page.extend_from_slice(&body);
        MemorySource::new(page)
    }

    fn sl_block(entries: &[(u32, u64, u64)]) -> Vec<u8> {
        let mut data = vec![0x02, 0x00];
        data.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        data.extend_from_slice(&0_u32.to_le_bytes());
        for (nid, bid, sub) in entries {
            data.extend_from_slice(&u64::from(*nid).to_le_bytes());
            data.extend_from_slice(&bid.to_le_bytes());
            data.extend_from_slice(&sub.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_leaf_sub_node_map() {
        let source = build_file(&[(0x6, sl_block(&[(0x8025, 0x8, 0), (0x8045, 0xC, 0x1E)]))]);
        let block_btree = BlockBTree::new(&source, Version::Unicode, 0);

        let map =
            SubNodeMap::read(&source, Version::Unicode, &block_btree, BlockId::from(0x6)).unwrap();

        let entry = map.find(NodeId::from(0x8025)).unwrap();
        assert_eq!(u64::from(entry.data()), 0x8);
        assert!(entry.sub_node().is_none());

        let entry = map.find(NodeId::from(0x8045)).unwrap();
        assert_eq!(u64::from(entry.sub_node().unwrap()), 0x1E);

        let Err(NdbError::SubNodeNotFound(0x9999)) = map.find(NodeId::from(0x9999)) else {
            panic!("missing sub-node should not resolve");
        };
    }

    #[test]
    fn test_intermediate_sub_node_block() {
        let mut si = vec![0x02, 0x01];
        si.extend_from_slice(&1_u16.to_le_bytes());
        si.extend_from_slice(&0_u32.to_le_bytes());
        // SIENTRY { nid: 0x8025, bid: 0xA }
        si.extend_from_slice(&0x8025_u64.to_le_bytes());
        si.extend_from_slice(&0xA_u64.to_le_bytes());

        let source = build_file(&[(0x6, si), (0xA, sl_block(&[(0x8025, 0x10, 0)]))]);
        let block_btree = BlockBTree::new(&source, Version::Unicode, 0);

        let map =
            SubNodeMap::read(&source, Version::Unicode, &block_btree, BlockId::from(0x6)).unwrap();
        assert_eq!(u64::from(map.find(NodeId::from(0x8025)).unwrap().data()), 0x10);
    }

    #[test]
    fn test_wrong_block_type_rejected() {
        // a data-tree block where a sub-node block is expected
        let mut xb = vec![0x01, 0x01];
        xb.extend_from_slice(&0_u16.to_le_bytes());
        xb.extend_from_slice(&0_u32.to_le_bytes());

        let source = build_file(&[(0x6, xb)]);
        let block_btree = BlockBTree::new(&source, Version::Unicode, 0);

        let err = SubNodeMap::read(&source, Version::Unicode, &block_btree, BlockId::from(0x6))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}

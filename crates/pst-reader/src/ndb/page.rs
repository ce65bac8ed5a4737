//! [Pages](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/5774b4f2-cdc4-453e-996a-8c8230116930)
//!
//! The node and block B-trees. Both are page-structured: branch pages hold
//! `BTENTRY` records pointing at child pages, leaf pages hold `NBTENTRY`
//! or `BBTENTRY` records.

use byteorder::{LittleEndian, ReadBytesExt};
use std::{
    collections::{BTreeMap, BTreeSet},
    io::{self, Cursor, Read},
};
use tracing::debug;

use super::{block_id::BlockId, header::Version, node_id::NodeId, *};
use crate::source::ByteSource;

/// `cLevel` of any page is at most this deep in practice; used as a guard
/// against reference cycles in corrupt files.
const MAX_BTREE_DEPTH: u8 = 8;

/// `ptype`/`ptypeRepeat` marker carried in the page trailer.
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PageKind {
    /// `ptypeBBT`: Block BTree page
    BlockBTree = 0x80,
    /// `ptypeNBT`: Node BTree page
    NodeBTree = 0x81,
}

/// [NBTENTRY](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/53a4b926-8ac4-45c9-9c6d-8358d951dbcd)
#[derive(Clone, Copy, Debug)]
pub struct NodeBTreeEntry {
    node: NodeId,
    data: BlockId,
    sub_node: Option<BlockId>,
    parent: NodeId,
}

impl NodeBTreeEntry {
    pub(crate) fn read(f: &mut dyn Read, version: Version) -> io::Result<Self> {
        if version.is_wide() {
            // nid (stored as a 64-bit value in the leaf entry)
            let node = NodeId::from(f.read_u64::<LittleEndian>()? as u32);
            // bidData
            let data = BlockId::from(f.read_u64::<LittleEndian>()?);
            // bidSub
            let sub_node = f.read_u64::<LittleEndian>()?;
            // nidParent
            let parent = NodeId::read(f)?;

            Ok(Self {
                node,
                data,
                sub_node: (sub_node != 0).then_some(BlockId::from(sub_node)),
                parent,
            })
        } else {
            // nid
            let node = NodeId::read(f)?;
            // bidData
            let data = BlockId::from(u64::from(f.read_u32::<LittleEndian>()?));
            // bidSub
            let sub_node = u64::from(f.read_u32::<LittleEndian>()?);
            // nidParent
            let parent = NodeId::read(f)?;

            Ok(Self {
                node,
                data,
                sub_node: (sub_node != 0).then_some(BlockId::from(sub_node)),
                parent,
            })
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn data(&self) -> BlockId {
        self.data
    }

    pub fn sub_node(&self) -> Option<BlockId> {
        self.sub_node
    }

    pub fn parent(&self) -> NodeId {
        self.parent
    }
}

/// [BBTENTRY](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/53a4b926-8ac4-45c9-9c6d-8358d951dbcd)
#[derive(Clone, Copy, Debug)]
pub struct BlockBTreeEntry {
    block: BlockId,
    file_offset: u64,
    size: u16,
    ref_count: u16,
}

impl BlockBTreeEntry {
    pub(crate) fn read(f: &mut dyn Read, version: Version) -> io::Result<Self> {
        let (block, file_offset) = if version.is_wide() {
            // BREF.bid
            let block = BlockId::from(f.read_u64::<LittleEndian>()?);
            // BREF.ib
            (block, f.read_u64::<LittleEndian>()?)
        } else {
            let block = BlockId::from(u64::from(f.read_u32::<LittleEndian>()?));
            (block, u64::from(f.read_u32::<LittleEndian>()?))
        };

        // cb
        let size = f.read_u16::<LittleEndian>()?;
        // cRef
        let ref_count = f.read_u16::<LittleEndian>()?;

        Ok(Self {
            block,
            file_offset,
            size,
            ref_count,
        })
    }

    pub fn block(&self) -> BlockId {
        self.block
    }

    pub fn file_offset(&self) -> u64 {
        self.file_offset
    }

    pub fn size(&self) -> u16 {
        self.size
    }

    pub fn ref_count(&self) -> u16 {
        self.ref_count
    }
}

/// [BTENTRY](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/bc8052a3-f300-4022-be31-f0f408fffca0)
#[derive(Clone, Copy, Debug)]
struct BranchEntry {
    key: u64,
    child_offset: u64,
}

impl BranchEntry {
    fn read(f: &mut dyn Read, version: Version) -> io::Result<Self> {
        if version.is_wide() {
            // btkey
            let key = f.read_u64::<LittleEndian>()?;
            // BREF.bid
            let _block = f.read_u64::<LittleEndian>()?;
            // BREF.ib
            let child_offset = f.read_u64::<LittleEndian>()?;
            Ok(Self { key, child_offset })
        } else {
            let key = u64::from(f.read_u32::<LittleEndian>()?);
            let _block = f.read_u32::<LittleEndian>()?;
            let child_offset = u64::from(f.read_u32::<LittleEndian>()?);
            Ok(Self { key, child_offset })
        }
    }
}

struct BTreePage {
    buffer: Vec<u8>,
    entry_count: usize,
    entry_size: usize,
    level: u8,
}

impl BTreePage {
    fn read(
        source: &dyn ByteSource,
        version: Version,
        offset: u64,
        kind: PageKind,
    ) -> io::Result<Self> {
        let buffer = source.read_vec_at(offset, version.page_size())?;

        let mut cursor = Cursor::new(&buffer[version.page_metadata_offset()..]);

        // cEnt, cEntMax
        let entry_count = if version.has_wide_page_counts() {
            let entry_count = cursor.read_u16::<LittleEndian>()?;
            let _max_count = cursor.read_u16::<LittleEndian>()?;
            usize::from(entry_count)
        } else {
            let entry_count = cursor.read_u8()?;
            let _max_count = cursor.read_u8()?;
            usize::from(entry_count)
        };

        // cbEnt
        let entry_size = cursor.read_u8()?;
        // cLevel
        let level = cursor.read_u8()?;
        if level > MAX_BTREE_DEPTH {
            return Err(NdbError::InvalidBTreePageLevel(level).into());
        }

        // pageTrailer.ptype, ptypeRepeat
        let trailer = version.page_size() - if version.is_wide() { 16 } else { 12 };
        let marker = buffer[trailer];
        let marker_repeat = buffer[trailer + 1];
        if marker != marker_repeat {
            return Err(NdbError::MismatchPageMarker(marker, marker_repeat).into());
        }
        if marker != kind as u8 {
            return Err(NdbError::UnexpectedPageKind {
                expected: kind,
                found: marker,
                offset,
            }
            .into());
        }

        if entry_size == 0
            || entry_count * usize::from(entry_size) > version.page_metadata_offset()
        {
            return Err(NdbError::InvalidBTreeEntryCount(entry_count).into());
        }

        Ok(Self {
            buffer,
            entry_count,
            entry_size: usize::from(entry_size),
            level,
        })
    }

    fn entry_bytes(&self, index: usize) -> &[u8] {
        &self.buffer[index * self.entry_size..(index + 1) * self.entry_size]
    }

    fn branch_entries(&self, version: Version) -> io::Result<Vec<BranchEntry>> {
        if self.entry_size < version.branch_entry_size() {
            return Err(NdbError::InvalidBTreeEntrySize(self.entry_size as u8).into());
        }

        (0..self.entry_count)
            .map(|index| BranchEntry::read(&mut Cursor::new(self.entry_bytes(index)), version))
            .collect()
    }
}

/// Generic key lookup over either B-tree. Descends from the root by
/// choosing the last branch entry whose key is not past the target, then
/// scans the leaf for an exact match.
fn find_leaf_entry<T>(
    source: &dyn ByteSource,
    version: Version,
    root: u64,
    kind: PageKind,
    key: u64,
    min_entry_size: usize,
    parse: impl Fn(&mut Cursor<&[u8]>, Version) -> io::Result<T>,
    key_of: impl Fn(&T) -> u64,
) -> io::Result<Option<T>> {
    let mut offset = root;

    for _ in 0..=MAX_BTREE_DEPTH {
        let page = BTreePage::read(source, version, offset, kind)?;

        if page.level > 0 {
            let mut child = None;
            for entry in page.branch_entries(version)? {
                if entry.key > key {
                    break;
                }
                child = Some(entry.child_offset);
            }

            let Some(child) = child else {
                return Ok(None);
            };
            offset = child;
            continue;
        }

        if page.entry_size < min_entry_size {
            return Err(NdbError::InvalidBTreeEntrySize(page.entry_size as u8).into());
        }

        for index in 0..page.entry_count {
            let entry = parse(&mut Cursor::new(page.entry_bytes(index)), version)?;
            if key_of(&entry) == key {
                return Ok(Some(entry));
            }
        }
        return Ok(None);
    }

    Err(NdbError::InvalidBTreePageLevel(MAX_BTREE_DEPTH).into())
}

/// The NBT ("descriptor index"): maps a [`NodeId`] to its data block,
/// optional sub-node block and parent node.
pub struct NodeBTree<'a> {
    source: &'a dyn ByteSource,
    version: Version,
    root: u64,
}

impl<'a> NodeBTree<'a> {
    pub fn new(source: &'a dyn ByteSource, version: Version, root: u64) -> Self {
        Self {
            source,
            version,
            root,
        }
    }

    pub fn find(&self, node: NodeId) -> io::Result<NodeBTreeEntry> {
        find_leaf_entry(
            self.source,
            self.version,
            self.root,
            PageKind::NodeBTree,
            u64::from(u32::from(node)),
            self.version.node_entry_size(),
            |cursor, version| NodeBTreeEntry::read(cursor, version),
            |entry| u64::from(u32::from(entry.node())),
        )?
        .ok_or_else(|| NdbError::NodeNotFound(u32::from(node)).into())
    }

    /// Visit every leaf entry in key order.
    pub fn for_each(&self, f: &mut dyn FnMut(NodeBTreeEntry)) -> io::Result<()> {
        self.walk(self.root, 0, f)
    }

    fn walk(&self, offset: u64, depth: u8, f: &mut dyn FnMut(NodeBTreeEntry)) -> io::Result<()> {
        if depth > MAX_BTREE_DEPTH {
            return Err(NdbError::InvalidBTreePageLevel(depth).into());
        }

        let page = BTreePage::read(self.source, self.version, offset, PageKind::NodeBTree)?;

        if page.level > 0 {
            for entry in page.branch_entries(self.version)? {
                self.walk(entry.child_offset, depth + 1, f)?;
            }
            return Ok(());
        }

        if page.entry_size < self.version.node_entry_size() {
            return Err(NdbError::InvalidBTreeEntrySize(page.entry_size as u8).into());
        }

        for index in 0..page.entry_count {
            let entry =
                NodeBTreeEntry::read(&mut Cursor::new(page.entry_bytes(index)), self.version)?;
            f(entry);
        }
        Ok(())
    }

    /// Walk the whole tree into a `parent -> children` map. Used as the
    /// fallback when a folder's hierarchy table is broken. Duplicate node
    /// ids and self-parenting entries are skipped.
    pub fn child_map(&self) -> io::Result<BTreeMap<u32, Vec<NodeBTreeEntry>>> {
        let mut map: BTreeMap<u32, Vec<NodeBTreeEntry>> = BTreeMap::new();
        let mut seen = BTreeSet::new();

        self.for_each(&mut |entry| {
            let node = u32::from(entry.node());
            let parent = u32::from(entry.parent());

            if !seen.insert(node) {
                debug!(node, "skipping duplicate node entry");
                return;
            }
            if node == parent {
                debug!(node, "skipping self-parenting node entry");
                return;
            }

            map.entry(parent).or_default().push(entry);
        })?;

        Ok(map)
    }
}

/// The BBT ("offset index"): maps a [`BlockId`] to its file region.
pub struct BlockBTree<'a> {
    source: &'a dyn ByteSource,
    version: Version,
    root: u64,
}

impl<'a> BlockBTree<'a> {
    pub fn new(source: &'a dyn ByteSource, version: Version, root: u64) -> Self {
        Self {
            source,
            version,
            root,
        }
    }

    pub fn find(&self, block: BlockId) -> io::Result<BlockBTreeEntry> {
        find_leaf_entry(
            self.source,
            self.version,
            self.root,
            PageKind::BlockBTree,
            u64::from(block),
            self.version.block_entry_size(),
            |cursor, version| BlockBTreeEntry::read(cursor, version),
            |entry| u64::from(entry.block()),
        )?
        .ok_or_else(|| NdbError::BlockNotFound(u64::from(block)).into())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::source::MemorySource;

    pub(crate) fn put_page_metadata(
        page: &mut [u8],
        version: Version,
        entry_count: usize,
        entry_size: u8,
        level: u8,
        kind: PageKind,
    ) {
        let meta = version.page_metadata_offset();
        if version.has_wide_page_counts() {
            page[meta..meta + 2].copy_from_slice(&(entry_count as u16).to_le_bytes());
            page[meta + 2..meta + 4].copy_from_slice(&(entry_count as u16).to_le_bytes());
            page[meta + 4] = entry_size;
            page[meta + 5] = level;
        } else {
            page[meta] = entry_count as u8;
            page[meta + 1] = entry_count as u8;
            page[meta + 2] = entry_size;
            page[meta + 3] = level;
        }

        let trailer = version.page_size() - if version.is_wide() { 16 } else { 12 };
        page[trailer] = kind as u8;
        page[trailer + 1] = kind as u8;
    }

    fn unicode_node_leaf_page(entries: &[(u32, u64, u64, u32)]) -> Vec<u8> {
        let mut page = vec![0_u8; 512];
        for (index, (nid, data, sub, parent)) in entries.iter().enumerate() {
            let at = index * 32;
            page[at..at + 8].copy_from_slice(&u64::from(*nid).to_le_bytes());
            page[at + 8..at + 16].copy_from_slice(&data.to_le_bytes());
            page[at + 16..at + 24].copy_from_slice(&sub.to_le_bytes());
            page[at + 24..at + 28].copy_from_slice(&parent.to_le_bytes());
        }
        put_page_metadata(
            &mut page,
            Version::Unicode,
            entries.len(),
            32,
            0,
            PageKind::NodeBTree,
        );
        page
    }

    #[test]
    fn test_unicode_node_leaf_lookup() {
        let page = unicode_node_leaf_page(&[(0x21, 0x8, 0, 0), (0x122, 0xC, 0x1E, 0x122)]);
        let source = MemorySource::new(page);
        let tree = NodeBTree::new(&source, Version::Unicode, 0);

        let entry = tree.find(NodeId::from(0x122)).unwrap();
        assert_eq!(u64::from(entry.data()), 0xC);
        assert_eq!(u64::from(entry.sub_node().unwrap()), 0x1E);

        let entry = tree.find(NodeId::from(0x21)).unwrap();
        assert!(entry.sub_node().is_none());

        let err = tree.find(NodeId::from(0x42)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_branch_descent_picks_last_entry_not_past_key() {
        // two leaves at 512 and 1024, split at key 0x100
        let mut file = vec![0_u8; 1536];

        let mut root = vec![0_u8; 512];
        for (index, (key, child)) in [(0x21_u64, 512_u64), (0x100, 1024)].iter().enumerate() {
            let at = index * 24;
            root[at..at + 8].copy_from_slice(&key.to_le_bytes());
            root[at + 16..at + 24].copy_from_slice(&child.to_le_bytes());
        }
        put_page_metadata(&mut root, Version::Unicode, 2, 24, 1, PageKind::NodeBTree);
        file[..512].copy_from_slice(&root);

        file[512..1024].copy_from_slice(&unicode_node_leaf_page(&[(0x21, 0x4, 0, 0)]));
        file[1024..1536].copy_from_slice(&unicode_node_leaf_page(&[(0x122, 0x8, 0, 0)]));

        let source = MemorySource::new(file);
        let tree = NodeBTree::new(&source, Version::Unicode, 0);

        assert_eq!(u64::from(tree.find(NodeId::from(0x122)).unwrap().data()), 0x8);
        assert_eq!(u64::from(tree.find(NodeId::from(0x21)).unwrap().data()), 0x4);
        // keys below the first branch entry have no candidate child
        assert!(tree.find(NodeId::from(0x1)).is_err());
    }

    #[test]
    fn test_ansi_block_leaf_lookup() {
        let mut page = vec![0_u8; 512];
        // BBTENTRY { bid: 0x8, ib: 0x2200, cb: 0x40, cRef: 1 }
        page[..4].copy_from_slice(&0x8_u32.to_le_bytes());
        page[4..8].copy_from_slice(&0x2200_u32.to_le_bytes());
        page[8..10].copy_from_slice(&0x40_u16.to_le_bytes());
        page[10..12].copy_from_slice(&1_u16.to_le_bytes());
        put_page_metadata(&mut page, Version::Ansi, 1, 12, 0, PageKind::BlockBTree);

        let source = MemorySource::new(page);
        let tree = BlockBTree::new(&source, Version::Ansi, 0);

        let entry = tree.find(BlockId::from(0x8)).unwrap();
        assert_eq!(entry.file_offset(), 0x2200);
        assert_eq!(entry.size(), 0x40);
        assert_eq!(entry.ref_count(), 1);
    }

    #[test]
    fn test_unicode_4k_wide_counts() {
        let mut page = vec![0_u8; 4096];
        page[..8].copy_from_slice(&0x8_u64.to_le_bytes());
        page[8..16].copy_from_slice(&0x2200_u64.to_le_bytes());
        page[16..18].copy_from_slice(&0x80_u16.to_le_bytes());
        page[18..20].copy_from_slice(&1_u16.to_le_bytes());
        put_page_metadata(&mut page, Version::Unicode4k, 1, 24, 0, PageKind::BlockBTree);

        let source = MemorySource::new(page);
        let tree = BlockBTree::new(&source, Version::Unicode4k, 0);

        let entry = tree.find(BlockId::from(0x8)).unwrap();
        assert_eq!(entry.file_offset(), 0x2200);
        assert_eq!(entry.size(), 0x80);
    }

    #[test]
    fn test_wrong_page_marker_is_fatal() {
        let page = unicode_node_leaf_page(&[(0x21, 0x8, 0, 0)]);
        let source = MemorySource::new(page);
        // expecting a block tree page but the marker says node tree
        let tree = BlockBTree::new(&source, Version::Unicode, 0);
        let err = tree.find(BlockId::from(0x8)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_child_map_skips_duplicates_and_self_parents() {
        let page = unicode_node_leaf_page(&[
            (0x122, 0x4, 0, 0x21),
            // self-parenting entry
            (0x2042, 0x8, 0, 0x2042),
            // duplicate of the first
            (0x122, 0xC, 0, 0x21),
            (0x2062, 0x10, 0, 0x122),
        ]);
        let source = MemorySource::new(page);
        let tree = NodeBTree::new(&source, Version::Unicode, 0);

        let map = tree.child_map().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&0x21].len(), 1);
        assert_eq!(u64::from(map[&0x21][0].data()), 0x4);
        assert_eq!(map[&0x122].len(), 1);
        assert!(!map.contains_key(&0x2042));
    }
}

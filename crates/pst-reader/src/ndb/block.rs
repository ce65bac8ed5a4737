//! [Blocks](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/a9c1981d-d1ea-457c-b39e-dc7fb0eb95d4)
//!
//! A node's data lives in one data block, or in a tree of them: an XBLOCK
//! is an array of data-leaf block ids, an XXBLOCK an array of XBLOCKs.
//! [`DataTree`] flattens that into an ordered plan of file regions, and
//! [`NodeStream`] reads the plan as one logical byte stream.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Read, Seek, SeekFrom};

use super::{block_id::BlockId, header::Version, page::BlockBTree, *};
use crate::{encode, source::ByteSource};

/// `btype` of an XBLOCK/XXBLOCK.
const BLOCK_TYPE_DATA_TREE: u8 = 0x01;

#[derive(Clone, Copy, Debug)]
struct Region {
    file_offset: u64,
    length: u32,
}

/// The ordered data-leaf regions of one node, in pre-order under the
/// node's data block id.
#[derive(Debug)]
pub struct DataTree {
    regions: Vec<Region>,
    total: u64,
}

impl DataTree {
    /// Resolve `block` through the block B-tree, expanding XBLOCK and
    /// XXBLOCK arrays into their data leaves.
    pub fn read(
        source: &dyn ByteSource,
        version: Version,
        block_btree: &BlockBTree,
        block: BlockId,
    ) -> io::Result<Self> {
        let entry = block_btree.find(block)?;

        if !block.is_internal() {
            let region = Region {
                file_offset: entry.file_offset(),
                length: u32::from(entry.size()),
            };
            return Ok(Self {
                regions: vec![region],
                total: u64::from(entry.size()),
            });
        }

        let mut regions = Vec::new();
        let declared = Self::expand(source, version, block_btree, block, 0, &mut regions)?;

        let total = regions.iter().map(|region| u64::from(region.length)).sum();
        if declared != total {
            return Err(NdbError::DataTreeSizeMismatch {
                declared,
                actual: total,
                block: u64::from(block),
            }
            .into());
        }

        Ok(Self { regions, total })
    }

    /// Parse one XBLOCK/XXBLOCK and append the data-leaf regions beneath
    /// it, returning its `lcbTotal`.
    fn expand(
        source: &dyn ByteSource,
        version: Version,
        block_btree: &BlockBTree,
        block: BlockId,
        depth: u8,
        regions: &mut Vec<Region>,
    ) -> io::Result<u64> {
        // cLevel 2 over cLevel 1 over data leaves is the deepest shape
        if depth > 1 {
            return Err(NdbError::InvalidInternalBlockLevel {
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
        if block_type != BLOCK_TYPE_DATA_TREE {
            return Err(NdbError::InvalidInternalBlockType {
                kind: block_type,
                block: u64::from(block),
            }
            .into());
        }

        // cLevel
        let level = cursor.read_u8()?;
        if !(1..=2).contains(&level) {
            return Err(NdbError::InvalidInternalBlockLevel {
                level,
                block: u64::from(block),
            }
            .into());
        }

        // cEnt
        let entry_count = cursor.read_u16::<LittleEndian>()?;

        // lcbTotal
        let declared = u64::from(cursor.read_u32::<LittleEndian>()?);

        // rgbid
        for _ in 0..entry_count {
            let child = if version.is_wide() {
                BlockId::from(cursor.read_u64::<LittleEndian>()?)
            } else {
                BlockId::from(u64::from(cursor.read_u32::<LittleEndian>()?))
            };

            if level == 1 {
                let leaf = block_btree.find(child)?;
                regions.push(Region {
                    file_offset: leaf.file_offset(),
                    length: u32::from(leaf.size()),
                });
            } else {
                Self::expand(source, version, block_btree, child, depth + 1, regions)?;
            }
        }

        Ok(declared)
    }

    /// Total logical length, i.e. `lcbTotal` of the root XBLOCK or the
    /// single leaf's size.
    pub fn total_len(&self) -> u64 {
        self.total
    }

    pub(crate) fn open<'a>(self, source: &'a dyn ByteSource, decode: bool) -> NodeStream<'a> {
        NodeStream {
            backing: Backing::Source(source),
            regions: self.regions,
            decode,
            total: self.total,
            position: 0,
        }
    }

    /// The per-leaf payloads, in order. Heap-on-node pages and external
    /// table rows are aligned to leaf boundaries, so those layers consume
    /// leaves rather than the flat stream.
    pub(crate) fn leaf_payloads(
        &self,
        source: &dyn ByteSource,
        decode: bool,
    ) -> io::Result<Vec<Vec<u8>>> {
        self.regions
            .iter()
            .map(|region| {
                let mut data =
                    source.read_vec_at(region.file_offset, region.length as usize)?;
                if decode {
                    encode::decode_block(&mut data);
                }
                Ok(data)
            })
            .collect()
    }
}

enum Backing<'a> {
    Source(&'a dyn ByteSource),
    Memory(Vec<u8>),
}

/// One logical byte stream over a node's data leaves. Owns the region
/// plan and a cursor; nothing is materialized unless the caller asks.
pub struct NodeStream<'a> {
    backing: Backing<'a>,
    regions: Vec<Region>,
    decode: bool,
    total: u64,
    position: u64,
}

impl NodeStream<'_> {
    /// A stream over an already-loaded buffer; used for values that live
    /// inline in a heap rather than in their own node.
    pub fn from_bytes(data: Vec<u8>) -> NodeStream<'static> {
        let total = data.len() as u64;
        NodeStream {
            regions: vec![Region {
                file_offset: 0,
                length: data.len() as u32,
            }],
            backing: Backing::Memory(data),
            decode: false,
            total,
            position: 0,
        }
    }

    pub fn total_len(&self) -> u64 {
        self.total
    }

    pub fn read_to_vec(&mut self) -> io::Result<Vec<u8>> {
        self.seek(SeekFrom::Start(0))?;
        let mut buffer = Vec::with_capacity(self.total as usize);
        self.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn read_region(&self, region: &Region, skip: u64, buf: &mut [u8]) -> io::Result<()> {
        match &self.backing {
            Backing::Source(source) => source.read_at(region.file_offset + skip, buf)?,
            Backing::Memory(data) => {
                let start = (region.file_offset + skip) as usize;
                buf.copy_from_slice(&data[start..start + buf.len()]);
            }
        }

        Ok(())
    }
}

impl Read for NodeStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position >= self.total || buf.is_empty() {
            return Ok(0);
        }

        let wanted = buf
            .len()
            .min((self.total - self.position) as usize);

        let mut written = 0;
        let mut region_start = 0_u64;

        for region in &self.regions {
            let region_len = u64::from(region.length);
            let region_end = region_start + region_len;

            if self.position < region_end && written < wanted {
                let skip = self.position - region_start;
                let chunk = ((region_len - skip) as usize).min(wanted - written);
                let target = &mut buf[written..written + chunk];

                self.read_region(region, skip, target)?;
                if self.decode {
                    encode::decode_block(target);
                }

                written += chunk;
                self.position += chunk as u64;
            }

            region_start = region_end;
            if written == wanted {
                break;
            }
        }

        Ok(written)
    }
}

impl Seek for NodeStream<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.total.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };

        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream")
        })?;

        self.position = target;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndb::page::tests::put_page_metadata;
    use crate::ndb::page::PageKind;
    use crate::source::MemorySource;

    /// Lay out a block B-tree leaf page at offset 0 describing `blocks`,
    /// each of which is appended to the file image afterwards.
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

    fn xblock(level: u8, total: u32, children: &[u64]) -> Vec<u8> {
        let mut data = vec![0x01, level];
        data.extend_from_slice(&(children.len() as u16).to_le_bytes());
        data.extend_from_slice(&total.to_le_bytes());
        for child in children {
            data.extend_from_slice(&child.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_single_leaf_stream() {
        let source = build_file(&[(0x4, b"hello world".to_vec())]);
        let block_btree = BlockBTree::new(&source, Version::Unicode, 0);

        let tree =
            DataTree::read(&source, Version::Unicode, &block_btree, BlockId::from(0x4)).unwrap();
        assert_eq!(tree.total_len(), 11);

        let mut stream = tree.open(&source, false);
        assert_eq!(stream.read_to_vec().unwrap(), b"hello world");
    }

    #[test]
    fn test_xblock_concatenates_leaves() {
        let source = build_file(&[
            (0x4, b"hello ".to_vec()),
            (0x8, b"world".to_vec()),
            (0x6, xblock(1, 11, &[0x4, 0x8])),
        ]);
        let block_btree = BlockBTree::new(&source, Version::Unicode, 0);

        let tree =
            DataTree::read(&source, Version::Unicode, &block_btree, BlockId::from(0x6)).unwrap();
        assert_eq!(tree.total_len(), 11);

        let mut stream = tree.open(&source, false);
        assert_eq!(stream.read_to_vec().unwrap(), b"hello world");
    }

    #[test]
    fn test_xxblock_flattens_in_pre_order() {
        let source = build_file(&[
            (0x4, b"ab".to_vec()),
            (0x8, b"cd".to_vec()),
            (0xC, b"ef".to_vec()),
            (0x6, xblock(1, 4, &[0x4, 0x8])),
            (0xA, xblock(1, 2, &[0xC])),
            (0xE, xblock(2, 6, &[0x6, 0xA])),
        ]);
        let block_btree = BlockBTree::new(&source, Version::Unicode, 0);

        let tree =
            DataTree::read(&source, Version::Unicode, &block_btree, BlockId::from(0xE)).unwrap();
        assert_eq!(tree.total_len(), 6);

        let mut stream = tree.open(&source, false);
        assert_eq!(stream.read_to_vec().unwrap(), b"abcdef");
    }

    #[test]
    fn test_xblock_total_size_mismatch() {
        let source = build_file(&[
            (0x4, b"hello ".to_vec()),
            (0x8, b"world".to_vec()),
            (0x6, xblock(1, 99, &[0x4, 0x8])),
        ]);
        let block_btree = BlockBTree::new(&source, Version::Unicode, 0);

        let err = DataTree::read(&source, Version::Unicode, &block_btree, BlockId::from(0x6))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_stream_seek_and_partial_reads() {
        let source = build_file(&[
            (0x4, b"hello ".to_vec()),
            (0x8, b"world".to_vec()),
            (0x6, xblock(1, 11, &[0x4, 0x8])),
        ]);
        let block_btree = BlockBTree::new(&source, Version::Unicode, 0);

        let tree =
            DataTree::read(&source, Version::Unicode, &block_btree, BlockId::from(0x6)).unwrap();
        let mut stream = tree.open(&source, false);

        // a read that straddles the leaf boundary
        stream.seek(SeekFrom::Start(4)).unwrap();
        let mut buf = [0_u8; 4];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"o wo");

        stream.seek(SeekFrom::End(-2)).unwrap();
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"ld");
    }

    #[test]
    fn test_permute_decoding_on_delivery() {
        let mut data = b"secret".to_vec();
        encode::encode_block(&mut data);

        let source = build_file(&[(0x4, data)]);
        let block_btree = BlockBTree::new(&source, Version::Unicode, 0);

        let tree =
            DataTree::read(&source, Version::Unicode, &block_btree, BlockId::from(0x4)).unwrap();
        let mut stream = tree.open(&source, true);
        assert_eq!(stream.read_to_vec().unwrap(), b"secret");
    }

    #[test]
    fn test_from_bytes_stream() {
        let mut stream = NodeStream::from_bytes(b"inline".to_vec());
        assert_eq!(stream.total_len(), 6);
        assert_eq!(stream.read_to_vec().unwrap(), b"inline");
    }
}

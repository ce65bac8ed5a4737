//! ## [Node Database (NDB) Layer](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/e4efaad0-1876-446e-9d34-bb921588f924)

use std::io;
use thiserror::Error;

pub mod block;
pub mod block_id;
pub mod header;
pub mod node_id;
pub mod page;
pub mod sub_node;

use block::{DataTree, NodeStream};
use block_id::BlockId;
use header::{Header, Version};
use node_id::NodeId;
use page::{BlockBTree, NodeBTree, NodeBTreeEntry, PageKind};
use sub_node::SubNodeMap;

use crate::source::ByteSource;

#[derive(Error, Debug)]
pub enum NdbError {
    #[error("Invalid HEADER dwMagic: 0x{0:08X}")]
    InvalidHeaderMagic(u32),
    #[error("Invalid HEADER wMagicClient: 0x{0:04X}")]
    InvalidHeaderClientMagic(u16),
    #[error("Invalid HEADER wVer: 0x{0:04X}")]
    InvalidVersion(u16),
    #[error("Invalid HEADER bCryptMethod: 0x{0:02X}")]
    InvalidCryptMethod(u8),
    #[error("Cyclic (high) encryption is not supported")]
    CyclicEncodingRejected,
    #[error("Invalid nidType: 0x{0:02X}")]
    InvalidNodeType(u8),
    #[error("NBTENTRY not found: 0x{0:X}")]
    NodeNotFound(u32),
    #[error("BBTENTRY not found: 0x{0:X}")]
    BlockNotFound(u64),
    #[error("Mismatch between PAGETRAILER ptype and ptypeRepeat: (0x{0:02X}, 0x{1:02X})")]
    MismatchPageMarker(u8, u8),
    #[error("Unexpected PAGETRAILER ptype 0x{found:02X} in page at 0x{offset:X}, expected {expected:?}")]
    UnexpectedPageKind {
        expected: PageKind,
        found: u8,
        offset: u64,
    },
    #[error("Invalid BTPAGE cLevel: 0x{0:02X}")]
    InvalidBTreePageLevel(u8),
    #[error("Invalid BTPAGE cbEnt: {0}")]
    InvalidBTreeEntrySize(u8),
    #[error("Invalid BTPAGE cEnt: {0}")]
    InvalidBTreeEntryCount(usize),
    #[error("Invalid data block btype 0x{kind:02X} in block 0x{block:X}")]
    InvalidInternalBlockType { kind: u8, block: u64 },
    #[error("Invalid data block cLevel 0x{level:02X} in block 0x{block:X}")]
    InvalidInternalBlockLevel { level: u8, block: u64 },
    #[error("XBLOCK lcbTotal 0x{declared:X} != leaf total 0x{actual:X} in block 0x{block:X}")]
    DataTreeSizeMismatch {
        declared: u64,
        actual: u64,
        block: u64,
    },
    #[error("Invalid sub-node block btype 0x{kind:02X} in block 0x{block:X}")]
    InvalidSubNodeBlockType { kind: u8, block: u64 },
    #[error("Invalid sub-node block cLevel 0x{level:02X} in block 0x{block:X}")]
    InvalidSubNodeBlockLevel { level: u8, block: u64 },
    #[error("Sub-node not found: 0x{0:X}")]
    SubNodeNotFound(u32),
}

impl From<NdbError> for io::Error {
    fn from(err: NdbError) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

pub type NdbResult<T> = Result<T, NdbError>;

/// The byte source and header facts bundled for the layers above. All
/// state is shared read-only; instances are free-standing values.
#[derive(Clone, Copy)]
pub struct NodeDatabase<'a> {
    source: &'a dyn ByteSource,
    header: &'a Header,
}

impl<'a> NodeDatabase<'a> {
    pub fn new(source: &'a dyn ByteSource, header: &'a Header) -> Self {
        Self { source, header }
    }

    pub fn version(&self) -> Version {
        self.header.version()
    }

    pub fn source(&self) -> &'a dyn ByteSource {
        self.source
    }

    pub fn node_btree(&self) -> NodeBTree<'a> {
        NodeBTree::new(self.source, self.header.version(), self.header.node_btree())
    }

    pub fn block_btree(&self) -> BlockBTree<'a> {
        BlockBTree::new(
            self.source,
            self.header.version(),
            self.header.block_btree(),
        )
    }

    pub fn find_node(&self, node: NodeId) -> io::Result<NodeBTreeEntry> {
        self.node_btree().find(node)
    }

    pub fn data_tree(&self, block: BlockId) -> io::Result<DataTree> {
        DataTree::read(
            self.source,
            self.header.version(),
            &self.block_btree(),
            block,
        )
    }

    /// The logical stream of a node's data, decoded on delivery when the
    /// file uses compressible encryption.
    pub fn node_stream(&self, block: BlockId) -> io::Result<NodeStream<'a>> {
        Ok(self
            .data_tree(block)?
            .open(self.source, self.header.decode_blocks()))
    }

    /// A node's data split at data-leaf boundaries; heap pages and
    /// external table rows never straddle a leaf.
    pub fn leaf_payloads(&self, block: BlockId) -> io::Result<Vec<Vec<u8>>> {
        self.data_tree(block)?
            .leaf_payloads(self.source, self.header.decode_blocks())
    }

    pub fn sub_node_map(&self, block: Option<BlockId>) -> io::Result<SubNodeMap> {
        match block {
            Some(block) => SubNodeMap::read(
                self.source,
                self.header.version(),
                &self.block_btree(),
                block,
            ),
            None => Ok(SubNodeMap::default()),
        }
    }

    /// Materialize the data of a local node out of a sub-node map.
    pub fn sub_node_bytes(&self, sub_nodes: &SubNodeMap, node: NodeId) -> io::Result<Vec<u8>> {
        let entry = sub_nodes.find(node)?;
        self.node_stream(entry.data())?.read_to_vec()
    }
}

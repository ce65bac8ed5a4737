#![doc = include_str!("../README.md")]

use std::{collections::BTreeMap, io, path::Path, sync::OnceLock};

pub mod ltp;
pub mod messaging;
pub mod ndb;

mod datetime;
mod source;

pub mod encode;

pub use datetime::{filetime_from_parts, filetime_to_datetime};
pub use source::{ByteSource, FileSource, MemorySource};

use messaging::{
    folder::Folder,
    message::{read_item, Item},
    named_prop::NamedPropertyMap,
    store::MessageStore,
};
use ndb::{
    header::Header,
    node_id::{NodeId, NID_ROOT_FOLDER},
    NodeDatabase,
};

/// An open PST/OST file: the byte source, the validated header, and the
/// named-property map built once at open. Everything else is decoded
/// lazily per request.
///
/// Single-threaded by design; open one handle per worker if parallel
/// access is wanted.
pub struct PstFile {
    source: Box<dyn ByteSource>,
    header: Header,
    named_props: NamedPropertyMap,
    fallback_map: OnceLock<BTreeMap<u32, Vec<u32>>>,
}

impl PstFile {
    /// Open a file on disk.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::from_source(Box::new(FileSource::open(path)?))
    }

    /// Open an in-memory image of a file.
    pub fn open_buffer(data: Vec<u8>) -> io::Result<Self> {
        Self::from_source(Box::new(MemorySource::new(data)))
    }

    pub fn from_source(source: Box<dyn ByteSource>) -> io::Result<Self> {
        let header = Header::read(source.as_ref())?;

        let mut file = Self {
            source,
            header,
            named_props: NamedPropertyMap::default(),
            fallback_map: OnceLock::new(),
        };
        let named_props = NamedPropertyMap::read(&file.ndb())?;
        file.named_props = named_props;

        Ok(file)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn named_properties(&self) -> &NamedPropertyMap {
        &self.named_props
    }

    pub(crate) fn ndb(&self) -> NodeDatabase<'_> {
        NodeDatabase::new(self.source.as_ref(), &self.header)
    }

    /// The message store object.
    pub fn message_store(&self) -> io::Result<MessageStore<'_>> {
        MessageStore::read(self)
    }

    /// The root mailbox folder.
    pub fn root_folder(&self) -> io::Result<Folder<'_>> {
        self.folder(NID_ROOT_FOLDER)
    }

    /// Any folder by node id.
    pub fn folder(&self, node_id: NodeId) -> io::Result<Folder<'_>> {
        Folder::read(self, node_id)
    }

    /// Any object by node id, dispatched on node type and message class.
    pub fn item(&self, node_id: NodeId) -> io::Result<Item<'_>> {
        read_item(self, node_id)
    }

    /// Children of `parent` according to the full node-tree walk, built
    /// on first use and memoized. This is the fallback for folders whose
    /// hierarchy table is broken.
    pub(crate) fn fallback_children(&self, parent: NodeId) -> io::Result<Vec<NodeId>> {
        let map = match self.fallback_map.get() {
            Some(map) => map,
            None => {
                let built = self
                    .ndb()
                    .node_btree()
                    .child_map()?
                    .into_iter()
                    .map(|(parent, entries)| {
                        let children = entries
                            .into_iter()
                            .map(|entry| u32::from(entry.node()))
                            .collect();
                        (parent, children)
                    })
                    .collect();
                self.fallback_map.get_or_init(|| built)
            }
        };

        Ok(map
            .get(&u32::from(parent))
            .map(|children| children.iter().copied().map(NodeId::from).collect())
            .unwrap_or_default())
    }
}

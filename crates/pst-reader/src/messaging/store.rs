//! ## [Message Store](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/aa0539bd-e7bf-4cec-8bde-0b87c2a86baf)

use std::io;

use super::{folder::Folder, *};
use crate::{
    ltp::prop_context::{PropertyContext, PropertySet},
    ndb::node_id::{NodeId, NID_MESSAGE_STORE},
    PstFile,
};

const PROP_DISPLAY_NAME: u16 = 0x3001;
const PROP_RECORD_KEY: u16 = 0x0FF9;
const PROP_IPM_SUB_TREE_ENTRY_ID: u16 = 0x35E0;
const PROP_IPM_WASTEBASKET_ENTRY_ID: u16 = 0x35E3;
const PROP_FINDER_ENTRY_ID: u16 = 0x35E7;

/// [ENTRYID](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/28029c1b-8b05-44e3-9183-fab0c37df7c6):
/// `{ rgbFlags, uid, nid }`, the store-relative address of an object.
#[derive(Clone, Copy, Debug)]
pub struct EntryId {
    flags: u32,
    uid: [u8; 16],
    node: NodeId,
}

impl EntryId {
    pub fn read(bytes: &[u8]) -> MessagingResult<Self> {
        if bytes.len() != 24 {
            return Err(MessagingError::InvalidEntryIdSize(bytes.len()));
        }

        // rgbFlags
        let mut flags = [0; 4];
        flags.copy_from_slice(&bytes[..4]);
        // uid
        let mut uid = [0; 16];
        uid.copy_from_slice(&bytes[4..20]);
        // nid
        let mut node = [0; 4];
        node.copy_from_slice(&bytes[20..]);

        Ok(Self {
            flags: u32::from_le_bytes(flags),
            uid,
            node: NodeId::from(u32::from_le_bytes(node)),
        })
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn uid(&self) -> &[u8; 16] {
        &self.uid
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }
}

/// The message store object at node 0x21: the root of everything the
/// file contains.
pub struct MessageStore<'a> {
    file: &'a PstFile,
    properties: PropertySet,
}

impl<'a> MessageStore<'a> {
    pub(crate) fn read(file: &'a PstFile) -> io::Result<Self> {
        let ndb = file.ndb();
        let node = ndb.find_node(NID_MESSAGE_STORE)?;
        let (properties, _) = PropertyContext::read_node(&ndb, &node)?;
        Ok(Self { file, properties })
    }

    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }

    pub fn display_name(&self) -> io::Result<String> {
        self.properties
            .string(PROP_DISPLAY_NAME)
            .ok_or_else(|| MessagingError::StoreDisplayNameNotFound.into())
    }

    /// The store's unique key; entry ids carry it as their `uid`.
    pub fn record_key(&self) -> io::Result<&[u8]> {
        self.properties
            .binary(PROP_RECORD_KEY)
            .ok_or_else(|| MessagingError::StoreRecordKeyNotFound.into())
    }

    /// Entry id of the IPM sub-tree, the folder under which the normal
    /// mailbox hierarchy lives.
    pub fn ipm_sub_tree(&self) -> io::Result<EntryId> {
        let bytes = self
            .properties
            .binary(PROP_IPM_SUB_TREE_ENTRY_ID)
            .ok_or(MessagingError::StoreIpmSubTreeEntryIdNotFound)?;
        Ok(EntryId::read(bytes)?)
    }

    pub fn wastebasket(&self) -> Option<EntryId> {
        let bytes = self.properties.binary(PROP_IPM_WASTEBASKET_ENTRY_ID)?;
        EntryId::read(bytes).ok()
    }

    pub fn finder(&self) -> Option<EntryId> {
        let bytes = self.properties.binary(PROP_FINDER_ENTRY_ID)?;
        EntryId::read(bytes).ok()
    }

    pub fn root_folder(&self) -> io::Result<Folder<'a>> {
        self.file.root_folder()
    }

    pub fn ipm_sub_tree_folder(&self) -> io::Result<Folder<'a>> {
        self.file.folder(self.ipm_sub_tree()?.node_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_id_round_trip() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0_u32.to_le_bytes());
        bytes.extend_from_slice(&[0xAB; 16]);
        bytes.extend_from_slice(&0x122_u32.to_le_bytes());

        let entry_id = EntryId::read(&bytes).unwrap();
        assert_eq!(entry_id.flags(), 0);
        assert_eq!(entry_id.uid(), &[0xAB; 16]);
        assert_eq!(u32::from(entry_id.node_id()), 0x122);
    }

    #[test]
    fn test_entry_id_wrong_size() {
        let Err(MessagingError::InvalidEntryIdSize(23)) = EntryId::read(&[0; 23]) else {
            panic!("a 23-byte entry id should be rejected");
        };
    }
}

//! [NID (Node ID)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/18d7644e-cb33-4e11-95c0-34d8a84fbff6)

use byteorder::{LittleEndian, ReadBytesExt};
use std::{
    fmt::Debug,
    io::{self, Read},
};

use super::*;

/// `nidType`: the low five bits of a [`NodeId`].
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum NodeType {
    /// `NID_TYPE_HID`: Heap node
    HeapNode = 0x00,
    /// `NID_TYPE_INTERNAL`: Internal node
    Internal = 0x01,
    /// `NID_TYPE_NORMAL_FOLDER`: Folder object (PC)
    NormalFolder = 0x02,
    /// `NID_TYPE_SEARCH_FOLDER`: Search Folder object (PC)
    SearchFolder = 0x03,
    /// `NID_TYPE_NORMAL_MESSAGE`: Message object (PC)
    NormalMessage = 0x04,
    /// `NID_TYPE_ATTACHMENT`: Attachment object (PC)
    Attachment = 0x05,
    /// `NID_TYPE_SEARCH_UPDATE_QUEUE`
    SearchUpdateQueue = 0x06,
    /// `NID_TYPE_SEARCH_CRITERIA_OBJECT`
    SearchCriteria = 0x07,
    /// `NID_TYPE_ASSOC_MESSAGE`: Folder associated information Message object (PC)
    AssociatedMessage = 0x08,
    /// `NID_TYPE_CONTENTS_TABLE_INDEX`
    ContentsTableIndex = 0x0A,
    /// `NID_TYPE_RECEIVE_FOLDER_TABLE`
    ReceiveFolderTable = 0x0B,
    /// `NID_TYPE_OUTGOING_QUEUE_TABLE`
    OutgoingQueueTable = 0x0C,
    /// `NID_TYPE_HIERARCHY_TABLE`: Hierarchy table (TC)
    HierarchyTable = 0x0D,
    /// `NID_TYPE_CONTENTS_TABLE`: Contents table (TC)
    ContentsTable = 0x0E,
    /// `NID_TYPE_ASSOC_CONTENTS_TABLE`: FAI contents table (TC)
    AssociatedContentsTable = 0x0F,
    /// `NID_TYPE_SEARCH_CONTENTS_TABLE`: Contents table (TC) of a search Folder object
    SearchContentsTable = 0x10,
    /// `NID_TYPE_ATTACHMENT_TABLE`: Attachment table (TC)
    AttachmentTable = 0x11,
    /// `NID_TYPE_RECIPIENT_TABLE`: Recipient table (TC)
    RecipientTable = 0x12,
    /// `NID_TYPE_SEARCH_TABLE_INDEX`
    SearchTableIndex = 0x13,
    /// `NID_TYPE_LTP`: [LTP](crate::ltp)
    ListsTablesProperties = 0x1F,
}

impl TryFrom<u8> for NodeType {
    type Error = NdbError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(NodeType::HeapNode),
            0x01 => Ok(NodeType::Internal),
            0x02 => Ok(NodeType::NormalFolder),
            0x03 => Ok(NodeType::SearchFolder),
            0x04 => Ok(NodeType::NormalMessage),
            0x05 => Ok(NodeType::Attachment),
            0x06 => Ok(NodeType::SearchUpdateQueue),
            0x07 => Ok(NodeType::SearchCriteria),
            0x08 => Ok(NodeType::AssociatedMessage),
            0x0A => Ok(NodeType::ContentsTableIndex),
            0x0B => Ok(NodeType::ReceiveFolderTable),
            0x0C => Ok(NodeType::OutgoingQueueTable),
            0x0D => Ok(NodeType::HierarchyTable),
            0x0E => Ok(NodeType::ContentsTable),
            0x0F => Ok(NodeType::AssociatedContentsTable),
            0x10 => Ok(NodeType::SearchContentsTable),
            0x11 => Ok(NodeType::AttachmentTable),
            0x12 => Ok(NodeType::RecipientTable),
            0x13 => Ok(NodeType::SearchTableIndex),
            0x1F => Ok(NodeType::ListsTablesProperties),
            _ => Err(NdbError::InvalidNodeType(value)),
        }
    }
}

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(node_type: NodeType, index: u32) -> Self {
        Self((index << 5) | u32::from(node_type as u8))
    }

    pub fn node_type(&self) -> NdbResult<NodeType> {
        NodeType::try_from((self.0 & 0x1F) as u8)
    }

    pub fn index(&self) -> u32 {
        self.0 >> 5
    }

    /// The sibling node carrying `node_type` for the same index, e.g. the
    /// contents table node of a folder node.
    pub fn with_type(&self, node_type: NodeType) -> Self {
        Self::new(node_type, self.index())
    }

    pub(crate) fn read(f: &mut dyn Read) -> io::Result<Self> {
        Ok(Self(f.read_u32::<LittleEndian>()?))
    }
}

impl Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Ok(node_type) = self.node_type() else {
            return write!(f, "NodeId {{ invalid: 0x{:08X} }}", self.0);
        };

        write!(f, "NodeId {{ {:?}: 0x{:X} }}", node_type, self.index())
    }
}

impl From<u32> for NodeId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<NodeId> for u32 {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

/// `NID_MESSAGE_STORE`: the message store node.
pub const NID_MESSAGE_STORE: NodeId = NodeId(0x21);

/// `NID_NAME_TO_ID_MAP`: the named properties map.
pub const NID_NAME_TO_ID_MAP: NodeId = NodeId(0x61);

/// `NID_ROOT_FOLDER`: the root mailbox Folder object.
pub const NID_ROOT_FOLDER: NodeId = NodeId(0x122);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_nids() {
        assert_eq!(u32::from(NID_MESSAGE_STORE), 33);
        assert_eq!(u32::from(NID_ROOT_FOLDER), 290);
        assert_eq!(NID_MESSAGE_STORE.node_type().unwrap(), NodeType::Internal);
        assert_eq!(
            NID_ROOT_FOLDER.node_type().unwrap(),
            NodeType::NormalFolder
        );
    }

    #[test]
    fn test_sibling_table_nid() {
        let contents = NID_ROOT_FOLDER.with_type(NodeType::ContentsTable);
        assert_eq!(contents.index(), NID_ROOT_FOLDER.index());
        assert_eq!(contents.node_type().unwrap(), NodeType::ContentsTable);
    }

    #[test]
    fn test_invalid_nid_type() {
        let Err(NdbError::InvalidNodeType(0x1E)) = NodeId::from(0x1E).node_type() else {
            panic!("nidType 0x1E should be invalid");
        };
    }
}

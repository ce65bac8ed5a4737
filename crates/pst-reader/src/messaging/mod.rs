//! ## [Messaging Layer](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/3f1bc553-d15d-4dcf-9b80-fbf1dd6c7e79)

use std::io;
use thiserror::Error;

pub mod attachment;
pub mod folder;
pub mod message;
pub mod named_prop;
pub mod recipient;
pub mod store;

use crate::ndb::node_id::NodeType;

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Node Database error: {0}")]
    NodeDatabaseError(#[from] crate::ndb::NdbError),
    #[error("Lists, Tables and Properties error: {0}")]
    ListsTablesPropertiesError(#[from] crate::ltp::LtpError),
    #[error("Invalid folder NID_TYPE: {0:?}")]
    InvalidFolderNodeType(NodeType),
    #[error("Invalid message NID_TYPE: {0:?}")]
    InvalidMessageNodeType(NodeType),
    #[error("Missing PidTagDisplayName on store")]
    StoreDisplayNameNotFound,
    #[error("Missing PidTagRecordKey on store")]
    StoreRecordKeyNotFound,
    #[error("Missing PidTagIpmSubTreeEntryId on store")]
    StoreIpmSubTreeEntryIdNotFound,
    #[error("Missing PidTagDisplayName on folder")]
    FolderDisplayNameNotFound,
    #[error("Missing PidTagContentCount on folder")]
    FolderContentCountNotFound,
    #[error("Missing PidTagContentUnreadCount on folder")]
    FolderUnreadCountNotFound,
    #[error("Missing PidTagSubfolders on folder")]
    FolderHasSubfoldersNotFound,
    #[error("Invalid EntryID size: {0}")]
    InvalidEntryIdSize(usize),
    #[error("Missing PidTagAttachDataBinary on attachment")]
    AttachmentDataNotFound,
    #[error("Invalid compressed RTF body: {0}")]
    InvalidRtfBody(#[from] compressed_rtf::Error),
}

impl From<MessagingError> for io::Error {
    fn from(err: MessagingError) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

pub type MessagingResult<T> = Result<T, MessagingError>;

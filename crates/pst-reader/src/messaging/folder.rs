//! ## [Folders](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/dee5b9d0-5513-4c5e-94aa-8bd28a9350b2)

use std::io;
use tracing::debug;

use super::{
    message::{read_item, Item},
    *,
};
use crate::{
    ltp::{
        prop_context::{PropertyContext, PropertySet},
        table_context::TableContext,
    },
    ndb::{
        node_id::{NodeId, NodeType},
        page::NodeBTreeEntry,
    },
    PstFile,
};

const PROP_DISPLAY_NAME: u16 = 0x3001;
const PROP_CONTENT_COUNT: u16 = 0x3602;
const PROP_CONTENT_UNREAD_COUNT: u16 = 0x3603;
const PROP_SUBFOLDERS: u16 = 0x360A;

/// A folder object: a property context plus the hierarchy, contents and
/// associated-contents tables stored beside it under sibling node ids.
pub struct Folder<'a> {
    file: &'a PstFile,
    node: NodeBTreeEntry,
    properties: PropertySet,
    contents: Option<TableContext>,
    cursor: usize,
}

impl<'a> Folder<'a> {
    pub(crate) fn read(file: &'a PstFile, node_id: NodeId) -> io::Result<Self> {
        match node_id.node_type()? {
            NodeType::NormalFolder | NodeType::SearchFolder => {}
            invalid => {
                return Err(MessagingError::InvalidFolderNodeType(invalid).into());
            }
        }

        let ndb = file.ndb();
        let node = ndb.find_node(node_id)?;
        let (properties, _) = PropertyContext::read_node(&ndb, &node)?;

        Ok(Self {
            file,
            node,
            properties,
            contents: None,
            cursor: 0,
        })
    }

    pub fn node_id(&self) -> NodeId {
        self.node.node()
    }

    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }

    pub fn display_name(&self) -> io::Result<String> {
        self.properties
            .string(PROP_DISPLAY_NAME)
            .ok_or_else(|| MessagingError::FolderDisplayNameNotFound.into())
    }

    pub fn content_count(&self) -> io::Result<i32> {
        self.properties
            .int32(PROP_CONTENT_COUNT)
            .ok_or_else(|| MessagingError::FolderContentCountNotFound.into())
    }

    pub fn unread_count(&self) -> io::Result<i32> {
        self.properties
            .int32(PROP_CONTENT_UNREAD_COUNT)
            .ok_or_else(|| MessagingError::FolderUnreadCountNotFound.into())
    }

    pub fn has_sub_folders(&self) -> io::Result<bool> {
        self.properties
            .boolean(PROP_SUBFOLDERS)
            .ok_or_else(|| MessagingError::FolderHasSubfoldersNotFound.into())
    }

    /// The child folders, through the hierarchy table when it is intact,
    /// through the node-tree walk when it is not.
    pub fn sub_folders(&self) -> io::Result<Vec<Folder<'a>>> {
        match self.hierarchy_children() {
            Ok(folders) => Ok(folders),
            Err(error) => {
                debug!(
                    folder = u32::from(self.node_id()),
                    %error,
                    "hierarchy table unusable, walking the node tree instead"
                );
                self.fallback_children()
            }
        }
    }

    fn hierarchy_children(&self) -> io::Result<Vec<Folder<'a>>> {
        let ndb = self.file.ndb();
        let table_node = ndb.find_node(self.node_id().with_type(NodeType::HierarchyTable))?;
        let table = TableContext::read_node(&ndb, &table_node)?;

        table
            .row_ids()
            .into_iter()
            .map(NodeId::from)
            .filter(|node_id| {
                matches!(
                    node_id.node_type(),
                    Ok(NodeType::NormalFolder | NodeType::SearchFolder)
                )
            })
            .map(|node_id| Folder::read(self.file, node_id))
            .collect()
    }

    fn fallback_children(&self) -> io::Result<Vec<Folder<'a>>> {
        let children = self.file.fallback_children(self.node_id())?;

        children
            .into_iter()
            .filter(|node_id| {
                matches!(
                    node_id.node_type(),
                    Ok(NodeType::NormalFolder | NodeType::SearchFolder)
                )
            })
            .map(|node_id| Folder::read(self.file, node_id))
            .collect()
    }

    /// The contents table listing this folder's messages.
    pub fn contents_table(&self) -> io::Result<TableContext> {
        let ndb = self.file.ndb();
        let table_node = ndb.find_node(self.node_id().with_type(NodeType::ContentsTable))?;
        TableContext::read_node(&ndb, &table_node)
    }

    /// The folder-associated-information table (hidden messages).
    pub fn associated_contents_table(&self) -> io::Result<TableContext> {
        let ndb = self.file.ndb();
        let table_node =
            ndb.find_node(self.node_id().with_type(NodeType::AssociatedContentsTable))?;
        TableContext::read_node(&ndb, &table_node)
    }

    /// Advance the folder's cursor over its contents table, turning each
    /// row into a typed item through the message-class factory. `None`
    /// once the table is exhausted.
    pub fn next_child(&mut self) -> io::Result<Option<Item<'a>>> {
        if self.contents.is_none() {
            self.contents = Some(self.contents_table()?);
        }
        let Some(table) = self.contents.as_ref() else {
            return Ok(None);
        };

        while self.cursor < table.row_count() {
            let row = self.cursor;
            self.cursor += 1;

            if let Some(row_id) = table.row_id(row) {
                return read_item(self.file, NodeId::from(row_id)).map(Some);
            }
        }

        Ok(None)
    }

    /// Rewind the [`Self::next_child`] cursor.
    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }
}

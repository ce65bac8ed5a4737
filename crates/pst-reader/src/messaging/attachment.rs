//! ## [Attachment Objects](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/46eb4828-c6a5-420d-a137-9ee36df317c1)

use std::io;

use super::{message::Message, *};
use crate::{
    ltp::prop_context::{PropertyContext, PropertySet, PropertyValue},
    ndb::{
        block::NodeStream,
        node_id::NodeId,
        sub_node::SubNodeMap,
    },
    PstFile,
};

const PROP_ATTACH_DATA: u16 = 0x3701;
const PROP_ATTACH_EXTENSION: u16 = 0x3703;
const PROP_ATTACH_FILENAME: u16 = 0x3704;
const PROP_ATTACH_METHOD: u16 = 0x3705;
const PROP_ATTACH_LONG_FILENAME: u16 = 0x3707;
const PROP_ATTACH_RENDERING_POSITION: u16 = 0x370B;
const PROP_ATTACH_MIME_TAG: u16 = 0x370E;
const PROP_ATTACH_SIZE: u16 = 0x0E20;
const PROP_DISPLAY_NAME: u16 = 0x3001;

/// `PidTagAttachMethod`
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AttachMethod {
    None,
    ByValue,
    ByReference,
    ByReferenceOnly,
    /// The attachment is itself a message.
    EmbeddedMessage,
    Storage,
}

impl AttachMethod {
    fn from_raw(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::ByValue),
            2 => Some(Self::ByReference),
            4 => Some(Self::ByReferenceOnly),
            5 => Some(Self::EmbeddedMessage),
            6 => Some(Self::Storage),
            _ => None,
        }
    }
}

/// One attachment: a property context in the owning message's sub-node
/// map, with its own sub-node map for external data and embedded
/// messages.
pub struct Attachment<'a> {
    file: &'a PstFile,
    node: NodeId,
    properties: PropertySet,
    sub_nodes: SubNodeMap,
}

impl<'a> Attachment<'a> {
    pub(crate) fn read(
        file: &'a PstFile,
        message_sub_nodes: &SubNodeMap,
        node_id: NodeId,
    ) -> io::Result<Self> {
        let entry = message_sub_nodes.find(node_id)?;

        let ndb = file.ndb();
        let heap = crate::ltp::heap::HeapNode::read(&ndb, entry.data())?;
        let sub_nodes = ndb.sub_node_map(entry.sub_node())?;
        let properties = PropertyContext::read(&ndb, &heap, &sub_nodes)?;

        Ok(Self {
            file,
            node: node_id,
            properties,
            sub_nodes,
        })
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }

    pub fn method(&self) -> Option<AttachMethod> {
        AttachMethod::from_raw(self.properties.int32(PROP_ATTACH_METHOD)?)
    }

    pub fn filename(&self) -> Option<String> {
        self.properties.string(PROP_ATTACH_FILENAME)
    }

    pub fn long_filename(&self) -> Option<String> {
        self.properties.string(PROP_ATTACH_LONG_FILENAME)
    }

    pub fn display_name(&self) -> Option<String> {
        self.properties.string(PROP_DISPLAY_NAME)
    }

    pub fn extension(&self) -> Option<String> {
        self.properties.string(PROP_ATTACH_EXTENSION)
    }

    pub fn mime_tag(&self) -> Option<String> {
        self.properties.string(PROP_ATTACH_MIME_TAG)
    }

    pub fn size(&self) -> Option<i32> {
        self.properties.int32(PROP_ATTACH_SIZE)
    }

    pub fn rendering_position(&self) -> Option<i32> {
        self.properties.int32(PROP_ATTACH_RENDERING_POSITION)
    }

    /// The attachment payload as a stream: either the in-heap bytes of
    /// `PidTagAttachDataBinary` or the external sub-node the object
    /// value points at.
    pub fn data_stream(&self) -> io::Result<NodeStream<'a>> {
        match self.properties.get(PROP_ATTACH_DATA) {
            Some(PropertyValue::Binary(bytes)) => Ok(NodeStream::from_bytes(bytes.clone())),
            Some(PropertyValue::Object(object)) => {
                let entry = self.sub_nodes.find(object.node())?;
                self.file.ndb().node_stream(entry.data())
            }
            _ => Err(MessagingError::AttachmentDataNotFound.into()),
        }
    }

    /// The payload, materialized.
    pub fn data(&self) -> io::Result<Vec<u8>> {
        self.data_stream()?.read_to_vec()
    }

    /// The embedded message, when [`Self::method`] says there is one.
    pub fn embedded_message(&self) -> io::Result<Option<Message<'a>>> {
        if self.method() != Some(AttachMethod::EmbeddedMessage) {
            return Ok(None);
        }

        let Some(object) = self.properties.object(PROP_ATTACH_DATA) else {
            return Err(MessagingError::AttachmentDataNotFound.into());
        };

        let entry = self.sub_nodes.find(object.node())?;
        Message::read_embedded(self.file, object.node(), entry.data(), entry.sub_node())
            .map(Some)
    }
}

//! ## [Messages](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/1042af37-aaa4-4edc-bffd-90a1ede24188)
//!
//! The message object, its recipient and attachment tables, and the
//! message-class dispatch that wraps a message in the matching typed
//! view.

use std::io;
use time::OffsetDateTime;
use tracing::warn;

use super::{
    attachment::Attachment,
    folder::Folder,
    named_prop::{
        GUID_INDEX_PSETID_ADDRESS, GUID_INDEX_PSETID_APPOINTMENT, GUID_INDEX_PSETID_LOG,
        GUID_INDEX_PSETID_TASK,
    },
    recipient::Recipient,
    *,
};
use crate::{
    ltp::{
        heap::HeapNode,
        prop_context::{PropertyContext, PropertySet, PropertyValue},
        table_context::TableContext,
    },
    ndb::{
        block_id::BlockId,
        node_id::{NodeId, NodeType},
        sub_node::SubNodeMap,
    },
    PstFile,
};

const PROP_MESSAGE_CLASS: u16 = 0x001A;
const PROP_IMPORTANCE: u16 = 0x0017;
const PROP_SUBJECT: u16 = 0x0037;
const PROP_CLIENT_SUBMIT_TIME: u16 = 0x0039;
const PROP_CONVERSATION_TOPIC: u16 = 0x0070;
const PROP_TRANSPORT_MESSAGE_HEADERS: u16 = 0x007D;
const PROP_SENDER_NAME: u16 = 0x0C1A;
const PROP_DISPLAY_BCC: u16 = 0x0E02;
const PROP_DISPLAY_CC: u16 = 0x0E03;
const PROP_DISPLAY_TO: u16 = 0x0E04;
const PROP_MESSAGE_DELIVERY_TIME: u16 = 0x0E06;
const PROP_MESSAGE_FLAGS: u16 = 0x0E07;
const PROP_MESSAGE_SIZE: u16 = 0x0E08;
const PROP_BODY: u16 = 0x1000;
const PROP_RTF_COMPRESSED: u16 = 0x1009;
const PROP_BODY_HTML: u16 = 0x1013;
const PROP_CREATION_TIME: u16 = 0x3007;
const PROP_LAST_MODIFICATION_TIME: u16 = 0x3008;

/// `PidTagMessageFlags` bit for "has attachments".
const MESSAGE_FLAG_HAS_ATTACH: i32 = 0x10;

/// What the factory produced for a node: the typed views share the
/// message surface underneath.
pub enum Item<'a> {
    Folder(Folder<'a>),
    Message(Message<'a>),
    Appointment(Appointment<'a>),
    Contact(Contact<'a>),
    Task(Task<'a>),
    Activity(Activity<'a>),
}

impl<'a> Item<'a> {
    /// The message surface of this item, if it is not a folder.
    pub fn message(&self) -> Option<&Message<'a>> {
        match self {
            Item::Folder(_) => None,
            Item::Message(message) => Some(message),
            Item::Appointment(appointment) => Some(&appointment.message),
            Item::Contact(contact) => Some(&contact.message),
            Item::Task(task) => Some(&task.message),
            Item::Activity(activity) => Some(&activity.message),
        }
    }

    pub fn into_message(self) -> Option<Message<'a>> {
        match self {
            Item::Folder(_) => None,
            Item::Message(message) => Some(message),
            Item::Appointment(appointment) => Some(appointment.message),
            Item::Contact(contact) => Some(contact.message),
            Item::Task(task) => Some(task.message),
            Item::Activity(activity) => Some(activity.message),
        }
    }
}

/// Read the node and dispatch on its type and `PidTagMessageClass`.
pub(crate) fn read_item<'a>(file: &'a PstFile, node_id: NodeId) -> io::Result<Item<'a>> {
    match node_id.node_type()? {
        NodeType::NormalFolder | NodeType::SearchFolder => {
            Ok(Item::Folder(Folder::read(file, node_id)?))
        }
        _ => Ok(classify(Message::read(file, node_id)?)),
    }
}

/// The message-class dispatch table. Anything unrecognized is still a
/// message; that path warns but never fails.
fn classify(message: Message) -> Item {
    let class = message.message_class().unwrap_or_default();

    if class.starts_with("IPM.Appointment") || class.starts_with("IPM.Schedule.Meeting") {
        return Item::Appointment(Appointment { message });
    }
    if class.starts_with("IPM.Contact") {
        return Item::Contact(Contact { message });
    }
    if class.starts_with("IPM.TaskRequest") || class.starts_with("IPM.Task") {
        return Item::Task(Task { message });
    }
    if class.starts_with("IPM.Activity") {
        return Item::Activity(Activity { message });
    }

    let generic = class.is_empty()
        || class.starts_with("IPM.Note")
        || class.starts_with("REPORT.IPM.Note")
        || class.starts_with("IPM.StickyNote")
        || class.starts_with("IPM.DistList")
        || class.starts_with("IPM.Post.Rss");
    if !generic {
        warn!(%class, "unknown message class, treating as a plain message");
    }

    Item::Message(message)
}

/// A message object: the property context at its node plus the sub-node
/// map carrying its recipient and attachment tables.
pub struct Message<'a> {
    file: &'a PstFile,
    node: NodeId,
    properties: PropertySet,
    sub_nodes: SubNodeMap,
}

impl<'a> Message<'a> {
    pub(crate) fn read(file: &'a PstFile, node_id: NodeId) -> io::Result<Self> {
        match node_id.node_type()? {
            NodeType::NormalMessage | NodeType::AssociatedMessage => {}
            invalid => {
                return Err(MessagingError::InvalidMessageNodeType(invalid).into());
            }
        }

        let ndb = file.ndb();
        let node = ndb.find_node(node_id)?;
        let (properties, sub_nodes) = PropertyContext::read_node(&ndb, &node)?;

        Ok(Self {
            file,
            node: node_id,
            properties,
            sub_nodes,
        })
    }

    /// An embedded message is not in the node B-tree; its blocks come
    /// straight out of the enclosing attachment's sub-node map.
    pub(crate) fn read_embedded(
        file: &'a PstFile,
        node_id: NodeId,
        data: BlockId,
        sub_node: Option<BlockId>,
    ) -> io::Result<Self> {
        let ndb = file.ndb();
        let heap = HeapNode::read(&ndb, data)?;
        let sub_nodes = ndb.sub_node_map(sub_node)?;
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

    pub fn message_class(&self) -> Option<String> {
        self.properties.string(PROP_MESSAGE_CLASS)
    }

    /// `PidTagSubject`, with the thread-prefix control pair (a leading
    /// 0x01 and the prefix length) stripped.
    pub fn subject(&self) -> Option<String> {
        let subject = self.properties.string(PROP_SUBJECT)?;
        if subject.starts_with('\u{1}') {
            Some(subject.chars().skip(2).collect())
        } else {
            Some(subject)
        }
    }

    pub fn body(&self) -> Option<String> {
        self.properties.string(PROP_BODY)
    }

    /// `PidTagBodyHtml` is written either as a string or as raw bytes in
    /// the message codepage.
    pub fn body_html(&self) -> Option<String> {
        match self.properties.get(PROP_BODY_HTML)? {
            PropertyValue::Binary(bytes) => Some(crate::ltp::prop_context::decode_string8(
                bytes,
                self.properties.codepage(),
            )),
            _ => self.properties.string(PROP_BODY_HTML),
        }
    }

    /// `PidTagRtfCompressed`, decompressed.
    pub fn body_rtf(&self) -> io::Result<Option<String>> {
        let Some(bytes) = self.properties.binary(PROP_RTF_COMPRESSED) else {
            return Ok(None);
        };

        let rtf = compressed_rtf::decompress_rtf(bytes).map_err(MessagingError::from)?;
        Ok(Some(rtf))
    }

    pub fn sender_name(&self) -> Option<String> {
        self.properties.string(PROP_SENDER_NAME)
    }

    pub fn transport_message_headers(&self) -> Option<String> {
        self.properties.string(PROP_TRANSPORT_MESSAGE_HEADERS)
    }

    pub fn conversation_topic(&self) -> Option<String> {
        self.properties.string(PROP_CONVERSATION_TOPIC)
    }

    pub fn display_to(&self) -> Option<String> {
        self.properties.string(PROP_DISPLAY_TO)
    }

    pub fn display_cc(&self) -> Option<String> {
        self.properties.string(PROP_DISPLAY_CC)
    }

    pub fn display_bcc(&self) -> Option<String> {
        self.properties.string(PROP_DISPLAY_BCC)
    }

    pub fn importance(&self) -> Option<i32> {
        self.properties.int32(PROP_IMPORTANCE)
    }

    pub fn message_flags(&self) -> Option<i32> {
        self.properties.int32(PROP_MESSAGE_FLAGS)
    }

    pub fn message_size(&self) -> Option<i32> {
        self.properties.int32(PROP_MESSAGE_SIZE)
    }

    pub fn has_attachments(&self) -> bool {
        self.message_flags()
            .is_some_and(|flags| flags & MESSAGE_FLAG_HAS_ATTACH != 0)
    }

    pub fn client_submit_time(&self) -> Option<OffsetDateTime> {
        self.properties.time(PROP_CLIENT_SUBMIT_TIME)
    }

    pub fn message_delivery_time(&self) -> Option<OffsetDateTime> {
        self.properties.time(PROP_MESSAGE_DELIVERY_TIME)
    }

    pub fn creation_time(&self) -> Option<OffsetDateTime> {
        self.properties.time(PROP_CREATION_TIME)
    }

    pub fn last_modification_time(&self) -> Option<OffsetDateTime> {
        self.properties.time(PROP_LAST_MODIFICATION_TIME)
    }

    /// The recipient table rows. Messages without one yield an empty
    /// list.
    pub fn recipients(&self) -> io::Result<Vec<Recipient>> {
        let Some(entry) = self
            .sub_nodes
            .iter()
            .find(|entry| matches!(entry.node().node_type(), Ok(NodeType::RecipientTable)))
            .copied()
        else {
            return Ok(Vec::new());
        };

        let ndb = self.file.ndb();
        let table = TableContext::read(&ndb, entry.data(), entry.sub_node())?;

        (0..table.row_count())
            .map(|row| Ok(Recipient::new(table.row(&ndb, row)?)))
            .collect()
    }

    /// The attachment objects. The attachment table's row ids name the
    /// attachment property contexts inside this message's sub-node map.
    pub fn attachments(&self) -> io::Result<Vec<Attachment<'a>>> {
        let Some(entry) = self
            .sub_nodes
            .iter()
            .find(|entry| matches!(entry.node().node_type(), Ok(NodeType::AttachmentTable)))
            .copied()
        else {
            return Ok(Vec::new());
        };

        let ndb = self.file.ndb();
        let table = TableContext::read(&ndb, entry.data(), entry.sub_node())?;

        table
            .row_ids()
            .into_iter()
            .map(|row_id| Attachment::read(self.file, &self.sub_nodes, NodeId::from(row_id)))
            .collect()
    }

    pub(crate) fn named_prop_id(&self, guid_index: i16, id: u32) -> Option<u16> {
        self.file
            .named_properties()
            .prop_id_for_numeric(guid_index, id)
    }

    pub(crate) fn named_string(&self, guid_index: i16, id: u32) -> Option<String> {
        self.properties.string(self.named_prop_id(guid_index, id)?)
    }

    pub(crate) fn named_time(&self, guid_index: i16, id: u32) -> Option<OffsetDateTime> {
        self.properties.time(self.named_prop_id(guid_index, id)?)
    }

    pub(crate) fn named_int32(&self, guid_index: i16, id: u32) -> Option<i32> {
        self.properties.int32(self.named_prop_id(guid_index, id)?)
    }

    pub(crate) fn named_boolean(&self, guid_index: i16, id: u32) -> Option<bool> {
        self.properties.boolean(self.named_prop_id(guid_index, id)?)
    }

    pub(crate) fn named_float64(&self, guid_index: i16, id: u32) -> Option<f64> {
        self.properties.float64(self.named_prop_id(guid_index, id)?)
    }
}

/// `IPM.Appointment` / `IPM.Schedule.Meeting.*`
pub struct Appointment<'a> {
    message: Message<'a>,
}

impl<'a> Appointment<'a> {
    pub fn message(&self) -> &Message<'a> {
        &self.message
    }

    pub fn location(&self) -> Option<String> {
        self.message.named_string(GUID_INDEX_PSETID_APPOINTMENT, 0x8208)
    }

    pub fn start_time(&self) -> Option<OffsetDateTime> {
        self.message.named_time(GUID_INDEX_PSETID_APPOINTMENT, 0x820D)
    }

    pub fn end_time(&self) -> Option<OffsetDateTime> {
        self.message.named_time(GUID_INDEX_PSETID_APPOINTMENT, 0x820E)
    }

    pub fn duration_minutes(&self) -> Option<i32> {
        self.message.named_int32(GUID_INDEX_PSETID_APPOINTMENT, 0x8213)
    }

    pub fn is_all_day(&self) -> Option<bool> {
        self.message.named_boolean(GUID_INDEX_PSETID_APPOINTMENT, 0x8215)
    }

    pub fn busy_status(&self) -> Option<i32> {
        self.message.named_int32(GUID_INDEX_PSETID_APPOINTMENT, 0x8205)
    }
}

/// `IPM.Contact`
pub struct Contact<'a> {
    message: Message<'a>,
}

impl<'a> Contact<'a> {
    pub fn message(&self) -> &Message<'a> {
        &self.message
    }

    pub fn given_name(&self) -> Option<String> {
        self.message.properties().string(0x3A06)
    }

    pub fn surname(&self) -> Option<String> {
        self.message.properties().string(0x3A11)
    }

    pub fn company_name(&self) -> Option<String> {
        self.message.properties().string(0x3A16)
    }

    pub fn title(&self) -> Option<String> {
        self.message.properties().string(0x3A17)
    }

    pub fn business_telephone_number(&self) -> Option<String> {
        self.message.properties().string(0x3A08)
    }

    pub fn home_telephone_number(&self) -> Option<String> {
        self.message.properties().string(0x3A09)
    }

    pub fn mobile_telephone_number(&self) -> Option<String> {
        self.message.properties().string(0x3A1C)
    }

    pub fn work_address_street(&self) -> Option<String> {
        self.message.named_string(GUID_INDEX_PSETID_ADDRESS, 0x8045)
    }

    pub fn work_address_city(&self) -> Option<String> {
        self.message.named_string(GUID_INDEX_PSETID_ADDRESS, 0x8046)
    }

    pub fn work_address_state(&self) -> Option<String> {
        self.message.named_string(GUID_INDEX_PSETID_ADDRESS, 0x8047)
    }

    pub fn work_address_postal_code(&self) -> Option<String> {
        self.message.named_string(GUID_INDEX_PSETID_ADDRESS, 0x8048)
    }

    pub fn work_address_country(&self) -> Option<String> {
        self.message.named_string(GUID_INDEX_PSETID_ADDRESS, 0x8049)
    }

    pub fn email1_email_address(&self) -> Option<String> {
        self.message.named_string(GUID_INDEX_PSETID_ADDRESS, 0x8083)
    }

    pub fn email1_display_name(&self) -> Option<String> {
        self.message.named_string(GUID_INDEX_PSETID_ADDRESS, 0x8080)
    }
}

/// `IPM.Task` / `IPM.TaskRequest.*`
pub struct Task<'a> {
    message: Message<'a>,
}

impl<'a> Task<'a> {
    pub fn message(&self) -> &Message<'a> {
        &self.message
    }

    pub fn status(&self) -> Option<i32> {
        self.message.named_int32(GUID_INDEX_PSETID_TASK, 0x8101)
    }

    pub fn percent_complete(&self) -> Option<f64> {
        self.message.named_float64(GUID_INDEX_PSETID_TASK, 0x8102)
    }

    pub fn start_date(&self) -> Option<OffsetDateTime> {
        self.message.named_time(GUID_INDEX_PSETID_TASK, 0x8104)
    }

    pub fn due_date(&self) -> Option<OffsetDateTime> {
        self.message.named_time(GUID_INDEX_PSETID_TASK, 0x8105)
    }

    pub fn date_completed(&self) -> Option<OffsetDateTime> {
        self.message.named_time(GUID_INDEX_PSETID_TASK, 0x810F)
    }

    pub fn is_complete(&self) -> Option<bool> {
        self.message.named_boolean(GUID_INDEX_PSETID_TASK, 0x811C)
    }

    pub fn owner(&self) -> Option<String> {
        self.message.named_string(GUID_INDEX_PSETID_TASK, 0x811F)
    }
}

/// `IPM.Activity` (journal entries)
pub struct Activity<'a> {
    message: Message<'a>,
}

impl<'a> Activity<'a> {
    pub fn message(&self) -> &Message<'a> {
        &self.message
    }

    pub fn activity_type(&self) -> Option<String> {
        self.message.named_string(GUID_INDEX_PSETID_LOG, 0x8700)
    }

    pub fn start_time(&self) -> Option<OffsetDateTime> {
        self.message.named_time(GUID_INDEX_PSETID_LOG, 0x8706)
    }

    pub fn end_time(&self) -> Option<OffsetDateTime> {
        self.message.named_time(GUID_INDEX_PSETID_LOG, 0x8708)
    }

    pub fn duration_minutes(&self) -> Option<i32> {
        self.message.named_int32(GUID_INDEX_PSETID_LOG, 0x8707)
    }
}

//! ## [Named Property Lookup Map](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/e17e195d-0454-4b9b-b398-c9127a26a678)
//!
//! Node 0x61 carries the file-wide map from property names (a GUID plus
//! a numeric or string name) to the 16-bit property ids above 0x8000
//! actually used on messages. Built once at open; immutable afterwards.

use byteorder::{LittleEndian, ReadBytesExt};
use std::{
    collections::BTreeMap,
    io::{self, Cursor},
};
use tracing::debug;

use super::*;
use crate::{
    ltp::prop_context::{Guid, PropertyContext, PropertySet},
    ndb::{node_id::NID_NAME_TO_ID_MAP, NodeDatabase},
};

/// Property ids of the map's own streams.
const PROP_NAMEID_STREAM_GUID: u16 = 0x0002;
const PROP_NAMEID_STREAM_ENTRY: u16 = 0x0003;
const PROP_NAMEID_STREAM_STRING: u16 = 0x0004;

pub const PS_MAPI: Guid = Guid::new(
    0x00020328,
    0x0000,
    0x0000,
    [0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
);

pub const PS_PUBLIC_STRINGS: Guid = Guid::new(
    0x00020329,
    0x0000,
    0x0000,
    [0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
);

pub const PSETID_COMMON: Guid = Guid::new(
    0x00062008,
    0x0000,
    0x0000,
    [0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
);

pub const PSETID_ADDRESS: Guid = Guid::new(
    0x00062004,
    0x0000,
    0x0000,
    [0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
);

pub const PSETID_AIR_SYNC: Guid = Guid::new(
    0x71035549,
    0x0739,
    0x4DCB,
    [0x91, 0x63, 0x00, 0xF0, 0x58, 0x0D, 0xBB, 0xDF],
);

pub const PSETID_APPOINTMENT: Guid = Guid::new(
    0x00062002,
    0x0000,
    0x0000,
    [0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
);

pub const PSETID_CALENDAR_ASSISTANT: Guid = Guid::new(
    0x11000E07,
    0xB51B,
    0x40D6,
    [0xAF, 0x21, 0xCA, 0xA8, 0x5E, 0xDA, 0xB1, 0xD0],
);

pub const PSETID_LOG: Guid = Guid::new(
    0x0006200A,
    0x0000,
    0x0000,
    [0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
);

pub const PSETID_MEETING: Guid = Guid::new(
    0x6ED8DA90,
    0x450B,
    0x101B,
    [0x98, 0xDA, 0x00, 0xAA, 0x00, 0x3F, 0x13, 0x05],
);

pub const PSETID_MESSAGING: Guid = Guid::new(
    0x41F28F13,
    0x83F4,
    0x4114,
    [0xA5, 0x84, 0xEE, 0xDB, 0x5A, 0x6B, 0x0B, 0xFF],
);

pub const PSETID_NOTE: Guid = Guid::new(
    0x0006200E,
    0x0000,
    0x0000,
    [0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
);

pub const PSETID_POST_RSS: Guid = Guid::new(
    0x00062041,
    0x0000,
    0x0000,
    [0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
);

pub const PSETID_SHARING: Guid = Guid::new(
    0x00062040,
    0x0000,
    0x0000,
    [0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
);

pub const PSETID_TASK: Guid = Guid::new(
    0x00062003,
    0x0000,
    0x0000,
    [0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
);

pub const PSETID_UNIFIED_MESSAGING: Guid = Guid::new(
    0x4442858E,
    0xA9E3,
    0x4E80,
    [0xB9, 0x00, 0x31, 0x7A, 0x21, 0x0C, 0xC1, 0x5B],
);

/// Property sets with reserved indices; a GUID not in this table maps
/// to index -1.
pub const KNOWN_GUIDS: [Guid; 15] = [
    PS_MAPI,
    PS_PUBLIC_STRINGS,
    PSETID_COMMON,
    PSETID_ADDRESS,
    PSETID_AIR_SYNC,
    PSETID_APPOINTMENT,
    PSETID_CALENDAR_ASSISTANT,
    PSETID_LOG,
    PSETID_MEETING,
    PSETID_MESSAGING,
    PSETID_NOTE,
    PSETID_POST_RSS,
    PSETID_SHARING,
    PSETID_TASK,
    PSETID_UNIFIED_MESSAGING,
];

pub const GUID_INDEX_PS_MAPI: i16 = 0;
pub const GUID_INDEX_PS_PUBLIC_STRINGS: i16 = 1;
pub const GUID_INDEX_PSETID_COMMON: i16 = 2;
pub const GUID_INDEX_PSETID_ADDRESS: i16 = 3;
pub const GUID_INDEX_PSETID_APPOINTMENT: i16 = 5;
pub const GUID_INDEX_PSETID_LOG: i16 = 7;
pub const GUID_INDEX_PSETID_TASK: i16 = 13;

pub fn known_guid_index(guid: &Guid) -> i16 {
    KNOWN_GUIDS
        .iter()
        .position(|known| known == guid)
        .map(|index| index as i16)
        .unwrap_or(-1)
}

/// A property name: numeric within its property set, or a string.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum NamedPropertyId {
    Number(u32),
    String(String),
}

#[derive(Clone, Debug)]
pub struct NamedProperty {
    guid: Option<Guid>,
    guid_index: i16,
    id: NamedPropertyId,
}

impl NamedProperty {
    pub fn guid(&self) -> Option<Guid> {
        self.guid
    }

    /// Index into [`KNOWN_GUIDS`], or -1 when the property set is not a
    /// well-known one.
    pub fn guid_index(&self) -> i16 {
        self.guid_index
    }

    pub fn id(&self) -> &NamedPropertyId {
        &self.id
    }
}

/// The bidirectional name map: `(guidIndex, numericName) <-> propId` and
/// `stringName <-> propId`.
#[derive(Default)]
pub struct NamedPropertyMap {
    entries: BTreeMap<u16, NamedProperty>,
    numeric: BTreeMap<(i16, u32), u16>,
    strings: BTreeMap<String, u16>,
}

impl NamedPropertyMap {
    pub(crate) fn read(ndb: &NodeDatabase) -> io::Result<Self> {
        let Ok(node) = ndb.find_node(NID_NAME_TO_ID_MAP) else {
            // not a structural failure: some stripped stores carry no map
            debug!("file has no named property map node");
            return Ok(Self::default());
        };

        let (properties, _) = PropertyContext::read_node(ndb, &node)?;
        Self::from_streams(&properties)
    }

    fn from_streams(properties: &PropertySet) -> io::Result<Self> {
        let guid_stream = properties.binary(PROP_NAMEID_STREAM_GUID).unwrap_or(&[]);
        let entry_stream = properties.binary(PROP_NAMEID_STREAM_ENTRY).unwrap_or(&[]);
        let string_stream = properties.binary(PROP_NAMEID_STREAM_STRING).unwrap_or(&[]);

        // rgbNidStreamGuid: 16 bytes per property set
        let guids = guid_stream
            .chunks_exact(16)
            .map(|chunk| Guid::read(&mut Cursor::new(chunk)))
            .collect::<io::Result<Vec<_>>>()?;

        let mut map = Self::default();

        // NAMEID records are 8 bytes: { dwPropertyID, wGuid, wPropIdx }
        for record in entry_stream.chunks_exact(8) {
            let mut cursor = Cursor::new(record);
            let raw_id = cursor.read_u32::<LittleEndian>()?;
            let guid_ref = cursor.read_u16::<LittleEndian>()?;
            let prop_index = cursor.read_u16::<LittleEndian>()?;

            let prop_id = 0x8000 + prop_index;
            let is_string = guid_ref & 0x0001 != 0;
            let guid_ref = guid_ref >> 1;

            let (guid, guid_index) = match guid_ref {
                0 => (None, -1),
                1 => (Some(PS_MAPI), GUID_INDEX_PS_MAPI),
                2 => (Some(PS_PUBLIC_STRINGS), GUID_INDEX_PS_PUBLIC_STRINGS),
                stream_ref => match guids.get(usize::from(stream_ref) - 3) {
                    Some(guid) => (Some(*guid), known_guid_index(guid)),
                    None => (None, -1),
                },
            };

            let id = if is_string {
                // dwPropertyID is a byte offset into the string stream:
                // { dwLength, UTF-16LE bytes }
                let Some(at) = string_stream.get(raw_id as usize..) else {
                    debug!(offset = raw_id, "string name offset out of bounds");
                    continue;
                };
                let mut cursor = Cursor::new(at);
                let length = cursor.read_u32::<LittleEndian>()? as usize;
                let Some(bytes) = at.get(4..4 + length) else {
                    debug!(offset = raw_id, length, "string name truncated");
                    continue;
                };

                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                NamedPropertyId::String(String::from_utf16_lossy(&units))
            } else {
                NamedPropertyId::Number(raw_id)
            };

            match &id {
                NamedPropertyId::Number(number) => {
                    map.numeric.insert((guid_index, *number), prop_id);
                }
                NamedPropertyId::String(name) => {
                    map.strings.insert(name.clone(), prop_id);
                }
            }
            map.entries.insert(
                prop_id,
                NamedProperty {
                    guid,
                    guid_index,
                    id,
                },
            );
        }

        Ok(map)
    }

    pub fn prop_id_for_numeric(&self, guid_index: i16, id: u32) -> Option<u16> {
        self.numeric.get(&(guid_index, id)).copied()
    }

    pub fn prop_id_for_string(&self, name: &str) -> Option<u16> {
        self.strings.get(name).copied()
    }

    pub fn name(&self, prop_id: u16) -> Option<&NamedProperty> {
        self.entries.get(&prop_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

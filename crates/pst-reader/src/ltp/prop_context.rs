//! ## [Property Context (PC)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/294c83c6-ff92-42f5-b6b6-876c29fa9737)
//!
//! A property context is a BTree-on-Heap keyed by 16-bit property id,
//! each leaf record carrying a type tag and a value that is inline, in
//! the heap, or out in the owning node's sub-node map.

use byteorder::{LittleEndian, ReadBytesExt};
use std::{
    collections::BTreeMap,
    fmt::Debug,
    io::{self, Cursor, Read},
};
use time::OffsetDateTime;

use super::{heap::*, prop_type::*, tree::*, *};
use crate::{
    datetime::filetime_to_datetime,
    ndb::{node_id::NodeId, page::NodeBTreeEntry, sub_node::SubNodeMap, NodeDatabase},
};

/// Codepage properties consulted when decoding `PtypString8` values, in
/// order of preference: `PidTagInternetCodepage`, `PidTagMessageCodepage`.
const PROP_INTERNET_CODEPAGE: u16 = 0x3FDE;
const PROP_MESSAGE_CODEPAGE: u16 = 0x3FFD;

/// Windows-1252 is assumed when a message names no codepage.
const DEFAULT_CODEPAGE: u16 = 1252;

#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Guid {
    data1: u32,
    data2: u16,
    data3: u16,
    data4: [u8; 8],
}

impl Guid {
    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }

    pub fn read(f: &mut dyn Read) -> io::Result<Self> {
        let data1 = f.read_u32::<LittleEndian>()?;
        let data2 = f.read_u16::<LittleEndian>()?;
        let data3 = f.read_u16::<LittleEndian>()?;
        let mut data4 = [0; 8];
        f.read_exact(&mut data4)?;

        Ok(Self {
            data1,
            data2,
            data3,
            data4,
        })
    }

    /// The on-disk shape: Data1-3 little-endian, Data4 as-is.
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut bytes = [0; 16];
        bytes[..4].copy_from_slice(&self.data1.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.data2.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.data3.to_le_bytes());
        bytes[8..].copy_from_slice(&self.data4);
        bytes
    }
}

impl Debug for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7]
        )
    }
}

/// `PtypObject` payload: the sub-node holding the real data and its
/// advertised size.
#[derive(Clone, Copy, Debug)]
pub struct ObjectValue {
    node: NodeId,
    size: u32,
}

impl ObjectValue {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn size(&self) -> u32 {
        self.size
    }
}

/// A fully decoded property value.
#[derive(Clone, Debug, Default)]
pub enum PropertyValue {
    #[default]
    Null,
    Integer16(i16),
    Integer32(i32),
    Floating32(f32),
    Floating64(f64),
    Currency(i64),
    FloatingTime(f64),
    ErrorCode(i32),
    Boolean(bool),
    Integer64(i64),
    /// Raw bytes in the codepage named by the message; decoded lazily by
    /// [`PropertySet::string`].
    String8(Vec<u8>),
    Unicode(String),
    /// Raw FILETIME ticks; converted by [`PropertySet::time`].
    Time(u64),
    Guid(Guid),
    Binary(Vec<u8>),
    Object(ObjectValue),
    MultipleInteger16(Vec<i16>),
    MultipleInteger32(Vec<i32>),
    MultipleFloating32(Vec<f32>),
    MultipleFloating64(Vec<f64>),
    MultipleCurrency(Vec<i64>),
    MultipleFloatingTime(Vec<f64>),
    MultipleInteger64(Vec<i64>),
    MultipleString8(Vec<Vec<u8>>),
    MultipleUnicode(Vec<String>),
    MultipleTime(Vec<u64>),
    MultipleGuid(Vec<Guid>),
    MultipleBinary(Vec<Vec<u8>>),
}

/// `dwValueHnid` interpreted against the property type: an inline
/// scalar, a heap allocation, or a sub-node reference.
#[derive(Copy, Clone, Debug)]
pub(crate) enum ValueReference {
    Inline(u32),
    Heap(HeapId),
    Node(NodeId),
}

impl ValueReference {
    /// [MS-PST] 2.3.3.2: an HNID whose five type bits are zero is an HID;
    /// anything else is an NID into the sub-node map.
    pub(crate) fn new(prop_type: PropertyType, raw: u32) -> Self {
        if prop_type.fits_inline() {
            Self::Inline(raw)
        } else if matches!(prop_type.fixed_size(), Some(_)) || prop_type == PropertyType::Object {
            Self::Heap(HeapId::from(raw))
        } else if raw & 0x1F == 0 {
            Self::Heap(HeapId::from(raw))
        } else {
            Self::Node(NodeId::from(raw))
        }
    }
}

/// Decode one value: fetch its bytes if it lives out of line, then parse
/// them according to the type tag.
pub(crate) fn decode_value(
    prop_type: PropertyType,
    reference: ValueReference,
    heap: &HeapNode,
    ndb: &NodeDatabase,
    sub_nodes: &SubNodeMap,
) -> io::Result<PropertyValue> {
    match reference {
        ValueReference::Inline(raw) => Ok(decode_inline(prop_type, raw)),
        ValueReference::Heap(heap_id) => {
            if heap_id.is_null() {
                return parse_value_bytes(prop_type, &[]);
            }
            parse_value_bytes(prop_type, heap.find_entry(heap_id)?)
        }
        ValueReference::Node(node) => {
            let entry = sub_nodes
                .find(node)
                .map_err(|_| LtpError::ExternalValueMissing(u32::from(node)))?;
            let bytes = ndb.node_stream(entry.data())?.read_to_vec()?;
            parse_value_bytes(prop_type, &bytes)
        }
    }
}

fn decode_inline(prop_type: PropertyType, raw: u32) -> PropertyValue {
    match prop_type {
        PropertyType::Null => PropertyValue::Null,
        PropertyType::Integer16 => PropertyValue::Integer16(raw as u16 as i16),
        PropertyType::Integer32 => PropertyValue::Integer32(raw as i32),
        PropertyType::Floating32 => PropertyValue::Floating32(f32::from_bits(raw)),
        PropertyType::ErrorCode => PropertyValue::ErrorCode(raw as i32),
        PropertyType::Boolean => PropertyValue::Boolean(raw & 0xFF != 0),
        // ValueReference::new only routes the types above here
        _ => PropertyValue::Null,
    }
}

/// Parse an out-of-line value's bytes. Fixed-width types insist on their
/// exact width; a mismatch means the reference resolved to the wrong
/// allocation.
pub(crate) fn parse_value_bytes(prop_type: PropertyType, bytes: &[u8]) -> io::Result<PropertyValue> {
    if let Some(size) = prop_type.fixed_size() {
        if bytes.len() != size {
            return Err(LtpError::InvalidValueSize(prop_type, bytes.len()).into());
        }
    }

    let mut cursor = Cursor::new(bytes);
    match prop_type {
        PropertyType::Null => Ok(PropertyValue::Null),
        PropertyType::Integer16 => Ok(PropertyValue::Integer16(
            cursor.read_i16::<LittleEndian>()?,
        )),
        PropertyType::Integer32 => Ok(PropertyValue::Integer32(
            cursor.read_i32::<LittleEndian>()?,
        )),
        PropertyType::Floating32 => Ok(PropertyValue::Floating32(
            cursor.read_f32::<LittleEndian>()?,
        )),
        PropertyType::Floating64 => Ok(PropertyValue::Floating64(
            cursor.read_f64::<LittleEndian>()?,
        )),
        PropertyType::Currency => Ok(PropertyValue::Currency(cursor.read_i64::<LittleEndian>()?)),
        PropertyType::FloatingTime => Ok(PropertyValue::FloatingTime(
            cursor.read_f64::<LittleEndian>()?,
        )),
        PropertyType::ErrorCode => Ok(PropertyValue::ErrorCode(
            cursor.read_i32::<LittleEndian>()?,
        )),
        PropertyType::Boolean => Ok(PropertyValue::Boolean(cursor.read_u8()? != 0)),
        PropertyType::Integer64 => Ok(PropertyValue::Integer64(
            cursor.read_i64::<LittleEndian>()?,
        )),
        PropertyType::Time => Ok(PropertyValue::Time(cursor.read_u64::<LittleEndian>()?)),
        PropertyType::Guid => Ok(PropertyValue::Guid(Guid::read(&mut cursor)?)),
        PropertyType::String8 => Ok(PropertyValue::String8(bytes.to_vec())),
        PropertyType::Unicode => Ok(PropertyValue::Unicode(decode_utf16(bytes))),
        PropertyType::Binary => Ok(PropertyValue::Binary(bytes.to_vec())),
        PropertyType::Object => {
            let node = NodeId::read(&mut cursor)?;
            let size = cursor.read_u32::<LittleEndian>()?;
            Ok(PropertyValue::Object(ObjectValue { node, size }))
        }

        PropertyType::MultipleInteger16 => Ok(PropertyValue::MultipleInteger16(
            fixed_values(bytes, 2, |v| {
                Cursor::new(v).read_i16::<LittleEndian>()
            })?,
        )),
        PropertyType::MultipleInteger32 => Ok(PropertyValue::MultipleInteger32(
            fixed_values(bytes, 4, |v| {
                Cursor::new(v).read_i32::<LittleEndian>()
            })?,
        )),
        PropertyType::MultipleFloating32 => Ok(PropertyValue::MultipleFloating32(
            fixed_values(bytes, 4, |v| {
                Cursor::new(v).read_f32::<LittleEndian>()
            })?,
        )),
        PropertyType::MultipleFloating64 => Ok(PropertyValue::MultipleFloating64(
            fixed_values(bytes, 8, |v| {
                Cursor::new(v).read_f64::<LittleEndian>()
            })?,
        )),
        PropertyType::MultipleCurrency => Ok(PropertyValue::MultipleCurrency(
            fixed_values(bytes, 8, |v| {
                Cursor::new(v).read_i64::<LittleEndian>()
            })?,
        )),
        PropertyType::MultipleFloatingTime => Ok(PropertyValue::MultipleFloatingTime(
            fixed_values(bytes, 8, |v| {
                Cursor::new(v).read_f64::<LittleEndian>()
            })?,
        )),
        PropertyType::MultipleInteger64 => Ok(PropertyValue::MultipleInteger64(
            fixed_values(bytes, 8, |v| {
                Cursor::new(v).read_i64::<LittleEndian>()
            })?,
        )),
        PropertyType::MultipleTime => Ok(PropertyValue::MultipleTime(fixed_values(
            bytes,
            8,
            |v| Cursor::new(v).read_u64::<LittleEndian>(),
        )?)),
        PropertyType::MultipleGuid => Ok(PropertyValue::MultipleGuid(fixed_values(
            bytes,
            16,
            |v| Guid::read(&mut Cursor::new(v)),
        )?)),
        PropertyType::MultipleString8 => Ok(PropertyValue::MultipleString8(
            variable_values(bytes)?,
        )),
        PropertyType::MultipleUnicode => Ok(PropertyValue::MultipleUnicode(
            variable_values(bytes)?
                .into_iter()
                .map(|value| decode_utf16(&value))
                .collect(),
        )),
        PropertyType::MultipleBinary => Ok(PropertyValue::MultipleBinary(variable_values(bytes)?)),
    }
}

/// Fixed-width multi-values are packed back to back.
fn fixed_values<T>(
    bytes: &[u8],
    width: usize,
    parse: impl Fn(&[u8]) -> io::Result<T>,
) -> io::Result<Vec<T>> {
    bytes.chunks_exact(width).map(parse).collect()
}

/// Variable-width multi-values: `ulCount`, then `ulCount` offsets into
/// the blob, each value running to the next offset (the last to the end).
fn variable_values(bytes: &[u8]) -> io::Result<Vec<Vec<u8>>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }

    let mut cursor = Cursor::new(bytes);
    let count = cursor.read_u32::<LittleEndian>()? as usize;

    let mut offsets = Vec::with_capacity(count + 1);
    for _ in 0..count {
        offsets.push(cursor.read_u32::<LittleEndian>()? as usize);
    }
    offsets.push(bytes.len());

    offsets
        .windows(2)
        .map(|window| {
            let (start, end) = (window[0], window[1]);
            if start > end || end > bytes.len() {
                return Err(LtpError::InvalidMultiValueOffset(start as u32).into());
            }
            Ok(bytes[start..end].to_vec())
        })
        .collect()
}

/// UTF-16LE with any terminating nulls stripped.
fn decode_utf16(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    let trimmed = units
        .iter()
        .rposition(|&unit| unit != 0)
        .map(|last| &units[..=last])
        .unwrap_or(&[]);

    String::from_utf16_lossy(trimmed)
}

/// A decoded property map with typed accessors; the shape shared by
/// property contexts and table rows.
#[derive(Default, Debug)]
pub struct PropertySet {
    values: BTreeMap<u16, PropertyValue>,
}

impl PropertySet {
    pub(crate) fn insert(&mut self, prop_id: u16, value: PropertyValue) {
        self.values.insert(prop_id, value);
    }

    pub fn get(&self, prop_id: u16) -> Option<&PropertyValue> {
        self.values.get(&prop_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u16, &PropertyValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The codepage 8-bit strings in this set are encoded with.
    pub fn codepage(&self) -> u16 {
        self.int32(PROP_INTERNET_CODEPAGE)
            .or_else(|| self.int32(PROP_MESSAGE_CODEPAGE))
            .and_then(|value| u16::try_from(value).ok())
            .unwrap_or(DEFAULT_CODEPAGE)
    }

    pub fn string(&self, prop_id: u16) -> Option<String> {
        match self.get(prop_id)? {
            PropertyValue::Unicode(value) => Some(value.clone()),
            PropertyValue::String8(bytes) => Some(decode_string8(bytes, self.codepage())),
            _ => None,
        }
    }

    pub fn int32(&self, prop_id: u16) -> Option<i32> {
        match self.get(prop_id)? {
            PropertyValue::Integer32(value) => Some(*value),
            PropertyValue::Integer16(value) => Some(i32::from(*value)),
            _ => None,
        }
    }

    pub fn int64(&self, prop_id: u16) -> Option<i64> {
        match self.get(prop_id)? {
            PropertyValue::Integer64(value) | PropertyValue::Currency(value) => Some(*value),
            _ => None,
        }
    }

    pub fn boolean(&self, prop_id: u16) -> Option<bool> {
        match self.get(prop_id)? {
            PropertyValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn float64(&self, prop_id: u16) -> Option<f64> {
        match self.get(prop_id)? {
            PropertyValue::Floating64(value) | PropertyValue::FloatingTime(value) => Some(*value),
            PropertyValue::Floating32(value) => Some(f64::from(*value)),
            _ => None,
        }
    }

    pub fn time(&self, prop_id: u16) -> Option<OffsetDateTime> {
        match self.get(prop_id)? {
            PropertyValue::Time(ticks) => Some(filetime_to_datetime(*ticks)),
            _ => None,
        }
    }

    pub fn binary(&self, prop_id: u16) -> Option<&[u8]> {
        match self.get(prop_id)? {
            PropertyValue::Binary(bytes) => Some(bytes.as_slice()),
            _ => None,
        }
    }

    pub fn guid(&self, prop_id: u16) -> Option<Guid> {
        match self.get(prop_id)? {
            PropertyValue::Guid(value) => Some(*value),
            _ => None,
        }
    }

    pub fn object(&self, prop_id: u16) -> Option<ObjectValue> {
        match self.get(prop_id)? {
            PropertyValue::Object(value) => Some(*value),
            _ => None,
        }
    }
}

impl FromIterator<(u16, PropertyValue)> for PropertySet {
    fn from_iter<T: IntoIterator<Item = (u16, PropertyValue)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

pub(crate) fn decode_string8(bytes: &[u8], codepage: u16) -> String {
    let trimmed = match bytes.iter().rposition(|&byte| byte != 0) {
        Some(last) => &bytes[..=last],
        None => &[],
    };

    match codepage {
        // us-ascii and utf-8 need no table
        20127 | 65001 => String::from_utf8_lossy(trimmed).to_string(),
        _ => codepage_strings::Coding::new(codepage)
            .ok()
            .and_then(|coding| coding.decode(trimmed).ok())
            .map(|value| value.to_string())
            .unwrap_or_else(|| String::from_utf8_lossy(trimmed).to_string()),
    }
}

/// The property context of one node: its heap's user root is a BTH keyed
/// by property id over 8-byte records `{wPropId, wPropType, dwValueHnid}`.
pub struct PropertyContext;

impl PropertyContext {
    /// The whole chain for one node of the node B-tree: open its heap,
    /// its sub-node map, and decode the property context inside.
    pub fn read_node(
        ndb: &NodeDatabase,
        entry: &NodeBTreeEntry,
    ) -> io::Result<(PropertySet, SubNodeMap)> {
        let heap = HeapNode::read(ndb, entry.data())?;
        let sub_nodes = ndb.sub_node_map(entry.sub_node())?;
        let properties = Self::read(ndb, &heap, &sub_nodes)?;
        Ok((properties, sub_nodes))
    }

    pub fn read(
        ndb: &NodeDatabase,
        heap: &HeapNode,
        sub_nodes: &SubNodeMap,
    ) -> io::Result<PropertySet> {
        let signature = heap.client_signature();
        if signature != HEAP_CLIENT_PROPERTIES {
            return Err(LtpError::InvalidHeapClientSignature(signature).into());
        }

        let tree = HeapTree::open(heap, heap.user_root())?;
        if tree.header().key_size() != 2 {
            return Err(LtpError::InvalidHeapTreeKeySize(tree.header().key_size()).into());
        }
        if tree.header().entry_size() != 6 {
            return Err(LtpError::InvalidHeapTreeDataSize(tree.header().entry_size()).into());
        }

        let mut properties = PropertySet::default();
        for record in tree.leaf_records()? {
            let mut cursor = Cursor::new(record.as_slice());

            // wPropId
            let prop_id = cursor.read_u16::<LittleEndian>()?;
            // wPropType
            let prop_type = PropertyType::try_from(cursor.read_u16::<LittleEndian>()?)?;
            // dwValueHnid
            let raw = cursor.read_u32::<LittleEndian>()?;

            let reference = ValueReference::new(prop_type, raw);
            let value = decode_value(prop_type, reference, heap, ndb, sub_nodes)?;
            properties.insert(prop_id, value);
        }

        Ok(properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ltp::heap::tests::{build_heap_page, heap_id};
    use crate::ndb::header::{CryptMethod, Header, Version};
    use crate::source::MemorySource;

    fn utf16_bytes(value: &str) -> Vec<u8> {
        value
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect()
    }

    fn pc_record(prop_id: u16, prop_type: PropertyType, raw: u32) -> Vec<u8> {
        let mut record = Vec::with_capacity(8);
        record.extend_from_slice(&prop_id.to_le_bytes());
        record.extend_from_slice(&u16::from(prop_type).to_le_bytes());
        record.extend_from_slice(&raw.to_le_bytes());
        record
    }

    fn empty_ndb_parts() -> (MemorySource, Header) {
        (
            MemorySource::new(vec![0; 512]),
            Header::new(Version::Unicode, CryptMethod::None, 0, 0),
        )
    }

    #[test]
    fn test_read_property_context() {
        let mut records = Vec::new();
        records.extend_from_slice(&pc_record(0x3001, PropertyType::Unicode, {
            u32::from(heap_id(0, 3))
        }));
        records.extend_from_slice(&pc_record(0x3007, PropertyType::Time, {
            u32::from(heap_id(0, 4))
        }));
        records.extend_from_slice(&pc_record(0x3602, PropertyType::Integer32, 7));
        records.extend_from_slice(&pc_record(0x360A, PropertyType::Boolean, 1));

        let mut bth_header = vec![HEAP_CLIENT_TREE, 2, 6, 0];
        bth_header.extend_from_slice(&u32::from(heap_id(0, 2)).to_le_bytes());

        let page = build_heap_page(
            Some((HEAP_CLIENT_PROPERTIES, u32::from(heap_id(0, 1)))),
            &[
                bth_header,
                records,
                utf16_bytes("Inbox"),
                0x01D3_B4C0_5404_6110_u64.to_le_bytes().to_vec(),
            ],
        );
        let heap = HeapNode::from_pages(vec![page]).unwrap();

        let (source, header) = empty_ndb_parts();
        let ndb = NodeDatabase::new(&source, &header);
        let sub_nodes = SubNodeMap::default();

        let properties = PropertyContext::read(&ndb, &heap, &sub_nodes).unwrap();
        assert_eq!(properties.len(), 4);
        assert_eq!(properties.string(0x3001).unwrap(), "Inbox");
        assert_eq!(properties.int32(0x3602).unwrap(), 7);
        assert_eq!(properties.boolean(0x360A).unwrap(), true);
        assert_eq!(
            properties.time(0x3007).unwrap(),
            time::macros::datetime!(2018-03-05 20:27:06.017 UTC)
        );
    }

    #[test]
    fn test_fixed_width_values_must_match() {
        // a Time value must be exactly eight bytes
        let err = parse_value_bytes(PropertyType::Time, &[0; 7]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        for (prop_type, width) in [
            (PropertyType::Floating64, 8),
            (PropertyType::Integer64, 8),
            (PropertyType::Guid, 16),
        ] {
            assert!(parse_value_bytes(prop_type, &vec![0; width]).is_ok());
            assert!(parse_value_bytes(prop_type, &vec![0; width + 1]).is_err());
        }
    }

    #[test]
    fn test_unicode_strips_trailing_nulls() {
        let mut bytes = utf16_bytes("Contacts");
        bytes.extend_from_slice(&[0, 0]);
        let PropertyValue::Unicode(value) = parse_value_bytes(PropertyType::Unicode, &bytes)
            .unwrap()
        else {
            panic!("expected a unicode value");
        };
        assert_eq!(value, "Contacts");
    }

    #[test]
    fn test_string8_codepage_decoding() {
        // 0xE9 is e-acute in windows-1252
        assert_eq!(decode_string8(b"caf\xE9\0", 1252), "café");
        assert_eq!(decode_string8(b"plain", 20127), "plain");
        // unknown codepages fall back to utf-8
        assert_eq!(decode_string8(b"plain", 0xFFFE), "plain");
    }

    #[test]
    fn test_multi_value_fixed() {
        let mut bytes = Vec::new();
        for value in [3_i32, -1, 700] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        let PropertyValue::MultipleInteger32(values) =
            parse_value_bytes(PropertyType::MultipleInteger32, &bytes).unwrap()
        else {
            panic!("expected a multi-value");
        };
        assert_eq!(values, [3, -1, 700]);
    }

    #[test]
    fn test_multi_value_variable() {
        // two strings with a count + offset table
        let first = utf16_bytes("To");
        let second = utf16_bytes("Cc");
        let header = 4 + 8;

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2_u32.to_le_bytes());
        bytes.extend_from_slice(&(header as u32).to_le_bytes());
        bytes.extend_from_slice(&((header + first.len()) as u32).to_le_bytes());
        bytes.extend_from_slice(&first);
        bytes.extend_from_slice(&second);

        let PropertyValue::MultipleUnicode(values) =
            parse_value_bytes(PropertyType::MultipleUnicode, &bytes).unwrap()
        else {
            panic!("expected a multi-value");
        };
        assert_eq!(values, ["To", "Cc"]);
    }

    #[test]
    fn test_value_reference_disambiguation() {
        // type bits zero: heap id
        let ValueReference::Heap(_) = ValueReference::new(PropertyType::Binary, 0x20) else {
            panic!("HNID with hidType 0 is an HID");
        };
        // type bits set: sub-node id
        let ValueReference::Node(node) = ValueReference::new(PropertyType::Binary, 0x24) else {
            panic!("HNID with nonzero nidType is an NID");
        };
        assert_eq!(u32::from(node), 0x24);
        // 8-byte scalars always indirect through the heap
        let ValueReference::Heap(_) = ValueReference::new(PropertyType::Time, 0x24) else {
            panic!("PtypTime goes through the heap");
        };
    }

    #[test]
    fn test_missing_external_reference() {
        let page = build_heap_page(
            Some((HEAP_CLIENT_PROPERTIES, u32::from(heap_id(0, 1)))),
            &[vec![HEAP_CLIENT_TREE, 2, 6, 0, 0, 0, 0, 0]],
        );
        let heap = HeapNode::from_pages(vec![page]).unwrap();

        let (source, header) = empty_ndb_parts();
        let ndb = NodeDatabase::new(&source, &header);
        let sub_nodes = SubNodeMap::default();

        let err = decode_value(
            PropertyType::Binary,
            ValueReference::new(PropertyType::Binary, 0x8025),
            &heap,
            &ndb,
            &sub_nodes,
        )
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}

//! ## [Table Context (TC)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/5e48be0d-a75a-4918-a277-50408ff96740)
//!
//! A row set stored in a heap: a column descriptor table, a row index
//! (BTH from row id to row number), and a blob of fixed-width row
//! records, either in-heap or out in a node of its own.

use byteorder::{LittleEndian, ReadBytesExt};
use std::{
    collections::BTreeMap,
    io::{self, Cursor},
};

use super::{heap::*, prop_context::*, prop_type::*, tree::*, *};
use crate::ndb::{
    block_id::BlockId, node_id::NodeId, page::NodeBTreeEntry, sub_node::SubNodeMap, NodeDatabase,
};

/// Every TC carries these two leading columns.
pub const PROP_ROW_ID: u16 = 0x67F2;
pub const PROP_ROW_VERSION: u16 = 0x67F3;

/// [TCOLDESC](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/3a2f63cf-bb40-4559-910c-e55ec43d9cbb)
#[derive(Clone, Copy, Debug)]
pub struct TableColumnDescriptor {
    prop_type: PropertyType,
    prop_id: u16,
    offset: u16,
    size: u8,
    bit_index: u8,
}

impl TableColumnDescriptor {
    pub(crate) fn read(f: &mut dyn io::Read) -> io::Result<Self> {
        // tag: wPropType then wPropId
        let prop_type = PropertyType::try_from(f.read_u16::<LittleEndian>()?)?;
        let prop_id = f.read_u16::<LittleEndian>()?;
        // ibData
        let offset = f.read_u16::<LittleEndian>()?;
        // cbData
        let size = f.read_u8()?;
        // iBit
        let bit_index = f.read_u8()?;

        Ok(Self {
            prop_type,
            prop_id,
            offset,
            size,
            bit_index,
        })
    }

    pub fn prop_type(&self) -> PropertyType {
        self.prop_type
    }

    pub fn prop_id(&self) -> u16 {
        self.prop_id
    }

    pub fn offset(&self) -> u16 {
        self.offset
    }

    pub fn size(&self) -> u8 {
        self.size
    }

    pub fn bit_index(&self) -> u8 {
        self.bit_index
    }
}

/// One parsed table context with its rows materialized as raw records.
/// Cells are decoded on demand.
pub struct TableContext {
    columns: Vec<TableColumnDescriptor>,
    row_size: usize,
    bitmap_offset: usize,
    heap: HeapNode,
    sub_nodes: SubNodeMap,
    rows: Vec<Vec<u8>>,
    row_index: BTreeMap<u32, u32>,
}

impl TableContext {
    /// Read the table stored at a node of the node B-tree.
    pub fn read_node(ndb: &NodeDatabase, entry: &NodeBTreeEntry) -> io::Result<Self> {
        Self::read(ndb, entry.data(), entry.sub_node())
    }

    pub fn read(
        ndb: &NodeDatabase,
        data: BlockId,
        sub_node: Option<BlockId>,
    ) -> io::Result<Self> {
        let heap = HeapNode::read(ndb, data)?;
        let sub_nodes = ndb.sub_node_map(sub_node)?;
        Self::from_heap(ndb, heap, sub_nodes)
    }

    pub(crate) fn from_heap(
        ndb: &NodeDatabase,
        heap: HeapNode,
        sub_nodes: SubNodeMap,
    ) -> io::Result<Self> {
        let signature = heap.client_signature();
        if signature != HEAP_CLIENT_TABLE {
            return Err(LtpError::InvalidHeapClientSignature(signature).into());
        }

        let info = heap.find_entry(heap.user_root())?.to_vec();
        let mut cursor = Cursor::new(info.as_slice());

        // bType
        let table_signature = cursor.read_u8()?;
        if table_signature != HEAP_CLIENT_TABLE {
            return Err(LtpError::InvalidTableSignature(table_signature).into());
        }

        // cCols
        let column_count = cursor.read_u8()?;

        // rgib: ends of the 4-byte, 2-byte, 1-byte and presence-bitmap
        // sections of a row
        let _end_4byte_values = cursor.read_u16::<LittleEndian>()?;
        let _end_2byte_values = cursor.read_u16::<LittleEndian>()?;
        let end_1byte_values = cursor.read_u16::<LittleEndian>()?;
        let end_existence_bitmap = cursor.read_u16::<LittleEndian>()?;
        if end_existence_bitmap < end_1byte_values {
            return Err(LtpError::InvalidTableRowSize(end_existence_bitmap).into());
        }

        // hidRowIndex
        let row_index_id = HeapId::from(cursor.read_u32::<LittleEndian>()?);

        // hnidRows
        let rows_reference = cursor.read_u32::<LittleEndian>()?;

        // hidIndex (deprecated)
        let _index = cursor.read_u32::<LittleEndian>()?;

        // rgTCOLDESC
        let mut columns = Vec::with_capacity(usize::from(column_count));
        for _ in 0..column_count {
            columns.push(TableColumnDescriptor::read(&mut cursor)?);
        }

        let row_size = usize::from(end_existence_bitmap);
        let bitmap_offset = usize::from(end_1byte_values);

        for column in &columns {
            if usize::from(column.bit_index()) >= (row_size - bitmap_offset) * 8 {
                return Err(LtpError::InvalidTableColumnBit(column.bit_index()).into());
            }
        }

        let rows = Self::read_rows(ndb, &heap, &sub_nodes, rows_reference, row_size)?;
        let row_index = Self::read_row_index(&heap, row_index_id)?;

        Ok(Self {
            columns,
            row_size,
            bitmap_offset,
            heap,
            sub_nodes,
            rows,
            row_index,
        })
    }

    /// The rows blob is in-heap for small tables, or an external node
    /// whose data leaves each hold a whole number of rows.
    fn read_rows(
        ndb: &NodeDatabase,
        heap: &HeapNode,
        sub_nodes: &SubNodeMap,
        reference: u32,
        row_size: usize,
    ) -> io::Result<Vec<Vec<u8>>> {
        if row_size == 0 {
            return Err(LtpError::InvalidTableRowSize(0).into());
        }
        if reference == 0 {
            return Ok(Vec::new());
        }

        let mut rows = Vec::new();
        let mut push_rows = |buffer: &[u8]| {
            for row in buffer.chunks_exact(row_size) {
                rows.push(row.to_vec());
            }
        };

        if reference & 0x1F == 0 {
            push_rows(heap.find_entry(HeapId::from(reference))?);
        } else {
            let node = NodeId::from(reference);
            let entry = sub_nodes
                .find(node)
                .map_err(|_| LtpError::ExternalValueMissing(reference))?;
            for payload in ndb.leaf_payloads(entry.data())? {
                push_rows(&payload);
            }
        }

        Ok(rows)
    }

    fn read_row_index(heap: &HeapNode, row_index_id: HeapId) -> io::Result<BTreeMap<u32, u32>> {
        if row_index_id.is_null() {
            return Ok(BTreeMap::new());
        }

        let tree = HeapTree::open(heap, row_index_id)?;
        if tree.header().key_size() != 4 || tree.header().entry_size() != 4 {
            return Err(LtpError::InvalidHeapTreeKeySize(tree.header().key_size()).into());
        }

        let mut index = BTreeMap::new();
        for record in tree.leaf_records()? {
            let mut cursor = Cursor::new(record.as_slice());
            // dwRowID
            let row_id = cursor.read_u32::<LittleEndian>()?;
            // dwRowIndex
            let row_number = cursor.read_u32::<LittleEndian>()?;
            index.insert(row_id, row_number);
        }
        Ok(index)
    }

    pub fn columns(&self) -> &[TableColumnDescriptor] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// The stable row id of row `row_number`, from the leading `dwRowID`
    /// column every TC carries.
    pub fn row_id(&self, row_number: usize) -> Option<u32> {
        let row = self.rows.get(row_number)?;
        Some(u32::from_le_bytes(row.get(..4)?.try_into().ok()?))
    }

    pub fn row_ids(&self) -> Vec<u32> {
        (0..self.row_count())
            .filter_map(|row_number| self.row_id(row_number))
            .collect()
    }

    /// Find a row by its stable id through the row index.
    pub fn row_number(&self, row_id: u32) -> Option<usize> {
        self.row_index
            .get(&row_id)
            .map(|row_number| *row_number as usize)
    }

    /// Decode every present cell of one row.
    pub fn row(&self, ndb: &NodeDatabase, row_number: usize) -> io::Result<PropertySet> {
        let row = self
            .rows
            .get(row_number)
            .ok_or(LtpError::TableRowNotFound(row_number))?;

        let bitmap = &row[self.bitmap_offset..];
        let mut properties = PropertySet::default();

        for column in &self.columns {
            let bit = usize::from(column.bit_index());
            if bitmap[bit / 8] & (1 << (7 - bit % 8)) == 0 {
                continue;
            }

            let start = usize::from(column.offset());
            let end = start + usize::from(column.size());
            if end > self.row_size {
                return Err(LtpError::InvalidTableRowSize(column.offset()).into());
            }
            let cell = &row[start..end];

            let value = match column.prop_type().fixed_size() {
                // fixed cells no wider than eight bytes live in the row
                Some(size) if size <= 8 && usize::from(column.size()) == size => {
                    parse_value_bytes(column.prop_type(), cell)?
                }
                _ => {
                    let raw = u32::from_le_bytes(
                        cell.try_into()
                            .map_err(|_| LtpError::InvalidValueSize(column.prop_type(), cell.len()))?,
                    );
                    if raw == 0 {
                        continue;
                    }
                    let reference = ValueReference::new(column.prop_type(), raw);
                    decode_value(
                        column.prop_type(),
                        reference,
                        &self.heap,
                        ndb,
                        &self.sub_nodes,
                    )?
                }
            };

            properties.insert(column.prop_id(), value);
        }

        Ok(properties)
    }
}

use std::sync::Arc;
use crate::{bitmap_get, bitmap_set};
use crate::storage::page::page::Page;
use crate::storage::row::Row;
use crate::storage::schema::Schema;
use crate::storage::transaction::TransactionId;
use crate::types::{DbError, DbResult, PAGE_SIZE, PageId, RecordId, SlotId};

/// Number of fixed-width slots a page holds for the given schema.
/// Largest `slots` with `slots * row_size + ceil(slots / 8) <= PAGE_SIZE`.
pub fn slots_per_page(schema: &Schema) -> usize {
    (PAGE_SIZE * 8) / (schema.row_size() * 8 + 1)
}

/// Length in bytes of the occupancy bitmap
pub fn header_size(num_slots: usize) -> usize {
    num_slots.div_ceil(8)
}

/// Slotted page of fixed-size rows.
///
/// Layout:
/// [occupancy bitmap: ceil(slots / 8)][slot 0][slot 1]...[slot slots-1][zero padding]
///
/// Slot `i` is occupied iff bit `i % 8` (least significant first) of bitmap byte
/// `i / 8` is set. Empty slots and the trailing padding are written as zeros.
#[derive(Clone, Debug)]
pub struct HeapPage {
    id: PageId,
    schema: Arc<Schema>,
    header: Vec<u8>, // occupancy bitmap
    rows: Vec<Option<Row>>,
    dirtier: Option<TransactionId>, // transaction that modified the page since the last flush
}

impl HeapPage {

    /// Create a blank page, all slots empty
    pub fn new(id: PageId, schema: Arc<Schema>) -> Self {
        let num_slots = slots_per_page(&schema);
        Self {
            id,
            schema,
            header: vec![0u8; header_size(num_slots)],
            rows: vec![None; num_slots],
            dirtier: None,
        }
    }

    /// Byte form of a page with every slot empty
    pub fn empty_page_data() -> [u8; PAGE_SIZE] {
        [0u8; PAGE_SIZE]
    }

    /// Deserialize page bytes read from a heap file
    pub fn from_bytes(id: PageId, schema: Arc<Schema>, buf: &[u8; PAGE_SIZE]) -> DbResult<Self> {
        let num_slots = slots_per_page(&schema);
        let header_len = header_size(num_slots);
        let row_size = schema.row_size();

        let header = buf[..header_len].to_vec();
        let mut rows = Vec::with_capacity(num_slots);
        for i in 0..num_slots {
            if !bitmap_get!(header, i) {
                rows.push(None);
                continue;
            }

            let start = header_len + i * row_size;
            let mut row = Row::deserialize(&buf[start..start + row_size], &schema)?;
            row.set_record_id(Some(RecordId::new(id, i as SlotId)));
            rows.push(Some(row));
        }

        Ok(Self { id, schema, header, rows, dirtier: None })
    }

    #[inline]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[inline]
    pub fn num_slots(&self) -> usize {
        self.rows.len()
    }

    pub fn empty_slot_count(&self) -> usize {
        (0..self.num_slots()).filter(|&i| !self.is_slot_used(i)).count()
    }

    #[inline]
    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.num_slots() && bitmap_get!(self.header, slot)
    }

    /// Get the row stored in an occupied slot
    pub fn read_slot(&self, slot: usize) -> DbResult<&Row> {
        if !self.is_slot_used(slot) {
            return Err(DbError::NoSuchElement(format!("slot {} of page {} is empty", slot, self.id)));
        }
        self.rows[slot].as_ref()
            .ok_or_else(|| DbError::NoSuchElement(format!("slot {} of page {} is empty", slot, self.id)))
    }

    /// Store a row in the given slot and bind the row to it
    pub fn write_slot(&mut self, slot: usize, mut row: Row) -> DbResult<()> {
        if slot >= self.num_slots() {
            return Err(DbError::NoSuchElement(format!("slot {} out of range", slot)));
        }
        if row.schema().as_ref() != self.schema.as_ref() {
            return Err(DbError::SchemaMismatch(
                format!("row schema [{}] differs from page schema [{}]", row.schema(), self.schema)
            ));
        }

        row.set_record_id(Some(RecordId::new(self.id, slot as SlotId)));
        self.rows[slot] = Some(row);
        bitmap_set!(self.header, slot, true);
        Ok(())
    }

    /// Mark an occupied slot as empty
    pub fn clear_slot(&mut self, slot: usize) -> DbResult<()> {
        if !self.is_slot_used(slot) {
            return Err(DbError::NoSuchElement(format!("slot {} of page {} is already empty", slot, self.id)));
        }
        bitmap_set!(self.header, slot, false);
        self.rows[slot] = None;
        Ok(())
    }

    /// Insert row into the lowest-numbered empty slot
    pub fn insert_row(&mut self, row: Row) -> DbResult<SlotId> {
        let slot = (0..self.num_slots())
            .find(|&i| !self.is_slot_used(i))
            .ok_or_else(|| DbError::CapacityExceeded(format!("page {} is full", self.id)))?;
        self.write_slot(slot, row)?;
        Ok(slot as SlotId)
    }

    /// Remove a row previously read from this page
    pub fn delete_row(&mut self, row: &Row) -> DbResult<()> {
        let record_id = row.record_id()
            .ok_or_else(|| DbError::NoSuchElement("row has no storage location".to_string()))?;
        if record_id.page_id != self.id {
            return Err(DbError::NoSuchElement(
                format!("row belongs to page {}, not page {}", record_id.page_id, self.id)
            ));
        }
        self.clear_slot(record_id.slot as usize)
    }

    /// Iterate through rows on page in slot order
    pub fn iter_rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
            .enumerate()
            .filter(move |(i, _)| bitmap_get!(self.header, *i))
            .filter_map(|(_, row)| row.as_ref())
    }
}

impl Page for HeapPage {

    #[inline]
    fn get_id(&self) -> PageId {
        self.id
    }

    fn serialize(&self) -> [u8; PAGE_SIZE] {
        let mut buf = [0u8; PAGE_SIZE];
        let header_len = self.header.len();
        let row_size = self.schema.row_size();

        buf[..header_len].copy_from_slice(&self.header);
        for (i, row) in self.rows.iter().enumerate() {
            if !bitmap_get!(self.header, i) {
                continue;
            }
            if let Some(row) = row {
                let start = header_len + i * row_size;
                // rows are type checked on write_slot, so encoding cannot fail here
                if let Ok(bytes) = row.serialize() {
                    buf[start..start + row_size].copy_from_slice(&bytes);
                }
            }
        }
        buf
    }

    #[inline]
    fn is_dirty(&self) -> Option<TransactionId> {
        self.dirtier
    }

    #[inline]
    fn mark_dirty(&mut self, dirty: bool, txn: TransactionId) {
        self.dirtier = if dirty { Some(txn) } else { None };
    }

    fn is_empty(&self) -> bool {
        self.header.iter().all(|b| *b == 0)
    }
}

/// Pages compare by id, occupancy and slot contents
impl PartialEq for HeapPage {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.header == other.header && self.rows == other.rows
    }
}

/*
Unit tests
*/

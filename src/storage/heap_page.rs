use super::error::{StorageError, StorageResult};
use super::{PageId, PAGE_SIZE};
use crate::tuple::{RecordId, Tuple, TupleDesc};
use crate::txn::TransactionId;

/// A fixed-size slotted page.
///
/// On disk the page is a header bitmap followed by the tuple slots:
/// bit `i` of the header (byte `i / 8`, LSB first) is 1 iff slot `i`
/// holds a live tuple. Unused slots and trailing padding are zero bytes.
/// Capacity is `floor(PAGE_SIZE * 8 / (tuple_size * 8 + 1))` so that the
/// header and all slots fit in one page.
pub struct HeapPage {
    pid: PageId,
    desc: TupleDesc,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    dirty: Option<TransactionId>,
    before_image: Vec<u8>,
}

impl HeapPage {
    /// Parse a page from its byte image. The image must be exactly
    /// `PAGE_SIZE` bytes; slots whose header bit is clear are skipped.
    pub fn new_from_bytes(pid: PageId, desc: TupleDesc, bytes: &[u8]) -> StorageResult<Self> {
        if bytes.len() != PAGE_SIZE {
            return Err(StorageError::CorruptPage(pid, PAGE_SIZE, bytes.len()));
        }

        let capacity = Self::capacity_for(&desc);
        let header_size = Self::header_size_for(capacity);
        let tuple_size = desc.byte_size();

        let header = bytes[..header_size].to_vec();
        let mut tuples = Vec::with_capacity(capacity);
        for slot in 0..capacity {
            if !slot_used(&header, slot) {
                tuples.push(None);
                continue;
            }
            let start = header_size + slot * tuple_size;
            let mut tuple = Tuple::from_bytes(desc.clone(), &bytes[start..start + tuple_size])?;
            tuple.set_record_id(Some(RecordId::new(pid, slot as i32)));
            tuples.push(Some(tuple));
        }

        let mut page = Self {
            pid,
            desc,
            header,
            tuples,
            dirty: None,
            before_image: Vec::new(),
        };
        page.before_image = page.page_data();
        Ok(page)
    }

    /// Fresh page with a zeroed header and no tuples
    pub fn empty(pid: PageId, desc: TupleDesc) -> Self {
        let capacity = Self::capacity_for(&desc);
        let header = vec![0u8; Self::header_size_for(capacity)];
        let mut page = Self {
            pid,
            desc,
            header,
            tuples: vec![None; capacity],
            dirty: None,
            before_image: Vec::new(),
        };
        page.before_image = page.page_data();
        page
    }

    /// How many tuples of this schema fit on one page
    pub fn capacity_for(desc: &TupleDesc) -> usize {
        (PAGE_SIZE * 8) / (desc.byte_size() * 8 + 1)
    }

    fn header_size_for(capacity: usize) -> usize {
        capacity.div_ceil(8)
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }

    pub fn capacity(&self) -> usize {
        self.tuples.len()
    }

    /// Number of free slots on this page
    pub fn num_unused_slots(&self) -> usize {
        (0..self.tuples.len())
            .filter(|&slot| !slot_used(&self.header, slot))
            .count()
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.tuples.len() && slot_used(&self.header, slot)
    }

    /// Place a tuple in the lowest-numbered free slot and return the
    /// record id it was assigned.
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> StorageResult<RecordId> {
        if tuple.tuple_desc() != &self.desc {
            return Err(StorageError::SchemaMismatch);
        }
        let slot = (0..self.tuples.len())
            .find(|&slot| !slot_used(&self.header, slot))
            .ok_or(StorageError::PageFull(self.pid))?;

        let rid = RecordId::new(self.pid, slot as i32);
        let mut stored = tuple.clone();
        stored.set_record_id(Some(rid));
        self.tuples[slot] = Some(stored);
        set_slot(&mut self.header, slot, true);
        Ok(rid)
    }

    /// Clear the slot the tuple's record id points at
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> StorageResult<()> {
        let rid = tuple.record_id().ok_or(StorageError::MissingRecordId)?;
        if rid.page_id != self.pid {
            return Err(StorageError::NotOnThisPage {
                rid,
                page: self.pid,
            });
        }
        let slot = rid.slot as usize;
        if slot >= self.tuples.len() || !slot_used(&self.header, slot) {
            return Err(StorageError::SlotEmpty(rid));
        }
        self.tuples[slot] = None;
        set_slot(&mut self.header, slot, false);
        Ok(())
    }

    /// Set or clear the dirty mark. The first transition from clean to
    /// dirty snapshots the current bytes as the page's before-image.
    pub fn mark_dirty(&mut self, dirty: bool, tid: TransactionId) {
        if dirty {
            if self.dirty.is_none() {
                self.before_image = self.page_data();
            }
            self.dirty = Some(tid);
        } else {
            self.dirty = None;
        }
    }

    /// The transaction that last dirtied this page, if any
    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirty
    }

    /// Byte image of the last clean state
    pub fn before_image(&self) -> &[u8] {
        &self.before_image
    }

    /// Re-snapshot the current bytes as the clean baseline (called after
    /// a successful flush)
    pub fn set_before_image(&mut self) {
        self.before_image = self.page_data();
    }

    /// Serialize the page: header, slots in order, zero padding
    pub fn page_data(&self) -> Vec<u8> {
        let tuple_size = self.desc.byte_size();
        let mut out = Vec::with_capacity(PAGE_SIZE);
        out.extend_from_slice(&self.header);
        for tuple in &self.tuples {
            match tuple {
                Some(t) => {
                    // serialization of an in-memory tuple cannot fail: its
                    // fields were validated against the descriptor on entry
                    let before = out.len();
                    if t.serialize_into(&mut out).is_err() {
                        out.truncate(before);
                        out.extend(std::iter::repeat(0u8).take(tuple_size));
                    }
                }
                None => out.extend(std::iter::repeat(0u8).take(tuple_size)),
            }
        }
        out.resize(PAGE_SIZE, 0);
        out
    }

    /// Occupied tuples in ascending slot order
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter().filter_map(|slot| slot.as_ref())
    }
}

fn slot_used(header: &[u8], slot: usize) -> bool {
    (header[slot / 8] >> (slot % 8)) & 1 == 1
}

fn set_slot(header: &mut [u8], slot: usize, used: bool) {
    if used {
        header[slot / 8] |= 1 << (slot % 8);
    } else {
        header[slot / 8] &= !(1 << (slot % 8));
    }
}

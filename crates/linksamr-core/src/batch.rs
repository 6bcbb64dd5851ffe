//! Fixed-size grouping of input records with sentinel padding.

use crate::{AmrError, LookupRecord};

/// One slot in a batch: a record, or padding in the final short batch.
///
/// Padding is an explicit variant rather than a nullable placeholder so the
/// request builder's skip logic is enforced by the type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Present(LookupRecord),
    Absent,
}

impl Slot {
    pub fn as_record(&self) -> Option<&LookupRecord> {
        match self {
            Slot::Present(record) => Some(record),
            Slot::Absent => None,
        }
    }
}

/// Split `records` into consecutive batches of exactly `size` slots.
///
/// The final batch is padded with [`Slot::Absent`] up to `size`. Order is
/// preserved: batch `i` always precedes batch `i + 1`, and records keep
/// their input order within each batch.
pub fn group(records: Vec<LookupRecord>, size: usize) -> Result<Vec<Vec<Slot>>, AmrError> {
    if size == 0 {
        return Err(AmrError::InvalidBatchSize);
    }

    let mut batches = Vec::with_capacity(records.len().div_ceil(size));
    let mut current = Vec::with_capacity(size);
    for record in records {
        current.push(Slot::Present(record));
        if current.len() == size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
        }
    }
    if !current.is_empty() {
        current.resize_with(size, || Slot::Absent);
        batches.push(current);
    }
    Ok(batches)
}

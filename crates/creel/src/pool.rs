//! The sub-buffer pool, plus the per-buffer mipmap staging hand-off.
//!
//! Slots are grouped by channel count and recycled, never freed: releasing only clears the in-use
//! flag, and the next acquisition of the slot zeroes its storage so a new chain can never observe
//! a previous lifetime's samples.

use std::sync::Arc;

use crate::ids::BufferIdx;
use crate::mipmap::encode_sample;
use crate::model::{BufferInfo, BufferService, BufferTable, Model};

/// Look up the shared service for a slot.  The slot must exist.
pub(crate) fn buffer_service(m: &Model, channel_count: u16, idx: BufferIdx) -> Arc<BufferService> {
    m.buffers[&channel_count].services[idx.0 as usize].clone()
}

fn find_unused(m: &Model, channel_count: u16) -> Option<BufferIdx> {
    let table = m.buffers.get(&channel_count)?;
    table
        .info
        .iter()
        .position(|info| !info.in_use)
        .map(|i| BufferIdx(i as u32))
}

/// Return an unused slot of `channel_count` channels, creating a new one if every slot is taken.
///
/// A reused slot is scrubbed here (storage zeroed, UI mipmap cleared) rather than at release, so
/// release stays cheap and the scrub cost lands on the participant that asked for memory.
pub(crate) fn acquire(mut m: Model, channel_count: u16) -> (Model, BufferIdx) {
    if let Some(idx) = find_unused(&m, channel_count) {
        let service = buffer_service(&m, channel_count, idx);
        // Safety: the slot is not in use, so no chain references it and no other participant
        // touches its storage or mipmap.
        unsafe {
            service.critical.storage.fill(0.0);
        }
        service.ui.borrow_mut().mipmap.clear();
        return (m, idx);
    }

    let service = BufferService::new(channel_count);
    let mut table = m.buffers.get(&channel_count).cloned().unwrap_or_default();
    table.info.push_back(BufferInfo::default());
    table.services.push_back(service);
    let idx = BufferIdx(table.info.len() as u32 - 1);
    m.buffers.insert(channel_count, table);
    (m, idx)
}

pub(crate) fn set_in_use(mut m: Model, channel_count: u16, idx: BufferIdx) -> Model {
    let mut table = m.buffers[&channel_count].clone();
    table.info.set(idx.0 as usize, BufferInfo { in_use: true });
    m.buffers.insert(channel_count, table);
    m
}

/// Return a slot to the pool.  Storage is left as-is; acquisition zeroes it.
pub(crate) fn release(mut m: Model, channel_count: u16, idx: BufferIdx) -> Model {
    let mut table = m.buffers[&channel_count].clone();
    table.info.set(idx.0 as usize, BufferInfo { in_use: false });
    m.buffers.insert(channel_count, table);
    m
}

/// Count of in-use slots for one channel count (zero when no table exists yet).
#[cfg(test)]
pub(crate) fn in_use_count(m: &Model, channel_count: u16) -> usize {
    m.buffers
        .get(&channel_count)
        .map(|t| t.info.iter().filter(|i| i.in_use).count())
        .unwrap_or(0)
}

// mipmap staging --------------------------------------------------------------------

/// Audio side: encode the dirty span of `storage` into the staging bytes and publish the span for
/// the UI to consume.  Must be called holding the staging token.
pub(crate) fn stage_mipmap(service: &BufferService) {
    let mut audio = service.audio.borrow_mut();
    let Some((beg, end)) = audio.dirty.bounds() else {
        return;
    };
    // Safety: the staging token is held, and the dirty span was written by this participant.
    unsafe {
        let staged = service.critical.staging.write(beg, end - beg, |bytes, ch| {
            for (i, byte) in bytes.iter_mut().enumerate() {
                *byte = encode_sample(service.critical.storage.at(ch, beg + i as u64));
            }
            bytes.len() as u64
        });
        debug_assert_eq!(staged, end - beg);
    }
    *service.critical.dirty.borrow_mut() = audio.dirty;
    audio.dirty.clear();
}

/// UI side: fold the staged span into the UI mipmap.  Must be called holding the staging token.
/// Returns whether anything changed.
pub(crate) fn consume_mipmap(service: &BufferService) -> bool {
    let mut dirty = service.critical.dirty.borrow_mut();
    let Some((beg, end)) = dirty.bounds() else {
        return false;
    };
    let mut ui = service.ui.borrow_mut();
    // Safety: the staging token is held.
    ui.mipmap
        .write(beg, end - beg, |ch, fr| unsafe { service.critical.staging.at(ch, fr) });
    ui.mipmap.update(*dirty);
    dirty.clear();
    true
}

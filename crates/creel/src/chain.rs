//! Chains: logical audio regions realized as ordered lists of pooled sub-buffers.
//!
//! Everything here is either a pure `Model -> Model` transformer (fed to the publisher by the
//! service layer) or a read/write helper over an already-obtained snapshot.
//!
//! The read/write helpers do no synchronization of their own.  A caller invoking them must
//! guarantee that no other thread is touching the frames in question while the call runs; that is
//! why they are `unsafe fn`s.  A "single sub-buffer region" is a start/count pair that stays
//! within one sub-buffer, i.e. `start / SUB_BUFFER_FRAMES == (start + count - 1) / SUB_BUFFER_FRAMES`.

use std::sync::Arc;

use crate::client_data::ClientData;
use crate::config::{SUB_BUFFER_FRAMES, VECTOR_FRAMES};
use crate::events::Event;
use crate::ids::{BufferIdx, ChainId};
use crate::mipmap::{lerp_minmax, MinMax};
use crate::model::{BufferService, Chain, ChainFlags, ChainOptions, LoadingChain, Model};
use crate::pool;
use crate::processor::{pump, PumpSpec};

pub(crate) fn required_buffer_count(frame_count: u64) -> u64 {
    frame_count.div_ceil(SUB_BUFFER_FRAMES)
}

/// Frames actually backed by sub-buffers, i.e. the frame count rounded up to whole sub-buffers.
pub(crate) fn actual_frame_count(chain: &Chain) -> u64 {
    required_buffer_count(chain.frame_count) * SUB_BUFFER_FRAMES
}

pub(crate) fn update_chain(mut m: Model, id: ChainId, f: impl FnOnce(Chain) -> Chain) -> Model {
    if let Some(chain) = m.chains.get(&id).cloned() {
        m.chains.insert(id, f(chain));
    }
    m
}

// creation / destruction ------------------------------------------------------------

/// Queue a loading descriptor so the allocator picks this chain up.
pub(crate) fn push_loading_chain(mut m: Model, user: ChainId, channel_count: u16) -> Model {
    let lc = LoadingChain {
        idx: m.loading_chains.len(),
        user,
        channel_count,
        buffers: im::Vector::new(),
    };
    m.loading_chains.push_back(lc);
    m
}

/// Acquire every sub-buffer within the current publish; the chain is ready on return.
pub(crate) fn allocate_entire_chain_now(mut m: Model, id: ChainId) -> Model {
    let chain = m.chains[&id].clone();
    let mut buffers = im::Vector::new();
    for _ in 0..required_buffer_count(chain.frame_count) {
        let (next, idx) = pool::acquire(m, chain.channel_count);
        m = pool::set_in_use(next, chain.channel_count, idx);
        buffers.push_back(idx);
    }
    update_chain(m, id, move |mut c| {
        c.buffers = Some(buffers);
        c
    })
}

pub(crate) fn make_chain(
    mut m: Model,
    channel_count: u16,
    frame_count: u64,
    options: ChainOptions,
    client_data: ClientData,
) -> (Model, ChainId) {
    let id = m.mint_chain_id();
    let chain = Chain {
        id,
        flags: ChainFlags {
            loading: !options.allocate_now,
            generate_mipmaps: options.enable_mipmaps,
            silent: options.silent,
        },
        load_progress: 0.0,
        channel_count,
        frame_count,
        buffers: None,
        client_data,
    };
    m.chains.insert(id, chain);
    if options.allocate_now {
        m = allocate_entire_chain_now(m, id);
    } else {
        m = push_loading_chain(m, id, channel_count);
    }
    (m, id)
}

pub(crate) fn release_buffers(mut m: Model, id: ChainId) -> Model {
    let chain = m.chains[&id].clone();
    if let Some(buffers) = chain.buffers {
        for idx in buffers.iter() {
            m = pool::release(m, chain.channel_count, *idx);
        }
    }
    m
}

pub(crate) fn erase(mut m: Model, id: ChainId) -> Model {
    m = release_buffers(m, id);
    m.chains.remove(&id);
    m
}

// resize ----------------------------------------------------------------------------

/// Drop the chain's buffers and flag it loading again; used when growth requires reallocation.
fn clear_buffers(m: Model, id: ChainId) -> Model {
    update_chain(m, id, |mut c| {
        c.buffers = None;
        c.flags.loading = true;
        c
    })
}

fn shrink(mut m: Model, id: ChainId, required_buffer_count: usize) -> Model {
    let chain = m.chains[&id].clone();
    let mut buffers = chain.buffers.expect("shrinking a chain that has no buffers");
    for idx in buffers.iter().skip(required_buffer_count) {
        m = pool::release(m, chain.channel_count, *idx);
    }
    buffers.truncate(required_buffer_count);
    update_chain(m, id, move |mut c| {
        c.buffers = Some(buffers);
        c
    })
}

/// Change the chain's frame count.
///
/// If the sub-buffer count is unchanged this only updates the frame count.  Shrinking releases the
/// trailing sub-buffers.  Growing discards the chain's contents: the buffer list is cleared and
/// the chain re-enters background loading.
pub(crate) fn resize(mut m: Model, id: ChainId, frame_count: u64) -> Model {
    let chain = m.chains[&id].clone();
    let current = required_buffer_count(chain.frame_count);
    let required = required_buffer_count(frame_count);
    m = update_chain(m, id, |mut c| {
        c.frame_count = frame_count;
        c
    });
    if current == required || chain.buffers.is_none() {
        return m;
    }
    if required < current {
        m = shrink(m, id, required as usize);
    } else {
        m = clear_buffers(m, id);
        m = push_loading_chain(m, id, chain.channel_count);
    }
    m
}

pub(crate) fn set_mipmaps_enabled(m: Model, id: ChainId, enabled: bool) -> Model {
    update_chain(m, id, |mut c| {
        c.flags.generate_mipmaps = enabled;
        c
    })
}

// loading-progress transformers (applied by the allocator) --------------------------

pub(crate) fn set_load_progress(m: Model, id: ChainId, progress: f32) -> Model {
    update_chain(m, id, |mut c| {
        c.load_progress = progress;
        c
    })
}

pub(crate) fn finish_loading(m: Model, id: ChainId, buffers: im::Vector<BufferIdx>) -> Model {
    update_chain(m, id, |mut c| {
        c.buffers = Some(buffers);
        c.load_progress = 1.0;
        c.flags.loading = false;
        c
    })
}

// region access ---------------------------------------------------------------------

fn service_at(m: &Model, chain: &Chain, frame: u64) -> Arc<BufferService> {
    let buffers = chain.buffers.as_ref().expect("chain has no buffers");
    let idx = buffers[(frame / SUB_BUFFER_FRAMES) as usize];
    pool::buffer_service(m, chain.channel_count, idx)
}

pub(crate) fn is_valid_sub_buffer_region(chain: &Chain, start: u64, count: u64) -> bool {
    count <= SUB_BUFFER_FRAMES
        && count > 0
        && start + count <= actual_frame_count(chain)
        && start / SUB_BUFFER_FRAMES == (start + count - 1) / SUB_BUFFER_FRAMES
}

/// Read one single-sub-buffer region of one channel, handing `read` a direct slice.
///
/// Returns 0 without invoking `read` if the chain is not fully allocated yet.
///
/// # Safety
/// No other thread may write the named frames during the call.
pub(crate) unsafe fn read_region(
    m: &Model,
    chain: &Chain,
    channel: u16,
    start: u64,
    count: u64,
    read: impl FnOnce(&[f32]) -> u64,
) -> u64 {
    if chain.buffers.is_none() {
        return 0;
    }
    debug_assert!(channel < chain.channel_count);
    debug_assert!(is_valid_sub_buffer_region(chain, start, count));
    let service = service_at(m, chain, start);
    service
        .critical
        .storage
        .read(channel, start % SUB_BUFFER_FRAMES, count, read)
}

/// Write one single-sub-buffer region of every channel and grow the buffer's dirty span.
///
/// Returns 0 without invoking `write` if the chain is not fully allocated yet.
///
/// # Safety
/// No other thread may access the named frames during the call.  Only one simultaneous writer is
/// supported.
pub(crate) unsafe fn write_region(
    m: &Model,
    chain: &Chain,
    start: u64,
    count: u64,
    write: impl FnMut(&mut [f32], u16) -> u64,
) -> u64 {
    if chain.buffers.is_none() {
        return 0;
    }
    debug_assert!(is_valid_sub_buffer_region(chain, start, count));
    let local_start = start % SUB_BUFFER_FRAMES;
    let service = service_at(m, chain, start);
    service
        .audio
        .borrow_mut()
        .dirty
        .grow(local_start, local_start + count);
    let written = service.critical.storage.write(local_start, count, write);
    debug_assert_eq!(written, count);
    written
}

/// Like [`write_region`] but for a single channel.
///
/// # Safety
/// As for [`write_region`].
pub(crate) unsafe fn write_region_channel(
    m: &Model,
    chain: &Chain,
    channel: u16,
    start: u64,
    count: u64,
    write: impl FnOnce(&mut [f32]) -> u64,
) -> u64 {
    if chain.buffers.is_none() {
        return 0;
    }
    debug_assert!(channel < chain.channel_count);
    debug_assert!(is_valid_sub_buffer_region(chain, start, count));
    let local_start = start % SUB_BUFFER_FRAMES;
    let service = service_at(m, chain, start);
    service
        .audio
        .borrow_mut()
        .dirty
        .grow(local_start, local_start + count);
    service
        .critical
        .storage
        .write_channel(channel, local_start, count, write)
}

/// Read one sample per entry of `frames`, in order, for every channel.  Out-of-range and negative
/// indices read as 0.
///
/// # Safety
/// No other thread may write any of the named frames during the call.
pub(crate) unsafe fn read_random(
    m: &Model,
    chain: &Chain,
    frames: &[i64; VECTOR_FRAMES],
    mut read: impl FnMut(f32, u16, usize),
) {
    if chain.buffers.is_none() {
        return;
    }
    let frame_count = actual_frame_count(chain) as i64;
    for ch in 0..chain.channel_count {
        for (slot, &fr) in frames.iter().enumerate() {
            if fr < 0 || fr >= frame_count {
                read(0.0, ch, slot);
                continue;
            }
            let service = service_at(m, chain, fr as u64);
            read(
                service.critical.storage.at(ch, fr as u64 % SUB_BUFFER_FRAMES),
                ch,
                slot,
            );
        }
    }
}

/// Write one sample per entry of `frames` from `provider`, for every channel.  Out-of-range and
/// negative indices are skipped.
///
/// # Safety
/// No other thread may access any of the named frames during the call.
pub(crate) unsafe fn write_random(
    m: &Model,
    chain: &Chain,
    frames: &[i64; VECTOR_FRAMES],
    mut provider: impl FnMut(u16, usize) -> f32,
) {
    if chain.buffers.is_none() {
        return;
    }
    let frame_count = actual_frame_count(chain) as i64;
    for ch in 0..chain.channel_count {
        for (slot, &fr) in frames.iter().enumerate() {
            if fr < 0 || fr >= frame_count {
                continue;
            }
            let fr = fr as u64;
            let local = fr % SUB_BUFFER_FRAMES;
            let service = service_at(m, chain, fr);
            service.critical.storage.set(ch, local, provider(ch, slot));
            service.audio.borrow_mut().dirty.grow(local, local + 1);
        }
    }
}

/// Read an arbitrary span of one channel, breaking at sub-buffer boundaries, in chunks of at most
/// `CHUNK` frames.
///
/// # Safety
/// No other thread may write the named frames during the call.
pub(crate) unsafe fn read_chunked<const CHUNK: usize>(
    m: &Model,
    chain: &Chain,
    channel: u16,
    start: u64,
    count: u64,
    mut read: impl FnMut(&[f32], u64) -> u64,
) -> u64 {
    let spec = PumpSpec {
        input_alignment: Some(SUB_BUFFER_FRAMES),
        output_alignment: None,
        fixed_chunk: false,
    };
    pump::<CHUNK>(
        spec,
        start,
        start,
        count,
        |chunk, at| {
            // Safety: forwarded from this function's contract.
            unsafe {
                read_region(m, chain, channel, at, chunk.len() as u64, |frames| {
                    chunk.copy_from_slice(frames);
                    frames.len() as u64
                })
            }
        },
        |chunk, at| read(chunk, at),
        |fr| fr,
    )
}

/// Read an arbitrary span of every channel; `read` receives each chunk once per channel.
///
/// # Safety
/// As for [`read_chunked`].
pub(crate) unsafe fn read_chunked_all<const CHUNK: usize>(
    m: &Model,
    chain: &Chain,
    start: u64,
    count: u64,
    mut read: impl FnMut(&[f32], u16, u64) -> u64,
) -> u64 {
    for ch in 0..chain.channel_count {
        let got = read_chunked::<CHUNK>(m, chain, ch, start, count, |chunk, at| {
            read(chunk, ch, at)
        });
        if got < count {
            return got;
        }
    }
    count
}

/// Write an arbitrary span of one channel, breaking at sub-buffer boundaries.
///
/// # Safety
/// No other thread may access the named frames during the call.
pub(crate) unsafe fn write_chunked<const CHUNK: usize>(
    m: &Model,
    chain: &Chain,
    channel: u16,
    start: u64,
    count: u64,
    mut write: impl FnMut(&mut [f32], u64) -> u64,
) -> u64 {
    let spec = PumpSpec {
        input_alignment: None,
        output_alignment: Some(SUB_BUFFER_FRAMES),
        fixed_chunk: false,
    };
    pump::<CHUNK>(
        spec,
        start,
        start,
        count,
        |chunk, at| write(chunk, at),
        |chunk, at| {
            // Safety: forwarded from this function's contract.
            unsafe {
                write_region_channel(m, chain, channel, at, chunk.len() as u64, |frames| {
                    frames.copy_from_slice(chunk);
                    frames.len() as u64
                })
            }
        },
        |fr| fr,
    )
}

/// Write an arbitrary span of every channel; `write` fills each chunk once per channel.
///
/// # Safety
/// As for [`write_chunked`].
pub(crate) unsafe fn write_chunked_all<const CHUNK: usize>(
    m: &Model,
    chain: &Chain,
    start: u64,
    count: u64,
    mut write: impl FnMut(&mut [f32], u16, u64) -> u64,
) -> u64 {
    for ch in 0..chain.channel_count {
        let got = write_chunked::<CHUNK>(m, chain, ch, start, count, |chunk, at| {
            write(chunk, ch, at)
        });
        if got < count {
            return got;
        }
    }
    count
}

// ui diff ---------------------------------------------------------------------------

/// Compare two chain tables and emit load lifecycle events for what changed.
///
/// Chains flagged silent produce nothing.  Structural sharing prunes untouched subtrees, so a
/// frame in which nothing happened costs almost nothing here.
pub(crate) fn diff(
    was: &im::OrdMap<ChainId, Chain>,
    now: &im::OrdMap<ChainId, Chain>,
    push: &mut dyn FnMut(Event),
) {
    use im::ordmap::DiffItem;

    for item in was.diff(now) {
        match item {
            DiffItem::Add(_, chain) => {
                if chain.generates_ui_events() && chain.is_loading() {
                    push(Event::ChainLoadBegin {
                        chain: chain.id,
                        client_data: chain.client_data.clone(),
                    });
                }
            }
            DiffItem::Remove(_, chain) => {
                if chain.generates_ui_events() && chain.is_loading() {
                    push(Event::ChainLoadEnd {
                        chain: chain.id,
                        client_data: chain.client_data.clone(),
                    });
                }
            }
            DiffItem::Update { old, new } => {
                let (_, was) = old;
                let (_, now) = new;
                if !now.generates_ui_events() {
                    continue;
                }
                if was.load_progress != now.load_progress {
                    push(Event::ChainLoadProgress {
                        chain: now.id,
                        progress: now.load_progress,
                        client_data: now.client_data.clone(),
                    });
                }
                if was.is_loading() != now.is_loading() {
                    if now.is_loading() {
                        push(Event::ChainLoadBegin {
                            chain: now.id,
                            client_data: now.client_data.clone(),
                        });
                    } else {
                        push(Event::ChainLoadEnd {
                            chain: now.id,
                            client_data: now.client_data.clone(),
                        });
                    }
                }
            }
        }
    }
}

// mipmaps ---------------------------------------------------------------------------

/// Fold any staged mipmap spans of this chain's buffers into their UI mipmaps.  Returns whether
/// anything changed.  Must be called holding the staging token.
pub(crate) fn consume_mipmaps(m: &Model, chain: &Chain) -> bool {
    if !chain.generates_mipmaps() {
        return false;
    }
    let Some(buffers) = &chain.buffers else {
        return false;
    };
    let mut changed = false;
    for idx in buffers.iter() {
        changed |= pool::consume_mipmap(&pool::buffer_service(m, chain.channel_count, *idx));
    }
    changed
}

/// Read the peak view at a fractional frame position, interpolating between the two nearest bins
/// at the level matching `bin_size`.
pub(crate) fn read_mipmap(m: &Model, chain: &Chain, bin_size: f32, channel: u16, frame: f32) -> MinMax {
    if frame < 0.0 {
        return MinMax::default();
    }
    let Some(buffers) = &chain.buffers else {
        return MinMax::default();
    };
    let last = actual_frame_count(chain) - 1;
    let index_a = (frame.floor() as u64).min(last);
    let index_b = (frame.ceil() as u64).min(last);
    let t = frame - frame.floor();

    let read_one = |index: u64| {
        let idx = buffers[(index / SUB_BUFFER_FRAMES) as usize];
        let service = pool::buffer_service(m, chain.channel_count, idx);
        let ui = service.ui.borrow();
        let level = ui.mipmap.bin_size_to_level(bin_size);
        ui.mipmap.read(level, channel, index % SUB_BUFFER_FRAMES)
    };
    lerp_minmax(read_one(index_a), read_one(index_b), t)
}

/// Reset the UI-side peak view of every buffer of the chain.
pub(crate) fn clear_mipmap(m: &Model, chain: &Chain) {
    let Some(buffers) = &chain.buffers else {
        return;
    };
    for idx in buffers.iter() {
        pool::buffer_service(m, chain.channel_count, *idx)
            .ui
            .borrow_mut()
            .mipmap
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_data::client_data;
    use crate::pool::in_use_count;

    fn opts(allocate_now: bool) -> ChainOptions {
        ChainOptions {
            allocate_now,
            ..Default::default()
        }
    }

    fn ready_chain(frames: u64, channels: u16) -> (Model, ChainId) {
        make_chain(Model::default(), channels, frames, opts(true), client_data(()))
    }

    #[test]
    fn allocate_now_is_ready_with_the_right_buffer_count() {
        let (m, id) = ready_chain(3 * SUB_BUFFER_FRAMES + 1, 2);
        let chain = &m.chains[&id];
        assert!(chain.is_ready());
        assert!(!chain.is_loading());
        assert_eq!(chain.buffers.as_ref().unwrap().len(), 4);
        assert_eq!(in_use_count(&m, 2), 4);
        assert!(m.loading_chains.is_empty());
    }

    #[test]
    fn deferred_creation_queues_a_loading_chain() {
        let (m, id) =
            make_chain(Model::default(), 1, SUB_BUFFER_FRAMES, opts(false), client_data(()));
        let chain = &m.chains[&id];
        assert!(chain.is_loading());
        assert!(!chain.is_ready());
        assert_eq!(m.loading_chains.len(), 1);
        assert_eq!(m.loading_chains[0].user, id);
        assert_eq!(in_use_count(&m, 1), 0);
    }

    #[test]
    fn erase_returns_every_slot() {
        let (m, id) = ready_chain(2 * SUB_BUFFER_FRAMES, 2);
        assert_eq!(in_use_count(&m, 2), 2);
        let m = erase(m, id);
        assert_eq!(in_use_count(&m, 2), 0);
        assert!(!m.chains.contains_key(&id));
    }

    #[test]
    fn resize_same_bucket_only_updates_frame_count() {
        let (m, id) = ready_chain(100, 1);
        let buffers_before = m.chains[&id].buffers.clone();
        let m = resize(m, id, 200);
        let chain = &m.chains[&id];
        assert_eq!(chain.frame_count, 200);
        assert_eq!(chain.buffers, buffers_before);
        assert!(m.loading_chains.is_empty());
    }

    #[test]
    fn resize_shrink_releases_trailing_slots() {
        let (m, id) = ready_chain(3 * SUB_BUFFER_FRAMES, 1);
        let m = resize(m, id, SUB_BUFFER_FRAMES);
        let chain = &m.chains[&id];
        assert_eq!(chain.buffers.as_ref().unwrap().len(), 1);
        assert!(chain.is_ready());
        assert_eq!(in_use_count(&m, 1), 1);
    }

    #[test]
    fn resize_grow_discards_and_requeues() {
        let (m, id) = ready_chain(SUB_BUFFER_FRAMES, 1);
        let m = resize(m, id, 3 * SUB_BUFFER_FRAMES);
        let chain = &m.chains[&id];
        assert!(chain.is_loading());
        assert!(chain.buffers.is_none());
        assert_eq!(m.loading_chains.len(), 1);
        assert_eq!(in_use_count(&m, 1), 0);
    }

    #[test]
    fn resize_is_idempotent() {
        let (m, id) = ready_chain(2 * SUB_BUFFER_FRAMES, 1);
        let once = resize(m.clone(), id, SUB_BUFFER_FRAMES);
        let twice = resize(once.clone(), id, SUB_BUFFER_FRAMES);
        assert_eq!(once.chains[&id], twice.chains[&id]);
        assert_eq!(in_use_count(&once, 1), in_use_count(&twice, 1));
    }

    #[test]
    fn region_write_read_round_trip() {
        let (m, id) = ready_chain(2 * SUB_BUFFER_FRAMES, 1);
        let chain = &m.chains[&id];
        // Second sub-buffer, local offset 4.
        let start = SUB_BUFFER_FRAMES + 4;
        unsafe {
            let wrote = write_region(&m, chain, start, 8, |frames, _| {
                for (i, f) in frames.iter_mut().enumerate() {
                    *f = i as f32;
                }
                frames.len() as u64
            });
            assert_eq!(wrote, 8);
            let got = read_region(&m, chain, 0, start, 8, |frames| {
                assert_eq!(frames[3], 3.0);
                frames.len() as u64
            });
            assert_eq!(got, 8);
        }
    }

    #[test]
    fn region_write_marks_the_buffer_dirty() {
        let (m, id) = ready_chain(SUB_BUFFER_FRAMES, 1);
        let chain = &m.chains[&id];
        unsafe {
            write_region(&m, chain, 100, 10, |frames, _| frames.len() as u64);
        }
        let service = service_at(&m, chain, 0);
        assert_eq!(service.audio.borrow().dirty.bounds(), Some((100, 110)));
    }

    #[test]
    fn unallocated_chain_reads_and_writes_nothing() {
        let (m, id) =
            make_chain(Model::default(), 1, SUB_BUFFER_FRAMES, opts(false), client_data(()));
        let chain = &m.chains[&id];
        unsafe {
            assert_eq!(read_region(&m, chain, 0, 0, 8, |_| panic!("no buffers")), 0);
            assert_eq!(write_region(&m, chain, 0, 8, |_, _| panic!("no buffers")), 0);
        }
    }

    #[test]
    fn chunked_write_then_read_crosses_sub_buffers() {
        let (m, id) = ready_chain(2 * SUB_BUFFER_FRAMES, 1);
        let chain = &m.chains[&id];
        let start = SUB_BUFFER_FRAMES - 100;
        let count = 200u64;
        unsafe {
            let wrote = write_chunked::<64>(&m, chain, 0, start, count, |chunk, at| {
                for (i, f) in chunk.iter_mut().enumerate() {
                    *f = (at + i as u64) as f32;
                }
                chunk.len() as u64
            });
            assert_eq!(wrote, count);

            let mut collected = vec![];
            let got = read_chunked::<64>(&m, chain, 0, start, count, |chunk, _| {
                collected.extend_from_slice(chunk);
                chunk.len() as u64
            });
            assert_eq!(got, count);
            let expected: Vec<f32> = (start..start + count).map(|i| i as f32).collect();
            assert_eq!(collected, expected);
        }
    }

    #[test]
    fn random_access_clamps_out_of_range() {
        let (m, id) = ready_chain(SUB_BUFFER_FRAMES, 1);
        let chain = &m.chains[&id];
        let mut frames = [0i64; VECTOR_FRAMES];
        frames[0] = -5;
        frames[1] = 10;
        frames[2] = SUB_BUFFER_FRAMES as i64 + 7;
        unsafe {
            write_random(&m, chain, &frames, |_, slot| slot as f32 + 1.0);
            let mut got = vec![];
            read_random(&m, chain, &frames, |v, _, slot| {
                if slot < 3 {
                    got.push(v);
                }
            });
            // Out-of-range slots read as zero; the in-range slot round-trips.
            assert_eq!(got, vec![0.0, 2.0, 0.0]);
        }
    }

    #[test]
    fn diff_reports_lifecycle_transitions() {
        let (m0, id) =
            make_chain(Model::default(), 1, SUB_BUFFER_FRAMES, opts(false), client_data(()));
        let empty = Model::default();

        let mut events = vec![];
        diff(&empty.chains, &m0.chains, &mut |e| events.push(e));
        assert!(
            matches!(events.as_slice(), [Event::ChainLoadBegin { chain, .. }] if *chain == id)
        );

        // Loading finished.
        let m1 = finish_loading(m0.clone(), id, im::Vector::new());
        let mut events = vec![];
        diff(&m0.chains, &m1.chains, &mut |e| events.push(e));
        assert!(matches!(
            events.as_slice(),
            [
                Event::ChainLoadProgress { progress, .. },
                Event::ChainLoadEnd { .. }
            ] if *progress == 1.0
        ));

        // Progress only.
        let m2 = set_load_progress(m0.clone(), id, 0.5);
        let mut events = vec![];
        diff(&m0.chains, &m2.chains, &mut |e| events.push(e));
        assert!(matches!(
            events.as_slice(),
            [Event::ChainLoadProgress { progress, .. }] if *progress == 0.5
        ));

        // Erased while loading.
        let m3 = erase(m0.clone(), id);
        let mut events = vec![];
        diff(&m0.chains, &m3.chains, &mut |e| events.push(e));
        assert!(matches!(events.as_slice(), [Event::ChainLoadEnd { chain, .. }] if *chain == id));
    }

    #[test]
    fn silent_chains_emit_nothing() {
        let options = ChainOptions {
            silent: true,
            ..Default::default()
        };
        let (m, _) = make_chain(Model::default(), 1, SUB_BUFFER_FRAMES, options, client_data(()));
        let empty = Model::default();
        let mut events = vec![];
        diff(&empty.chains, &m.chains, &mut |e| events.push(e));
        assert!(events.is_empty());
    }
}

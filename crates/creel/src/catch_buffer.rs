//! Catch buffers: gated ring recorders with partitioned playback.
//!
//! A catch buffer of logical capacity P owns a chain of 2P frames split into two halves.  The
//! recorder writes one quantum at the write marker each time the peak gate is open, wrapping
//! through both halves.  Readers never address the ring directly: a linear read offset in
//! `[0, P)` is remapped by the partition transform so that offsets the recorder has already
//! passed this lap resolve into the half being written (fresh samples) and the rest resolve into
//! the other half (the previous lap).  Writer and readers therefore never meet on the same
//! frames, which is what makes the chain's unsynchronised region access sound here.
//!
//! Quantum-sized writes never straddle a sub-buffer because the quantum divides
//! `SUB_BUFFER_FRAMES` and the chain length is a whole number of sub-buffers (for capacities of
//! at least half a sub-buffer; smaller test-sized rings fit inside one sub-buffer entirely).

use std::sync::atomic::Ordering;

use crate::chain;
use crate::client_data::ClientData;
use crate::config::{Block, StereoBlock, VECTOR_FRAMES};
use crate::ids::CatchBufferId;
use crate::messages::{AudioToUi, MsgQueue};
use crate::mipmap::MinMax;
use crate::model::{CatchBuffer, CatchBufferService, Chain, ChainOptions, Model};
use crate::processor::{pump, PumpSpec};
use crate::region::Region;

pub(crate) fn make_catch_buffer(
    mut m: Model,
    channel_count: u16,
    frame_count: u64,
    options: ChainOptions,
    client_data: ClientData,
) -> (Model, CatchBufferId) {
    let id = m.mint_catch_buffer_id();
    let service = CatchBufferService::new(channel_count);
    let (next, chain) = chain::make_chain(m, channel_count, frame_count * 2, options, client_data.clone());
    m = next;
    m.catch_buffers.insert(
        id,
        CatchBuffer {
            id,
            chain,
            chain_options: options,
            client_data,
            service,
            playback_region: Region::default(),
        },
    );
    (m, id)
}

pub(crate) fn erase(mut m: Model, id: CatchBufferId) -> Model {
    let cbuf = m.catch_buffers[&id].clone();
    m = chain::erase(m, cbuf.chain);
    m.catch_buffers.remove(&id);
    m
}

/// Replace the owned chain with a freshly allocated one of the new shape and reset the markers.
/// Any recorded material is discarded.
pub(crate) fn reconfigure(mut m: Model, id: CatchBufferId, channel_count: u16, frame_count: u64) -> Model {
    let mut cbuf = m.catch_buffers[&id].clone();
    let old_chain = m.chains[&cbuf.chain].clone();
    let (next, new_chain) = chain::make_chain(
        m,
        channel_count,
        frame_count * 2,
        cbuf.chain_options,
        old_chain.client_data.clone(),
    );
    m = chain::erase(next, old_chain.id);
    cbuf.chain = new_chain;
    m.catch_buffers.insert(id, cbuf.clone());
    cbuf.service.critical.playback_marker.store(0, Ordering::Relaxed);
    cbuf.service.critical.write_marker.store(0, Ordering::Relaxed);
    m
}

pub(crate) fn set_playback_region(mut m: Model, id: CatchBufferId, region: Region) -> Model {
    if let Some(mut cbuf) = m.catch_buffers.get(&id).cloned() {
        cbuf.playback_region = region;
        m.catch_buffers.insert(id, cbuf);
    }
    m
}

fn silence() -> StereoBlock {
    [[0.0; VECTOR_FRAMES]; 2]
}

// ring arithmetic -------------------------------------------------------------------

pub(crate) fn partition_size(chain_frame_count: u64) -> u64 {
    chain_frame_count / 2
}

/// Step a marker forward one quantum, wrapping at the chain length.
pub(crate) fn advance_marker(chain_frame_count: u64, marker: u64) -> u64 {
    let next = marker + VECTOR_FRAMES as u64;
    if next >= chain_frame_count {
        next - chain_frame_count
    } else {
        next
    }
}

/// Map a linear read offset in `[0, P)` to an absolute chain frame in `[0, 2P)`.
///
/// Offsets the recorder has already overwritten this lap (left of the write marker within the
/// partition) read from the half being written; the rest read from the other half, which still
/// holds the previous lap.
pub(crate) fn partitioned_read_frame(chain_frame_count: u64, write_marker: u64, read_frame: u64) -> u64 {
    let p = partition_size(chain_frame_count);
    let write_part = u64::from(write_marker >= p);
    let other_part = 1 - write_part;
    let read_part = if read_frame < write_marker % p {
        write_part
    } else {
        other_part
    };
    read_frame + p * read_part
}

fn partitioned_read_frame_now(cbuf: &CatchBuffer, chain_frame_count: u64, read_frame: u64) -> u64 {
    // Acquire pairs with the release store in record(): a read routed into the written half must
    // see the samples the recorder put there.
    let write_marker = cbuf.service.critical.write_marker.load(Ordering::Acquire);
    partitioned_read_frame(chain_frame_count, write_marker, read_frame)
}

// record ----------------------------------------------------------------------------

fn record(
    m: &Model,
    cbuf: &CatchBuffer,
    chain: &Chain,
    record_gate: bool,
    to_ui: &MsgQueue<AudioToUi>,
    write: impl FnMut(&mut [f32], u16) -> u64,
) {
    let critical = &cbuf.service.critical;
    let record_active = critical.record_active.load(Ordering::Relaxed);
    if record_gate {
        let write_marker = critical.write_marker.load(Ordering::Relaxed);
        // Safety: the partition transform routes every concurrent reader away from the quantum
        // being written, and there is exactly one recorder per catch buffer.
        unsafe {
            chain::write_region(m, chain, write_marker, VECTOR_FRAMES as u64, write);
        }
        if !record_active {
            let mut audio = cbuf.service.audio.borrow_mut();
            audio.record_start = write_marker;
            to_ui.send(AudioToUi::RecordingStarted {
                id: cbuf.id,
                beg: write_marker,
            });
            critical.record_active.store(true, Ordering::Relaxed);
        }
        critical
            .write_marker
            .store(advance_marker(chain.frame_count, write_marker), Ordering::Release);
    } else if record_active {
        let p = partition_size(chain.frame_count);
        let write_marker = critical.write_marker.load(Ordering::Relaxed);
        let beg = cbuf.service.audio.borrow().record_start % p;
        let end = write_marker % p;
        to_ui.send(AudioToUi::RecordingFinished {
            id: cbuf.id,
            region: Region::new(beg, end),
        });
        critical.record_active.store(false, Ordering::Relaxed);
    }
}

// playback --------------------------------------------------------------------------

fn playback_one_channel(
    m: &Model,
    cbuf: &CatchBuffer,
    chain: &Chain,
    channel: u16,
    read_marker: u64,
) -> Block {
    let mut out = [0.0f32; VECTOR_FRAMES];
    // Pulls break at quantum boundaries: the partition switch point always lies on one (the
    // write marker only moves in whole quanta), and every quantum boundary that is also a
    // sub-buffer boundary is covered too.
    let spec = PumpSpec {
        input_alignment: Some(VECTOR_FRAMES as u64),
        output_alignment: None,
        fixed_chunk: true,
    };
    let produced = pump::<VECTOR_FRAMES>(
        spec,
        read_marker,
        read_marker,
        VECTOR_FRAMES as u64,
        |chunk, at| {
            // Safety: the partition transform keeps reads out of the quantum being recorded.
            unsafe {
                chain::read_region(m, chain, channel, at, chunk.len() as u64, |frames| {
                    chunk.copy_from_slice(frames);
                    frames.len() as u64
                })
            }
        },
        |chunk, at| {
            let offset = (at - read_marker) as usize;
            out[offset..offset + chunk.len()].copy_from_slice(chunk);
            chunk.len() as u64
        },
        |fr| partitioned_read_frame_now(cbuf, chain.frame_count, fr),
    );
    debug_assert_eq!(produced, VECTOR_FRAMES as u64);
    out
}

fn playback(m: &Model, cbuf: &CatchBuffer, chain: &Chain, to_ui: &MsgQueue<AudioToUi>) -> StereoBlock {
    let critical = &cbuf.service.critical;
    if !cbuf.service.audio.borrow().playback_active {
        return silence();
    }
    let read_marker = critical.playback_marker.load(Ordering::Relaxed);
    let out = if chain.channel_count == 1 {
        let row = playback_one_channel(m, cbuf, chain, 0, read_marker);
        [row, row]
    } else {
        [
            playback_one_channel(m, cbuf, chain, 0, read_marker),
            playback_one_channel(m, cbuf, chain, 1, read_marker),
        ]
    };
    let advanced = advance_marker(chain.frame_count, read_marker);
    critical.playback_marker.store(advanced, Ordering::Relaxed);
    if advanced >= cbuf.playback_region.end {
        cbuf.service.audio.borrow_mut().playback_active = false;
        to_ui.send(AudioToUi::PlaybackFinished { id: cbuf.id });
    }
    out
}

// per-quantum processing ------------------------------------------------------------

pub(crate) fn process_mono(
    m: &Model,
    cbuf: &CatchBuffer,
    to_ui: &MsgQueue<AudioToUi>,
    input: &Block,
    threshold: f32,
    gain: f32,
    disable_recording: bool,
) -> StereoBlock {
    let Some(chain) = m.chains.get(&cbuf.chain) else {
        debug_assert!(false, "catch buffer without its chain");
        return silence();
    };
    let record_gate = !disable_recording
        && cbuf
            .service
            .audio
            .borrow_mut()
            .peak_gate
            .process_mono(input, threshold);
    record(m, cbuf, chain, record_gate, to_ui, |frames, _| {
        for (f, s) in frames.iter_mut().zip(input.iter()) {
            *f = s * gain;
        }
        frames.len() as u64
    });
    playback(m, cbuf, chain, to_ui)
}

pub(crate) fn process_stereo(
    m: &Model,
    cbuf: &CatchBuffer,
    to_ui: &MsgQueue<AudioToUi>,
    input: &StereoBlock,
    threshold: f32,
    gain: f32,
    disable_recording: bool,
) -> StereoBlock {
    let Some(chain) = m.chains.get(&cbuf.chain) else {
        debug_assert!(false, "catch buffer without its chain");
        return silence();
    };
    let record_gate = !disable_recording
        && cbuf
            .service
            .audio
            .borrow_mut()
            .peak_gate
            .process_stereo(input, threshold);
    record(m, cbuf, chain, record_gate, to_ui, |frames, ch| {
        for (f, s) in frames.iter_mut().zip(input[ch as usize].iter()) {
            *f = s * gain;
        }
        frames.len() as u64
    });
    playback(m, cbuf, chain, to_ui)
}

// playback control (audio-side dispatch) --------------------------------------------

pub(crate) fn playback_start_audio(m: &Model, id: CatchBufferId) {
    let Some(cbuf) = m.catch_buffers.get(&id) else {
        return;
    };
    cbuf.service.audio.borrow_mut().playback_active = true;
    cbuf.service
        .critical
        .playback_marker
        .store(cbuf.playback_region.beg, Ordering::Relaxed);
}

pub(crate) fn playback_stop_audio(m: &Model, id: CatchBufferId) {
    let Some(cbuf) = m.catch_buffers.get(&id) else {
        return;
    };
    cbuf.service.audio.borrow_mut().playback_active = false;
}

// queries ---------------------------------------------------------------------------

pub(crate) fn channel_count(m: &Model, cbuf: &CatchBuffer) -> u16 {
    m.chains[&cbuf.chain].channel_count
}

/// The catch buffer's logical capacity P (half its chain).
pub(crate) fn frame_count(m: &Model, cbuf: &CatchBuffer) -> u64 {
    partition_size(m.chains[&cbuf.chain].frame_count)
}

pub(crate) fn write_marker(m: &Model, cbuf: &CatchBuffer) -> u64 {
    let marker = cbuf.service.critical.write_marker.load(Ordering::Relaxed);
    marker % partition_size(m.chains[&cbuf.chain].frame_count)
}

pub(crate) fn playback_marker(m: &Model, cbuf: &CatchBuffer) -> u64 {
    let marker = cbuf.service.critical.playback_marker.load(Ordering::Relaxed);
    marker % partition_size(m.chains[&cbuf.chain].frame_count)
}

pub(crate) fn is_record_active(cbuf: &CatchBuffer) -> bool {
    cbuf.service.critical.record_active.load(Ordering::Relaxed)
}

pub(crate) fn is_playback_active_ui(cbuf: &CatchBuffer) -> bool {
    cbuf.service.ui.borrow().playback_active
}

// reading ---------------------------------------------------------------------------

/// Read `count` frames of one channel starting at linear offset `start`, routed through the
/// partition transform.  Safe against the concurrent recorder by construction; the caller must
/// not run this concurrently with model mutation of this chain.
pub(crate) fn read(
    m: &Model,
    cbuf: &CatchBuffer,
    chain: &Chain,
    channel: u16,
    start: u64,
    count: u64,
    mut read_fn: impl FnMut(&[f32], u64) -> u64,
) -> u64 {
    // Quantum-aligned pulls, as in playback: no pull may straddle the partition switch point.
    let spec = PumpSpec {
        input_alignment: Some(VECTOR_FRAMES as u64),
        output_alignment: None,
        fixed_chunk: false,
    };
    pump::<VECTOR_FRAMES>(
        spec,
        start,
        start,
        count,
        |chunk, at| {
            // Safety: the partition transform keeps this read out of the recorder's quantum.
            unsafe {
                chain::read_region(m, chain, channel, at, chunk.len() as u64, |frames| {
                    chunk.copy_from_slice(frames);
                    frames.len() as u64
                })
            }
        },
        |chunk, at| read_fn(chunk, at),
        |fr| partitioned_read_frame_now(cbuf, chain.frame_count, fr % partition_size(chain.frame_count)),
    )
}

/// Bulk-copy `count` frames into a caller buffer, one slice per channel.  The source start is
/// taken modulo the capacity.
pub(crate) fn copy(
    m: &Model,
    cbuf: &CatchBuffer,
    src_start: u64,
    dest: &mut [&mut [f32]],
    dest_start: usize,
    count: u64,
) -> u64 {
    let chain = &m.chains[&cbuf.chain];
    let src_start = src_start % partition_size(chain.frame_count);
    let mut copied = count;
    for (ch, dest_channel) in dest.iter_mut().enumerate().take(chain.channel_count as usize) {
        let got = read(m, cbuf, chain, ch as u16, src_start, count, |chunk, at| {
            let offset = dest_start + (at - src_start) as usize;
            dest_channel[offset..offset + chunk.len()].copy_from_slice(chunk);
            chunk.len() as u64
        });
        copied = copied.min(got);
    }
    copied
}

/// Read the peak view at a fractional offset in `[0, P)`, routed through the partition transform.
pub(crate) fn read_mipmap(
    m: &Model,
    cbuf: &CatchBuffer,
    bin_size: f32,
    channel: u16,
    frame: f64,
) -> MinMax {
    let chain = &m.chains[&cbuf.chain];
    let p = partition_size(chain.frame_count);
    if frame < 0.0 || frame >= p as f64 {
        return MinMax::default();
    }
    let write_marker = cbuf.service.critical.write_marker.load(Ordering::Acquire);
    let write_part = u64::from(write_marker >= p);
    let read_part = if frame < (write_marker % p) as f64 {
        write_part
    } else {
        1 - write_part
    };
    let absolute = frame + (p * read_part) as f64;
    chain::read_mipmap(m, chain, bin_size, channel, absolute as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_transform_stays_in_bounds_and_picks_the_right_half() {
        let chain_frames = 64u64; // P = 32
        let p = 32u64;
        for w in 0..chain_frames {
            for r in 0..p {
                let abs = partitioned_read_frame(chain_frames, w, r);
                assert!(abs < chain_frames);
                let write_part = u64::from(w >= p);
                let abs_part = u64::from(abs >= p);
                if r >= w % p {
                    assert_ne!(abs_part, write_part, "w={w} r={r}");
                } else {
                    assert_eq!(abs_part, write_part, "w={w} r={r}");
                }
            }
        }
    }

    #[test]
    fn partition_transform_matches_worked_examples() {
        // P = 32, write marker 40 (in the second half).
        assert_eq!(partitioned_read_frame(64, 40, 10), 10);
        assert_eq!(partitioned_read_frame(64, 40, 5), 37);
    }

    #[test]
    fn markers_wrap_at_the_chain_length() {
        let chain_frames = 128u64;
        assert_eq!(advance_marker(chain_frames, 0), 64);
        assert_eq!(advance_marker(chain_frames, 64), 0);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn partition_transform_is_total(
                p_subs in 1u64..4,
                w_frac in 0.0f64..1.0,
                r_frac in 0.0f64..1.0,
            ) {
                let p = p_subs * 64;
                let chain_frames = p * 2;
                let w = (w_frac * (chain_frames - 1) as f64) as u64;
                let r = (r_frac * (p - 1) as f64) as u64;
                let abs = partitioned_read_frame(chain_frames, w, r);
                prop_assert!(abs < chain_frames);
                prop_assert_eq!(abs % p, r);
            }
        }
    }
}

//! End-to-end scenarios driving a live service.
//!
//! The test thread plays all three roles: it calls the audio-side entry points with an `AudioT`
//! token, the UI-side entry points with a `UiT` token, and leaves the real allocator thread to
//! make deferred chains ready in the background.

use std::time::{Duration, Instant};

use creel::{
    client_data, AudioT, Block, ChainOptions, Creel, Event, NortT, Region, UiT, SUB_BUFFER_FRAMES,
    VECTOR_FRAMES,
};

fn allocate_now() -> ChainOptions {
    ChainOptions {
        allocate_now: true,
        ..Default::default()
    }
}

fn drain_events(creel: &Creel) -> Vec<Event> {
    let mut events = vec![];
    creel.update_ui(UiT, |e| events.push(e));
    events
}

/// Poll `predicate` until it holds or two seconds elapse.
fn eventually(mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if predicate() {
            return true;
        }
        if Instant::now() > deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// A quantum whose first half is `a` and second half is `b`.
fn halves(a: f32, b: f32) -> Block {
    let mut block = [0.0f32; VECTOR_FRAMES];
    block[..VECTOR_FRAMES / 2].fill(a);
    block[VECTOR_FRAMES / 2..].fill(b);
    block
}

#[test]
fn silent_synchronous_creation_is_ready_and_emits_nothing() {
    let creel = Creel::new();
    drain_events(&creel);

    let options = ChainOptions {
        allocate_now: true,
        silent: true,
        ..Default::default()
    };
    let id = creel.make_chain(NortT, 2, 1024, options, client_data(()));
    assert_eq!(creel.chain_is_ready(UiT, id), Ok(true));
    assert!(drain_events(&creel).is_empty());

    creel.erase_chain(NortT, id).unwrap();
    assert!(drain_events(&creel).is_empty());
    assert!(creel.chain_is_ready(UiT, id).is_err());
}

#[test]
fn gated_record_then_partitioned_playback_loop() {
    let creel = Creel::new();
    // Logical capacity 64 frames, so the chain underneath holds 128.
    let cb = creel.make_catch_buffer(NortT, 1, 64, allocate_now(), client_data("loop"));

    // First quantum records but nothing is playing yet.
    let v0 = halves(1.0, 2.0);
    let out = creel.process_catch_buffer_mono(AudioT, cb, &v0, 0.0, 1.0, false);
    assert_eq!(out, [[0.0; VECTOR_FRAMES]; 2]);
    assert!(creel.catch_buffer_is_recording(UiT, cb).unwrap());
    // One full lap of the partition: the marker is back at 0.
    assert_eq!(creel.catch_buffer_write_marker(UiT, cb).unwrap(), 0);

    let restart = |input: &Block, disable_recording: bool| {
        creel
            .start_catch_buffer_playback(UiT, cb, Region::new(0, 64))
            .unwrap();
        creel.update(AudioT);
        creel.process_catch_buffer_mono(AudioT, cb, input, 0.0, 1.0, disable_recording)
    };

    // v1 was just recorded, so the partitioned read returns it on both rows.
    let v1 = halves(3.0, 4.0);
    let out = restart(&v1, false);
    assert_eq!(out, [v1, v1]);

    let v2 = halves(5.0, 6.0);
    let out = restart(&v2, false);
    assert_eq!(out, [v2, v2]);

    // Recording disabled: the partition freezes on the last written material.
    let v3 = halves(7.0, 8.0);
    let out = restart(&v3, true);
    assert_eq!(out, [v2, v2]);

    let v4 = halves(9.0, 10.0);
    let out = restart(&v4, true);
    assert_eq!(out, [v2, v2]);

    // The host heard about the gate opening and closing and each playback completing.
    let events = drain_events(&creel);
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::RecordingStarted { beg: 0, .. })));
    assert!(events.iter().any(|e| matches!(e, Event::RecordingFinished { .. })));
    assert!(events.iter().any(|e| matches!(e, Event::PlaybackFinished { .. })));
}

#[test]
fn recording_region_is_reported_in_partition_coordinates() {
    let creel = Creel::new();
    let cb = creel.make_catch_buffer(NortT, 1, 64, allocate_now(), client_data(()));

    let loud = halves(1.0, 1.0);
    creel.process_catch_buffer_mono(AudioT, cb, &loud, 0.0, 1.0, false);
    creel.process_catch_buffer_mono(AudioT, cb, &loud, 0.0, 1.0, true);

    let events = drain_events(&creel);
    let finished = events
        .iter()
        .find_map(|e| match e {
            Event::RecordingFinished { region, .. } => Some(*region),
            _ => None,
        })
        .expect("gate closed");
    // One quantum recorded from marker 0; both ends land on partition offset 0.
    assert_eq!(finished, Region::new(0, 0));
}

#[test]
fn erasing_a_loading_chain_cancels_cleanly() {
    let creel = Creel::new();
    drain_events(&creel);

    // Big enough that the allocator cannot finish before we erase it out from under it; the
    // cancel path then has partial allocations to give back.
    let id = creel.make_chain(
        NortT,
        1,
        512 * SUB_BUFFER_FRAMES,
        ChainOptions::default(),
        client_data(()),
    );
    creel.erase_chain(NortT, id).unwrap();
    assert!(creel.chain_is_ready(UiT, id).is_err());

    // Created and erased between two UI frames: the host never hears about it.
    assert!(drain_events(&creel).is_empty());

    // The cancel path runs in the background; the service stays healthy afterwards.
    let other = creel.make_chain(NortT, 1, SUB_BUFFER_FRAMES, allocate_now(), client_data(()));
    assert!(eventually(|| creel.chain_is_ready(UiT, other) == Ok(true)));
}

#[test]
fn background_loading_reports_progress_and_finishes() {
    let creel = Creel::new();
    drain_events(&creel);

    let id = creel.make_chain(
        NortT,
        1,
        512 * SUB_BUFFER_FRAMES,
        ChainOptions::default(),
        client_data(()),
    );
    // Sample the loading state before the allocator can plausibly have finished 512 steps.
    let mut events = drain_events(&creel);
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::ChainLoadBegin { chain, .. } if *chain == id)));

    assert!(eventually(|| {
        events.extend(drain_events(&creel));
        creel.chain_is_ready(UiT, id) == Ok(true)
    }));
    events.extend(drain_events(&creel));

    // The previous UI frame saw the chain loading, so the flag flip must surface as a load-end.
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::ChainLoadEnd { chain, .. } if *chain == id)));
    assert_eq!(creel.chain_frame_count(UiT, id), Ok(512 * SUB_BUFFER_FRAMES));
}

#[test]
fn resize_grow_reloads_with_fresh_zeroed_buffers() {
    let creel = Creel::new();
    let id = creel.make_chain(NortT, 1, SUB_BUFFER_FRAMES, allocate_now(), client_data(()));

    // Leave some residue so we can prove the regrown chain starts clean.
    let written = unsafe {
        creel.write_chain_region(AudioT, id, 100, 8, |frames, _| {
            frames.fill(0.9);
            frames.len() as u64
        })
    };
    assert_eq!(written, 8);

    creel.resize_chain(NortT, id, 3 * SUB_BUFFER_FRAMES).unwrap();
    assert_eq!(creel.chain_is_ready(UiT, id), Ok(false));
    assert_eq!(creel.chain_frame_count(UiT, id), Ok(3 * SUB_BUFFER_FRAMES));

    assert!(eventually(|| creel.chain_is_ready(UiT, id) == Ok(true)));

    // Every part of the regrown chain reads as silence, including the old residue and the
    // newly acquired third sub-buffer.
    for start in [100, 2 * SUB_BUFFER_FRAMES + 5] {
        let got = unsafe {
            creel.read_chain_region(AudioT, id, 0, start, 8, |frames| {
                assert!(frames.iter().all(|&s| s == 0.0));
                frames.len() as u64
            })
        };
        assert_eq!(got, 8);
    }
}

#[test]
fn resize_same_bucket_keeps_contents() {
    let creel = Creel::new();
    let id = creel.make_chain(NortT, 1, SUB_BUFFER_FRAMES, allocate_now(), client_data(()));
    unsafe {
        creel.write_chain_region(AudioT, id, 0, 4, |frames, _| {
            frames.copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
            frames.len() as u64
        });
    }
    creel.resize_chain(NortT, id, SUB_BUFFER_FRAMES / 2).unwrap();
    assert_eq!(creel.chain_is_ready(UiT, id), Ok(true));
    unsafe {
        creel.read_chain_region(AudioT, id, 0, 0, 4, |frames| {
            assert_eq!(frames, &[1.0, 2.0, 3.0, 4.0]);
            frames.len() as u64
        });
    }
}

#[test]
fn event_queue_overflow_is_announced_once() {
    let creel = Creel::new();
    let cb = creel.make_catch_buffer(NortT, 1, 64, allocate_now(), client_data(()));

    // Each enable/disable pair emits a recording-started and a recording-finished notification;
    // far more than the queue holds between two UI frames.
    let loud = halves(1.0, 1.0);
    for _ in 0..600 {
        creel.process_catch_buffer_mono(AudioT, cb, &loud, 0.0, 1.0, false);
        creel.process_catch_buffer_mono(AudioT, cb, &loud, 0.0, 1.0, true);
    }

    let events = drain_events(&creel);
    let overflows = events
        .iter()
        .filter(|e| matches!(e, Event::QueueOverflow { .. }))
        .count();
    assert_eq!(overflows, 1);
    // The queue stayed bounded but kept delivering the newest notifications.
    assert!(events.len() <= 1024);
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::RecordingFinished { .. })));
}

#[test]
fn partitioned_reads_return_the_other_half_behind_the_recorder() {
    let creel = Creel::new();
    // Capacity 32: one recorded quantum spans both halves of the 64-frame chain.
    let cb = creel.make_catch_buffer(NortT, 1, 32, allocate_now(), client_data(()));

    let v = halves(0.25, 0.5);
    creel.process_catch_buffer_mono(AudioT, cb, &v, 0.0, 1.0, false);

    // The recorder wrapped back to 0, so every offset reads from the second half.
    let mut got = vec![];
    let n = creel
        .read_catch_buffer(NortT, cb, 0, 0, 32, |chunk, _| {
            got.extend_from_slice(chunk);
            chunk.len() as u64
        })
        .unwrap();
    assert_eq!(n, 32);
    assert_eq!(got, vec![0.5; 32]);

    let mut dest = vec![0.0f32; 32];
    let copied = creel
        .copy_catch_buffer(NortT, cb, 0, &mut [&mut dest[..]], 0, 32)
        .unwrap();
    assert_eq!(copied, 32);
    assert_eq!(dest, vec![0.5; 32]);
}

#[test]
fn mipmaps_flow_from_audio_writes_to_ui_reads() {
    let creel = Creel::new();
    let options = ChainOptions {
        allocate_now: true,
        enable_mipmaps: true,
        ..Default::default()
    };
    let id = creel.make_chain(NortT, 1, SUB_BUFFER_FRAMES, options, client_data("wave"));

    unsafe {
        creel.write_chain_region(AudioT, id, 0, 64, |frames, _| {
            frames[..32].fill(1.0);
            frames[32..].fill(-1.0);
            frames.len() as u64
        });
    }

    // Audio stages (it holds the token first), then the UI consumes.
    creel.update(AudioT);
    let events = drain_events(&creel);
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::ChainMipmapChanged { chain, .. } if *chain == id)));

    // A bin covering the whole written span sees both extremes.
    let bin = creel.read_chain_mipmap(UiT, id, 64.0, 0, 0.0).unwrap();
    assert_eq!(bin.min, 0);
    assert_eq!(bin.max, 255);

    creel.clear_chain_mipmap(UiT, id).unwrap();
    let bin = creel.read_chain_mipmap(UiT, id, 64.0, 0, 0.0).unwrap();
    assert_eq!(bin, creel.read_chain_mipmap(UiT, id, 64.0, 0, 1.0).unwrap());
    assert_eq!(bin.max, 0);
}

#[test]
fn reconfigure_replaces_the_chain_and_resets_markers() {
    let creel = Creel::new();
    let cb = creel.make_catch_buffer(NortT, 1, 64, allocate_now(), client_data(()));

    let loud = halves(1.0, 1.0);
    creel.process_catch_buffer_mono(AudioT, cb, &loud, 0.0, 1.0, false);

    creel.reconfigure_catch_buffer(NortT, cb, 1, 128).unwrap();
    assert_eq!(creel.catch_buffer_frame_count(UiT, cb).unwrap(), 128);
    assert_eq!(creel.catch_buffer_write_marker(UiT, cb).unwrap(), 0);
    assert_eq!(creel.catch_buffer_playback_marker(UiT, cb).unwrap(), 0);
}

#[test]
fn handles_erase_their_entities_on_drop() {
    let creel = Creel::new();
    let id = {
        let chain = creel.chain(NortT, 1, 1024, allocate_now(), client_data(()));
        assert_eq!(chain.is_ready(UiT), Ok(true));
        chain.id()
    };
    assert!(creel.chain_is_ready(UiT, id).is_err());

    let kept = creel
        .chain(NortT, 1, 1024, allocate_now(), client_data(()))
        .into_id();
    assert_eq!(creel.chain_is_ready(UiT, kept), Ok(true));
}

#[test]
fn shutdown_is_idempotent_and_runs_on_drop() {
    let creel = Creel::new();
    creel.shutdown();
    creel.shutdown();
    drop(creel);
}

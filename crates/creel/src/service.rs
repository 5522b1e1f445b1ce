//! The process-wide buffer service.
//!
//! [`Creel`] owns the published model, the two cross-thread queues, the mipmap staging token and
//! the background allocator thread.  The three participants drive it at their own cadence:
//!
//! - the audio thread calls [`Creel::update`] once per quantum and the per-entity processing and
//!   region operations, all wait-free;
//! - the UI thread calls [`Creel::update_ui`] once per frame to collect events, and owns every
//!   create/resize/erase operation;
//! - the allocator thread advances loading chains in the background.
//!
//! Dropping the service stops and joins the allocator thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use atomic_refcell::AtomicRefCell;

use crate::alloc_thread;
use crate::beach_ball::{BeachBall, AUDIO_CATCHER, UI_CATCHER};
use crate::catch_buffer;
use crate::chain;
use crate::client_data::ClientData;
use crate::config::{Block, StereoBlock, VECTOR_FRAMES};
use crate::error::{Error, Result};
use crate::events::Event;
use crate::ids::{CatchBufferId, ChainId};
use crate::messages::{AudioToUi, MsgQueue, UiToAudio};
use crate::mipmap::MinMax;
use crate::model::{ChainOptions, Model};
use crate::pool;
use crate::publisher::SnapshotCell;
use crate::region::Region;
use crate::tags::{AudioT, Nort, NortT, Rt, UiT};

/// State shared with the allocator thread.
pub(crate) struct Shared {
    pub(crate) model: SnapshotCell,
    pub(crate) beach: BeachBall,
    pub(crate) to_ui: MsgQueue<AudioToUi>,
    pub(crate) to_audio: MsgQueue<UiToAudio>,
    pub(crate) alloc_wait: Mutex<()>,
    pub(crate) alloc_cv: Condvar,
    pub(crate) stop: AtomicBool,
    /// The UI participant's copy of the previous frame's model, diffed against each new frame.
    pub(crate) prev_frame: AtomicRefCell<Model>,
}

pub struct Creel {
    shared: Arc<Shared>,
    alloc_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Default for Creel {
    fn default() -> Self {
        Creel::new()
    }
}

impl Creel {
    /// Create the service and spawn its allocator thread.
    pub fn new() -> Creel {
        let shared = Arc::new(Shared {
            model: SnapshotCell::new(Model::default()),
            beach: BeachBall::new(),
            to_ui: MsgQueue::new(),
            to_audio: MsgQueue::new(),
            alloc_wait: Mutex::new(()),
            alloc_cv: Condvar::new(),
            stop: AtomicBool::new(false),
            prev_frame: AtomicRefCell::new(Model::default()),
        });
        let thread = {
            let shared = shared.clone();
            std::thread::spawn(move || alloc_thread::run(shared))
        };
        Creel {
            shared,
            alloc_thread: Mutex::new(Some(thread)),
        }
    }

    /// Stop and join the allocator thread.  Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        let Some(thread) = self.alloc_thread.lock().unwrap().take() else {
            return;
        };
        self.shared.stop.store(true, Ordering::Release);
        self.shared.alloc_cv.notify_one();
        if thread.join().is_err() {
            log::error!("allocator thread panicked during shutdown");
        }
    }

    fn wake_allocator(&self) {
        self.shared.alloc_cv.notify_one();
    }

    // participant updates ---------------------------------------------------------

    /// Audio participant, once per quantum: dispatch pending playback commands, then stage dirty
    /// mipmap spans if the staging token is in the audio participant's hands.
    pub fn update(&self, _audio: AudioT) {
        let m = self.shared.model.read();
        while let Some(msg) = self.shared.to_audio.pop() {
            match msg {
                UiToAudio::PlaybackStart { id } => catch_buffer::playback_start_audio(&m, id),
                UiToAudio::PlaybackStop { id } => catch_buffer::playback_stop_audio(&m, id),
            }
        }
        let _ = self.shared.beach.with_ball(AUDIO_CATCHER, UI_CATCHER, || {
            for (_, table) in m.buffers.iter() {
                for service in table.services.iter() {
                    pool::stage_mipmap(service);
                }
            }
        });
    }

    /// UI participant, once per frame: emit chain lifecycle events from the model diff, fold
    /// staged mipmap spans, and drain the audio participant's notifications.
    pub fn update_ui(&self, _ui: UiT, mut push_event: impl FnMut(Event)) {
        let was = self.shared.prev_frame.borrow().clone();
        let now = self.shared.model.read();

        chain::diff(&was.chains, &now.chains, &mut push_event);
        if was.loading_chains != now.loading_chains {
            // Resize may have queued work without going through a creation path.
            self.wake_allocator();
        }

        let _ = self.shared.beach.with_ball(UI_CATCHER, AUDIO_CATCHER, || {
            for (_, c) in now.chains.iter() {
                if chain::consume_mipmaps(&now, c) {
                    push_event(Event::ChainMipmapChanged {
                        chain: c.id,
                        client_data: c.client_data.clone(),
                    });
                }
            }
        });

        while let Some(msg) = self.shared.to_ui.pop() {
            match msg {
                AudioToUi::RecordingStarted { id, beg } => {
                    if let Some(cbuf) = now.catch_buffers.get(&id) {
                        push_event(Event::RecordingStarted {
                            catch_buffer: id,
                            beg,
                            client_data: cbuf.client_data.clone(),
                        });
                    }
                }
                AudioToUi::RecordingFinished { id, region } => {
                    if let Some(cbuf) = now.catch_buffers.get(&id) {
                        push_event(Event::RecordingFinished {
                            catch_buffer: id,
                            region,
                            client_data: cbuf.client_data.clone(),
                        });
                    }
                }
                AudioToUi::PlaybackFinished { id } => {
                    if let Some(cbuf) = now.catch_buffers.get(&id) {
                        cbuf.service.ui.borrow_mut().playback_active = false;
                        push_event(Event::PlaybackFinished {
                            catch_buffer: id,
                            client_data: cbuf.client_data.clone(),
                        });
                    }
                }
                AudioToUi::QueueFull { len_approx } => {
                    log::warn!("audio event queue overflowed (~{len_approx} pending)");
                    push_event(Event::QueueOverflow { len_approx });
                }
            }
        }

        *self.shared.prev_frame.borrow_mut() = (*now).clone();
    }

    // chains ----------------------------------------------------------------------

    /// Create a chain of `frame_count` frames and `channel_count` channels.
    ///
    /// With `allocate_now` the chain is ready on return; otherwise it is handed to the allocator
    /// thread and becomes ready once every sub-buffer has been acquired.
    pub fn make_chain(
        &self,
        _caller: impl Nort,
        channel_count: u16,
        frame_count: u64,
        options: ChainOptions,
        client_data: ClientData,
    ) -> ChainId {
        let mut id = None;
        self.shared.model.update_publish(|m| {
            let (m, new_id) = chain::make_chain(m, channel_count, frame_count, options, client_data.clone());
            id = Some(new_id);
            m
        });
        if !options.allocate_now {
            self.wake_allocator();
        }
        id.expect("publish ran")
    }

    /// Destroy a chain and return its sub-buffers to the pool.
    pub fn erase_chain(&self, _caller: impl Nort, id: ChainId) -> Result<()> {
        let mut found = false;
        self.shared.model.update_publish(|m| {
            found = m.chains.contains_key(&id);
            if found {
                chain::erase(m, id)
            } else {
                m
            }
        });
        // The allocator may be sleeping on a descriptor that now needs cancelling.
        self.wake_allocator();
        if found {
            Ok(())
        } else {
            Err(Error::UnknownChain(id))
        }
    }

    /// Change a chain's frame count; see the resize rules in the chain module.
    pub fn resize_chain(&self, _caller: impl Nort, id: ChainId, frame_count: u64) -> Result<()> {
        let mut found = false;
        self.shared.model.update_publish(|m| {
            found = m.chains.contains_key(&id);
            if found {
                chain::resize(m, id, frame_count)
            } else {
                m
            }
        });
        self.wake_allocator();
        if found {
            Ok(())
        } else {
            Err(Error::UnknownChain(id))
        }
    }

    /// Whether the chain has all of its sub-buffers and can be read and written.
    pub fn chain_is_ready(&self, _ui: UiT, id: ChainId) -> Result<bool> {
        let m = self.shared.model.read();
        m.chains
            .get(&id)
            .map(|c| c.is_ready())
            .ok_or(Error::UnknownChain(id))
    }

    pub fn chain_frame_count(&self, _ui: UiT, id: ChainId) -> Result<u64> {
        let m = self.shared.model.read();
        m.chains
            .get(&id)
            .map(|c| c.frame_count)
            .ok_or(Error::UnknownChain(id))
    }

    pub fn set_chain_mipmaps_enabled(&self, _caller: impl Nort, id: ChainId, enabled: bool) -> Result<()> {
        let mut found = false;
        self.shared.model.update_publish(|m| {
            found = m.chains.contains_key(&id);
            chain::set_mipmaps_enabled(m, id, enabled)
        });
        if found {
            Ok(())
        } else {
            Err(Error::UnknownChain(id))
        }
    }

    /// Read the down-sampled peak view at a fractional frame position.
    pub fn read_chain_mipmap(
        &self,
        _ui: UiT,
        id: ChainId,
        bin_size: f32,
        channel: u16,
        frame: f32,
    ) -> Result<MinMax> {
        let m = self.shared.model.read();
        let chain = m.chains.get(&id).ok_or(Error::UnknownChain(id))?;
        if channel >= chain.channel_count {
            return Err(Error::ChannelOutOfRange {
                channel,
                channel_count: chain.channel_count,
            });
        }
        Ok(chain::read_mipmap(&m, chain, bin_size, channel, frame))
    }

    /// Reset the chain's peak view to silence.
    pub fn clear_chain_mipmap(&self, _ui: UiT, id: ChainId) -> Result<()> {
        let m = self.shared.model.read();
        let chain = m.chains.get(&id).ok_or(Error::UnknownChain(id))?;
        chain::clear_mipmap(&m, chain);
        Ok(())
    }

    // unsynchronised chain access --------------------------------------------------

    /// Read a region of one channel lying within a single sub-buffer, handing `read` a direct
    /// slice.  No-op returning 0 if the chain is unknown or not fully allocated.
    ///
    /// # Safety
    /// The caller must guarantee no concurrent writer touches the named frames; the service does
    /// no synchronization of sample storage.
    pub unsafe fn read_chain_region(
        &self,
        _caller: impl Rt,
        id: ChainId,
        channel: u16,
        start: u64,
        count: u64,
        read: impl FnOnce(&[f32]) -> u64,
    ) -> u64 {
        let m = self.shared.model.read();
        match m.chains.get(&id) {
            Some(c) => chain::read_region(&m, c, channel, start, count, read),
            None => 0,
        }
    }

    /// Write a region of every channel lying within a single sub-buffer; `write` runs once per
    /// channel.  No-op returning 0 if the chain is unknown or not fully allocated.
    ///
    /// # Safety
    /// The caller must guarantee exclusive access to the named frames; only one simultaneous
    /// writer is supported.
    pub unsafe fn write_chain_region(
        &self,
        _caller: impl Rt,
        id: ChainId,
        start: u64,
        count: u64,
        write: impl FnMut(&mut [f32], u16) -> u64,
    ) -> u64 {
        let m = self.shared.model.read();
        match m.chains.get(&id) {
            Some(c) => chain::write_region(&m, c, start, count, write),
            None => 0,
        }
    }

    /// Read one sample per entry of `frames` for every channel, in order.  Out-of-range entries
    /// read as 0.
    ///
    /// # Safety
    /// As for [`Creel::read_chain_region`].
    pub unsafe fn read_chain_random(
        &self,
        _caller: impl Rt,
        id: ChainId,
        frames: &[i64; VECTOR_FRAMES],
        read: impl FnMut(f32, u16, usize),
    ) {
        let m = self.shared.model.read();
        if let Some(c) = m.chains.get(&id) {
            chain::read_random(&m, c, frames, read);
        }
    }

    /// Write one sample per entry of `frames` for every channel from `provider`.  Out-of-range
    /// entries are skipped.
    ///
    /// # Safety
    /// As for [`Creel::write_chain_region`].
    pub unsafe fn write_chain_random(
        &self,
        _caller: impl Rt,
        id: ChainId,
        frames: &[i64; VECTOR_FRAMES],
        provider: impl FnMut(u16, usize) -> f32,
    ) {
        let m = self.shared.model.read();
        if let Some(c) = m.chains.get(&id) {
            chain::write_random(&m, c, frames, provider);
        }
    }

    /// Read an arbitrary span of every channel in chunks of at most `CHUNK` frames, breaking at
    /// sub-buffer boundaries.
    ///
    /// # Safety
    /// As for [`Creel::read_chain_region`].
    pub unsafe fn read_chain<const CHUNK: usize>(
        &self,
        _caller: impl Rt,
        id: ChainId,
        start: u64,
        count: u64,
        read: impl FnMut(&[f32], u16, u64) -> u64,
    ) -> u64 {
        let m = self.shared.model.read();
        match m.chains.get(&id) {
            Some(c) => chain::read_chunked_all::<CHUNK>(&m, c, start, count, read),
            None => 0,
        }
    }

    /// Write an arbitrary span of every channel in chunks of at most `CHUNK` frames, breaking at
    /// sub-buffer boundaries.
    ///
    /// # Safety
    /// As for [`Creel::write_chain_region`].
    pub unsafe fn write_chain<const CHUNK: usize>(
        &self,
        _caller: impl Rt,
        id: ChainId,
        start: u64,
        count: u64,
        write: impl FnMut(&mut [f32], u16, u64) -> u64,
    ) -> u64 {
        let m = self.shared.model.read();
        match m.chains.get(&id) {
            Some(c) => chain::write_chunked_all::<CHUNK>(&m, c, start, count, write),
            None => 0,
        }
    }

    // catch buffers ---------------------------------------------------------------

    /// Create a catch buffer of logical capacity `frame_count`; the chain underneath holds twice
    /// that so recording and playback can share it.
    pub fn make_catch_buffer(
        &self,
        _caller: impl Nort,
        channel_count: u16,
        frame_count: u64,
        options: ChainOptions,
        client_data: ClientData,
    ) -> CatchBufferId {
        let mut id = None;
        self.shared.model.update_publish(|m| {
            let (m, new_id) =
                catch_buffer::make_catch_buffer(m, channel_count, frame_count, options, client_data.clone());
            id = Some(new_id);
            m
        });
        if !options.allocate_now {
            self.wake_allocator();
        }
        id.expect("publish ran")
    }

    /// Destroy a catch buffer and the chain it owns.
    pub fn erase_catch_buffer(&self, _caller: impl Nort, id: CatchBufferId) -> Result<()> {
        let mut found = false;
        self.shared.model.update_publish(|m| {
            found = m.catch_buffers.contains_key(&id);
            if found {
                catch_buffer::erase(m, id)
            } else {
                m
            }
        });
        self.wake_allocator();
        if found {
            Ok(())
        } else {
            Err(Error::UnknownCatchBuffer(id))
        }
    }

    /// Give the catch buffer a new shape.  The old chain is replaced within one publish and all
    /// recorded material is discarded.
    pub fn reconfigure_catch_buffer(
        &self,
        _caller: impl Nort,
        id: CatchBufferId,
        channel_count: u16,
        frame_count: u64,
    ) -> Result<()> {
        let mut found = false;
        self.shared.model.update_publish(|m| {
            found = m.catch_buffers.contains_key(&id);
            if found {
                catch_buffer::reconfigure(m, id, channel_count, frame_count)
            } else {
                m
            }
        });
        self.wake_allocator();
        if found {
            Ok(())
        } else {
            Err(Error::UnknownCatchBuffer(id))
        }
    }

    /// Per-quantum processing for a mono catch buffer: gate-and-record the input, then produce
    /// the playback output (both rows carry the single channel).
    pub fn process_catch_buffer_mono(
        &self,
        _audio: AudioT,
        id: CatchBufferId,
        input: &Block,
        threshold: f32,
        gain: f32,
        disable_recording: bool,
    ) -> StereoBlock {
        let m = self.shared.model.read();
        match m.catch_buffers.get(&id) {
            Some(cbuf) => {
                catch_buffer::process_mono(&m, cbuf, &self.shared.to_ui, input, threshold, gain, disable_recording)
            }
            None => {
                debug_assert!(false, "processing unknown {id}");
                [[0.0; VECTOR_FRAMES]; 2]
            }
        }
    }

    /// Per-quantum processing for a stereo catch buffer.
    pub fn process_catch_buffer_stereo(
        &self,
        _audio: AudioT,
        id: CatchBufferId,
        input: &StereoBlock,
        threshold: f32,
        gain: f32,
        disable_recording: bool,
    ) -> StereoBlock {
        let m = self.shared.model.read();
        match m.catch_buffers.get(&id) {
            Some(cbuf) => {
                catch_buffer::process_stereo(&m, cbuf, &self.shared.to_ui, input, threshold, gain, disable_recording)
            }
            None => {
                debug_assert!(false, "processing unknown {id}");
                [[0.0; VECTOR_FRAMES]; 2]
            }
        }
    }

    /// Begin one-shot playback of `region`.  The region is published, the playback marker is
    /// stored immediately for UI visibility, and the audio participant starts on its next update.
    pub fn start_catch_buffer_playback(&self, _ui: UiT, id: CatchBufferId, region: Region) -> Result<()> {
        let model = self
            .shared
            .model
            .update_publish(|m| catch_buffer::set_playback_region(m, id, region));
        let cbuf = model.catch_buffers.get(&id).ok_or(Error::UnknownCatchBuffer(id))?;
        cbuf.service.ui.borrow_mut().playback_active = true;
        // Stored here only so the UI can observe the marker before the audio thread dispatches
        // the command; the audio side stores it again on dispatch.
        cbuf.service
            .critical
            .playback_marker
            .store(region.beg, std::sync::atomic::Ordering::Relaxed);
        self.shared.to_audio.send(UiToAudio::PlaybackStart { id });
        Ok(())
    }

    pub fn stop_catch_buffer_playback(&self, _ui: UiT, id: CatchBufferId) -> Result<()> {
        let m = self.shared.model.read();
        let cbuf = m.catch_buffers.get(&id).ok_or(Error::UnknownCatchBuffer(id))?;
        cbuf.service.ui.borrow_mut().playback_active = false;
        self.shared.to_audio.send(UiToAudio::PlaybackStop { id });
        Ok(())
    }

    // catch buffer queries --------------------------------------------------------

    pub fn catch_buffer_channel_count(&self, _ui: UiT, id: CatchBufferId) -> Result<u16> {
        let m = self.shared.model.read();
        let cbuf = m.catch_buffers.get(&id).ok_or(Error::UnknownCatchBuffer(id))?;
        Ok(catch_buffer::channel_count(&m, cbuf))
    }

    /// The catch buffer's logical capacity P.
    pub fn catch_buffer_frame_count(&self, _ui: UiT, id: CatchBufferId) -> Result<u64> {
        let m = self.shared.model.read();
        let cbuf = m.catch_buffers.get(&id).ok_or(Error::UnknownCatchBuffer(id))?;
        Ok(catch_buffer::frame_count(&m, cbuf))
    }

    /// The write position in playback coordinates `[0, P)`.
    pub fn catch_buffer_write_marker(&self, _ui: UiT, id: CatchBufferId) -> Result<u64> {
        let m = self.shared.model.read();
        let cbuf = m.catch_buffers.get(&id).ok_or(Error::UnknownCatchBuffer(id))?;
        Ok(catch_buffer::write_marker(&m, cbuf))
    }

    /// The playback position in playback coordinates `[0, P)`.
    pub fn catch_buffer_playback_marker(&self, _ui: UiT, id: CatchBufferId) -> Result<u64> {
        let m = self.shared.model.read();
        let cbuf = m.catch_buffers.get(&id).ok_or(Error::UnknownCatchBuffer(id))?;
        Ok(catch_buffer::playback_marker(&m, cbuf))
    }

    pub fn catch_buffer_is_recording(&self, _ui: UiT, id: CatchBufferId) -> Result<bool> {
        let m = self.shared.model.read();
        let cbuf = m.catch_buffers.get(&id).ok_or(Error::UnknownCatchBuffer(id))?;
        Ok(catch_buffer::is_record_active(cbuf))
    }

    pub fn catch_buffer_is_playing(&self, _ui: UiT, id: CatchBufferId) -> Result<bool> {
        let m = self.shared.model.read();
        let cbuf = m.catch_buffers.get(&id).ok_or(Error::UnknownCatchBuffer(id))?;
        Ok(catch_buffer::is_playback_active_ui(cbuf))
    }

    pub fn set_catch_buffer_mipmaps_enabled(
        &self,
        _caller: impl Nort,
        id: CatchBufferId,
        enabled: bool,
    ) -> Result<()> {
        let mut found = false;
        self.shared.model.update_publish(|m| {
            match m.catch_buffers.get(&id).cloned() {
                Some(cbuf) => {
                    found = true;
                    chain::set_mipmaps_enabled(m, cbuf.chain, enabled)
                }
                None => m,
            }
        });
        if found {
            Ok(())
        } else {
            Err(Error::UnknownCatchBuffer(id))
        }
    }

    /// Read `count` frames of one channel through the partition transform, so the result is
    /// always the most recent consistent material.
    pub fn read_catch_buffer(
        &self,
        _caller: impl Nort,
        id: CatchBufferId,
        channel: u16,
        start: u64,
        count: u64,
        read: impl FnMut(&[f32], u64) -> u64,
    ) -> Result<u64> {
        let m = self.shared.model.read();
        let cbuf = m.catch_buffers.get(&id).ok_or(Error::UnknownCatchBuffer(id))?;
        let chain = &m.chains[&cbuf.chain];
        if channel >= chain.channel_count {
            return Err(Error::ChannelOutOfRange {
                channel,
                channel_count: chain.channel_count,
            });
        }
        Ok(catch_buffer::read(&m, cbuf, chain, channel, start, count, read))
    }

    /// Bulk-copy `count` frames into `dest` (one slice per channel), starting at `src_start`
    /// modulo the capacity.
    pub fn copy_catch_buffer(
        &self,
        _caller: impl Nort,
        id: CatchBufferId,
        src_start: u64,
        dest: &mut [&mut [f32]],
        dest_start: usize,
        count: u64,
    ) -> Result<u64> {
        let m = self.shared.model.read();
        let cbuf = m.catch_buffers.get(&id).ok_or(Error::UnknownCatchBuffer(id))?;
        Ok(catch_buffer::copy(&m, cbuf, src_start, dest, dest_start, count))
    }

    /// Read the peak view at a fractional offset in playback coordinates.
    pub fn read_catch_buffer_mipmap(
        &self,
        _ui: UiT,
        id: CatchBufferId,
        bin_size: f32,
        channel: u16,
        frame: f64,
    ) -> Result<MinMax> {
        let m = self.shared.model.read();
        let cbuf = m.catch_buffers.get(&id).ok_or(Error::UnknownCatchBuffer(id))?;
        Ok(catch_buffer::read_mipmap(&m, cbuf, bin_size, channel, frame))
    }

    // handles ---------------------------------------------------------------------

    /// Create a chain owned by the returned handle; dropping the handle erases it.
    pub fn chain(
        &self,
        caller: impl Nort,
        channel_count: u16,
        frame_count: u64,
        options: ChainOptions,
        client_data: ClientData,
    ) -> ChainHandle<'_> {
        ChainHandle {
            service: self,
            id: self.make_chain(caller, channel_count, frame_count, options, client_data),
        }
    }

    /// Create a catch buffer owned by the returned handle; dropping the handle erases it.
    pub fn catch_buffer(
        &self,
        caller: impl Nort,
        channel_count: u16,
        frame_count: u64,
        options: ChainOptions,
        client_data: ClientData,
    ) -> CatchBufferHandle<'_> {
        CatchBufferHandle {
            service: self,
            id: self.make_catch_buffer(caller, channel_count, frame_count, options, client_data),
        }
    }
}

impl Drop for Creel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Owning handle to a chain; erases it on drop.
pub struct ChainHandle<'c> {
    service: &'c Creel,
    id: ChainId,
}

impl ChainHandle<'_> {
    pub fn id(&self) -> ChainId {
        self.id
    }

    /// Release ownership without erasing the chain.
    pub fn into_id(self) -> ChainId {
        let id = self.id;
        std::mem::forget(self);
        id
    }

    pub fn is_ready(&self, ui: UiT) -> Result<bool> {
        self.service.chain_is_ready(ui, self.id)
    }

    pub fn frame_count(&self, ui: UiT) -> Result<u64> {
        self.service.chain_frame_count(ui, self.id)
    }

    pub fn resize(&self, caller: impl Nort, frame_count: u64) -> Result<()> {
        self.service.resize_chain(caller, self.id, frame_count)
    }

    pub fn set_mipmaps_enabled(&self, caller: impl Nort, enabled: bool) -> Result<()> {
        self.service.set_chain_mipmaps_enabled(caller, self.id, enabled)
    }

    pub fn read_mipmap(&self, ui: UiT, bin_size: f32, channel: u16, frame: f32) -> Result<MinMax> {
        self.service.read_chain_mipmap(ui, self.id, bin_size, channel, frame)
    }

    pub fn clear_mipmap(&self, ui: UiT) -> Result<()> {
        self.service.clear_chain_mipmap(ui, self.id)
    }
}

impl Drop for ChainHandle<'_> {
    fn drop(&mut self) {
        let _ = self.service.erase_chain(NortT, self.id);
    }
}

/// Owning handle to a catch buffer; erases it on drop.
pub struct CatchBufferHandle<'c> {
    service: &'c Creel,
    id: CatchBufferId,
}

impl CatchBufferHandle<'_> {
    pub fn id(&self) -> CatchBufferId {
        self.id
    }

    /// Release ownership without erasing the catch buffer.
    pub fn into_id(self) -> CatchBufferId {
        let id = self.id;
        std::mem::forget(self);
        id
    }

    pub fn playback_start(&self, ui: UiT, region: Region) -> Result<()> {
        self.service.start_catch_buffer_playback(ui, self.id, region)
    }

    pub fn playback_stop(&self, ui: UiT) -> Result<()> {
        self.service.stop_catch_buffer_playback(ui, self.id)
    }

    pub fn reconfigure(&self, caller: impl Nort, channel_count: u16, frame_count: u64) -> Result<()> {
        self.service
            .reconfigure_catch_buffer(caller, self.id, channel_count, frame_count)
    }

    pub fn frame_count(&self, ui: UiT) -> Result<u64> {
        self.service.catch_buffer_frame_count(ui, self.id)
    }

    pub fn channel_count(&self, ui: UiT) -> Result<u16> {
        self.service.catch_buffer_channel_count(ui, self.id)
    }

    pub fn write_marker(&self, ui: UiT) -> Result<u64> {
        self.service.catch_buffer_write_marker(ui, self.id)
    }

    pub fn playback_marker(&self, ui: UiT) -> Result<u64> {
        self.service.catch_buffer_playback_marker(ui, self.id)
    }

    pub fn is_recording(&self, ui: UiT) -> Result<bool> {
        self.service.catch_buffer_is_recording(ui, self.id)
    }

    pub fn is_playing(&self, ui: UiT) -> Result<bool> {
        self.service.catch_buffer_is_playing(ui, self.id)
    }
}

impl Drop for CatchBufferHandle<'_> {
    fn drop(&mut self) {
        let _ = self.service.erase_catch_buffer(NortT, self.id);
    }
}

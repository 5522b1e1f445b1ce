//! The published world model.
//!
//! [`Model`] is an immutable value built from persistent collections: replacing one entity clones
//! only the spine of the containers, so publishing a new snapshot is cheap and every participant
//! keeps reading its own consistent view for as long as it holds one.  Mutation happens only
//! through `Model -> Model` transformer functions (see `chain`, `pool`, `catch_buffer`,
//! `alloc_thread`) applied inside the publisher's serialized update.
//!
//! Entities whose real-time state must be shared across snapshots hold it out-of-band in `Arc`ed
//! service structs, split by the participant allowed to touch each part: a `critical` section of
//! atomics, an `audio` section behind `AtomicRefCell` that only the audio participant borrows,
//! and a `ui` section likewise reserved to the UI participant.

use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;

use atomic_refcell::AtomicRefCell;

use crate::client_data::ClientData;
use crate::ids::{BufferIdx, CatchBufferId, ChainId};
use crate::mipmap::PeakMipmap;
use crate::peak_gate::PeakGate;
use crate::region::{DirtyRegion, Region};
use crate::storage::{SampleStorage, StagingBytes};

/// Options recognized when creating a chain (or the chain under a catch buffer).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ChainOptions {
    /// Allocate every sub-buffer synchronously within the creating publish instead of handing the
    /// chain to the background allocator.
    pub allocate_now: bool,
    /// Maintain the down-sampled peak view for this chain.
    pub enable_mipmaps: bool,
    /// Suppress all UI events for this chain.
    pub silent: bool,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct ChainFlags {
    pub(crate) loading: bool,
    pub(crate) generate_mipmaps: bool,
    pub(crate) silent: bool,
}

// buffer pool -----------------------------------------------------------------------

/// Pool bookkeeping for one sub-buffer slot.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct BufferInfo {
    pub(crate) in_use: bool,
}

/// Audio-participant-only side of a sub-buffer service.
#[derive(Default)]
pub(crate) struct BufferAudioSide {
    /// Span written since the audio thread last staged this buffer's mipmap bytes.
    pub(crate) dirty: DirtyRegion,
}

/// State shared between participants, synchronized as documented per field.
pub(crate) struct BufferCritical {
    /// Raw samples; exclusion is the caller's responsibility (see `storage`).
    pub(crate) storage: SampleStorage,
    /// Encoded bytes in flight from audio to UI; guarded by the staging token.
    pub(crate) staging: StagingBytes,
    /// Span of `staging` the UI has not consumed yet; guarded by the staging token.
    pub(crate) dirty: AtomicRefCell<DirtyRegion>,
}

/// UI-participant-only side of a sub-buffer service.
pub(crate) struct BufferUiSide {
    pub(crate) mipmap: PeakMipmap,
}

/// Shared per-sub-buffer state.  One of these lives as long as any snapshot or chain references
/// its slot; the slot's storage is recycled, never freed.
pub(crate) struct BufferService {
    pub(crate) critical: BufferCritical,
    pub(crate) audio: AtomicRefCell<BufferAudioSide>,
    pub(crate) ui: AtomicRefCell<BufferUiSide>,
}

impl BufferService {
    pub(crate) fn new(channel_count: u16) -> Arc<BufferService> {
        Arc::new(BufferService {
            critical: BufferCritical {
                storage: SampleStorage::new(channel_count),
                staging: StagingBytes::new(channel_count),
                dirty: AtomicRefCell::new(DirtyRegion::default()),
            },
            audio: AtomicRefCell::new(BufferAudioSide::default()),
            ui: AtomicRefCell::new(BufferUiSide {
                mipmap: PeakMipmap::new(channel_count),
            }),
        })
    }
}

/// All pool slots of one channel count: parallel in-use flags and service handles.
#[derive(Clone, Default)]
pub(crate) struct BufferTable {
    pub(crate) info: im::Vector<BufferInfo>,
    pub(crate) services: im::Vector<Arc<BufferService>>,
}

// chain -----------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub(crate) struct Chain {
    pub(crate) id: ChainId,
    pub(crate) flags: ChainFlags,
    pub(crate) load_progress: f32,
    pub(crate) channel_count: u16,
    pub(crate) frame_count: u64,
    /// Present exactly when the chain is ready to be read or written.
    pub(crate) buffers: Option<im::Vector<BufferIdx>>,
    pub(crate) client_data: ClientData,
}

// Identity and client payload are deliberately not compared: the UI diff wants "did anything the
// host can observe change", and persistent-map diffing prunes on this.
impl PartialEq for Chain {
    fn eq(&self, other: &Chain) -> bool {
        self.flags == other.flags
            && self.load_progress == other.load_progress
            && self.channel_count == other.channel_count
            && self.frame_count == other.frame_count
            && self.buffers == other.buffers
    }
}

impl Chain {
    pub(crate) fn is_loading(&self) -> bool {
        self.flags.loading
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.buffers.is_some()
    }

    pub(crate) fn generates_ui_events(&self) -> bool {
        !self.flags.silent
    }

    pub(crate) fn generates_mipmaps(&self) -> bool {
        self.flags.generate_mipmaps
    }
}

/// Allocator-side descriptor for a chain that has not yet acquired all of its sub-buffers.
#[derive(Clone, PartialEq)]
pub(crate) struct LoadingChain {
    /// Position of this descriptor in the loading queue.
    pub(crate) idx: usize,
    /// The chain this descriptor is loading for.
    pub(crate) user: ChainId,
    pub(crate) channel_count: u16,
    /// Sub-buffers acquired so far.
    pub(crate) buffers: im::Vector<BufferIdx>,
}

// catch buffer ----------------------------------------------------------------------

/// Markers and flags shared between the audio and UI participants.
pub(crate) struct CatchCritical {
    /// Next write position in chain coordinates `[0, 2P)`.  Written with release ordering so a
    /// partitioned read deriving from it sees the samples it covers.
    pub(crate) write_marker: AtomicU64,
    /// Current playback position in chain coordinates.
    pub(crate) playback_marker: AtomicU64,
    pub(crate) record_active: AtomicBool,
}

/// Audio-participant-only catch-buffer state.
pub(crate) struct CatchAudioSide {
    pub(crate) peak_gate: PeakGate,
    /// Write position at which the current recording started.
    pub(crate) record_start: u64,
    pub(crate) playback_active: bool,
}

/// UI-participant-only catch-buffer state.
#[derive(Default)]
pub(crate) struct CatchUiSide {
    pub(crate) playback_active: bool,
}

pub(crate) struct CatchBufferService {
    pub(crate) critical: CatchCritical,
    pub(crate) audio: AtomicRefCell<CatchAudioSide>,
    pub(crate) ui: AtomicRefCell<CatchUiSide>,
}

impl CatchBufferService {
    pub(crate) fn new(channel_count: u16) -> Arc<CatchBufferService> {
        Arc::new(CatchBufferService {
            critical: CatchCritical {
                write_marker: AtomicU64::new(0),
                playback_marker: AtomicU64::new(0),
                record_active: AtomicBool::new(false),
            },
            audio: AtomicRefCell::new(CatchAudioSide {
                peak_gate: PeakGate::new(channel_count),
                record_start: 0,
                playback_active: false,
            }),
            ui: AtomicRefCell::new(CatchUiSide::default()),
        })
    }
}

#[derive(Clone)]
pub(crate) struct CatchBuffer {
    pub(crate) id: CatchBufferId,
    /// The owned chain; its frame count is twice the catch buffer's logical capacity.
    pub(crate) chain: ChainId,
    /// Remembered so reconfiguring can recreate the chain with the same options.
    pub(crate) chain_options: ChainOptions,
    pub(crate) client_data: ClientData,
    pub(crate) service: Arc<CatchBufferService>,
    pub(crate) playback_region: Region,
}

impl PartialEq for CatchBuffer {
    fn eq(&self, other: &CatchBuffer) -> bool {
        self.chain == other.chain
            && self.chain_options == other.chain_options
            && self.playback_region == other.playback_region
            && Arc::ptr_eq(&self.service, &other.service)
    }
}

// root ------------------------------------------------------------------------------

/// The immutable root published between participants.
#[derive(Clone, Default)]
pub(crate) struct Model {
    /// Sub-buffer pool, grouped by channel count.
    pub(crate) buffers: im::OrdMap<u16, BufferTable>,
    pub(crate) chains: im::OrdMap<ChainId, Chain>,
    pub(crate) catch_buffers: im::OrdMap<CatchBufferId, CatchBuffer>,
    /// Pending work for the background allocator, drained from the back.
    pub(crate) loading_chains: im::Vector<LoadingChain>,
    pub(crate) next_id: i32,
}

impl Model {
    pub(crate) fn mint_chain_id(&mut self) -> ChainId {
        self.next_id += 1;
        ChainId(self.next_id)
    }

    pub(crate) fn mint_catch_buffer_id(&mut self) -> CatchBufferId {
        self.next_id += 1;
        CatchBufferId(self.next_id)
    }
}

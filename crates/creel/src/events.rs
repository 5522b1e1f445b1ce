use crate::client_data::ClientData;
use crate::ids::{CatchBufferId, ChainId};
use crate::region::Region;

/// Events delivered to the host from the UI participant's per-frame update.
///
/// Entity-scoped variants carry the entity's opaque [`ClientData`] so hosts can route them
/// without a side table.
#[derive(Clone)]
pub enum Event {
    /// A chain began background loading.
    ChainLoadBegin { chain: ChainId, client_data: ClientData },
    /// A chain finished loading or was erased while loading.
    ChainLoadEnd { chain: ChainId, client_data: ClientData },
    /// Background loading progress moved; `progress` is in `[0, 1]`.
    ChainLoadProgress {
        chain: ChainId,
        progress: f32,
        client_data: ClientData,
    },
    /// A chain's down-sampled peak view changed since the last UI frame.
    ChainMipmapChanged { chain: ChainId, client_data: ClientData },
    /// The record gate opened; `beg` is the write position at which recording started.
    RecordingStarted {
        catch_buffer: CatchBufferId,
        beg: u64,
        client_data: ClientData,
    },
    /// The record gate closed; `region` is the recorded span in playback coordinates.
    RecordingFinished {
        catch_buffer: CatchBufferId,
        region: Region,
        client_data: ClientData,
    },
    /// One-shot playback ran off the end of its region.
    PlaybackFinished {
        catch_buffer: CatchBufferId,
        client_data: ClientData,
    },
    /// The audio-to-UI event queue overflowed; some notifications were dropped.
    QueueOverflow { len_approx: usize },
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::ChainLoadBegin { chain, .. } => write!(f, "ChainLoadBegin({chain})"),
            Event::ChainLoadEnd { chain, .. } => write!(f, "ChainLoadEnd({chain})"),
            Event::ChainLoadProgress { chain, progress, .. } => {
                write!(f, "ChainLoadProgress({chain}, {progress})")
            }
            Event::ChainMipmapChanged { chain, .. } => write!(f, "ChainMipmapChanged({chain})"),
            Event::RecordingStarted { catch_buffer, beg, .. } => {
                write!(f, "RecordingStarted({catch_buffer}, beg={beg})")
            }
            Event::RecordingFinished { catch_buffer, region, .. } => {
                write!(f, "RecordingFinished({catch_buffer}, {region:?})")
            }
            Event::PlaybackFinished { catch_buffer, .. } => {
                write!(f, "PlaybackFinished({catch_buffer})")
            }
            Event::QueueOverflow { len_approx } => write!(f, "QueueOverflow(~{len_approx})"),
        }
    }
}

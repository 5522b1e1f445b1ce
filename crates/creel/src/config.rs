/// Frames in one pooled sub-buffer.
///
/// Every chain is realized as a list of sub-buffers of exactly this many frames, so this is the
/// granularity of pool allocation and of the background loading thread's per-step work.  Must be a
/// power of two; region arithmetic throughout the crate relies on it.
pub const SUB_BUFFER_FRAMES: u64 = 1 << 14;

/// Frames processed per audio callback quantum.
///
/// This is the smallest unit of catch-buffer record and playback, and divides
/// [`SUB_BUFFER_FRAMES`] so that a quantum-sized write never straddles two sub-buffers.
pub const VECTOR_FRAMES: usize = 64;

/// One channel's worth of one audio quantum.
pub type Block = [f32; VECTOR_FRAMES];

/// Two-row output of catch-buffer processing. Mono chains are broadcast to both rows.
pub type StereoBlock = [Block; 2];

/// Capacity of each cross-thread message queue.
pub(crate) const MSG_QUEUE_CAPACITY: usize = 1024;

const _: () = assert!(SUB_BUFFER_FRAMES.is_power_of_two());
const _: () = assert!(SUB_BUFFER_FRAMES % (VECTOR_FRAMES as u64) == 0);

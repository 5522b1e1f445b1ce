//! Generic chunk pump between a frame producer and a frame consumer.
//!
//! [`pump`] moves `frame_count` frames through a fixed-size chunk, alternating pulls from the
//! input callback with pushes to the output callback.  Either side may declare a region
//! alignment, in which case no single callback invocation ever spans a multiple of that
//! alignment; chain code uses this to break transfers at sub-buffer boundaries.  An optional
//! input-start transform remaps the position handed to the input callback, which is how the catch
//! buffer translates linear read offsets into its partitioned ring.
//!
//! Both callbacks report how many frames they actually handled; reporting fewer than requested
//! ends the pump early.  The return value is the number of frames delivered to the output.

/// Static shape of one pump invocation.
#[derive(Copy, Clone, Debug)]
pub(crate) struct PumpSpec {
    /// Input callback invocations never span a multiple of this.
    pub(crate) input_alignment: Option<u64>,
    /// Output callback invocations never span a multiple of this.
    pub(crate) output_alignment: Option<u64>,
    /// Require `frame_count` to be a whole number of chunks.
    pub(crate) fixed_chunk: bool,
}

/// Largest transfer that starts at `start`, stays under `limit` frames, and does not cross a
/// multiple of `alignment`.  Ending exactly on a boundary is not a crossing.
fn sub_chunk_len(alignment: Option<u64>, start: u64, limit: u64, remaining: u64) -> u64 {
    let mut len = limit;
    if let Some(a) = alignment {
        let next_boundary = (start / a + 1) * a;
        if next_boundary < start + len {
            len = next_boundary - start;
        }
    }
    len.min(remaining)
}

pub(crate) fn pump<const CHUNK: usize>(
    spec: PumpSpec,
    mut input_start: u64,
    mut output_start: u64,
    frame_count: u64,
    mut input: impl FnMut(&mut [f32], u64) -> u64,
    mut output: impl FnMut(&[f32], u64) -> u64,
    input_start_xform: impl Fn(u64) -> u64,
) -> u64 {
    if spec.fixed_chunk {
        debug_assert_eq!(frame_count % CHUNK as u64, 0);
    }
    if frame_count == 0 {
        return 0;
    }

    let mut chunk = [0.0f32; CHUNK];
    let mut written = 0usize;
    let mut read = 0usize;
    let mut input_remaining = frame_count;
    let mut output_remaining = frame_count;

    loop {
        let xformed = input_start_xform(input_start);
        let space = (CHUNK - written) as u64;
        let want = sub_chunk_len(spec.input_alignment, xformed, space, input_remaining);
        let got = input(&mut chunk[written..written + want as usize], xformed);
        debug_assert!(got <= want);
        written += got as usize;
        input_start += got;
        input_remaining -= got;

        let starved = got < want;
        if written == CHUNK || starved || input_remaining == 0 {
            loop {
                let avail = (written - read) as u64;
                if avail == 0 {
                    break;
                }
                let to_write = sub_chunk_len(spec.output_alignment, output_start, avail, output_remaining);
                let put = output(&chunk[read..read + to_write as usize], output_start);
                debug_assert!(put <= to_write);
                read += put as usize;
                output_start += put;
                output_remaining -= put;
                if put < to_write || output_remaining == 0 {
                    return frame_count - output_remaining;
                }
            }
            written = 0;
            read = 0;
            chunk = [0.0; CHUNK];
        }

        if starved || input_remaining == 0 {
            return frame_count - output_remaining;
        }
    }
}

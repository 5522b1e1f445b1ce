//! The background allocator participant.
//!
//! Chains created without `allocate_now` are queued as loading descriptors; this thread drains
//! the queue one sub-buffer per step, so a single step's cost is bounded by one sub-buffer's
//! storage and the publisher is never held for a long run.  Between steps other participants are
//! free to publish, including erasing the chain a descriptor is loading for — the step detects
//! that and releases whatever the descriptor had already acquired.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::chain;
use crate::model::{Chain, LoadingChain, Model};
use crate::pool;
use crate::service::Shared;

/// The allocator re-checks for work and shutdown at least this often, so a wakeup lost to the
/// gap between the emptiness check and the wait only delays progress, never stalls it.
const WAKE_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Release everything a dead descriptor had acquired and drop it from the queue.
pub(crate) fn cancel_loading(mut m: Model, lc: &LoadingChain) -> Model {
    for idx in lc.buffers.iter() {
        m = pool::release(m, lc.channel_count, *idx);
    }
    m.loading_chains.truncate(lc.idx);
    m
}

/// Acquire one more sub-buffer for `lc`; finish the chain if that was the last one.
pub(crate) fn allocate_one(m: Model, mut lc: LoadingChain, chain: &Chain) -> Model {
    debug_assert_eq!(lc.channel_count, chain.channel_count);
    let required = chain::required_buffer_count(chain.frame_count);
    let (m, idx) = pool::acquire(m, chain.channel_count);
    let mut m = pool::set_in_use(m, chain.channel_count, idx);
    lc.buffers.push_back(idx);

    if (lc.buffers.len() as u64) < required {
        let progress = lc.buffers.len() as f32 / required as f32;
        let user = lc.user;
        m.loading_chains.set(lc.idx, lc);
        return chain::set_load_progress(m, user, progress);
    }
    m.loading_chains.truncate(lc.idx);
    chain::finish_loading(m, lc.user, lc.buffers)
}

/// Advance the back descriptor by one sub-buffer (or cancel it).  Returns whether there was
/// anything to do.
pub(crate) fn step(shared: &Shared) -> bool {
    if shared.model.read().loading_chains.is_empty() {
        return false;
    }
    shared.model.update_publish(|m| {
        // Only this thread removes descriptors, so the queue cannot have emptied since the check.
        let lc = m.loading_chains.back().cloned().expect("loading queue emptied under the allocator");
        match m.chains.get(&lc.user).cloned() {
            Some(chain) => allocate_one(m, lc, &chain),
            None => {
                // The chain was erased before loading finished; give its sub-buffers back.
                log::debug!("abandoning load of erased {}", lc.user);
                cancel_loading(m, &lc)
            }
        }
    });
    true
}

pub(crate) fn run(shared: Arc<Shared>) {
    log::info!("buffer allocator thread started");
    loop {
        if shared.stop.load(Ordering::Acquire) {
            break;
        }
        if !step(&shared) {
            let guard = shared.alloc_wait.lock().unwrap();
            let _ = shared.alloc_cv.wait_timeout(guard, WAKE_CHECK_INTERVAL).unwrap();
        }
    }
    log::info!("buffer allocator thread exiting");
}

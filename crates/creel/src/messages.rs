//! Cross-thread command and event messages.
//!
//! Two bounded lock-free queues connect the participants: the UI sends playback commands down to
//! the audio thread, and the audio thread sends recording/playback notifications back up.  Each
//! queue has exactly one producer and one consumer.  Audio-side sends must never block, so a full
//! queue is handled by displacing the oldest entries: the first time it happens a single
//! [`AudioToUi::QueueFull`] notice is forced in ahead of the event, and the UI surfaces it so the
//! host knows notifications were dropped.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::queue::ArrayQueue;

use crate::config::MSG_QUEUE_CAPACITY;
use crate::ids::CatchBufferId;
use crate::region::Region;

#[derive(Copy, Clone, Debug)]
pub(crate) enum UiToAudio {
    PlaybackStart { id: CatchBufferId },
    PlaybackStop { id: CatchBufferId },
}

#[derive(Copy, Clone, Debug)]
pub(crate) enum AudioToUi {
    RecordingStarted { id: CatchBufferId, beg: u64 },
    RecordingFinished { id: CatchBufferId, region: Region },
    PlaybackFinished { id: CatchBufferId },
    QueueFull { len_approx: usize },
}

pub(crate) struct MsgQueue<T> {
    queue: ArrayQueue<T>,
    warned: AtomicBool,
}

impl<T> MsgQueue<T> {
    pub(crate) fn new() -> MsgQueue<T> {
        MsgQueue {
            queue: ArrayQueue::new(MSG_QUEUE_CAPACITY),
            warned: AtomicBool::new(false),
        }
    }

    pub(crate) fn pop(&self) -> Option<T> {
        self.queue.pop()
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }
}

impl MsgQueue<AudioToUi> {
    /// Best-effort send from the audio thread.
    ///
    /// Never blocks.  On overflow, forces a one-shot [`AudioToUi::QueueFull`] notice and then the
    /// event itself, displacing the oldest queued entries.
    pub(crate) fn send(&self, msg: AudioToUi) {
        if self.queue.push(msg).is_err() {
            if !self.warned.swap(true, Ordering::Relaxed) {
                self.queue.force_push(AudioToUi::QueueFull {
                    len_approx: self.queue.len(),
                });
            }
            self.queue.force_push(msg);
        }
    }
}

impl MsgQueue<UiToAudio> {
    /// Send a command to the audio thread, displacing the oldest command if the queue is somehow
    /// full (which would take a thousand unserviced commands).
    pub(crate) fn send(&self, msg: UiToAudio) {
        if self.queue.push(msg).is_err() {
            log::warn!("audio command queue full; displacing the oldest command");
            self.queue.force_push(msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_warns_exactly_once() {
        let q: MsgQueue<AudioToUi> = MsgQueue::new();
        for i in 0..MSG_QUEUE_CAPACITY + 10 {
            q.send(AudioToUi::PlaybackFinished {
                id: CatchBufferId(i as i32),
            });
        }
        let mut warns = 0;
        while let Some(msg) = q.pop() {
            if matches!(msg, AudioToUi::QueueFull { .. }) {
                warns += 1;
            }
        }
        assert_eq!(warns, 1);
    }

    #[test]
    fn overflow_keeps_the_newest_events() {
        let q: MsgQueue<AudioToUi> = MsgQueue::new();
        for i in 0..MSG_QUEUE_CAPACITY * 2 {
            q.send(AudioToUi::PlaybackFinished {
                id: CatchBufferId(i as i32),
            });
        }
        let mut last = None;
        while let Some(msg) = q.pop() {
            if let AudioToUi::PlaybackFinished { id } = msg {
                last = Some(id);
            }
        }
        assert_eq!(last, Some(CatchBufferId(MSG_QUEUE_CAPACITY as i32 * 2 - 1)));
    }
}

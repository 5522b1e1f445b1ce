//! Two-player token guarding the mipmap staging buffers.
//!
//! The audio participant encodes dirty sample spans into each sub-buffer's staging bytes; the UI
//! participant folds them into its mipmap.  Exactly one of the two may touch the staging bytes at
//! a time, and neither may ever wait.  A single atomic word naming the participant whose turn it
//! is gives both properties: a participant runs its work only when the token is oriented to it,
//! then tosses the token across.  A participant that finds the token elsewhere simply skips its
//! work for this tick and retries on the next one.

use std::sync::atomic::{AtomicU8, Ordering};

pub(crate) const AUDIO_CATCHER: u8 = 0;
pub(crate) const UI_CATCHER: u8 = 1;

pub(crate) struct BeachBall {
    holder: AtomicU8,
}

impl BeachBall {
    /// The audio participant holds the token first, since staging must precede consuming.
    pub(crate) fn new() -> BeachBall {
        BeachBall {
            holder: AtomicU8::new(AUDIO_CATCHER),
        }
    }

    /// Run `work` if the token is currently held by `me`, then toss it to `target`.
    ///
    /// Returns `None` without running `work` when the token is elsewhere.  The acquire load
    /// ensures `work` observes everything the previous holder published before its release toss.
    pub(crate) fn with_ball<R>(&self, me: u8, target: u8, work: impl FnOnce() -> R) -> Option<R> {
        if self.holder.load(Ordering::Acquire) != me {
            return None;
        }
        let out = work();
        self.holder.store(target, Ordering::Release);
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_goes_first() {
        let ball = BeachBall::new();
        assert!(ball
            .with_ball(UI_CATCHER, AUDIO_CATCHER, || ())
            .is_none());
        assert!(ball
            .with_ball(AUDIO_CATCHER, UI_CATCHER, || ())
            .is_some());
    }

    #[test]
    fn turns_alternate() {
        let ball = BeachBall::new();
        for _ in 0..3 {
            assert!(ball.with_ball(AUDIO_CATCHER, UI_CATCHER, || ()).is_some());
            // Audio skips while the UI has not caught yet.
            assert!(ball.with_ball(AUDIO_CATCHER, UI_CATCHER, || ()).is_none());
            assert!(ball.with_ball(UI_CATCHER, AUDIO_CATCHER, || ()).is_some());
        }
    }
}

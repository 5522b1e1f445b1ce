//! Thread-tag witnesses.
//!
//! Every public operation names the participant allowed to invoke it by taking one of these
//! zero-sized tokens.  The application constructs one token per participant thread and threads it
//! through its call sites; handing the audio callback only an [`AudioT`] makes calling a blocking
//! operation from it a compile error rather than a glitch report.
//!
//! The tokens carry no runtime state.  They document and enforce the calling convention, nothing
//! more.

/// The audio participant. Hard real-time: operations taking this never lock, block or allocate.
#[derive(Copy, Clone, Debug)]
pub struct AudioT;

/// The UI participant. May block briefly; owns all model mutation and event delivery.
#[derive(Copy, Clone, Debug)]
pub struct UiT;

/// A generic non-real-time caller (the background allocator holds one of these).
#[derive(Copy, Clone, Debug)]
pub struct NortT;

/// A generic real-time caller that is not the audio participant.
#[derive(Copy, Clone, Debug)]
pub struct RtT;

/// Participants allowed to invoke operations that may lock or allocate.
pub trait Nort: Copy {}

/// Participants running under real-time constraints; operations taking this are wait-free.
pub trait Rt: Copy {}

impl Nort for UiT {}
impl Nort for NortT {}

impl Rt for AudioT {}
impl Rt for RtT {}

use crate::ids::{CatchBufferId, ChainId};

#[non_exhaustive]
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("no such chain: {}", .0)]
    UnknownChain(ChainId),

    #[error("no such catch buffer: {}", .0)]
    UnknownCatchBuffer(CatchBufferId),

    #[error("channel {} out of range for a {}-channel entity", channel, channel_count)]
    ChannelOutOfRange { channel: u16, channel_count: u16 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

mod alloc_thread;
mod beach_ball;
mod catch_buffer;
mod chain;
mod client_data;
mod config;
mod error;
mod events;
mod ids;
mod messages;
mod mipmap;
mod model;
mod peak_gate;
mod pool;
mod processor;
mod publisher;
mod region;
mod service;
mod storage;
mod tags;

pub use client_data::{client_data, client_data_as, ClientData};
pub use config::{Block, StereoBlock, SUB_BUFFER_FRAMES, VECTOR_FRAMES};
pub use error::{Error, Result};
pub use events::Event;
pub use ids::{CatchBufferId, ChainId};
pub use mipmap::MinMax;
pub use model::ChainOptions;
pub use region::Region;
pub use service::{CatchBufferHandle, ChainHandle, Creel};
pub use tags::{AudioT, Nort, NortT, Rt, RtT, UiT};

//! Discord-facing rendering helpers: embeds, chunking, streaming edits,
//! status reactions, tool timers and the stop button.

pub mod chunker;
pub mod embeds;
pub mod status;
pub mod stop;
pub mod streamer;
pub mod timer;

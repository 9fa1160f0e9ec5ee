pub mod channel;

pub use channel::{channel, Channel, ChannelSource, Publisher};

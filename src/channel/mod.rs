// Bounded-channel primitive: fixed-capacity FIFO handoff between producers
// and consumers
mod bounded;
mod flow;

pub use bounded::{BoundedChannel, ChannelStats};
pub use flow::{run_producer_consumer, ProducerConsumerConfig, ProducerConsumerReport};

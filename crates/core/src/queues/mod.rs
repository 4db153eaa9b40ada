pub mod bounded_drop_newest_queue;
pub mod fifo_drop_oldest_queue;
pub mod isolated_forwarder;
pub mod latest1_queue;

pub use bounded_drop_newest_queue::*;
pub use fifo_drop_oldest_queue::*;
pub use isolated_forwarder::*;
pub use latest1_queue::*;

/// How a subscriber's inbox behaves when events arrive faster than it drains them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueKind {
    /// Keep only the newest value. Suited to state snapshots.
    Latest1,
    /// Keep the newest `capacity` values, evicting the oldest.
    FifoDropOldest { capacity: usize },
    /// Keep the first `capacity` values, rejecting newer ones while full.
    BoundedDropNewest { capacity: usize },
    /// Forward through a dedicated task with its own buffer.
    Isolated { output_buffer: usize },
}

//! Adapters: background tasks and observer implementations that connect
//! the correlator to a running connection.

pub mod channel_observer;
pub mod dispatcher;
pub mod sweeper;

pub use channel_observer::ChannelObserver;
pub use dispatcher::{dispatch_loop, spawn_dispatcher, DispatchSummary, InboundEvent};
pub use sweeper::{spawn_sweeper, sweep_task, SweeperHandle};

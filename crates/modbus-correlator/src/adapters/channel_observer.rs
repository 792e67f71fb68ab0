//! Response observer that forwards delivered frames into a channel.

use modbus_types::DecodedFrame;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{trace, warn};

use crate::ports::ResponseObserver;

/// Forwards copies of delivered frames to a bounded mpsc channel.
///
/// The dispatch path never waits on a slow subscriber: when the channel is
/// full the copy is dropped and a warning logged.
pub struct ChannelObserver<R> {
    sender: mpsc::Sender<DecodedFrame<R>>,
}

impl<R> ChannelObserver<R> {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<DecodedFrame<R>>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl<R> ResponseObserver<R> for ChannelObserver<R>
where
    R: Clone + Send + Sync,
{
    fn on_response(&self, frame: &DecodedFrame<R>) {
        match self.sender.try_send(frame.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                warn!(
                    transaction_id = %dropped.transaction_id(),
                    "Response subscriber is lagging, notification dropped"
                );
            }
            Err(TrySendError::Closed(_)) => {
                trace!("Response subscriber gone");
            }
        }
    }
}

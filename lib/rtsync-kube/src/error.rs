use rtsync_core::QueueClosed;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Node watch stream ended")]
    StreamEnded,

    #[error(transparent)]
    QueueClosed(#[from] QueueClosed),
}

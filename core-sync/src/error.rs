use bridge_traits::error::BridgeError;
use core_media::MediaError;
use core_reports::ReportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Report store error: {0}")]
    Store(#[from] ReportError),

    #[error("Image error: {0}")]
    Media(#[from] MediaError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;

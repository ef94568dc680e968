use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Configuration error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Report store error: {0}")]
    Reports(#[from] core_reports::ReportError),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Remote error: {0}")]
    Remote(#[from] core_sync::UploadError),
}

pub type Result<T> = std::result::Result<T, CoreError>;

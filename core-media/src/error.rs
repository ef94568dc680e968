use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Source image not found: {0}")]
    SourceNotFound(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image task failed: {0}")]
    Task(String),
}

impl MediaError {
    /// Whether the input itself is unusable. Such failures never get better
    /// on retry.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, MediaError::Decode(_) | MediaError::SourceNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;

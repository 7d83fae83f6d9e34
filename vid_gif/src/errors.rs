use thiserror::Error;

#[derive(Error, Debug)]
pub enum VidGifError {
    #[error("Input video not found: {0}")]
    InputMissing(String),

    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("FFmpeg failed: {0}")]
    FFmpegError(String),

    #[error("Frame decoder not built in (rebuild with --features libav)")]
    DecoderUnavailable,

    #[error("Failed to decode video: {0}")]
    DecodeError(String),

    #[error("GIF encoding failed: {0}")]
    EncodeError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VidGifError>;

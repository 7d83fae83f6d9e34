use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Effective conversion parameters. Encoders receive them through
/// [`ConversionRequest`] and declare no defaults of their own.
pub const TARGET_FPS: u32 = 5;
pub const TARGET_WIDTH: u32 = 480;

/// Fixed filenames used when the binary runs without arguments.
pub const DEFAULT_INPUT: &str = "game_screenshot.mp4";
pub const DEFAULT_OUTPUT: &str = "game_demo.gif";

/// Above this output size the report advises lowering fps or width.
pub const SIZE_ADVISORY_BYTES: u64 = 10 * 1024 * 1024;

/// Which encoder wrote the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncodePath {
    /// Two-pass palettegen/paletteuse through the external transcoder
    PaletteTranscode,
    /// In-process decode, decimate, downscale, re-encode
    FrameSampling,
}

impl EncodePath {
    pub fn as_str(&self) -> &str {
        match self {
            EncodePath::PaletteTranscode => "palette transcode (ffmpeg)",
            EncodePath::FrameSampling => "frame sampling (built-in)",
        }
    }
}

/// One conversion run, immutable once built at the entry point
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Target frame rate, frames per second
    pub fps: u32,
    /// Frames wider than this are downscaled, aspect preserved
    pub max_width: u32,
}

impl ConversionRequest {
    pub fn new(input: PathBuf, output: PathBuf) -> Self {
        Self {
            input,
            output,
            fps: TARGET_FPS,
            max_width: TARGET_WIDTH,
        }
    }
}

impl Default for ConversionRequest {
    fn default() -> Self {
        Self::new(PathBuf::from(DEFAULT_INPUT), PathBuf::from(DEFAULT_OUTPUT))
    }
}

/// Conversion outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReport {
    pub success: bool,
    pub input_path: String,
    pub output_path: String,
    /// Which path wrote the output (None when nothing ran to completion)
    pub encoder: Option<EncodePath>,
    pub output_size: Option<u64>,
    pub message: String,
}

impl ConversionReport {
    pub fn failure(request: &ConversionRequest, encoder: Option<EncodePath>, message: String) -> Self {
        Self {
            success: false,
            input_path: request.input.display().to_string(),
            output_path: request.output.display().to_string(),
            encoder,
            output_size: None,
            message,
        }
    }

    pub fn output_size_mib(&self) -> Option<f64> {
        self.output_size.map(|bytes| bytes as f64 / (1024.0 * 1024.0))
    }

    /// True when the GIF came out larger than the advisory threshold.
    pub fn oversized(&self) -> bool {
        self.output_size
            .is_some_and(|bytes| bytes > SIZE_ADVISORY_BYTES)
    }
}

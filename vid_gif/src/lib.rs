//! vid_gif - Video to Animated GIF Conversion
//!
//! Turns a short gameplay capture into a looping animated GIF. Two encode
//! paths, tried in order:
//! - Palette transcode: external ffmpeg two-pass (palettegen → paletteuse)
//! - Frame sampling: built-in decode, decimate and downscale fallback
//!
//! ```rust,ignore
//! use vid_gif::{convert, ConversionRequest};
//!
//! // game_screenshot.mp4 → game_demo.gif
//! let report = convert(&ConversionRequest::default());
//! if report.success {
//!     println!("wrote {}", report.output_path);
//! }
//! ```

pub mod conversion_api;
pub mod conversion_types;
pub mod errors;
pub mod ffmpeg_gif;
pub mod frame_sampler;
pub mod gif_stream;
pub mod logging;
#[cfg(feature = "libav")]
pub mod video_reader;

pub use conversion_api::{convert, convert_with};
pub use conversion_types::{
    ConversionReport, ConversionRequest, EncodePath, DEFAULT_INPUT, DEFAULT_OUTPUT,
    SIZE_ADVISORY_BYTES, TARGET_FPS, TARGET_WIDTH,
};

pub use errors::{Result, VidGifError};

//! In-process fallback encoder: decode frames, keep every Nth, downscale the
//! wide ones, stream the rest into a GIF.

use crate::conversion_types::ConversionRequest;
use crate::errors::Result;
use image::imageops::FilterType;
use image::RgbImage;

/// Integer decimation factor between the source rate and the target rate.
///
/// Floor division, so non-integral ratios shift the effective output rate: a
/// 24 fps source sampled to 5 fps keeps every 4th frame, an effective 6 fps.
/// Unknown or non-positive rates degrade to a stride of 1 (keep everything).
pub fn frame_stride(native_fps: f64, target_fps: u32) -> u64 {
    if !native_fps.is_finite() || native_fps <= 0.0 || target_fps == 0 {
        return 1;
    }
    ((native_fps / target_fps as f64).floor() as u64).max(1)
}

/// Output dimensions for a frame: untouched at or below `max_width`, scaled
/// down to `max_width` with the height recomputed proportionally (rounded to
/// nearest, at least 1) above it.
pub fn scaled_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width {
        return (width, height);
    }
    let scaled_height = (height as f64 * max_width as f64 / width as f64).round() as u32;
    (max_width, scaled_height.max(1))
}

/// Lazily decimates and downscales a frame stream. Decode errors surface
/// whatever their index; only well-decoded frames are subject to the stride.
pub fn sample_frames<I>(
    frames: I,
    stride: u64,
    max_width: u32,
) -> impl Iterator<Item = Result<RgbImage>>
where
    I: Iterator<Item = Result<RgbImage>>,
{
    let stride = stride.max(1);
    frames.enumerate().filter_map(move |(index, frame)| {
        match frame {
            Err(e) => Some(Err(e)),
            Ok(frame) if index as u64 % stride == 0 => Some(Ok(downscale(frame, max_width))),
            Ok(_) => None,
        }
    })
}

fn downscale(frame: RgbImage, max_width: u32) -> RgbImage {
    let (width, height) = scaled_dimensions(frame.width(), frame.height(), max_width);
    if width == frame.width() {
        frame
    } else {
        image::imageops::resize(&frame, width, height, FilterType::Triangle)
    }
}

/// Converts through the in-process pipeline: libav decode, temporal
/// decimation, spatial downscale, streaming GIF encode.
#[cfg(feature = "libav")]
pub fn encode(request: &ConversionRequest) -> Result<()> {
    use crate::video_reader::VideoReader;
    use tracing::{debug, info};

    info!("📹 Reading video file...");
    let reader = VideoReader::open(&request.input)?;
    let native_fps = reader.native_fps();
    let stride = frame_stride(native_fps, request.fps);
    debug!(native_fps, stride, target_fps = request.fps, "Sampling plan");

    info!("🎨 Converting to GIF...");
    match stream_into_gif(reader, request, stride) {
        Ok(written) => {
            debug!(frames = written, "Frame sampling complete");
            Ok(())
        }
        Err(e) => {
            // The writer may have left a partial file behind.
            let _ = std::fs::remove_file(&request.output);
            Err(e)
        }
    }
}

#[cfg(feature = "libav")]
fn stream_into_gif(
    reader: crate::video_reader::VideoReader,
    request: &ConversionRequest,
    stride: u64,
) -> Result<u64> {
    use crate::gif_stream::GifStreamWriter;

    let mut writer = GifStreamWriter::create(&request.output, request.fps);
    for frame in sample_frames(reader.frames(), stride, request.max_width) {
        writer.append(&frame?)?;
    }
    writer.finish()
}

/// Without the `libav` feature there is no in-process decoder; report the
/// missing dependency so the caller can surface the install hint.
#[cfg(not(feature = "libav"))]
pub fn encode(_request: &ConversionRequest) -> Result<()> {
    Err(crate::errors::VidGifError::DecoderUnavailable)
}

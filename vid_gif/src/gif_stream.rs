//! Streaming GIF writer for the frame-sampling path.
//!
//! The underlying encoder needs frame dimensions before it can emit the GIF
//! header, so neither the file nor the header exists until the first frame
//! arrives. Frames are quantized and written one at a time; the trailer goes
//! out when the writer is dropped after [`GifStreamWriter::finish`].

use crate::errors::{Result, VidGifError};
use gif::{Encoder, Frame, Repeat};
use image::RgbImage;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Per-frame quantization speed, 1 (best) to 30 (fastest).
const QUANTIZE_SPEED: i32 = 10;

/// Frame delay in hundredths of a second, as stored in the GIF graphics
/// control extension.
fn frame_delay(fps: u32) -> u16 {
    (100.0 / fps.max(1) as f64).round() as u16
}

pub struct GifStreamWriter {
    path: PathBuf,
    delay: u16,
    encoder: Option<Encoder<File>>,
    frames_written: u64,
}

impl GifStreamWriter {
    /// Targets `path` at `fps`. No file is created until the first `append`.
    pub fn create(path: &Path, fps: u32) -> Self {
        Self {
            path: path.to_path_buf(),
            delay: frame_delay(fps),
            encoder: None,
            frames_written: 0,
        }
    }

    pub fn append(&mut self, frame: &RgbImage) -> Result<()> {
        let width = dimension(frame.width())?;
        let height = dimension(frame.height())?;

        if self.encoder.is_none() {
            self.encoder = Some(open_encoder(&self.path, width, height)?);
        }
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| VidGifError::EncodeError("GIF stream not open".to_string()))?;

        let mut gif_frame = Frame::from_rgb_speed(width, height, frame.as_raw(), QUANTIZE_SPEED);
        gif_frame.delay = self.delay;

        encoder
            .write_frame(&gif_frame)
            .map_err(|e| VidGifError::EncodeError(format!("GIF frame write: {}", e)))?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Finalizes the stream and returns the frame count. A stream that never
    /// received a frame is an error; no file exists in that case.
    pub fn finish(self) -> Result<u64> {
        if self.encoder.is_none() {
            return Err(VidGifError::EncodeError(format!(
                "no frames to write to {}",
                self.path.display()
            )));
        }
        // Dropping the encoder writes the GIF trailer.
        Ok(self.frames_written)
    }
}

fn open_encoder(path: &Path, width: u16, height: u16) -> Result<Encoder<File>> {
    let file = File::create(path)?;
    let mut encoder = Encoder::new(file, width, height, &[])
        .map_err(|e| VidGifError::EncodeError(format!("GIF header: {}", e)))?;
    encoder
        .set_repeat(Repeat::Infinite)
        .map_err(|e| VidGifError::EncodeError(format!("GIF loop flag: {}", e)))?;
    Ok(encoder)
}

/// GIF stores dimensions as u16; anything wider has to be downscaled first.
fn dimension(value: u32) -> Result<u16> {
    u16::try_from(value)
        .map_err(|_| VidGifError::EncodeError(format!("frame dimension {} exceeds GIF limits", value)))
}

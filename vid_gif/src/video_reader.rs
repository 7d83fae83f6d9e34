//! libav-backed frame source for the fallback path.
//!
//! Opens the container, picks the best video stream, and exposes the decoded
//! frames as a consuming iterator of RGB rasters. The native frame rate comes
//! from stream metadata, which matters because this path runs exactly when
//! the external ffmpeg toolchain is absent.

use crate::errors::{Result, VidGifError};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::error::EAGAIN;
use image::RgbImage;
use std::path::Path;

pub struct VideoReader {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::decoder::Video,
    scaler: ffmpeg::software::scaling::context::Context,
    native_fps: f64,
}

impl VideoReader {
    pub fn open(path: &Path) -> Result<Self> {
        ffmpeg::init().map_err(|e| VidGifError::DecodeError(format!("libav init: {}", e)))?;

        let input = ffmpeg::format::input(&path).map_err(|e| {
            VidGifError::DecodeError(format!("failed to open {}: {}", path.display(), e))
        })?;

        let (stream_index, native_fps, parameters) = {
            let stream = input
                .streams()
                .best(ffmpeg::media::Type::Video)
                .ok_or_else(|| {
                    VidGifError::DecodeError(format!("no video stream in {}", path.display()))
                })?;
            let fps = rate_to_fps(stream.avg_frame_rate())
                .or_else(|| rate_to_fps(stream.rate()))
                .unwrap_or(0.0);
            (stream.index(), fps, stream.parameters())
        };

        let context = ffmpeg::codec::context::Context::from_parameters(parameters)
            .map_err(|e| VidGifError::DecodeError(format!("decoder parameters: {}", e)))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| VidGifError::DecodeError(format!("no usable video decoder: {}", e)))?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::format::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .map_err(|e| VidGifError::DecodeError(format!("scaler setup: {}", e)))?;

        Ok(Self {
            input,
            stream_index,
            decoder,
            scaler,
            native_fps,
        })
    }

    /// Native frame rate from stream metadata; 0.0 when the container does
    /// not report one (callers degrade to a stride of 1).
    pub fn native_fps(&self) -> f64 {
        self.native_fps
    }

    /// Consuming frame iterator. Finite, not restartable.
    pub fn frames(self) -> Frames {
        Frames {
            reader: self,
            eof_sent: false,
            finished: false,
        }
    }
}

fn rate_to_fps(rate: ffmpeg::Rational) -> Option<f64> {
    if rate.numerator() > 0 && rate.denominator() > 0 {
        Some(rate.numerator() as f64 / rate.denominator() as f64)
    } else {
        None
    }
}

pub struct Frames {
    reader: VideoReader,
    eof_sent: bool,
    finished: bool,
}

impl Frames {
    fn convert(&mut self, decoded: &ffmpeg::frame::Video) -> Result<RgbImage> {
        let mut rgb = ffmpeg::frame::Video::empty();
        self.reader
            .scaler
            .run(decoded, &mut rgb)
            .map_err(|e| VidGifError::DecodeError(format!("pixel conversion: {}", e)))?;

        let width = rgb.width();
        let height = rgb.height();
        let stride = rgb.stride(0);
        let data = rgb.data(0);
        let row_len = width as usize * 3;

        // libav pads each scanline out to the stride; copy row by row.
        let mut pixels = Vec::with_capacity(row_len * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            pixels.extend_from_slice(&data[start..start + row_len]);
        }

        RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| VidGifError::DecodeError("scaled frame has unexpected size".to_string()))
    }

    /// Feeds the decoder the next packet of our stream, or signals EOF once
    /// the container is exhausted. Returns an error to surface, if any.
    fn pump(&mut self) -> Option<VidGifError> {
        loop {
            let mut packet = ffmpeg::Packet::empty();
            match packet.read(&mut self.reader.input) {
                Ok(()) => {
                    if packet.stream() != self.reader.stream_index {
                        continue;
                    }
                    if let Err(e) = self.reader.decoder.send_packet(&packet) {
                        return Some(VidGifError::DecodeError(format!("packet submit: {}", e)));
                    }
                    return None;
                }
                Err(ffmpeg::Error::Eof) => {
                    if let Err(e) = self.reader.decoder.send_eof() {
                        if e != ffmpeg::Error::Eof {
                            return Some(VidGifError::DecodeError(format!(
                                "decoder flush: {}",
                                e
                            )));
                        }
                    }
                    self.eof_sent = true;
                    return None;
                }
                Err(e) => {
                    return Some(VidGifError::DecodeError(format!("packet read: {}", e)));
                }
            }
        }
    }
}

impl Iterator for Frames {
    type Item = Result<RgbImage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            let mut decoded = ffmpeg::frame::Video::empty();
            match self.reader.decoder.receive_frame(&mut decoded) {
                Ok(()) => return Some(self.convert(&decoded)),
                Err(ffmpeg::Error::Eof) => {
                    self.finished = true;
                    return None;
                }
                Err(ffmpeg::Error::Other { errno: EAGAIN }) => {
                    if self.eof_sent {
                        // Drained without an explicit Eof; treat as the end.
                        self.finished = true;
                        return None;
                    }
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(VidGifError::DecodeError(format!("frame decode: {}", e))));
                }
            }

            if let Some(e) = self.pump() {
                self.finished = true;
                return Some(Err(e));
            }
        }
    }
}

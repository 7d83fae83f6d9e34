//! Conversion orchestration.
//!
//! Tries the external palette transcode first. If the transcoder is missing
//! or either of its passes fails, falls back to the built-in frame sampler.
//! The fallback runs at most once per conversion; its failure is final.

use crate::conversion_types::{ConversionReport, ConversionRequest, EncodePath};
use crate::errors::VidGifError;
use crate::{ffmpeg_gif, frame_sampler};
use std::fs;
use tracing::{info, warn};

pub fn convert(request: &ConversionRequest) -> ConversionReport {
    convert_with(ffmpeg_gif::TRANSCODER, request)
}

/// Same as [`convert`], against an arbitrary transcoder binary.
pub fn convert_with(transcoder: &str, request: &ConversionRequest) -> ConversionReport {
    if !request.input.exists() {
        let e = VidGifError::InputMissing(request.input.display().to_string());
        return ConversionReport::failure(request, None, e.to_string());
    }

    info!(
        "🎬 Converting {} → {}",
        request.input.display(),
        request.output.display()
    );

    match ffmpeg_gif::encode_with(transcoder, request) {
        Ok(()) => return finish(request, EncodePath::PaletteTranscode),
        Err(VidGifError::ToolNotFound(tool)) => {
            info!(
                "⚠️ External transcoder not available ({}), falling back to built-in sampling...",
                tool
            );
        }
        Err(e) => {
            warn!(
                "⚠️ Palette transcode failed: {}. Falling back to built-in sampling...",
                e
            );
        }
    }

    match frame_sampler::encode(request) {
        Ok(()) => finish(request, EncodePath::FrameSampling),
        Err(e @ VidGifError::DecoderUnavailable) => {
            ConversionReport::failure(request, None, e.to_string())
        }
        Err(e) => ConversionReport::failure(request, None, format!("Conversion failed: {}", e)),
    }
}

fn finish(request: &ConversionRequest, encoder: EncodePath) -> ConversionReport {
    match fs::metadata(&request.output).map(|m| m.len()).ok() {
        Some(size) if size > 0 => {
            info!(
                "✅ Converted with {}: {}",
                encoder.as_str(),
                request.output.display()
            );
            ConversionReport {
                success: true,
                input_path: request.input.display().to_string(),
                output_path: request.output.display().to_string(),
                encoder: Some(encoder),
                output_size: Some(size),
                message: format!("Converted with {}", encoder.as_str()),
            }
        }
        _ => ConversionReport::failure(
            request,
            Some(encoder),
            "Output file missing after conversion".to_string(),
        ),
    }
}

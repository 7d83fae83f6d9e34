//! External two-pass GIF transcode.
//!
//! First pass generates an optimized 256-color palette (`palettegen`), second
//! pass renders the GIF against it (`paletteuse`). Both passes share the same
//! fps/scale filter chain so the palette is sampled from exactly the frames
//! that end up in the output.

use crate::conversion_types::ConversionRequest;
use crate::errors::{Result, VidGifError};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// The external transcoder both passes run through.
pub const TRANSCODER: &str = "ffmpeg";

/// Intermediate palette location. Fixed name in the system temp dir; the
/// `-y` on the palette pass overwrites whatever a previous run left behind.
pub fn palette_path() -> PathBuf {
    std::env::temp_dir().join("vid_gif_palette.png")
}

pub fn is_transcoder_available() -> bool {
    is_command_available(TRANSCODER)
}

/// Probes with `-version`, the one version flag ffmpeg understands.
pub fn is_command_available(command_name: &str) -> bool {
    Command::new(command_name)
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

pub fn encode(request: &ConversionRequest) -> Result<()> {
    encode_with(TRANSCODER, request)
}

/// Runs the probe and both passes as one unit against an arbitrary
/// transcoder binary. Any failure aborts the whole unit; no pass is retried.
pub fn encode_with(transcoder: &str, request: &ConversionRequest) -> Result<()> {
    if !is_command_available(transcoder) {
        return Err(VidGifError::ToolNotFound(transcoder.to_string()));
    }

    let palette = palette_path();

    struct PaletteGuard<'a> {
        path: &'a Path,
    }
    impl<'a> Drop for PaletteGuard<'a> {
        fn drop(&mut self) {
            if self.path.exists() {
                if let Err(e) = fs::remove_file(self.path) {
                    eprintln!("⚠️ [cleanup] Failed to remove temp palette file: {}", e);
                }
            }
        }
    }
    let _palette_guard = PaletteGuard { path: &palette };

    generate_palette(transcoder, request, &palette)?;
    render_with_palette(transcoder, request, &palette)
}

fn generate_palette(transcoder: &str, request: &ConversionRequest, palette: &Path) -> Result<()> {
    info!("🎨 Generating optimized palette...");
    let result = Command::new(transcoder)
        .arg("-i")
        .arg(safe_path_arg(&request.input).as_ref())
        .arg("-vf")
        .arg(format!(
            "fps={},scale={}:-1:flags=lanczos,palettegen=reserve_transparent=0",
            request.fps, request.max_width
        ))
        .arg("-y")
        .arg(safe_path_arg(palette).as_ref())
        .output();

    match result {
        Ok(output_cmd) if output_cmd.status.success() => Ok(()),
        Ok(output_cmd) => {
            let stderr = String::from_utf8_lossy(&output_cmd.stderr);
            Err(VidGifError::FFmpegError(format!(
                "palettegen failed: {}",
                summarize_stderr(&stderr)
            )))
        }
        Err(e) => Err(VidGifError::ToolNotFound(format!("{}: {}", transcoder, e))),
    }
}

fn render_with_palette(
    transcoder: &str,
    request: &ConversionRequest,
    palette: &Path,
) -> Result<()> {
    info!("🎬 Rendering GIF with palette...");
    let result = Command::new(transcoder)
        .arg("-i")
        .arg(safe_path_arg(&request.input).as_ref())
        .arg("-i")
        .arg(safe_path_arg(palette).as_ref())
        .arg("-filter_complex")
        .arg(format!(
            "fps={},scale={}:-1:flags=lanczos[x];[x][1:v]paletteuse=dither=bayer:bayer_scale=5",
            request.fps, request.max_width
        ))
        .arg("-y")
        .arg(safe_path_arg(&request.output).as_ref())
        .output();

    match result {
        Ok(output_cmd) if output_cmd.status.success() => {
            let output_size = fs::metadata(&request.output).map(|m| m.len()).unwrap_or(0);
            if output_size == 0 {
                let _ = fs::remove_file(&request.output);
                return Err(VidGifError::FFmpegError(
                    "GIF output file is empty (encoding may have failed)".to_string(),
                ));
            }
            Ok(())
        }
        Ok(output_cmd) => {
            let stderr = String::from_utf8_lossy(&output_cmd.stderr);
            let _ = fs::remove_file(&request.output);
            Err(VidGifError::FFmpegError(format!(
                "paletteuse failed: {}",
                summarize_stderr(&stderr)
            )))
        }
        Err(e) => {
            let _ = fs::remove_file(&request.output);
            Err(VidGifError::ToolNotFound(format!("{}: {}", transcoder, e)))
        }
    }
}

/// Pulls the most useful line out of ffmpeg's stderr wall of text.
fn summarize_stderr(stderr: &str) -> String {
    // Prefer the last line that mentions an error
    if let Some(error_line) = stderr
        .lines()
        .rev()
        .find(|line| line.contains("Error") || line.contains("error"))
    {
        return error_line.trim().to_string();
    }

    // Otherwise the last meaningful line, skipping progress spam
    stderr
        .lines()
        .rev()
        .find(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty()
                && !trimmed.starts_with("frame=")
                && !trimmed.starts_with("fps=")
                && !trimmed.starts_with("size=")
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "Unknown FFmpeg error".to_string())
}

fn safe_path_arg(path: &Path) -> Cow<'_, str> {
    let s = path.to_string_lossy();
    if s.starts_with('-') {
        // Prepend ./ so the transcoder cannot mistake the path for a flag
        Cow::Owned(format!("./{}", s))
    } else {
        s
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Scripted stand-ins for the external transcoder. Each script logs its
    //! argv (one line per invocation) so tests can assert which passes ran
    //! and with what filters.

    use std::path::Path;
    use std::sync::Mutex;

    /// The palette lives at one fixed path per process, so every test that
    /// drives a scripted transcode must hold this lock.
    pub(crate) static PALETTE_LOCK: Mutex<()> = Mutex::new(());

    #[cfg(unix)]
    pub(crate) fn stub_transcoder(dir: &Path, script: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("stub_ffmpeg");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    pub(crate) fn well_behaved_script(log: &Path) -> String {
        format!(
            r#"#!/bin/sh
printf '%s\n' "$*" >> "{log}"
for last; do :; done
case "$*" in
  *-version*) ;;
  *palettegen*) printf 'palette' > "$last" ;;
  *paletteuse*) printf 'GIF89a' > "$last" ;;
  *) exit 1 ;;
esac
exit 0
"#,
            log = log.display()
        )
    }

    #[cfg(unix)]
    pub(crate) fn probe_fails_script(log: &Path) -> String {
        format!(
            r#"#!/bin/sh
printf '%s\n' "$*" >> "{log}"
exit 1
"#,
            log = log.display()
        )
    }

    #[cfg(unix)]
    pub(crate) fn palette_pass_fails_script(log: &Path) -> String {
        format!(
            r#"#!/bin/sh
printf '%s\n' "$*" >> "{log}"
case "$*" in
  *-version*) exit 0 ;;
  *palettegen*) printf 'Error reinitializing filters!\n' >&2; exit 1 ;;
esac
exit 0
"#,
            log = log.display()
        )
    }

    #[cfg(unix)]
    pub(crate) fn render_pass_fails_script(log: &Path) -> String {
        format!(
            r#"#!/bin/sh
printf '%s\n' "$*" >> "{log}"
for last; do :; done
case "$*" in
  *-version*) exit 0 ;;
  *palettegen*) printf 'palette' > "$last"; exit 0 ;;
  *paletteuse*) printf 'Error writing trailer\n' >&2; exit 1 ;;
esac
exit 0
"#,
            log = log.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_rejects_missing_command() {
        assert!(!is_command_available("definitely_not_a_real_transcoder_9f2"));
    }

    #[test]
    fn palette_path_is_fixed_in_temp_dir() {
        let path = palette_path();
        assert!(path.starts_with(std::env::temp_dir()));
        assert_eq!(path.file_name().unwrap(), "vid_gif_palette.png");
    }

    #[test]
    fn stderr_summary_prefers_the_last_error_line() {
        let stderr = "Error opening filters\nframe=   10 fps=0.0\nError while filtering: out of memory\n";
        assert_eq!(
            summarize_stderr(stderr),
            "Error while filtering: out of memory"
        );
        // Error lines win even when progress spam comes after them
        let stderr = "Input #0, mov\nError while filtering: out of memory\nframe=   10";
        assert_eq!(
            summarize_stderr(stderr),
            "Error while filtering: out of memory"
        );
    }

    #[test]
    fn stderr_summary_skips_progress_lines() {
        let stderr = "Stream mapping:\n  Stream #0:0 -> #0:0\nframe=   10 fps=0.0\nsize=  2kB\n";
        assert_eq!(summarize_stderr(stderr), "Stream #0:0 -> #0:0");
    }

    #[test]
    fn stderr_summary_has_a_fallback() {
        assert_eq!(summarize_stderr(""), "Unknown FFmpeg error");
        assert_eq!(summarize_stderr("frame=1\nfps=0.0\n"), "Unknown FFmpeg error");
    }

    #[test]
    fn dash_paths_get_a_safe_prefix() {
        assert_eq!(safe_path_arg(Path::new("normal.mp4")), "normal.mp4");
        assert_eq!(safe_path_arg(Path::new("/abs/path.mp4")), "/abs/path.mp4");
        assert_eq!(safe_path_arg(Path::new("-dash.mp4")), "./-dash.mp4");
    }

    #[cfg(unix)]
    mod scripted {
        use super::super::test_support::*;
        use super::super::*;
        use tempfile::TempDir;

        fn read_log(log: &Path) -> Vec<String> {
            fs::read_to_string(log)
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }

        fn request_in(dir: &Path) -> ConversionRequest {
            let input = dir.join("clip.mp4");
            fs::write(&input, b"mp4").unwrap();
            ConversionRequest::new(input, dir.join("clip.gif"))
        }

        #[test]
        fn full_run_cleans_palette_and_writes_output() {
            let _guard = PALETTE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            let dir = TempDir::new().unwrap();
            let log = dir.path().join("calls.log");
            let stub = stub_transcoder(dir.path(), &well_behaved_script(&log));
            let request = request_in(dir.path());

            encode_with(stub.to_str().unwrap(), &request).unwrap();

            let palette = palette_path();
            let lines = read_log(&log);
            assert_eq!(lines.len(), 3, "probe + two passes: {:?}", lines);
            assert_eq!(lines[0], "-version");
            assert!(lines[1].contains("palettegen=reserve_transparent=0"));
            assert!(lines[1].contains("fps=5,scale=480:-1:flags=lanczos"));
            assert!(lines[1].ends_with(&format!("-y {}", palette.display())));
            assert!(lines[2].contains("paletteuse=dither=bayer:bayer_scale=5"));
            assert!(lines[2].contains(&format!("-i {}", palette.display())));
            assert!(lines[2].ends_with(&format!("-y {}", request.output.display())));

            assert!(!palette.exists(), "palette must be cleaned up");
            assert_eq!(fs::read(&request.output).unwrap(), b"GIF89a");
        }

        #[test]
        fn failed_probe_stops_before_any_pass() {
            let _guard = PALETTE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            let dir = TempDir::new().unwrap();
            let log = dir.path().join("calls.log");
            let stub = stub_transcoder(dir.path(), &probe_fails_script(&log));
            let request = request_in(dir.path());

            let err = encode_with(stub.to_str().unwrap(), &request).unwrap_err();
            assert!(matches!(err, VidGifError::ToolNotFound(_)));
            assert_eq!(read_log(&log), vec!["-version"]);
            assert!(!request.output.exists());
        }

        #[test]
        fn failed_palette_pass_skips_the_render_pass() {
            let _guard = PALETTE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            let dir = TempDir::new().unwrap();
            let log = dir.path().join("calls.log");
            let stub = stub_transcoder(dir.path(), &palette_pass_fails_script(&log));
            let request = request_in(dir.path());

            let err = encode_with(stub.to_str().unwrap(), &request).unwrap_err();
            match err {
                VidGifError::FFmpegError(msg) => {
                    assert!(msg.contains("palettegen failed"), "{}", msg);
                    assert!(msg.contains("Error reinitializing filters!"), "{}", msg);
                }
                other => panic!("unexpected error: {:?}", other),
            }
            let lines = read_log(&log);
            assert_eq!(lines.len(), 2, "probe + palette pass only: {:?}", lines);
            assert!(!lines.iter().any(|l| l.contains("paletteuse")));
            assert!(!palette_path().exists());
            assert!(!request.output.exists());
        }

        #[test]
        fn failed_render_pass_still_cleans_palette() {
            let _guard = PALETTE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            let dir = TempDir::new().unwrap();
            let log = dir.path().join("calls.log");
            let stub = stub_transcoder(dir.path(), &render_pass_fails_script(&log));
            let request = request_in(dir.path());

            let err = encode_with(stub.to_str().unwrap(), &request).unwrap_err();
            match err {
                VidGifError::FFmpegError(msg) => {
                    assert!(msg.contains("paletteuse failed"), "{}", msg);
                    assert!(msg.contains("Error writing trailer"), "{}", msg);
                }
                other => panic!("unexpected error: {:?}", other),
            }
            assert_eq!(read_log(&log).len(), 3);
            assert!(!palette_path().exists(), "palette must be cleaned up");
            assert!(!request.output.exists(), "partial output must be removed");
        }

        #[test]
        fn stale_palette_from_a_previous_run_is_replaced() {
            let _guard = PALETTE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            let dir = TempDir::new().unwrap();
            let log = dir.path().join("calls.log");
            let stub = stub_transcoder(dir.path(), &well_behaved_script(&log));
            let request = request_in(dir.path());

            fs::write(palette_path(), b"stale junk from an interrupted run").unwrap();

            encode_with(stub.to_str().unwrap(), &request).unwrap();
            assert!(!palette_path().exists());
            assert_eq!(fs::read(&request.output).unwrap(), b"GIF89a");
        }
    }
}

//! Audio extraction and segmentation with ffmpeg/ffprobe.

use crate::error::{LecternError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// One slice of a longer recording.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSlice {
    pub path: PathBuf,
    /// Where the slice starts in the original recording.
    pub offset_seconds: f64,
}

/// Extracts the audio track of a media file into an MP3 under `output_dir`.
///
/// The output is named after the source file stem plus `stem_suffix`, so
/// concurrent jobs over files with the same name do not collide.
#[instrument(skip(output_dir), fields(source = %source.display()))]
pub async fn extract_audio(source: &Path, output_dir: &Path, stem_suffix: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(output_dir).await?;

    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("media");
    let target = output_dir.join(format!("{}-{}.mp3", stem, stem_suffix));

    info!("Extracting audio track");
    let mut args = input_args(source);
    args.extend(["-vn", "-map", "a", "-codec:a", "libmp3lame", "-q:a", "0"].map(OsString::from));
    args.extend(output_args(&target));

    run_tool("ffmpeg", args).await?;
    Ok(target)
}

/// Cuts `source` into slices of about `slice_seconds` each for upload.
///
/// Recordings no longer than one slice come back as a single slice pointing
/// at `source` itself.
#[instrument(skip_all, fields(source = %source.display()))]
pub async fn split_audio(
    source: &Path,
    output_dir: &Path,
    slice_seconds: u32,
) -> Result<Vec<AudioSlice>> {
    let total = probe_duration(source).await?;
    let plan = slice_plan(total, slice_seconds);
    info!("Audio runs {:.1}s, {} slice(s)", total, plan.len());

    if plan.len() <= 1 {
        return Ok(vec![AudioSlice {
            path: source.to_path_buf(),
            offset_seconds: 0.0,
        }]);
    }

    tokio::fs::create_dir_all(output_dir).await?;
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio");

    let mut slices = Vec::with_capacity(plan.len());
    for (idx, (start, length)) in plan.into_iter().enumerate() {
        let path = output_dir.join(format!("{}.part{:03}.mp3", stem, idx));
        cut_slice(source, &path, start, length).await?;
        debug!("Wrote slice {} starting at {:.1}s", idx, start);
        slices.push(AudioSlice {
            path,
            offset_seconds: start,
        });
    }
    Ok(slices)
}

/// `(start, length)` pairs covering `total` seconds in steps of `slice_seconds`.
fn slice_plan(total: f64, slice_seconds: u32) -> Vec<(f64, f64)> {
    let step = f64::from(slice_seconds.max(1));
    if !total.is_finite() || total <= step {
        return vec![(0.0, total.max(0.0))];
    }

    let count = (total / step).ceil() as usize;
    (0..count)
        .map(|i| {
            let start = i as f64 * step;
            (start, step.min(total - start))
        })
        .collect()
}

/// Copy the stream when the container allows it, re-encode otherwise.
async fn cut_slice(source: &Path, dest: &Path, start: f64, length: f64) -> Result<()> {
    let copied = run_tool("ffmpeg", slice_args(source, dest, start, length, false)).await;
    match copied {
        Ok(_) if dest.exists() => return Ok(()),
        Err(LecternError::ToolNotFound(tool)) => return Err(LecternError::ToolNotFound(tool)),
        Ok(_) => warn!("Stream copy produced no output, re-encoding slice"),
        Err(e) => warn!("Stream copy failed ({}), re-encoding slice", e),
    }

    run_tool("ffmpeg", slice_args(source, dest, start, length, true)).await?;
    Ok(())
}

fn slice_args(source: &Path, dest: &Path, start: f64, length: f64, reencode: bool) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-ss".into(), format!("{:.3}", start).into()];
    args.extend(input_args(source));
    args.push("-t".into());
    args.push(format!("{:.3}", length).into());
    if reencode {
        args.extend(["-codec:a", "libmp3lame", "-qscale:a", "2"].map(OsString::from));
    } else {
        args.extend(["-c", "copy"].map(OsString::from));
    }
    args.extend(output_args(dest));
    args
}

fn input_args(source: &Path) -> Vec<OsString> {
    vec!["-i".into(), source.as_os_str().to_owned()]
}

fn output_args(dest: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        dest.as_os_str().to_owned(),
    ]
}

/// Length of a media file in seconds, as reported by ffprobe.
async fn probe_duration(path: &Path) -> Result<f64> {
    let mut args: Vec<OsString> = [
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ]
    .map(OsString::from)
    .to_vec();
    args.push(path.as_os_str().to_owned());

    let output = run_tool("ffprobe", args).await?;
    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

fn parse_duration(report: &str) -> Result<f64> {
    report
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.parse::<f64>().ok())
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
        .ok_or_else(|| {
            LecternError::AudioExtraction(format!(
                "Could not determine audio duration from {:?}",
                report.trim()
            ))
        })
}

/// Run an ffmpeg-family tool to completion. A missing binary is
/// `ToolNotFound`; a non-zero exit is `ToolFailed` carrying stderr.
async fn run_tool(program: &str, args: Vec<OsString>) -> Result<Output> {
    let output = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LecternError::ToolNotFound(program.to_string()),
            _ => LecternError::Io(e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(LecternError::ToolFailed(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr.trim()
        )));
    }
    Ok(output)
}

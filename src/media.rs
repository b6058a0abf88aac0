use std::path::Path;
use std::process::Stdio;

use anyhow::Context;
use tokio::process::Command;
use tracing::debug;

/// Fails fast when ffmpeg is not on PATH. Every stage shells out to it, so a
/// missing binary is a startup error, not something to retry.
pub(crate) async fn ensure_ffmpeg() -> anyhow::Result<()> {
    let status = Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .context("ffmpeg not found on the system")?;
    anyhow::ensure!(status.success(), "ffmpeg -version exited with {status}");
    Ok(())
}

async fn run_ffmpeg(args: &[&str]) -> anyhow::Result<()> {
    debug!(?args, "running ffmpeg");
    let output = Command::new("ffmpeg")
        .args(["-nostats", "-loglevel", "error"])
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .context("failed to spawn ffmpeg")?;
    if !output.status.success() {
        anyhow::bail!(
            "ffmpeg {} failed: {}",
            args.first().copied().unwrap_or(""),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

/// Writes a down-scaled, frame-rate-reduced, audio-free copy of `input` for
/// the scene-cut pass. Keeps the detector cheap on large sources.
pub(crate) async fn preprocess(
    input: &Path,
    output: &Path,
    fps: u32,
    height: u32,
) -> anyhow::Result<()> {
    let scale = format!("scale=-2:{height}");
    let fps = fps.to_string();
    run_ffmpeg(&[
        "-i",
        &input.to_string_lossy(),
        "-vf",
        &scale,
        "-r",
        &fps,
        "-preset",
        "ultrafast",
        "-an",
        "-y",
        &output.to_string_lossy(),
    ])
    .await
}

/// Trims `[start, end]` seconds out of `input` without re-encoding.
pub(crate) async fn clip(
    input: &Path,
    output: &Path,
    start_sec: u32,
    end_sec: u32,
) -> anyhow::Result<()> {
    run_ffmpeg(&[
        "-i",
        &input.to_string_lossy(),
        "-ss",
        &start_sec.to_string(),
        "-to",
        &end_sec.to_string(),
        "-c",
        "copy",
        "-y",
        &output.to_string_lossy(),
    ])
    .await
}

/// Concatenates the clips listed in `manifest` into `output` with the concat
/// demuxer. Stream copy only: the inputs must share codec parameters, which
/// holds for clips trimmed from sources that were recorded alike but is not
/// checked here.
pub(crate) async fn concat(manifest: &Path, output: &Path) -> anyhow::Result<()> {
    run_ffmpeg(&[
        "-f",
        "concat",
        "-safe",
        "0",
        "-i",
        &manifest.to_string_lossy(),
        "-c",
        "copy",
        "-y",
        &output.to_string_lossy(),
    ])
    .await
}

/// Container duration in seconds via ffprobe.
pub(crate) async fn probe_duration(input: &Path) -> anyhow::Result<f64> {
    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(input)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .context("failed to spawn ffprobe")?;
    anyhow::ensure!(
        output.status.success(),
        "ffprobe failed for {}",
        input.display()
    );
    let value: serde_json::Value = serde_json::from_slice(&output.stdout)
        .context("ffprobe produced malformed JSON")?;
    duration_from_probe(&value)
        .with_context(|| format!("no duration in ffprobe output for {}", input.display()))
}

fn duration_from_probe(value: &serde_json::Value) -> Option<f64> {
    value["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_parses_from_format_block() {
        let value = serde_json::json!({
            "format": { "duration": "130.466000", "format_name": "mov" }
        });
        assert_eq!(duration_from_probe(&value), Some(130.466));
    }

    #[test]
    fn duration_missing_yields_none() {
        let value = serde_json::json!({ "format": {} });
        assert_eq!(duration_from_probe(&value), None);
        assert_eq!(duration_from_probe(&serde_json::json!({})), None);
    }
}

use std::path::Path;
use std::process::Stdio;

use anyhow::Context;
use tokio::process::Command;
use tracing::debug;

use crate::media;
use crate::workspace::TaskWorkspace;

/// Scene-score threshold on the down-sampled copy; matches the sensitivity
/// the pipeline was tuned with.
const SCENE_THRESHOLD: f64 = 0.45;

const PREPROCESS_FPS: u32 = 2;
const PREPROCESS_HEIGHT: u32 = 720;

/// Detects scene cuts in `source` and returns ordered, non-overlapping
/// `(start, end)` second intervals covering `[0, duration)`. Detection runs
/// on a down-scaled, frame-rate-reduced temporary copy which is deleted
/// afterwards. An empty result means the video is too short to cover a whole
/// second; the caller falls back to a single scene.
pub(crate) async fn detect_scenes(
    source: &Path,
    workspace: &TaskWorkspace,
) -> anyhow::Result<Vec<(u32, u32)>> {
    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("source path has no file name")?;
    let reduced = workspace.dir()?.join(format!("pre_{file_name}"));

    media::preprocess(source, &reduced, PREPROCESS_FPS, PREPROCESS_HEIGHT).await?;
    let duration = media::probe_duration(&reduced).await?;
    let filter_log = run_scene_filter(&reduced).await;
    let _ = std::fs::remove_file(&reduced);
    let cuts = parse_cut_times(&filter_log?);

    let intervals = intervals_from_cuts(&cuts, duration);
    debug!(
        source = %source.display(),
        cuts = cuts.len(),
        scenes = intervals.len(),
        "scene detection finished"
    );
    Ok(intervals)
}

/// Runs the ffmpeg `select` scene filter and returns its log output. The
/// filter prints one `pts_time:` line per detected cut; that requires the
/// info log level, so this does not share the quiet wrapper in `media`.
async fn run_scene_filter(input: &Path) -> anyhow::Result<String> {
    let select = format!("select='gt(scene,{SCENE_THRESHOLD})',metadata=print");
    let output = Command::new("ffmpeg")
        .arg("-i")
        .arg(input)
        .args(["-vf", &select, "-fps_mode", "vfr", "-f", "null", "-"])
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .context("failed to spawn ffmpeg for scene detection")?;
    anyhow::ensure!(
        output.status.success(),
        "scene detection failed for {}",
        input.display()
    );
    Ok(String::from_utf8_lossy(&output.stderr).into_owned())
}

/// Extracts cut timestamps from `metadata=print` log lines, e.g.
/// `[Parsed_metadata_1 @ 0x...] frame:3 pts:152 pts_time:6.08`.
fn parse_cut_times(log: &str) -> Vec<f64> {
    let mut cuts = Vec::new();
    for line in log.lines() {
        if let Some(rest) = line.split("pts_time:").nth(1) {
            if let Some(value) = rest.split_whitespace().next() {
                if let Ok(t) = value.parse::<f64>() {
                    cuts.push(t);
                }
            }
        }
    }
    cuts
}

/// Turns cut timestamps into whole-second scene intervals covering
/// `[0, floor(duration))` with no gaps and no overlaps. Cuts that floor to a
/// repeated or out-of-range second are dropped.
fn intervals_from_cuts(cuts: &[f64], duration: f64) -> Vec<(u32, u32)> {
    let end = duration.floor() as u32;
    if end == 0 {
        return Vec::new();
    }
    let mut bounds = vec![0u32];
    for &cut in cuts {
        let sec = cut.floor() as u32;
        if sec > *bounds.last().unwrap() && sec < end {
            bounds.push(sec);
        }
    }
    bounds.push(end);
    bounds.windows(2).map(|pair| (pair[0], pair[1])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cut_times_parse_from_filter_log() {
        let log = "\
[Parsed_metadata_1 @ 0x55e] frame:2   pts:105   pts_time:4.2
[Parsed_metadata_1 @ 0x55e] lavfi.scene_score=0.532
frame=   12 fps=0.0 q=-0.0 size=N/A
[Parsed_metadata_1 @ 0x55e] frame:7   pts:245   pts_time:9.8
[Parsed_metadata_1 @ 0x55e] lavfi.scene_score=0.671
";
        assert_eq!(parse_cut_times(log), vec![4.2, 9.8]);
    }

    #[test]
    fn intervals_cover_duration_without_gaps() {
        let intervals = intervals_from_cuts(&[4.2, 9.8], 15.9);
        assert_eq!(intervals, vec![(0, 4), (4, 9), (9, 15)]);
    }

    #[test]
    fn no_cuts_yield_one_whole_video_scene() {
        assert_eq!(intervals_from_cuts(&[], 130.4), vec![(0, 130)]);
    }

    #[test]
    fn out_of_range_and_duplicate_cuts_are_dropped() {
        // 0.4 floors to 0 (not after the previous bound), 12.1 and 12.7
        // collapse to the same second, 19.5 is past the end
        let intervals = intervals_from_cuts(&[0.4, 12.1, 12.7, 19.5], 18.0);
        assert_eq!(intervals, vec![(0, 12), (12, 18)]);
    }

    #[test]
    fn sub_second_video_has_no_intervals() {
        assert!(intervals_from_cuts(&[], 0.6).is_empty());
    }
}

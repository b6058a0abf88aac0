use std::path::Path;

use crate::media;
use crate::types::StorylineEntry;
use crate::workspace::TaskWorkspace;

/// Concatenates the storyline clips, in order, into `output`. Stream copy
/// only, so every clip must share codec parameters; clips trimmed by the
/// storyline stage from uniformly recorded sources do.
pub(crate) async fn render_video(
    workspace: &TaskWorkspace,
    entries: &[StorylineEntry],
    output: &Path,
) -> anyhow::Result<()> {
    anyhow::ensure!(!entries.is_empty(), "storyline has no segments to render");
    let manifest_path = workspace.dir()?.join("vid_list.txt");
    std::fs::write(&manifest_path, manifest(entries))?;
    media::concat(&manifest_path, output).await
}

/// Concat-demuxer manifest: one `file '<path>'` line per clip.
fn manifest(entries: &[StorylineEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format!("file '{}'\n", entry.src_file.absolute_path));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VideoFile;

    fn entry(path: &str) -> StorylineEntry {
        StorylineEntry {
            start_time_sec: 0,
            end_time_sec: 10,
            description: String::new(),
            src_file: VideoFile {
                absolute_path: path.to_owned(),
                name: path.rsplit('/').next().unwrap().to_owned(),
            },
        }
    }

    #[test]
    fn manifest_lists_clips_in_storyline_order() {
        let entries = vec![entry("/tmp/t/clips/b.mp4_5_15.mp4"), entry("/tmp/t/clips/a.mp4_0_10.mp4")];
        assert_eq!(
            manifest(&entries),
            "file '/tmp/t/clips/b.mp4_5_15.mp4'\nfile '/tmp/t/clips/a.mp4_0_10.mp4'\n"
        );
    }
}

use std::path::Path;

use anyhow::Context;
use tracing::{info, warn};

use crate::ai::{call_with_retries, ModelClient, MAX_ATTEMPTS};
use crate::media;
use crate::types::{Scene, StorylineEntry, VideoFile, VideoSummary};
use crate::workspace::TaskWorkspace;

const STORY_PROMPT: &str = "Based on the description of the videos, suggest me a story with \
     selected parts of the videos. You can change the order of the input.";

/// Asks the model for a cross-video storyline, then materializes every
/// surviving scene as a stream-copied clip under the task's clip directory.
/// Entry order is the model's narrative order, not source chronology.
pub(crate) async fn generate_storyline(
    client: &ModelClient,
    workspace: &TaskWorkspace,
    summaries: &[VideoSummary],
    prompt: &str,
    duration_min: f64,
) -> anyhow::Result<Vec<StorylineEntry>> {
    let base_blocks = request_blocks(summaries, prompt, duration_min);
    let story = call_with_retries(MAX_ATTEMPTS, |remediation| {
        let mut blocks = base_blocks.clone();
        blocks[0].push_str(&remediation);
        async move { client.compose_story(&blocks).await }
    })
    .await
    .context("storyline generation failed")?;
    info!(title = %story.title, scenes = story.scenes.len(), "storyline received");

    let clips_dir = workspace.clips_dir()?;
    let mut storyline = Vec::with_capacity(story.scenes.len());
    for scene in existing_scenes(story.scenes) {
        let source = Path::new(&scene.file_path);
        let clip_name = clip_file_name(source, scene.start, scene.end);
        let clip_path = clips_dir.join(&clip_name);
        media::clip(source, &clip_path, scene.start, scene.end).await?;
        let absolute = std::fs::canonicalize(&clip_path).unwrap_or(clip_path);
        storyline.push(StorylineEntry {
            start_time_sec: scene.start,
            end_time_sec: scene.end,
            description: scene.story,
            src_file: VideoFile {
                absolute_path: absolute.to_string_lossy().into_owned(),
                name: clip_name,
            },
        });
    }
    Ok(storyline)
}

/// The text blocks of the storyline request: the instruction plus every
/// summary's scene lines, the optional user intent, and the target duration.
fn request_blocks(summaries: &[VideoSummary], prompt: &str, duration_min: f64) -> Vec<String> {
    let mut blocks = vec![format!(
        "{STORY_PROMPT}\n\n{}",
        summary_block(summaries)
    )];
    if !prompt.is_empty() {
        blocks.push(format!(
            "Here is the prompt the user wants the story to be based on:\n{prompt}"
        ));
    }
    blocks.push(format!(
        "The duration of the whole video should be around {duration_min} minutes."
    ));
    blocks
}

fn summary_block(summaries: &[VideoSummary]) -> String {
    let mut block = String::new();
    for summary in summaries {
        for segment in &summary.segments {
            block.push_str(&format!(
                "{} from {} to {}:\n{}\n----------------\n",
                summary.file.absolute_path,
                segment.start_time_sec,
                segment.end_time_sec,
                segment.description
            ));
        }
    }
    block
}

/// Drops scenes whose source file no longer exists; one stale reference must
/// not fail the whole storyline. Survivor order is preserved.
fn existing_scenes(scenes: Vec<Scene>) -> Vec<Scene> {
    scenes
        .into_iter()
        .filter(|scene| {
            let exists = Path::new(&scene.file_path).exists();
            if !exists {
                warn!(file = %scene.file_path, "dropping storyline scene, file does not exist");
            }
            exists
        })
        .collect()
}

fn clip_file_name(source: &Path, start: u32, end: u32) -> String {
    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clip".to_owned());
    format!("{file_name}_{start}_{end}.mp4")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Segment;

    fn sample_summaries() -> Vec<VideoSummary> {
        vec![VideoSummary {
            file: VideoFile {
                absolute_path: "/videos/a.mp4".into(),
                name: "a.mp4".into(),
            },
            summary: "harbor day".into(),
            aesthetic_rating: Some(4),
            segments: vec![
                Segment {
                    start_time_sec: 0,
                    end_time_sec: 60,
                    description: "sunrise".into(),
                    src_file: None,
                },
                Segment {
                    start_time_sec: 60,
                    end_time_sec: 130,
                    description: "boats".into(),
                    src_file: None,
                },
            ],
        }]
    }

    #[test]
    fn summary_block_lists_every_segment_with_its_path() {
        let block = summary_block(&sample_summaries());
        let first = block.find("/videos/a.mp4 from 0 to 60:\nsunrise").unwrap();
        let second = block.find("/videos/a.mp4 from 60 to 130:\nboats").unwrap();
        assert!(first < second);
    }

    #[test]
    fn intent_prompt_block_is_optional() {
        let with_prompt = request_blocks(&sample_summaries(), "make it nostalgic", 2.0);
        assert_eq!(with_prompt.len(), 3);
        assert!(with_prompt[1].contains("make it nostalgic"));
        assert!(with_prompt[2].contains("around 2 minutes"));

        let without_prompt = request_blocks(&sample_summaries(), "", 2.0);
        assert_eq!(without_prompt.len(), 2);
        assert!(without_prompt[1].contains("around 2 minutes"));
    }

    #[test]
    fn missing_files_are_dropped_and_order_kept() {
        let dir = tempfile::tempdir().unwrap();
        let present_a = dir.path().join("a.mp4");
        let present_b = dir.path().join("b.mp4");
        std::fs::write(&present_a, b"x").unwrap();
        std::fs::write(&present_b, b"x").unwrap();

        let scene = |path: &str, start: u32| Scene {
            story: format!("part at {start}"),
            file_path: path.to_owned(),
            start,
            end: start + 10,
        };
        let scenes = vec![
            scene(present_b.to_str().unwrap(), 30),
            scene(dir.path().join("gone.mp4").to_str().unwrap(), 0),
            scene(present_a.to_str().unwrap(), 5),
        ];

        let kept = existing_scenes(scenes);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].start, 30);
        assert_eq!(kept[1].start, 5);
    }

    #[test]
    fn clip_names_embed_source_name_and_range() {
        assert_eq!(
            clip_file_name(Path::new("/videos/IMG_001.MOV"), 10, 25),
            "IMG_001.MOV_10_25.mp4"
        );
    }
}

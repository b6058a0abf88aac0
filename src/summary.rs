use tracing::{debug, info, warn};

use crate::ai::{call_with_retries, ModelClient, MAX_ATTEMPTS};
use crate::chunk::{plan_scene_chunks, Chunk, LLM_IMG_LIMIT};
use crate::types::{Segment, VideoFile, VideoSummary};
use crate::workspace::TaskWorkspace;
use crate::{capture, detect};

/// One sampled frame per second; chunk frame indices rely on this.
const SAMPLE_INTERVAL_SEC: u32 = 1;
const FRAME_WIDTH: u32 = 1280;
const FRAME_HEIGHT: u32 = 720;

/// Placeholder description for a scene whose every chunk was dropped.
const FILTERED_PLACEHOLDER: &str = "filtered";

const CHUNK_PROMPT: &str = "Give me a detailed description of the provided sequence of frames \
     from the video. Additionally, give me an aesthetic rating from 1 to 5 for the sequence of \
     frames.";

/// Summarizes every input video in order: sample frames, detect scenes,
/// caption scene chunks with rolling context, then fold the per-scene
/// captions into one synopsis and one rating per video.
pub(crate) async fn generate_summaries(
    client: &ModelClient,
    workspace: &TaskWorkspace,
    files: &[VideoFile],
) -> anyhow::Result<Vec<VideoSummary>> {
    let mut summaries = Vec::with_capacity(files.len());
    for file in files {
        info!(video = %file.absolute_path, "summarizing video");
        let source = std::path::Path::new(&file.absolute_path);

        let frames = capture::sample_frames(source, SAMPLE_INTERVAL_SEC)?;
        let frames = capture::downscale_frames(frames, FRAME_WIDTH, FRAME_HEIGHT);
        let encoded = capture::encode_frames_base64(&frames)?;

        let mut scenes = detect::detect_scenes(source, workspace).await?;
        if scenes.is_empty() {
            scenes = vec![(0, encoded.len() as u32)];
        }

        let (segments, ratings) = caption_scenes(client, &scenes, &encoded).await;

        let summary = summarize_segments(client, &segments).await;
        summaries.push(VideoSummary {
            file: file.clone(),
            summary,
            aesthetic_rating: mean_rating(&ratings),
            segments,
        });
    }
    Ok(summaries)
}

/// Captions every chunk of every scene in chronological order. Within a
/// scene each chunk's prompt carries the previous chunk's caption; the
/// context never crosses a scene boundary. A chunk whose retries are
/// exhausted is skipped and the scene keeps the last successful caption.
async fn caption_scenes(
    client: &ModelClient,
    scenes: &[(u32, u32)],
    encoded_frames: &[String],
) -> (Vec<Segment>, Vec<u8>) {
    let mut segments = Vec::with_capacity(scenes.len());
    let mut ratings = Vec::new();

    for &(scene_start, scene_end) in scenes {
        let mut last_caption: Option<String> = None;
        for chunk in plan_scene_chunks(scene_start, scene_end, LLM_IMG_LIMIT, encoded_frames.len())
        {
            let frame_slice = &encoded_frames[chunk.frame_range.clone()];
            let result = call_with_retries(MAX_ATTEMPTS, |remediation| {
                let prompt =
                    chunk_prompt(last_caption.as_deref(), scene_start, &chunk) + &remediation;
                async move { client.caption_frames(&prompt, frame_slice).await }
            })
            .await;
            match result {
                Ok(caption) => {
                    debug!(
                        start = chunk.start_sec,
                        end = chunk.end_sec,
                        rating = caption.aesthetic_rating,
                        "chunk captioned"
                    );
                    ratings.push(caption.aesthetic_rating);
                    last_caption = Some(caption.description);
                }
                Err(e) => {
                    // best effort: one dead chunk must not sink the video
                    warn!(
                        start = chunk.start_sec,
                        end = chunk.end_sec,
                        error = %e,
                        "chunk skipped after exhausting retries"
                    );
                }
            }
        }
        segments.push(Segment {
            start_time_sec: scene_start,
            end_time_sec: scene_end,
            description: last_caption.unwrap_or_else(|| FILTERED_PLACEHOLDER.to_owned()),
            src_file: None,
        });
    }
    (segments, ratings)
}

/// Requests a short whole-video synopsis over the concatenated segment
/// block. Exhausted retries degrade to an empty synopsis.
async fn summarize_segments(client: &ModelClient, segments: &[Segment]) -> String {
    let base_prompt = synopsis_prompt(segments);
    let result = call_with_retries(MAX_ATTEMPTS, |remediation| {
        let prompt = base_prompt.clone() + &remediation;
        async move { client.summarize(&prompt).await }
    })
    .await;
    match result {
        Ok(summary) => summary,
        Err(e) => {
            warn!(error = %e, "video synopsis dropped after exhausting retries");
            String::new()
        }
    }
}

fn chunk_prompt(context: Option<&str>, scene_start: u32, chunk: &Chunk) -> String {
    let mut prompt = CHUNK_PROMPT.to_owned();
    if let Some(previous) = context {
        prompt.push_str(&format!(
            "\nHere is the previous description covering {} to {} seconds; combine it with \
             what you see now and give me a new description.\n",
            scene_start,
            chunk.start_sec.saturating_sub(1)
        ));
        prompt.push_str(previous);
    }
    prompt
}

fn synopsis_prompt(segments: &[Segment]) -> String {
    let mut block = String::new();
    for segment in segments {
        block.push_str(&format!(
            "from {} to {} seconds:\n{}\n",
            segment.start_time_sec, segment.end_time_sec, segment.description
        ));
    }
    format!(
        "Based on the description of the video from each part, give me a short summary of \
         the video.\n\n{block}"
    )
}

/// Rounded arithmetic mean of the chunk ratings, rounding half away from
/// zero. `None` when no chunk produced a rating.
fn mean_rating(ratings: &[u8]) -> Option<u8> {
    if ratings.is_empty() {
        return None;
    }
    let sum: u32 = ratings.iter().map(|&r| u32::from(r)).sum();
    Some((f64::from(sum) / ratings.len() as f64).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_rating_rounds_half_away_from_zero() {
        assert_eq!(mean_rating(&[4, 5, 3]), Some(4));
        assert_eq!(mean_rating(&[3, 4]), Some(4));
        assert_eq!(mean_rating(&[2, 3]), Some(3));
        assert_eq!(mean_rating(&[5]), Some(5));
    }

    #[test]
    fn mean_rating_of_nothing_is_none() {
        assert_eq!(mean_rating(&[]), None);
    }

    #[test]
    fn first_chunk_prompt_has_no_context() {
        let chunk = Chunk {
            start_sec: 0,
            end_sec: 49,
            frame_range: 0..50,
        };
        let prompt = chunk_prompt(None, 0, &chunk);
        assert_eq!(prompt, CHUNK_PROMPT);
    }

    #[test]
    fn later_chunk_prompt_carries_previous_caption_verbatim() {
        let chunk = Chunk {
            start_sec: 110,
            end_sec: 129,
            frame_range: 110..130,
        };
        let prompt = chunk_prompt(Some("a crowded market street"), 60, &chunk);
        assert!(prompt.starts_with(CHUNK_PROMPT));
        assert!(prompt.contains("covering 60 to 109 seconds"));
        assert!(prompt.ends_with("a crowded market street"));
    }

    #[test]
    fn synopsis_prompt_lists_segments_in_order() {
        let segments = vec![
            Segment {
                start_time_sec: 0,
                end_time_sec: 60,
                description: "sunrise over the bay".into(),
                src_file: None,
            },
            Segment {
                start_time_sec: 60,
                end_time_sec: 130,
                description: "boats leaving the harbor".into(),
                src_file: None,
            },
        ];
        let prompt = synopsis_prompt(&segments);
        let first = prompt.find("from 0 to 60 seconds:\nsunrise over the bay").unwrap();
        let second = prompt
            .find("from 60 to 130 seconds:\nboats leaving the harbor")
            .unwrap();
        assert!(first < second);
    }
}

use std::path::Path;

use serde::{Deserialize, Serialize};

/// A source or derived clip on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VideoFile {
    pub absolute_path: String,
    pub name: String,
}

impl VideoFile {
    pub(crate) fn from_path(path: &Path) -> Self {
        Self {
            absolute_path: path.to_string_lossy().into_owned(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}

/// One visually coherent scene of a source video with its final caption.
/// Times are seconds, half-open `[start, end)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Segment {
    pub start_time_sec: u32,
    pub end_time_sec: u32,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub src_file: Option<VideoFile>,
}

/// The per-video output of the summarization stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VideoSummary {
    pub file: VideoFile,
    pub summary: String,
    /// Rounded mean of all chunk ratings, 1..=5. `None` when no chunk of the
    /// video was captioned successfully.
    pub aesthetic_rating: Option<u8>,
    pub segments: Vec<Segment>,
}

/// One selected time range in the model's storyline. Field names match the
/// structured-output schema sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Scene {
    pub story: String,
    pub file_path: String,
    pub start: u32,
    pub end: u32,
}

/// The model's cross-video storyline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Story {
    pub title: String,
    pub whole_story: String,
    pub scenes: Vec<Scene>,
}

/// A storyline scene materialized as a trimmed clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StorylineEntry {
    pub start_time_sec: u32,
    pub end_time_sec: u32,
    pub description: String,
    pub src_file: VideoFile,
}

/// Stage 1 input payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SummariesInput {
    pub task_id: String,
    pub files: Vec<VideoFile>,
}

/// Stage 2 input payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StorylineInput {
    pub task_id: String,
    pub summaries: Vec<VideoSummary>,
    #[serde(default)]
    pub prompt: String,
    pub duration: f64,
}

/// Stage 3 input payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RenderInput {
    pub task_id: String,
    pub segments: Vec<StorylineEntry>,
}

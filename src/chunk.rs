use std::ops::Range;

/// Default per-call image limit of the vision model, in frames (== seconds at
/// the 1 s sampling interval).
pub(crate) const LLM_IMG_LIMIT: u32 = 50;

/// One caption request: a sub-range of a scene that fits the model's image
/// limit. `start_sec..=end_sec` is inclusive; `frame_range` indexes into the
/// video's encoded frame sequence (index == second).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Chunk {
    pub start_sec: u32,
    pub end_sec: u32,
    pub frame_range: Range<usize>,
}

/// Splits the scene `(start, end)` into contiguous chunks of at most `limit`
/// seconds: `[s, s+L), [s+L, s+2L), ...` clipped to the scene end. Frame
/// slices are additionally clamped to `frame_count` so a short frame buffer
/// is never over-read.
pub(crate) fn plan_scene_chunks(
    scene_start: u32,
    scene_end: u32,
    limit: u32,
    frame_count: usize,
) -> Vec<Chunk> {
    debug_assert!(limit > 0);
    let mut chunks = Vec::new();
    let mut start = scene_start;
    while start < scene_end {
        let end_sec = (start + limit - 1).min(scene_end - 1);
        let slice_end = ((start + limit).min(scene_end) as usize).min(frame_count);
        let slice_start = (start as usize).min(slice_end);
        chunks.push(Chunk {
            start_sec: start,
            end_sec,
            frame_range: slice_start..slice_end,
        });
        start += limit;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(chunks: &[Chunk]) -> Vec<(u32, u32)> {
        chunks.iter().map(|c| (c.start_sec, c.end_sec)).collect()
    }

    #[test]
    fn chunks_cover_scene_without_gaps_or_overlaps() {
        let chunks = plan_scene_chunks(10, 137, 50, 200);
        assert_eq!(ranges(&chunks), vec![(10, 59), (60, 109), (110, 136)]);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end_sec + 1, pair[1].start_sec);
            assert_eq!(pair[0].frame_range.end, pair[1].frame_range.start);
        }
        assert_eq!(chunks.first().unwrap().frame_range.start, 10);
        assert_eq!(chunks.last().unwrap().frame_range.end, 137);
    }

    #[test]
    fn chunk_count_matches_ceil_of_scene_length() {
        for (start, end, limit) in [(0u32, 60, 50u32), (60, 130, 50), (0, 50, 50), (0, 1, 50)] {
            let expected = ((end - start) as f64 / limit as f64).ceil() as usize;
            assert_eq!(
                plan_scene_chunks(start, end, limit, end as usize).len(),
                expected,
                "scene ({start},{end}) limit {limit}"
            );
        }
    }

    #[test]
    fn adjacent_scenes_from_detector_chunk_independently() {
        // scenes (0,60) and (60,130) at the default limit
        let first = plan_scene_chunks(0, 60, 50, 130);
        let second = plan_scene_chunks(60, 130, 50, 130);
        assert_eq!(ranges(&first), vec![(0, 49), (50, 59)]);
        assert_eq!(ranges(&second), vec![(60, 109), (110, 129)]);
        assert_eq!(second[0].frame_range, 60..110);
        assert_eq!(second[1].frame_range, 110..130);
    }

    #[test]
    fn frame_slice_clamps_to_short_frame_buffer() {
        // decoder dropped frames: only 45 frames exist for a (0,60) scene
        let chunks = plan_scene_chunks(0, 60, 50, 45);
        assert_eq!(chunks[0].frame_range, 0..45);
        assert_eq!(chunks[1].frame_range, 45..45);
        assert_eq!(chunks[1].end_sec, 59);
    }

    #[test]
    fn empty_scene_yields_no_chunks() {
        assert!(plan_scene_chunks(30, 30, 50, 100).is_empty());
    }
}

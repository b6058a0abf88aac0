use std::path::Path;
use std::sync::Once;

use base64::Engine;
use ffmpeg::util::frame::video::Video;
use ffmpeg::{format, media};
use ffmpeg_next::{self as ffmpeg};
use image::codecs::jpeg;
use image::{ImageBuffer, Rgb, RgbImage};
use tracing::{debug, warn};

static INIT: Once = Once::new();

pub(crate) fn init() {
    INIT.call_once(|| {
        ffmpeg::init().unwrap();
    });
}

/// Decodes `input_path` and keeps one frame per `interval_sec` seconds of
/// video, using the stream's native frame rate to compute the stride
/// (`round(fps) * interval`, minimum 1). Frames that fail to decode or to
/// convert are skipped, so the result may be shorter than
/// `duration / interval`.
pub(crate) fn sample_frames(input_path: &Path, interval_sec: u32) -> anyhow::Result<Vec<RgbImage>> {
    let mut input = format::input(&input_path)?;
    let video_stream = input
        .streams()
        .best(media::Type::Video)
        .ok_or(anyhow::anyhow!(ffmpeg::Error::StreamNotFound))?;
    let video_stream_index = video_stream.index();

    let fps: f64 = video_stream.avg_frame_rate().into();
    let stride = ((fps.round() as i64) * i64::from(interval_sec)).max(1) as u64;

    let codec_params = video_stream.parameters();
    let context_decoder = ffmpeg::codec::context::Context::from_parameters(codec_params)?;
    let mut decoder = context_decoder.decoder().video()?;

    let mut scaler = ffmpeg::software::scaling::context::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        format::Pixel::RGB24,
        decoder.width(),
        decoder.height(),
        ffmpeg::software::scaling::Flags::BILINEAR,
    )?;

    let mut frames = Vec::new();
    let mut decoded_count: u64 = 0;
    let mut process_decoded_frames =
        |decoder: &mut ffmpeg::decoder::Video| -> Result<(), anyhow::Error> {
            let mut decoded = Video::empty();
            while decoder.receive_frame(&mut decoded).is_ok() {
                let keep = decoded_count % stride == 0;
                decoded_count += 1;
                if !keep {
                    continue;
                }
                let mut rgb_frame = Video::empty();
                scaler.run(&decoded, &mut rgb_frame)?;
                match ImageBuffer::<Rgb<u8>, _>::from_raw(
                    rgb_frame.width(),
                    rgb_frame.height(),
                    rgb_frame.data(0).to_vec(),
                ) {
                    Some(image) => frames.push(image),
                    None => warn!(frame = decoded_count, "skipping unconvertible frame"),
                }
            }
            Ok(())
        };

    for (stream, packet) in input.packets() {
        if stream.index() == video_stream_index {
            if decoder.send_packet(&packet).is_err() {
                // corrupt packet; sampling is best-effort
                continue;
            }
            process_decoded_frames(&mut decoder)?;
        }
    }
    decoder.send_eof()?;
    process_decoded_frames(&mut decoder)?;

    debug!(
        path = %input_path.display(),
        sampled = frames.len(),
        stride,
        "sampled frames"
    );
    Ok(frames)
}

/// Down-scales every frame to fit `width`x`height` before JPEG encoding,
/// keeping the per-image payload sent to the model small.
pub(crate) fn downscale_frames(frames: Vec<RgbImage>, width: u32, height: u32) -> Vec<RgbImage> {
    frames
        .into_iter()
        .map(|frame| {
            if frame.width() <= width && frame.height() <= height {
                frame
            } else {
                image::imageops::resize(
                    &frame,
                    width,
                    height,
                    image::imageops::FilterType::Triangle,
                )
            }
        })
        .collect()
}

/// Encodes each frame as a JPEG data URL, the form the vision model accepts
/// as an image attachment.
pub(crate) fn encode_frames_base64(frames: &[RgbImage]) -> anyhow::Result<Vec<String>> {
    use base64::prelude::BASE64_STANDARD;

    let mut encoded = Vec::with_capacity(frames.len());
    for frame in frames {
        let mut jpeg_data = Vec::new();
        let mut encoder = jpeg::JpegEncoder::new_with_quality(&mut jpeg_data, 90);
        encoder.encode(
            frame,
            frame.width(),
            frame.height(),
            image::ExtendedColorType::Rgb8,
        )?;
        encoded.push("data:image/jpeg;base64,".to_owned() + &BASE64_STANDARD.encode(jpeg_data));
    }
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |_, _| Rgb([40u8, 80, 120]))
    }

    #[test]
    fn downscale_shrinks_oversized_frames_only() {
        let frames = vec![solid_frame(1920, 1080), solid_frame(640, 360)];
        let scaled = downscale_frames(frames, 1280, 720);
        assert_eq!((scaled[0].width(), scaled[0].height()), (1280, 720));
        assert_eq!((scaled[1].width(), scaled[1].height()), (640, 360));
    }

    #[test]
    fn encoded_frames_are_jpeg_data_urls() {
        let encoded = encode_frames_base64(&[solid_frame(16, 16)]).unwrap();
        assert_eq!(encoded.len(), 1);
        assert!(encoded[0].starts_with("data:image/jpeg;base64,"));
        assert!(encoded[0].len() > "data:image/jpeg;base64,".len());
    }
}

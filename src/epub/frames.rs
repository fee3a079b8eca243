//! Still frames sampled from animated GIFs, shown as a small gallery below the animation.

use crate::content::escape_attr;
use crate::epub::{Asset, AssetKind};
use image::codecs::gif::GifDecoder;
use image::codecs::jpeg::JpegEncoder;
use image::{AnimationDecoder, DynamicImage, Frame, ImageError};
use std::collections::BTreeMap;
use std::io::Cursor;
use thiserror::Error;
use tracing::{debug, warn};

/// Number of frames sampled from each animation.
pub const SAMPLE_COUNT: usize = 8;
const FRAMES_PER_ROW: usize = 4;
const JPEG_QUALITY: u8 = 75;
const FRAME_MEDIA_TYPE: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("could not decode animation: {0}")]
    Decode(#[source] ImageError),

    #[error("could not decode frame {index}: {source}")]
    Frame {
        index: usize,
        #[source]
        source: ImageError,
    },

    #[error("could not encode frame {index} as JPEG: {source}")]
    Encode {
        index: usize,
        #[source]
        source: ImageError,
    },
}

/// Gallery markup plus the frame assets it references, in sampled order.
#[derive(Debug)]
pub struct FrameGallery {
    pub markup: String,
    pub frames: Vec<Asset>,
}

/// Frame indices sampled from an animation of `total` frames.
///
/// `(total / SAMPLE_COUNT) * i` clamped to the last frame. With fewer than
/// [SAMPLE_COUNT] frames the step is 0 and every sample is frame 0.
pub fn sample_indices(total: usize) -> Vec<usize> {
    if total == 0 {
        return Vec::new();
    }
    let step = total / SAMPLE_COUNT;
    (0..SAMPLE_COUNT).map(|i| (step * i).min(total - 1)).collect()
}

/// Sample [SAMPLE_COUNT] frames of an animated GIF.
///
/// Returns `Ok(None)` when there is nothing to show: the bytes are not a readable GIF,
/// the GIF has a single frame, or every sampled frame failed. Frames that fail to decode
/// or encode are logged and left out of the gallery. Frame files are named
/// `images/{uid_prefix}_{image_index}_frame{i}.jpg`.
pub fn sample_frames(
    bytes: &[u8],
    uid_prefix: &str,
    image_index: usize,
) -> Result<Option<FrameGallery>, FrameError> {
    let total = match count_frames(bytes) {
        Some(n) => n,
        None => {
            debug!("Not a readable animation, no frames sampled");
            return Ok(None);
        }
    };
    if total <= 1 {
        return Ok(None);
    }

    let indices = sample_indices(total);
    let encoded = encode_sampled(bytes, &indices)?;
    Ok(build_gallery(&indices, &encoded, uid_prefix, image_index))
}

/// Gallery over the sampled frames that encoded cleanly. `None` when none did.
fn build_gallery(
    indices: &[usize],
    encoded: &BTreeMap<usize, Result<Vec<u8>, FrameError>>,
    uid_prefix: &str,
    image_index: usize,
) -> Option<FrameGallery> {
    let mut frames = Vec::with_capacity(indices.len());
    let mut markup = String::from(
        "<div class=\"extracted-gif-frames\"><h4>Extracted GIF Frames</h4>",
    );
    for (i, frame_index) in indices.iter().enumerate() {
        let data = match encoded.get(frame_index) {
            Some(Ok(data)) => data.clone(),
            Some(Err(e)) => {
                warn!("Error extracting frame {} from GIF: {}", i, e);
                continue;
            }
            None => {
                warn!("Error extracting frame {} from GIF: frame {} not reached", i, frame_index);
                continue;
            }
        };
        let uid = format!("{}_{}_frame{}", uid_prefix, image_index, i);
        let file_name = format!("images/{}.jpg", uid);
        markup.push_str(&format!(
            "<img src=\"{}\" alt=\"GIF Frame {}\"/>",
            escape_attr(&file_name),
            i
        ));
        frames.push(Asset {
            uid,
            file_name,
            media_type: FRAME_MEDIA_TYPE.to_string(),
            data,
            kind: AssetKind::Frame,
        });
        if frames.len() % FRAMES_PER_ROW == 0 {
            markup.push_str("<br/>");
        }
    }
    markup.push_str("</div>");

    if frames.is_empty() {
        return None;
    }
    Some(FrameGallery { markup, frames })
}

fn decoder(bytes: &[u8]) -> Result<GifDecoder<Cursor<&[u8]>>, ImageError> {
    GifDecoder::new(Cursor::new(bytes))
}

/// Frames in the animation, counting a failing frame as the last one. `None` if the
/// container cannot be read at all.
fn count_frames(bytes: &[u8]) -> Option<usize> {
    let mut total = 0;
    for frame in decoder(bytes).ok()?.into_frames() {
        total += 1;
        if frame.is_err() {
            break;
        }
    }
    Some(total)
}

/// Decode the animation once more and JPEG-encode just the sampled frames.
fn encode_sampled(
    bytes: &[u8],
    indices: &[usize],
) -> Result<BTreeMap<usize, Result<Vec<u8>, FrameError>>, FrameError> {
    let mut out = BTreeMap::new();
    let last = match indices.iter().max() {
        Some(&last) => last,
        None => return Ok(out),
    };
    for (index, frame) in decoder(bytes)
        .map_err(FrameError::Decode)?
        .into_frames()
        .enumerate()
    {
        if index > last {
            break;
        }
        let failed = frame.is_err();
        if indices.contains(&index) {
            let result = frame
                .map_err(|source| FrameError::Frame { index, source })
                .and_then(|f| encode_jpeg(f, index));
            out.insert(index, result);
        }
        if failed {
            break;
        }
    }
    Ok(out)
}

/// Flatten to opaque RGB (alpha is dropped) and encode as JPEG.
fn encode_jpeg(frame: Frame, index: usize) -> Result<Vec<u8>, FrameError> {
    let rgb = DynamicImage::ImageRgba8(frame.into_buffer()).to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|source| FrameError::Encode { index, source })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{animated_gif, png_bytes};

    #[test]
    fn sample_indices_spread_over_animation() {
        assert_eq!(sample_indices(20), vec![0, 2, 4, 6, 8, 10, 12, 14]);
        assert_eq!(sample_indices(8), (0..8).collect::<Vec<_>>());
        assert_eq!(sample_indices(100), vec![0, 12, 24, 36, 48, 60, 72, 84]);
    }

    #[test]
    fn sample_indices_short_animation_repeats_first_frame() {
        assert_eq!(sample_indices(5), vec![0; SAMPLE_COUNT]);
        assert!(sample_indices(0).is_empty());
    }

    #[test]
    fn sample_indices_are_deterministic_and_non_decreasing() {
        for total in 1..200 {
            let a = sample_indices(total);
            assert_eq!(a, sample_indices(total));
            assert_eq!(a.len(), SAMPLE_COUNT);
            assert!(a.windows(2).all(|w| w[0] <= w[1]));
            assert!(a.iter().all(|&i| i < total));
        }
    }

    #[test]
    fn twenty_frame_gif_yields_eight_jpeg_frames() -> Result<(), FrameError> {
        let gallery = sample_frames(&animated_gif(20), "ch1", 1)?.expect("gallery");
        assert_eq!(gallery.frames.len(), SAMPLE_COUNT);
        for (i, frame) in gallery.frames.iter().enumerate() {
            assert_eq!(frame.file_name, format!("images/ch1_1_frame{}.jpg", i));
            assert_eq!(frame.uid, format!("ch1_1_frame{}", i));
            assert_eq!(frame.media_type, "image/jpeg");
            assert_eq!(frame.kind, AssetKind::Frame);
            assert_eq!(&frame.data[..2], &[0xFF, 0xD8]);
        }
        Ok(())
    }

    #[test]
    fn gallery_breaks_line_after_every_fourth_frame() -> Result<(), FrameError> {
        let gallery = sample_frames(&animated_gif(20), "ch2", 0)?.expect("gallery");
        assert!(gallery
            .markup
            .starts_with("<div class=\"extracted-gif-frames\"><h4>Extracted GIF Frames</h4>"));
        assert!(gallery.markup.ends_with("</div>"));
        let rows: Vec<&str> = gallery.markup.split("<br/>").collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].matches("<img").count(), 4);
        assert_eq!(rows[1].matches("<img").count(), 4);
        assert!(rows[0].contains("src=\"images/ch2_0_frame0.jpg\""));
        assert!(rows[1].contains("src=\"images/ch2_0_frame7.jpg\""));
        Ok(())
    }

    #[test]
    fn short_gif_samples_duplicates_of_first_frame() -> Result<(), FrameError> {
        let gallery = sample_frames(&animated_gif(3), "ch1", 0)?.expect("gallery");
        assert_eq!(gallery.frames.len(), SAMPLE_COUNT);
        let first = &gallery.frames[0].data;
        assert!(gallery.frames.iter().all(|f| &f.data == first));
        Ok(())
    }

    #[test]
    fn single_frame_gif_is_nothing_to_do() -> Result<(), FrameError> {
        assert!(sample_frames(&animated_gif(1), "ch1", 0)?.is_none());
        Ok(())
    }

    #[test]
    fn truncated_gif_keeps_the_frames_that_decode() -> Result<(), FrameError> {
        let gif = animated_gif(8);
        // Cutting the trailer and the end of the last frame's data breaks frame 7 only.
        let gallery = sample_frames(&gif[..gif.len() - 3], "ch1", 0)?.expect("gallery");
        assert_eq!(gallery.frames.len(), 7);
        for (i, frame) in gallery.frames.iter().enumerate() {
            assert_eq!(frame.file_name, format!("images/ch1_0_frame{}.jpg", i));
        }
        assert!(!gallery.markup.contains("frame7"));
        assert_eq!(gallery.markup.matches("<br/>").count(), 1);
        Ok(())
    }

    #[test]
    fn gallery_is_none_when_every_frame_failed() {
        let indices = sample_indices(16);
        let encoded: BTreeMap<usize, Result<Vec<u8>, FrameError>> = indices
            .iter()
            .map(|&index| {
                let source = ImageError::IoError(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "truncated frame",
                ));
                (index, Err(FrameError::Frame { index, source }))
            })
            .collect();
        assert!(build_gallery(&indices, &encoded, "ch1", 0).is_none());
        assert!(build_gallery(&indices, &BTreeMap::new(), "ch1", 0).is_none());
    }

    #[test]
    fn gallery_skips_failed_frames_between_good_ones() {
        let indices = sample_indices(16);
        let encoded: BTreeMap<usize, Result<Vec<u8>, FrameError>> = indices
            .iter()
            .map(|&index| {
                let result = if index == 4 {
                    Err(FrameError::Frame {
                        index,
                        source: ImageError::IoError(std::io::Error::new(
                            std::io::ErrorKind::InvalidData,
                            "bad frame",
                        )),
                    })
                } else {
                    Ok(vec![0xFF, 0xD8, index as u8])
                };
                (index, result)
            })
            .collect();
        let gallery = build_gallery(&indices, &encoded, "ch2", 3).expect("gallery");
        assert_eq!(gallery.frames.len(), 7);
        // Sample 2 (frame 4) is missing; names keep the sample position.
        assert!(gallery.frames.iter().all(|f| f.uid != "ch2_3_frame2"));
        assert_eq!(gallery.frames[2].uid, "ch2_3_frame3");
    }

    #[test]
    fn non_gif_input_is_nothing_to_do() -> Result<(), FrameError> {
        assert!(sample_frames(&png_bytes(), "ch1", 0)?.is_none());
        assert!(sample_frames(b"definitely not an image", "ch1", 0)?.is_none());
        assert!(sample_frames(&[], "ch1", 0)?.is_none());
        Ok(())
    }
}

// Frame extraction from still and animated images
//
// Animated GIFs are decoded frame by frame through a lazy iterator (single
// forward pass, not restartable); anything else decodes to exactly one
// frame at index 0. All frames come out as 8-bit RGB.

use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage};

use crate::core::errors::DecodeError;
use crate::core::types::Frame;

/// Animated-GIF detection: a declared MIME of image/gif wins, but the
/// GIF87a/GIF89a magic prefix is sufficient on its own.
pub fn is_gif(bytes: &[u8], mime: Option<&str>) -> bool {
    if let Some(ct) = mime {
        let ct = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        if ct == "image/gif" {
            return true;
        }
    }

    bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a")
}

enum Inner<'a> {
    Animated(image::Frames<'a>),
    Still(Option<&'a [u8]>),
}

/// Lazy, ordered, finite sequence of decoded frames.
pub struct FrameIter<'a> {
    inner: Inner<'a>,
    index: usize,
}

/// Open `bytes` as a frame source. Container-level decode failures are
/// reported here; per-frame failures surface from the iterator.
pub fn frames<'a>(bytes: &'a [u8], mime: Option<&str>) -> Result<FrameIter<'a>, DecodeError> {
    if is_gif(bytes, mime) {
        let decoder = GifDecoder::new(Cursor::new(bytes))?;
        Ok(FrameIter {
            inner: Inner::Animated(decoder.into_frames()),
            index: 0,
        })
    } else {
        Ok(FrameIter {
            inner: Inner::Still(Some(bytes)),
            index: 0,
        })
    }
}

impl Iterator for FrameIter<'_> {
    type Item = Result<Frame, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            Inner::Animated(frames) => {
                let frame = frames.next()?;
                let index = self.index;
                self.index += 1;
                Some(
                    frame
                        .map(|f| Frame {
                            index,
                            pixels: DynamicImage::ImageRgba8(f.into_buffer()).to_rgb8(),
                        })
                        .map_err(DecodeError::from),
                )
            }
            Inner::Still(slot) => {
                let bytes = slot.take()?;
                Some(
                    image::load_from_memory(bytes)
                        .map(|img| Frame {
                            index: 0,
                            pixels: img.to_rgb8(),
                        })
                        .map_err(DecodeError::from),
                )
            }
        }
    }
}

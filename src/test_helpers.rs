//! In-memory fetcher and generated image fixtures for unit tests.

use crate::scraper::{FetchError, FetchedResource, Fetcher};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;

enum StubResponse {
    Body(FetchedResource),
    Status(u16),
}

/// Serves canned responses by exact URL; anything unknown is a 404.
#[derive(Default)]
pub struct StubFetcher {
    responses: HashMap<String, StubResponse>,
    /// Every URL requested, in order.
    pub requests: Vec<String>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bytes(mut self, url: &str, content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        self.responses.insert(
            url.to_string(),
            StubResponse::Body(FetchedResource {
                bytes,
                content_type: content_type.map(String::from),
            }),
        );
        self
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.with_bytes(url, Some("text/html; charset=utf-8"), html.as_bytes().to_vec())
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.responses
            .insert(url.to_string(), StubResponse::Status(status));
        self
    }
}

impl Fetcher for StubFetcher {
    fn fetch(&mut self, url: &str) -> Result<FetchedResource, FetchError> {
        self.requests.push(url.to_string());
        match self.responses.get(url) {
            Some(StubResponse::Body(resource)) => Ok(resource.clone()),
            Some(StubResponse::Status(status)) => Err(FetchError::HttpStatus {
                status: *status,
                url: url.to_string(),
            }),
            None => Err(FetchError::HttpStatus {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}

/// A 2x2 PNG.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    RgbImage::from_pixel(2, 2, Rgb([200, 30, 30]))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    bytes
}

/// A looping 4x4 GIF with `frame_count` frames of distinct colors.
pub fn animated_gif(frame_count: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut bytes);
        encoder.set_repeat(Repeat::Infinite).expect("gif repeat");
        let frames = (0..frame_count).map(|i| {
            let shade = (i * 255 / frame_count.max(1)) as u8;
            Frame::from_parts(
                RgbaImage::from_pixel(4, 4, Rgba([shade, 40, 255 - shade, 255])),
                0,
                0,
                Delay::from_numer_denom_ms(100, 1),
            )
        });
        encoder.encode_frames(frames).expect("encode gif");
    }
    bytes
}

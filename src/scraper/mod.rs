//! Fetching and hierarchy discovery: the HTTP seam, URL resolution, and the side menu reader.

mod client;
mod error;

pub mod hierarchy;

pub use client::{PoliteClient, PoliteClientBuilder};
pub use error::{FetchError, StructureError};
pub use hierarchy::extract_chapters;

use reqwest::Url;
use scraper::Selector;

/// Site the course is hosted on. Subchapter and image URLs resolve against it.
pub const DEFAULT_BASE_URL: &str = "https://huggingface.co";

/// A page that carries the full side menu with every chapter.
pub const DEFAULT_START_PATH: &str = "/learn/agents-course/unit0/introduction";

/// Raw response body plus the declared content type, if any.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Blocking GET of a URL. Implemented by [PoliteClient]; tests use an in-memory stub.
pub trait Fetcher {
    fn fetch(&mut self, url: &str) -> Result<FetchedResource, FetchError>;

    fn fetch_text(&mut self, url: &str) -> Result<String, FetchError> {
        let resource = self.fetch(url)?;
        Ok(String::from_utf8_lossy(&resource.bytes).into_owned())
    }
}

/// Join a relative or absolute reference onto the site base.
pub fn resolve_url(base: &Url, href: &str) -> Result<Url, FetchError> {
    base.join(href.trim()).map_err(|e| FetchError::InvalidUrl {
        input: href.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a URL given on the command line or in config.
pub fn parse_url(input: &str) -> Result<Url, FetchError> {
    Url::parse(input).map_err(|e| FetchError::InvalidUrl {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a CSS selector or return an error (avoids panics from Selector::parse).
pub(crate) fn parse_selector(sel: &str) -> Result<Selector, StructureError> {
    Selector::parse(sel).map_err(|e| StructureError::InvalidSelector {
        selector: sel.to_string(),
        reason: e.to_string(),
    })
}

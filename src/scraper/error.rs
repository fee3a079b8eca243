//! Error types for fetching pages/images and for reading the course hierarchy.

use thiserror::Error;

/// Any failed GET: transport failure, non-success status, or unreadable body.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL: {input}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("Network error: could not reach {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// HTTP status for `HttpStatus` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The root page does not carry the expected side menu configuration.
#[derive(Debug, Error)]
pub enum StructureError {
    #[error("Could not find the SideMenu element (div[data-target=\"SideMenu\"]) in the course page.")]
    MissingSideMenu,

    #[error("The SideMenu element has no data-props attribute.")]
    MissingProps,

    #[error("SideMenu data-props is not valid JSON: {reason}")]
    InvalidJson { reason: String },

    #[error("SideMenu data-props has no 'chapters' key.")]
    MissingChapters,

    #[error("SideMenu chapters have an unexpected shape: {reason}")]
    InvalidShape { reason: String },

    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },
}

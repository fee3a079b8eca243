//! coursebook: CLI scraper for the Hugging Face Agents Course, writing one EPUB per unit.

pub mod assemble;
pub mod cli;
pub mod config;
pub mod content;
pub mod course;
pub mod epub;
pub mod logger;
pub mod model;
pub mod scraper;

#[cfg(test)]
mod test_helpers;

// Re-exports for CLI and consumers.
pub use crate::assemble::{assemble_chapter, write_chapter_package, AssembleOptions};
pub use crate::content::ContentFragment;
pub use crate::course::{build_course, list_course, CourseError, CourseOptions, CourseSummary};
pub use crate::epub::{EpubError, EpubPackage};
pub use crate::model::{Chapter, Subchapter};
pub use crate::scraper::{
    extract_chapters, FetchError, Fetcher, PoliteClient, PoliteClientBuilder, StructureError,
};

//! Whole-course run: read the hierarchy from the start page, then build one EPUB per
//! chapter. Chapters are independent; a failing chapter is logged and the run goes on.

use crate::assemble::{assemble_chapter, output_path, write_chapter_package, AssembleOptions};
use crate::model::Chapter;
use crate::scraper::{extract_chapters, FetchError, Fetcher, StructureError};
use reqwest::Url;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

/// Errors that stop the run before any chapter is processed.
#[derive(Debug, Error)]
pub enum CourseError {
    #[error("Could not fetch the course start page: {0}")]
    RootFetch(#[source] FetchError),

    #[error("Could not read the course structure: {0}")]
    Structure(#[from] StructureError),

    #[error("Cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Settings for one course run.
pub struct CourseOptions<'a> {
    /// Page carrying the side menu.
    pub start_url: &'a Url,
    pub output_dir: &'a Path,
    pub assemble: AssembleOptions<'a>,
    /// Called with (chapter title, subchapter count) before each chapter is assembled.
    pub on_chapter: Option<&'a dyn Fn(&str, u32)>,
}

/// Outcome of a run.
#[derive(Debug, Default)]
pub struct CourseSummary {
    /// EPUB files written, in chapter order.
    pub written: Vec<PathBuf>,
    /// Chapters with no subchapters, or whose subchapters all failed.
    pub skipped: usize,
    /// Chapters whose EPUB could not be written.
    pub failed: usize,
}

/// A chapter and the file it would be written to.
#[derive(Debug, Clone)]
pub struct PlannedChapter {
    pub chapter: Chapter,
    pub output: PathBuf,
}

fn load_chapters(fetcher: &mut dyn Fetcher, start_url: &Url) -> Result<Vec<Chapter>, CourseError> {
    info!("Fetching course structure from {}", start_url);
    let html = fetcher
        .fetch_text(start_url.as_str())
        .map_err(CourseError::RootFetch)?;
    let chapters = extract_chapters(&html)?;
    info!("Found {} chapters", chapters.len());
    Ok(chapters)
}

/// Fetch the hierarchy and report where each chapter would go. Writes nothing.
pub fn list_course(
    fetcher: &mut dyn Fetcher,
    start_url: &Url,
    output_dir: &Path,
) -> Result<Vec<PlannedChapter>, CourseError> {
    Ok(load_chapters(fetcher, start_url)?
        .into_iter()
        .map(|chapter| PlannedChapter {
            output: output_path(output_dir, &chapter.title),
            chapter,
        })
        .collect())
}

/// Build every chapter's EPUB into `options.output_dir`.
pub fn build_course(
    fetcher: &mut dyn Fetcher,
    options: &CourseOptions<'_>,
) -> Result<CourseSummary, CourseError> {
    let chapters = load_chapters(fetcher, options.start_url)?;

    std::fs::create_dir_all(options.output_dir).map_err(|e| CourseError::OutputDir {
        path: options.output_dir.to_path_buf(),
        source: e,
    })?;

    let mut summary = CourseSummary::default();
    for chapter in &chapters {
        let heading = &chapter.title;
        if chapter.subchapters.is_empty() {
            info!("Skipping '{}' because it has no subchapters.", heading);
            summary.skipped += 1;
            continue;
        }

        info!("Creating eBook for: {}", heading);
        if let Some(on_chapter) = options.on_chapter {
            on_chapter(heading, chapter.subchapters.len() as u32);
        }
        let package = match assemble_chapter(fetcher, chapter, &options.assemble) {
            Some(p) => p,
            None => {
                summary.skipped += 1;
                continue;
            }
        };
        match write_chapter_package(&package, options.output_dir, heading) {
            Ok(path) => {
                info!(
                    "Created EPUB: {} ({} documents, {} assets)",
                    path.display(),
                    package.documents().len(),
                    package.assets().len()
                );
                summary.written.push(path);
            }
            Err(e) => {
                error!("Failed to write EPUB for '{}': {}", heading, e);
                summary.failed += 1;
            }
        }
    }

    if summary.failed > 0 {
        warn!("{} chapter(s) could not be written", summary.failed);
    }
    Ok(summary)
}

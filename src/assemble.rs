//! Turns one chapter into one EPUB: fetch each subchapter page, keep its main content,
//! bundle its images, and write the package next to the others.

use crate::content::ContentFragment;
use crate::epub::{embed_images, EpubError, EpubPackage, PackageMetadata, SubDocument};
use crate::model::Chapter;
use crate::scraper::{resolve_url, Fetcher};
use reqwest::Url;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Language tag written to every package.
pub const DEFAULT_LANGUAGE: &str = "en";
/// Author written to every package.
pub const DEFAULT_AUTHOR: &str = "Hugging Face";

/// Settings shared by every chapter of a run.
pub struct AssembleOptions<'a> {
    /// Subchapter and image URLs resolve against this.
    pub base_url: &'a Url,
    pub language: &'a str,
    pub author: &'a str,
    /// Called with (subchapters done, total) before each subchapter and once at the end.
    pub progress: Option<&'a dyn Fn(u32, u32)>,
}

/// Build the package for `chapter`. `None` when no subchapter could be fetched.
pub fn assemble_chapter(
    fetcher: &mut dyn Fetcher,
    chapter: &Chapter,
    options: &AssembleOptions<'_>,
) -> Option<EpubPackage> {
    let heading = &chapter.title;
    let mut package = EpubPackage::new(PackageMetadata {
        identifier: heading.clone(),
        title: heading.clone(),
        language: options.language.to_string(),
        author: options.author.to_string(),
    });

    let total = chapter.subchapters.len() as u32;
    for (idx, sub) in chapter.subchapters.iter().enumerate() {
        let position = idx + 1;
        if let Some(progress) = options.progress {
            progress(idx as u32, total);
        }
        info!("Downloading subchapter: {} => {}", sub.title, sub.url);

        let page = match resolve_url(options.base_url, &sub.url)
            .and_then(|url| fetcher.fetch_text(url.as_str()))
        {
            Ok(page) => page,
            Err(e) => {
                warn!("Failed to download {}: {}", sub.url, e);
                continue;
            }
        };
        let mut fragment = match ContentFragment::parse(&page) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not read {}: {}", sub.url, e);
                continue;
            }
        };
        if !fragment.has_main_content() {
            info!("No main content marker in {}, using the whole page", sub.url);
        }

        let slug = format!("ch{}", position);
        let report = embed_images(fetcher, &mut fragment, &mut package, options.base_url, &slug);
        if report.failed > 0 {
            warn!(
                "{}: {} image(s) could not be embedded and keep their remote URL",
                sub.title, report.failed
            );
        }
        package.add_document(SubDocument::new(position, sub.title.clone(), fragment.to_xhtml()));
    }
    if let Some(progress) = options.progress {
        progress(total, total);
    }

    if package.is_empty() {
        warn!(
            "No subchapters (or all failed) for {}, skipping EPUB creation.",
            heading
        );
        return None;
    }
    Some(package)
}

/// Keep alphanumerics, spaces, `_` and `-`, then trim. Falls back to `chapter` when
/// nothing is left.
pub fn sanitize_file_stem(heading: &str) -> String {
    let kept: String = heading
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    let trimmed = kept.trim();
    if trimmed.is_empty() {
        "chapter".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `{output_dir}/{sanitized heading}.epub`.
pub fn output_path(output_dir: &Path, heading: &str) -> PathBuf {
    output_dir.join(format!("{}.epub", sanitize_file_stem(heading)))
}

/// Write the package for `heading` into `output_dir` and return the file path.
pub fn write_chapter_package(
    package: &EpubPackage,
    output_dir: &Path,
    heading: &str,
) -> Result<PathBuf, EpubError> {
    let path = output_path(output_dir, heading);
    package.write_epub(&path)?;
    Ok(path)
}

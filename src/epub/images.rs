//! Downloads the images of a content fragment into the package and points the
//! fragment's `<img>` tags at the bundled copies.

use crate::content::ContentFragment;
use crate::epub::frames::{sample_frames, FrameGallery};
use crate::epub::{Asset, AssetKind, EpubError, EpubPackage};
use crate::scraper::{resolve_url, Fetcher};
use reqwest::Url;
use tracing::{debug, info, warn};

const DEFAULT_MEDIA_TYPE: &str = "image/png";
const DEFAULT_EXTENSION: &str = ".png";

/// What happened to the images of one fragment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbedReport {
    /// Images bundled and rewritten.
    pub embedded: usize,
    /// Images left pointing at their original URL.
    pub failed: usize,
    /// Frame assets added for animated images.
    pub frames: usize,
}

/// Embed every image of `fragment` into `package`, in document order.
///
/// Images without `src` are ignored. An image that cannot be fetched keeps its original
/// reference. Bundled images are named `images/{uid_prefix}_{n}{ext}` where `n` counts
/// successfully fetched images. GIFs additionally get a gallery of sampled frames
/// right after them when they have more than one frame.
pub fn embed_images(
    fetcher: &mut dyn Fetcher,
    fragment: &mut ContentFragment,
    package: &mut EpubPackage,
    base_url: &Url,
    uid_prefix: &str,
) -> EmbedReport {
    let mut report = EmbedReport::default();
    let mut counter = 0usize;

    for image in fragment.images() {
        let src = match image.src.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => continue,
        };
        let url = match resolve_url(base_url, src) {
            Ok(u) => u,
            Err(e) => {
                warn!("Skipping image with unusable src {:?}: {}", src, e);
                report.failed += 1;
                continue;
            }
        };
        let resource = match fetcher.fetch(url.as_str()) {
            Ok(r) => r,
            Err(e) => {
                warn!("Failed to download image {}: {}", url, e);
                report.failed += 1;
                continue;
            }
        };

        let media_type = media_type_for(resource.content_type.as_deref());
        let ext = extension_for(&media_type);
        let index = counter;
        counter += 1;
        let uid = format!("{}_{}", uid_prefix, index);
        let file_name = format!("images/{}{}", uid, ext);

        let gallery = if is_animated(ext, &media_type) {
            info!("Processing GIF: {}", url);
            match sample_frames(&resource.bytes, uid_prefix, index) {
                Ok(Some(gallery)) => Some(gallery),
                Ok(None) => {
                    info!("No frames extracted for {}", url);
                    None
                }
                Err(e) => {
                    warn!("Failed to process GIF frames for {}: {}", url, e);
                    None
                }
            }
        } else {
            None
        };

        let asset = Asset {
            uid,
            file_name: file_name.clone(),
            media_type,
            data: resource.bytes,
            kind: AssetKind::Image,
        };
        if let Err(e) = package.add_asset(asset) {
            warn!("Could not bundle image {}: {}", url, e);
            report.failed += 1;
            continue;
        }
        fragment.rewrite_image(image.ordinal, file_name.as_str());
        report.embedded += 1;
        debug!("Embedded {} as {}", url, file_name);

        if let Some(gallery) = gallery {
            let count = gallery.frames.len();
            match add_gallery(package, gallery) {
                Ok(markup) => {
                    fragment.attach_gallery(image.ordinal, markup);
                    report.frames += count;
                    info!("Successfully extracted {} frames for {}", count, url);
                }
                Err(e) => warn!("Could not bundle GIF frames for {}: {}", url, e),
            }
        }
    }
    report
}

/// Register the frame assets together; on a clash none of them is added.
fn add_gallery(package: &mut EpubPackage, gallery: FrameGallery) -> Result<String, EpubError> {
    package.add_assets(gallery.frames)?;
    Ok(gallery.markup)
}

/// Media type from a Content-Type header. Missing or non-image types become PNG.
pub fn media_type_for(content_type: Option<&str>) -> String {
    let main = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|mt| mt.trim().to_ascii_lowercase());
    match main {
        Some(mt) if mt.starts_with("image/") && mt.len() > "image/".len() => mt,
        _ => DEFAULT_MEDIA_TYPE.to_string(),
    }
}

/// File extension (with dot) for an image media type; `.png` when unknown.
pub fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "image/png" => ".png",
        "image/jpeg" | "image/jpg" | "image/pjpeg" => ".jpg",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/svg+xml" => ".svg",
        "image/bmp" | "image/x-ms-bmp" => ".bmp",
        "image/x-icon" | "image/vnd.microsoft.icon" => ".ico",
        "image/tiff" => ".tiff",
        "image/avif" => ".avif",
        _ => DEFAULT_EXTENSION,
    }
}

fn is_animated(ext: &str, media_type: &str) -> bool {
    ext.eq_ignore_ascii_case(".gif") || media_type.eq_ignore_ascii_case("image/gif")
}

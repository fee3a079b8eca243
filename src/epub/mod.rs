//! EPUB package: in-memory model of one chapter's e-book and its EPUB 3 writer
//! (mimetype, container, OPF, nav.xhtml + toc.ncx, stylesheet, chapters, images).

pub mod frames;
pub mod images;

use crate::content::escape_attr;
use chrono::{DateTime, Utc};
use std::io::{Seek, Write};
use std::path::Path;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub use frames::{sample_frames, sample_indices, FrameError, FrameGallery, SAMPLE_COUNT};
pub use images::{embed_images, EmbedReport};

const CONTAINER_XML: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">\n  <rootfiles>\n    <rootfile full-path=\"OEBPS/content.opf\" media-type=\"application/oebps-package+xml\"/>\n  </rootfiles>\n</container>";

const MIMETYPE: &[u8] = b"application/epub+zip";
const OEBPS_PREFIX: &str = "OEBPS/";
const STYLESHEET_PATH: &str = "style/style.css";
/// EPUB 3 wants UTC without fractional seconds.
const MODIFIED_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Shared stylesheet: frame gallery container and headings.
pub const STYLESHEET: &str = r#".extracted-gif-frames {
  margin-top: 15px;
  padding: 10px;
  border: 1px dotted #ccc;
  background-color: #f9f9f9;
}
.extracted-gif-frames h4 {
  margin-top: 0;
  font-size: 1em;
  color: #666;
}
.extracted-gif-frames img {
  margin: 5px;
  border: 1px solid #ccc;
}
.gif-container {
  margin-bottom: 20px;
}
"#;

/// Errors from building or writing a package.
#[derive(Debug, Error)]
pub enum EpubError {
    #[error("Asset {name} is already part of the package.")]
    DuplicateAsset { name: String },

    #[error("Cannot write EPUB: package has no content documents.")]
    NoDocuments,

    #[error("Failed to create EPUB file: {path}: {source}")]
    CreateFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write EPUB archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl From<std::io::Error> for EpubError {
    fn from(e: std::io::Error) -> Self {
        EpubError::Zip(zip::result::ZipError::Io(e))
    }
}

/// Dublin Core metadata written to the OPF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetadata {
    pub identifier: String,
    pub title: String,
    pub language: String,
    pub author: String,
}

/// One content document (one subchapter page).
#[derive(Debug, Clone)]
pub struct SubDocument {
    /// Manifest id, `ch<N>`.
    pub slug: String,
    /// Path inside OEBPS, `chapter_<N>.xhtml`.
    pub file_name: String,
    pub title: String,
    /// XHTML fragment placed inside `<body>`.
    pub body: String,
}

impl SubDocument {
    /// Document for the subchapter at 1-based `position`.
    pub fn new(position: usize, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            slug: format!("ch{}", position),
            file_name: format!("chapter_{}.xhtml", position),
            title: title.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// Image downloaded from the page.
    Image,
    /// Still frame sampled from an animated image.
    Frame,
}

/// Binary file bundled into the package.
#[derive(Debug, Clone)]
pub struct Asset {
    pub uid: String,
    /// Path inside OEBPS, e.g. `images/ch1_0.png`. Also what `<img src>` points at.
    pub file_name: String,
    pub media_type: String,
    pub data: Vec<u8>,
    pub kind: AssetKind,
}

/// One chapter's e-book, assembled in memory and written once.
#[derive(Debug)]
pub struct EpubPackage {
    metadata: PackageMetadata,
    documents: Vec<SubDocument>,
    assets: Vec<Asset>,
    stylesheet: String,
    /// Written as `dcterms:modified`.
    modified: DateTime<Utc>,
}

impl EpubPackage {
    pub fn new(metadata: PackageMetadata) -> Self {
        Self {
            metadata,
            documents: Vec::new(),
            assets: Vec::new(),
            stylesheet: STYLESHEET.to_string(),
            modified: Utc::now(),
        }
    }

    /// Override the modification time, which defaults to when the package was created.
    pub fn set_modified(&mut self, at: DateTime<Utc>) {
        self.modified = at;
    }

    pub fn metadata(&self) -> &PackageMetadata {
        &self.metadata
    }

    pub fn documents(&self) -> &[SubDocument] {
        &self.documents
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn asset(&self, file_name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.file_name == file_name)
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn add_document(&mut self, document: SubDocument) {
        self.documents.push(document);
    }

    /// Register an asset. Uids and file names must be unique within the package.
    pub fn add_asset(&mut self, asset: Asset) -> Result<(), EpubError> {
        if clashes(&self.assets, &asset) {
            return Err(EpubError::DuplicateAsset {
                name: asset.file_name,
            });
        }
        self.assets.push(asset);
        Ok(())
    }

    /// Register a group of assets, all or none. Nothing is added if any of them clashes
    /// with the package or with another member of the group.
    pub fn add_assets(&mut self, assets: Vec<Asset>) -> Result<(), EpubError> {
        for (i, asset) in assets.iter().enumerate() {
            if clashes(&self.assets, asset) || clashes(&assets[..i], asset) {
                return Err(EpubError::DuplicateAsset {
                    name: asset.file_name.clone(),
                });
            }
        }
        self.assets.extend(assets);
        Ok(())
    }

    /// Write the package to `path`, replacing any existing file.
    pub fn write_epub(&self, path: &Path) -> Result<(), EpubError> {
        let file = std::fs::File::create(path).map_err(|e| EpubError::CreateFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.write_to(file)?;
        Ok(())
    }

    /// Serialize the package as an EPUB zip into `writer`.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W, EpubError> {
        if self.documents.is_empty() {
            return Err(EpubError::NoDocuments);
        }
        let mut zip = ZipWriter::new(writer);

        let options_stored = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored)
            .unix_permissions(0o644);
        let options_deflate = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(0o644);

        // Mimetype first, uncompressed (required by EPUB OCF)
        zip.start_file("mimetype", options_stored)?;
        zip.write_all(MIMETYPE)?;

        zip.start_file("META-INF/container.xml", options_deflate)?;
        zip.write_all(CONTAINER_XML)?;

        self.write_opf(&mut zip, options_deflate)?;
        self.write_nav_xhtml(&mut zip, options_deflate)?;
        self.write_ncx(&mut zip, options_deflate)?;

        zip.start_file(format!("{}{}", OEBPS_PREFIX, STYLESHEET_PATH), options_deflate)?;
        zip.write_all(self.stylesheet.as_bytes())?;

        self.write_documents(&mut zip, options_deflate)?;

        for asset in &self.assets {
            // Images go in as fetched, uncompressed.
            zip.start_file(format!("{}{}", OEBPS_PREFIX, asset.file_name), options_stored)?;
            zip.write_all(&asset.data)?;
        }

        Ok(zip.finish()?)
    }

    fn write_opf(
        &self,
        zip: &mut ZipWriter<impl Write + Seek>,
        options: SimpleFileOptions,
    ) -> Result<(), EpubError> {
        let meta = &self.metadata;
        let mut manifest = format!(
            r#"    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="style" href="{}" media-type="text/css"/>
"#,
            STYLESHEET_PATH
        );
        for doc in &self.documents {
            manifest.push_str(&format!(
                "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
                xml_escape(&doc.slug),
                xml_escape(&doc.file_name)
            ));
        }
        for asset in &self.assets {
            manifest.push_str(&format!(
                "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"/>\n",
                xml_escape(&asset.uid),
                xml_escape(&asset.file_name),
                xml_escape(&asset.media_type)
            ));
        }

        // Reading order: navigation page first, then each document.
        let mut spine = String::from("    <itemref idref=\"nav\"/>\n");
        for doc in &self.documents {
            spine.push_str(&format!(
                "    <itemref idref=\"{}\"/>\n",
                xml_escape(&doc.slug)
            ));
        }

        let opf = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="book-id" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="book-id">{id}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:language>{language}</dc:language>
    <dc:creator>{creator}</dc:creator>
    <meta property="dcterms:modified">{modified}</meta>
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine toc="ncx">
{spine}  </spine>
</package>
"#,
            id = xml_escape(&meta.identifier),
            title = xml_escape(&meta.title),
            language = xml_escape(&meta.language),
            creator = xml_escape(&meta.author),
            modified = self.modified.format(MODIFIED_FORMAT),
            manifest = manifest,
            spine = spine,
        );

        zip.start_file(format!("{}content.opf", OEBPS_PREFIX), options)?;
        zip.write_all(opf.as_bytes())?;
        Ok(())
    }

    fn write_nav_xhtml(
        &self,
        zip: &mut ZipWriter<impl Write + Seek>,
        options: SimpleFileOptions,
    ) -> Result<(), EpubError> {
        let mut nav_links = String::new();
        for doc in &self.documents {
            nav_links.push_str(&format!(
                "      <li><a href=\"{}\">{}</a></li>\n",
                xml_escape(&doc.file_name),
                xml_escape(&doc.title)
            ));
        }
        let nav = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="{lang}" xml:lang="{lang}">
<head>
  <meta charset="UTF-8"/>
  <title>{title}</title>
</head>
<body>
  <nav epub:type="toc" id="toc">
    <h1>{title}</h1>
    <ol>
{links}    </ol>
  </nav>
</body>
</html>
"#,
            lang = xml_escape(&self.metadata.language),
            title = xml_escape(&self.metadata.title),
            links = nav_links
        );
        zip.start_file(format!("{}nav.xhtml", OEBPS_PREFIX), options)?;
        zip.write_all(nav.as_bytes())?;
        Ok(())
    }

    fn write_ncx(
        &self,
        zip: &mut ZipWriter<impl Write + Seek>,
        options: SimpleFileOptions,
    ) -> Result<(), EpubError> {
        let mut nav_points = String::new();
        for (i, doc) in self.documents.iter().enumerate() {
            nav_points.push_str(&format!(
                r#"    <navPoint id="navpoint-{n}" playOrder="{n}">
      <navLabel><text>{label}</text></navLabel>
      <content src="{src}"/>
    </navPoint>
"#,
                n = i + 1,
                label = xml_escape(&doc.title),
                src = xml_escape(&doc.file_name)
            ));
        }
        let ncx = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{}"/>
  </head>
  <docTitle>
    <text>{}</text>
  </docTitle>
  <navMap>
{}  </navMap>
</ncx>
"#,
            xml_escape(&self.metadata.identifier),
            xml_escape(&self.metadata.title),
            nav_points
        );
        zip.start_file(format!("{}toc.ncx", OEBPS_PREFIX), options)?;
        zip.write_all(ncx.as_bytes())?;
        Ok(())
    }

    fn write_documents(
        &self,
        zip: &mut ZipWriter<impl Write + Seek>,
        options: SimpleFileOptions,
    ) -> Result<(), EpubError> {
        let lang = xml_escape(&self.metadata.language);
        for doc in &self.documents {
            let html = format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="{lang}" xml:lang="{lang}">
<head>
  <meta charset="UTF-8"/>
  <title>{title}</title>
  <link rel="stylesheet" type="text/css" href="{css}"/>
</head>
<body>
{body}
</body>
</html>
"#,
                lang = lang,
                title = xml_escape(&doc.title),
                css = STYLESHEET_PATH,
                body = doc.body
            );
            zip.start_file(format!("{}{}", OEBPS_PREFIX, doc.file_name), options)?;
            zip.write_all(html.as_bytes())?;
        }
        Ok(())
    }
}

fn clashes(existing: &[Asset], asset: &Asset) -> bool {
    existing
        .iter()
        .any(|a| a.uid == asset.uid || a.file_name == asset.file_name)
}

fn xml_escape(s: &str) -> String {
    escape_attr(s).replace('\'', "&apos;")
}

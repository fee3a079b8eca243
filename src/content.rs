//! A subchapter page reduced to its main content region, serialized as XHTML.
//!
//! The parsed tree itself is never mutated. Image rewrites are recorded against the
//! image's position in document order and applied while serializing.

use crate::scraper::{parse_selector, StructureError};
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::BTreeMap;

/// Class marking the article body on course pages.
pub const MAIN_CONTENT_SELECTOR: &str = ".prose-doc";

/// Elements dropped from the output, subtree included.
const SKIPPED_ELEMENTS: &[&str] = &["script", "noscript", "template"];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const MATHML_NS: &str = "http://www.w3.org/1998/Math/MathML";

/// An `<img>` in the main region. `ordinal` is its position among all images there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub ordinal: usize,
    pub src: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct ImageRewrite {
    src: String,
    gallery: Option<String>,
}

/// Parsed page plus the pending image rewrites.
#[derive(Debug)]
pub struct ContentFragment {
    html: Html,
    main: Selector,
    body: Selector,
    rewrites: BTreeMap<usize, ImageRewrite>,
}

impl ContentFragment {
    /// Parse a full page. The main region is `.prose-doc`, or the whole body if absent.
    pub fn parse(page: &str) -> Result<Self, StructureError> {
        Ok(Self {
            html: Html::parse_document(page),
            main: parse_selector(MAIN_CONTENT_SELECTOR)?,
            body: parse_selector("body")?,
            rewrites: BTreeMap::new(),
        })
    }

    /// True when the page carried the main content marker.
    pub fn has_main_content(&self) -> bool {
        self.html.select(&self.main).next().is_some()
    }

    /// Region root and whether the root element itself is part of the output.
    fn region(&self) -> (ElementRef<'_>, bool) {
        if let Some(main) = self.html.select(&self.main).next() {
            return (main, true);
        }
        match self.html.select(&self.body).next() {
            Some(body) => (body, false),
            None => (self.html.root_element(), false),
        }
    }

    /// Every `<img>` of the region, in document order.
    pub fn images(&self) -> Vec<ImageRef> {
        let (root, include_root) = self.region();
        let mut out = Vec::new();
        let mut visit = |el: ElementRef<'_>| {
            if el.value().name() == "img" {
                out.push(ImageRef {
                    ordinal: out.len(),
                    src: el.value().attr("src").map(String::from),
                });
            }
        };
        if include_root {
            walk_elements(root, &mut visit);
        } else {
            for child in root.children().filter_map(ElementRef::wrap) {
                walk_elements(child, &mut visit);
            }
        }
        out
    }

    /// Point the image at `src` (a package-local file name). Drops any `srcset`.
    pub fn rewrite_image(&mut self, ordinal: usize, src: impl Into<String>) {
        self.rewrites.entry(ordinal).or_default().src = src.into();
    }

    /// Place `markup` right after the (rewritten) image, both wrapped in `div.gif-container`.
    /// `markup` must already be well-formed XHTML.
    pub fn attach_gallery(&mut self, ordinal: usize, markup: impl Into<String>) {
        self.rewrites.entry(ordinal).or_default().gallery = Some(markup.into());
    }

    /// Serialize the region as an XHTML fragment suitable for a `<body>`.
    pub fn to_xhtml(&self) -> String {
        let (root, include_root) = self.region();
        let mut writer = XhtmlWriter {
            out: String::new(),
            rewrites: &self.rewrites,
            next_image: 0,
        };
        if include_root {
            writer.element(root, "");
        } else {
            writer.children(root, &root.value().name.ns);
        }
        writer.out
    }
}

/// Pre-order walk over elements, skipping the same subtrees the serializer drops.
fn walk_elements<'a>(el: ElementRef<'a>, visit: &mut impl FnMut(ElementRef<'a>)) {
    if SKIPPED_ELEMENTS.contains(&el.value().name()) {
        return;
    }
    visit(el);
    for child in el.children().filter_map(ElementRef::wrap) {
        walk_elements(child, visit);
    }
}

struct XhtmlWriter<'r> {
    out: String,
    rewrites: &'r BTreeMap<usize, ImageRewrite>,
    next_image: usize,
}

impl XhtmlWriter<'_> {
    fn children(&mut self, el: ElementRef<'_>, ns: &str) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => self.out.push_str(&escape_text(text)),
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.element(child_el, ns);
                    }
                }
                _ => {}
            }
        }
    }

    fn element(&mut self, el: ElementRef<'_>, parent_ns: &str) {
        let value = el.value();
        let name = value.name();
        if SKIPPED_ELEMENTS.contains(&name) {
            return;
        }
        let ns: &str = &value.name.ns;
        if !is_xml_name(name) {
            // Keep the content of elements that cannot be expressed in XML.
            self.children(el, ns);
            return;
        }

        let rewrite = if name == "img" {
            let ordinal = self.next_image;
            self.next_image += 1;
            self.rewrites.get(&ordinal)
        } else {
            None
        };
        let gallery = rewrite.and_then(|r| r.gallery.as_deref());
        if gallery.is_some() {
            self.out.push_str("<div class=\"gif-container\">");
        }

        self.out.push('<');
        self.out.push_str(name);
        if ns != parent_ns && (ns == SVG_NS || ns == MATHML_NS) {
            self.out.push_str(&format!(" xmlns=\"{}\"", ns));
        }
        let mut seen: Vec<&str> = Vec::new();
        for (attr, attr_value) in value.attrs() {
            if attr == "xmlns" || !is_xml_name(attr) || seen.contains(&attr) {
                continue;
            }
            seen.push(attr);
            let attr_value = match (rewrite, attr) {
                (Some(_), "srcset") => continue,
                (Some(r), "src") => r.src.as_str(),
                _ => attr_value,
            };
            self.push_attr(attr, attr_value);
        }
        if let Some(r) = rewrite {
            if !seen.contains(&"src") {
                self.push_attr("src", &r.src);
            }
        }

        if VOID_ELEMENTS.contains(&name) && ns != SVG_NS && ns != MATHML_NS {
            self.out.push_str("/>");
        } else {
            self.out.push('>');
            self.children(el, ns);
            self.out.push_str("</");
            self.out.push_str(name);
            self.out.push('>');
        }

        if let Some(gallery) = gallery {
            self.out.push_str(gallery);
            self.out.push_str("</div>");
        }
    }

    fn push_attr(&mut self, name: &str, value: &str) {
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str("=\"");
        self.out.push_str(&escape_attr(value));
        self.out.push('"');
    }
}

/// Conservative XML Name check (ASCII only) for tag and attribute names.
fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
        && name.matches(':').count() <= 1
}

/// XML 1.0 `Char`: tab, newline, carriage return, and everything from U+0020 up except
/// U+FFFE and U+FFFF.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && !matches!(c, '\u{FFFE}' | '\u{FFFF}'))
}

/// Escape markup characters and drop characters XML cannot represent.
fn escape(s: &str, quotes: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if quotes => out.push_str("&quot;"),
            c if is_xml_char(c) => out.push(c),
            _ => {}
        }
    }
    out
}

pub(crate) fn escape_text(s: &str) -> String {
    escape(s, false)
}

pub(crate) fn escape_attr(s: &str) -> String {
    escape(s, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html><html><head><title>t</title></head><body>
<header><img src="/logo.svg"></header>
<div class="prose-doc"><h1>Welcome</h1>
<p>Agents &amp; tools<br>line</p>
<img src="/a.png" alt="first">
<script>var x = "<img src='no.png'>";</script>
<noscript><img src="/tracking.gif"></noscript>
<p><img src="https://cdn.example.com/b.gif" srcset="https://cdn.example.com/b@2x.gif 2x"></p>
<img alt="no source">
</div></body></html>"#;

    #[test]
    fn selects_prose_doc_region() -> Result<(), StructureError> {
        let fragment = ContentFragment::parse(PAGE)?;
        assert!(fragment.has_main_content());
        let xhtml = fragment.to_xhtml();
        assert!(xhtml.starts_with("<div class=\"prose-doc\">"));
        assert!(!xhtml.contains("logo.svg"));
        assert!(!xhtml.contains("<title>"));
        Ok(())
    }

    #[test]
    fn lists_images_in_document_order_skipping_scripts() -> Result<(), StructureError> {
        let fragment = ContentFragment::parse(PAGE)?;
        let images = fragment.images();
        assert_eq!(images.len(), 3);
        assert_eq!(images[0].src.as_deref(), Some("/a.png"));
        assert_eq!(images[1].src.as_deref(), Some("https://cdn.example.com/b.gif"));
        assert_eq!(images[2].src, None);
        assert_eq!(
            images.iter().map(|i| i.ordinal).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        Ok(())
    }

    #[test]
    fn falls_back_to_body_without_marker() -> Result<(), StructureError> {
        let fragment =
            ContentFragment::parse("<html><body><p>Plain</p><img src=\"x.png\"></body></html>")?;
        assert!(!fragment.has_main_content());
        assert_eq!(fragment.to_xhtml(), "<p>Plain</p><img src=\"x.png\"/>");
        assert_eq!(fragment.images().len(), 1);
        Ok(())
    }

    #[test]
    fn serializes_well_formed_xhtml() -> Result<(), StructureError> {
        let fragment = ContentFragment::parse(PAGE)?;
        let xhtml = fragment.to_xhtml();
        assert!(xhtml.contains("<p>Agents &amp; tools<br/>line</p>"));
        let img_start = xhtml.find("<img").expect("image in output");
        let img_len = xhtml[img_start..].find("/>").expect("self-closed image");
        let img_tag = &xhtml[img_start..img_start + img_len];
        assert!(img_tag.contains("src=\"/a.png\""));
        assert!(img_tag.contains("alt=\"first\""));
        assert!(!xhtml.contains("<script"));
        assert!(!xhtml.contains("tracking.gif"));
        Ok(())
    }

    #[test]
    fn rewrites_src_and_drops_srcset() -> Result<(), StructureError> {
        let mut fragment = ContentFragment::parse(PAGE)?;
        fragment.rewrite_image(1, "images/ch1_1.gif");
        let xhtml = fragment.to_xhtml();
        assert!(xhtml.contains("<img src=\"images/ch1_1.gif\"/>"));
        assert!(!xhtml.contains("cdn.example.com"));
        assert!(xhtml.contains("src=\"/a.png\""));
        Ok(())
    }

    #[test]
    fn gallery_follows_rewritten_image_inside_container() -> Result<(), StructureError> {
        let mut fragment = ContentFragment::parse(PAGE)?;
        fragment.rewrite_image(1, "images/ch1_1.gif");
        fragment.attach_gallery(1, "<div class=\"extracted-gif-frames\"></div>");
        let xhtml = fragment.to_xhtml();
        assert!(xhtml.contains(
            "<div class=\"gif-container\"><img src=\"images/ch1_1.gif\"/><div class=\"extracted-gif-frames\"></div></div>"
        ));
        Ok(())
    }

    #[test]
    fn svg_gets_namespace_and_keeps_children() -> Result<(), StructureError> {
        let fragment = ContentFragment::parse(
            "<div class=\"prose-doc\"><svg viewBox=\"0 0 1 1\"><path d=\"M0 0\"></path></svg></div>",
        )?;
        let xhtml = fragment.to_xhtml();
        assert!(xhtml.contains(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 1 1\"><path d=\"M0 0\"></path></svg>"
        ));
        Ok(())
    }

    #[test]
    fn drops_attributes_that_are_not_xml_names() -> Result<(), StructureError> {
        let fragment =
            ContentFragment::parse("<div class=\"prose-doc\"><p @click=\"x\" id=\"a\">t</p></div>")?;
        assert_eq!(
            fragment.to_xhtml(),
            "<div class=\"prose-doc\"><p id=\"a\">t</p></div>"
        );
        Ok(())
    }

    #[test]
    fn control_characters_are_dropped() -> Result<(), StructureError> {
        let fragment =
            ContentFragment::parse("<div class=\"prose-doc\"><p>a\u{1}b\u{b}c</p></div>")?;
        assert_eq!(
            fragment.to_xhtml(),
            "<div class=\"prose-doc\"><p>abc</p></div>"
        );
        Ok(())
    }

    #[test]
    fn escaping_keeps_whitespace_and_drops_non_characters() {
        assert_eq!(escape_text("a\tb\nc\r<\u{1f}>"), "a\tb\nc\r&lt;&gt;");
        assert_eq!(escape_attr("\"x\u{c}\u{FFFE}y\" \u{e9}"), "&quot;xy&quot; \u{e9}");
    }
}

//! Reads the chapter/subchapter tree from the course page's side menu.
//!
//! The page renders `<div data-target="SideMenu" data-props="{...}">` where `data-props`
//! is HTML-escaped JSON with a `chapters` array.

use crate::model::{Chapter, SideMenuProps};
use crate::scraper::error::StructureError;
use crate::scraper::parse_selector;
use quick_xml::escape::unescape_with;
use scraper::Html;

const SIDE_MENU_SELECTOR: &str = "div[data-target=\"SideMenu\"]";
const PROPS_ATTR: &str = "data-props";

/// Extract the ordered chapter list. Chapters without sections are kept.
pub fn extract_chapters(html: &str) -> Result<Vec<Chapter>, StructureError> {
    let doc = Html::parse_document(html);
    let sel = parse_selector(SIDE_MENU_SELECTOR)?;
    let menu = doc
        .select(&sel)
        .next()
        .ok_or(StructureError::MissingSideMenu)?;
    let raw = menu
        .value()
        .attr(PROPS_ATTR)
        .ok_or(StructureError::MissingProps)?;

    // The parser has already decoded one level of entities; some pages escape twice.
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(first) => {
            let invalid = || StructureError::InvalidJson {
                reason: first.to_string(),
            };
            let decoded = unescape_with(raw, resolve_entity).map_err(|_| invalid())?;
            serde_json::from_str(&decoded).map_err(|_| invalid())?
        }
    };

    if value.get("chapters").is_none() {
        return Err(StructureError::MissingChapters);
    }
    let props: SideMenuProps =
        serde_json::from_value(value).map_err(|e| StructureError::InvalidShape {
            reason: e.to_string(),
        })?;
    Ok(props.chapters)
}

/// Named entities seen in escaped props. Numeric references are handled by quick-xml.
fn resolve_entity(name: &str) -> Option<&'static str> {
    match name {
        "quot" => Some("\""),
        "amp" => Some("&"),
        "lt" => Some("<"),
        "gt" => Some(">"),
        "apos" => Some("'"),
        "nbsp" => Some("\u{a0}"),
        _ => None,
    }
}

//! Course hierarchy as decoded from the site's side menu.
//!
//! One [Chapter] becomes one EPUB; its [Subchapter]s become the EPUB's content documents,
//! in the order listed here.

use serde::Deserialize;

/// Top-level course unit (e.g. "Unit 0. Welcome to the course").
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Chapter {
    pub title: String,
    /// Pages of this unit in reading order. The site calls them `sections`.
    #[serde(rename = "sections", default)]
    pub subchapters: Vec<Subchapter>,
}

/// One page of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Subchapter {
    pub title: String,
    /// Relative (`/learn/...`) or absolute page URL.
    pub url: String,
}

/// Top-level shape of the side menu `data-props` payload. Other keys are ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct SideMenuProps {
    pub chapters: Vec<Chapter>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn chapter_reads_sections_as_subchapters() -> Result<(), Box<dyn Error>> {
        let json = r#"{"title":"Unit 1. Introduction","sections":[
            {"title":"What is an Agent?","url":"/learn/agents-course/unit1/what-are-agents"},
            {"title":"Quiz","url":"/learn/agents-course/unit1/quiz1"}]}"#;
        let chapter: Chapter = serde_json::from_str(json)?;
        assert_eq!(chapter.title, "Unit 1. Introduction");
        assert_eq!(chapter.subchapters.len(), 2);
        assert_eq!(chapter.subchapters[0].title, "What is an Agent?");
        assert_eq!(chapter.subchapters[1].url, "/learn/agents-course/unit1/quiz1");
        Ok(())
    }

    #[test]
    fn chapter_without_sections_has_no_subchapters() -> Result<(), Box<dyn Error>> {
        let chapter: Chapter = serde_json::from_str(r#"{"title":"Live 1"}"#)?;
        assert!(chapter.subchapters.is_empty());
        Ok(())
    }

    #[test]
    fn subchapter_without_url_is_rejected() {
        let result = serde_json::from_str::<Chapter>(r#"{"title":"U","sections":[{"title":"x"}]}"#);
        assert!(result.is_err());
    }
}

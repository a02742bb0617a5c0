use html_escape::encode_text;
use regex::{Captures, Regex};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::RenderError;

/// Directory searched for templates that are not found at the given path.
pub const TEMPLATE_DIR: &str = "templates";

const PLACEHOLDER: &str = r"\{\{\s*([A-Za-z_]+)\s*\}\}";

/// Everything a template can show.
///
/// `title`, `header`, `summary` and `date` are plain text and are escaped on
/// output. `preamble` and `body` are HTML and are inserted as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderContext {
    pub title: String,
    pub header: String,
    pub summary: String,
    pub date: String,
    pub preamble: Option<String>,
    pub body: String,
}

impl RenderContext {
    fn value(&self, name: &str) -> Option<String> {
        let value = match name {
            "title" => encode_text(&self.title).into_owned(),
            "header" => encode_text(&self.header).into_owned(),
            "summary" => encode_text(&self.summary).into_owned(),
            "date" => encode_text(&self.date).into_owned(),
            "preamble" => self.preamble.clone().unwrap_or_default(),
            "body" => self.body.clone(),
            _ => return None,
        };
        Some(value)
    }
}

/// Turns a [`RenderContext`] into a finished HTML document.
pub trait Renderer {
    fn render(&self, context: &RenderContext) -> Result<String, RenderError>;
}

/// An HTML file with `{{ name }}` placeholders.
pub struct HtmlTemplate {
    source: String,
    placeholder: Regex,
}

impl HtmlTemplate {
    pub fn from_source(source: impl Into<String>) -> Result<Self, RenderError> {
        Ok(Self {
            source: source.into(),
            placeholder: Regex::new(PLACEHOLDER)?,
        })
    }

    /// Loads `name` as given, or from the `templates/` directory.
    pub fn load(name: &str) -> Result<Self, RenderError> {
        let path = resolve_template(name)?;
        let source = fs::read_to_string(&path).map_err(|source| RenderError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_source(source)
    }
}

impl Renderer for HtmlTemplate {
    fn render(&self, context: &RenderContext) -> Result<String, RenderError> {
        // Any unknown placeholder fails the whole render.
        if let Some(unknown) = self
            .placeholder
            .captures_iter(&self.source)
            .map(|caps| caps[1].to_string())
            .find(|name| context.value(name).is_none())
        {
            return Err(RenderError::UnknownPlaceholder(unknown));
        }

        let rendered = self
            .placeholder
            .replace_all(&self.source, |caps: &Captures| {
                context.value(&caps[1]).unwrap_or_default()
            });
        Ok(rendered.into_owned())
    }
}

fn resolve_template(name: &str) -> Result<PathBuf, RenderError> {
    let direct = Path::new(name);
    if direct.is_file() {
        return Ok(direct.to_path_buf());
    }
    let in_dir = Path::new(TEMPLATE_DIR).join(name);
    if in_dir.is_file() {
        return Ok(in_dir);
    }
    Err(RenderError::NotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn context() -> RenderContext {
        RenderContext {
            title: "Report <today>".into(),
            header: "Report: 1 search criterion configured (a)".into(),
            summary: "1 success".into(),
            date: "2026-10-18".into(),
            preamble: Some("<p>Hello</p>".into()),
            body: "<h2>a</h2>".into(),
        }
    }

    #[test]
    fn test_render_substitutes_and_escapes() {
        let template =
            HtmlTemplate::from_source("<title>{{ title }}</title>{{preamble}}{{ body }}").unwrap();
        let html = template.render(&context()).unwrap();
        assert_eq!(
            html,
            "<title>Report &lt;today&gt;</title><p>Hello</p><h2>a</h2>"
        );
    }

    #[test]
    fn test_missing_preamble_renders_empty() {
        let template = HtmlTemplate::from_source("[{{ preamble }}]").unwrap();
        let ctx = RenderContext {
            preamble: None,
            ..context()
        };
        assert_eq!(template.render(&ctx).unwrap(), "[]");
    }

    #[test]
    fn test_unknown_placeholder_is_an_error() {
        let template = HtmlTemplate::from_source("{{ body }}{{ footer }}").unwrap();
        let err = template.render(&context()).unwrap_err();
        assert!(matches!(err, RenderError::UnknownPlaceholder(name) if name == "footer"));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<h1>{{ header }}</h1>").unwrap();
        let template = HtmlTemplate::load(file.path().to_str().unwrap()).unwrap();
        let html = template.render(&context()).unwrap();
        assert!(html.contains("1 search criterion configured"));
    }

    #[test]
    fn test_load_missing_template() {
        let err = HtmlTemplate::load("no_such_template.html").err().unwrap();
        assert!(matches!(err, RenderError::NotFound(_)));
    }
}

//! Renderers for documents a browser can show more or less directly.

use std::fs;
use std::path::Path;

use ammonia::{Builder as AmmoniaBuilder, clean_text};
use comrak::{Options, markdown_to_html};

use super::types::{RenderContext, RendererError};

/// CommonMark with the GitHub table, strikethrough and autolink extensions.
pub struct MarkdownRenderer {
    options: Options<'static>,
    sanitizer: AmmoniaBuilder<'static>,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let mut options = Options::default();
        options.extension.table = true;
        options.extension.strikethrough = true;
        options.extension.autolink = true;
        options.extension.tasklist = true;

        let mut sanitizer = AmmoniaBuilder::default();
        sanitizer.add_tag_attributes("th", &["align"]);
        sanitizer.add_tag_attributes("td", &["align"]);
        sanitizer.add_tag_attributes("input", &["type", "checked", "disabled"]);
        sanitizer.add_tags(&["input"]);

        Self { options, sanitizer }
    }

    pub fn render(&self, path: &Path) -> Result<String, RendererError> {
        let bytes = fs::read(path)?;
        let source = String::from_utf8_lossy(&bytes);
        let html = markdown_to_html(&source, &self.options);
        Ok(format!(
            "<div class=\"quire-markdown\">\n{}\n</div>",
            self.sanitizer.clean(&html)
        ))
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

pub fn render_text(path: &Path) -> Result<String, RendererError> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(format!(
        "<pre class=\"quire-text\">{}</pre>",
        clean_text(&text)
    ))
}

pub fn render_image(context: &RenderContext) -> String {
    format!(
        "<img class=\"quire-image\" src=\"{}\" alt=\"\">",
        clean_text(&context.download_url)
    )
}

pub fn render_pdf(context: &RenderContext) -> String {
    let viewer = format!(
        "{}/pdf/web/viewer.html",
        context.static_path.trim_end_matches('/')
    );
    let src = format!(
        "{viewer}?file={}",
        url::form_urlencoded::byte_serialize(context.download_url.as_bytes()).collect::<String>()
    );
    format!(
        "<iframe class=\"quire-pdf\" src=\"{}\" width=\"100%\" height=\"800\"></iframe>",
        clean_text(&src)
    )
}

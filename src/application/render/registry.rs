use std::path::{Path, PathBuf};

use super::external::ExternalRenderer;
use super::markup::{MarkdownRenderer, render_image, render_pdf, render_text};
use super::tabular::{render_delimited, render_stata};
use super::types::{FileRenderer, RenderContext, RendererError};

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "log", "rst", "c", "cc", "cpp", "cs", "css", "go", "h", "hpp", "java", "js", "json",
    "jl", "m", "php", "pl", "py", "r", "rb", "rs", "scala", "sh", "sql", "swift", "tex", "ts",
    "toml", "xml", "yaml", "yml",
];

/// Picks a renderer by the file's lower-cased extension.
pub struct RendererRegistry {
    markdown: MarkdownRenderer,
    external: Option<ExternalRenderer>,
}

impl RendererRegistry {
    pub fn new(external_command: Option<PathBuf>) -> Self {
        Self {
            markdown: MarkdownRenderer::new(),
            external: external_command.map(ExternalRenderer::new),
        }
    }
}

impl FileRenderer for RendererRegistry {
    fn render(&self, path: &Path, context: &RenderContext) -> Result<String, RendererError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "dta" => render_stata(path),
            "csv" => render_delimited(path, b','),
            "tsv" => render_delimited(path, b'\t'),
            "md" | "markdown" => self.markdown.render(path),
            "pdf" => Ok(render_pdf(context)),
            ext if TEXT_EXTENSIONS.contains(&ext) => render_text(path),
            ext if is_image(ext) => Ok(render_image(context)),
            ext => match &self.external {
                Some(external) => external.render(path, context),
                None => Err(RendererError::Unsupported {
                    extension: if ext.is_empty() {
                        "(none)".to_string()
                    } else {
                        format!(".{ext}")
                    },
                }),
            },
        }
    }
}

fn is_image(extension: &str) -> bool {
    !extension.is_empty()
        && mime_guess::from_ext(extension)
            .first()
            .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE)
}

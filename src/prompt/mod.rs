//! Prompt rendering
//!
//! A rendered prompt is, in order: the style directive (if any) and a blank
//! line, the content type's template with the user prompt substituted, and
//! the directive of the requested output format.
//!
//! ```rust
//! use lorewright::prompt::PromptBuilder;
//!
//! let builder = PromptBuilder::new();
//! let prompt = builder.render("character", "Elf ranger", "markdown", "").unwrap();
//! assert!(prompt.contains("Elf ranger"));
//! assert!(prompt.contains("FORMAT REQUIREMENT: Use markdown"));
//! ```

pub mod formats;
pub mod styles;
pub mod templates;

pub use formats::OutputFormat;
pub use styles::{StyleCatalogue, DEFAULT_STYLE};
pub use templates::{Category, ContentType, CATALOGUE, USER_PROMPT_SLOT};

use tracing::trace;

use crate::LorewrightError;

/// Renders generation requests into a single prompt string
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    styles: StyleCatalogue,
}

impl PromptBuilder {
    /// Builder with the built-in styles only
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_styles(styles: StyleCatalogue) -> Self {
        Self { styles }
    }

    pub fn styles(&self) -> &StyleCatalogue {
        &self.styles
    }

    pub fn styles_mut(&mut self) -> &mut StyleCatalogue {
        &mut self.styles
    }

    /// Render a prompt
    ///
    /// `output_format` is matched against the known formats; an unrecognised
    /// format simply gets no directive. `style` is a style name; an empty or
    /// unknown name leaves the model in its own voice.
    pub fn render(
        &self,
        content_type: &str,
        user_prompt: &str,
        output_format: &str,
        style: &str,
    ) -> Result<String, LorewrightError> {
        let content = templates::lookup(content_type)
            .ok_or_else(|| LorewrightError::UnknownContentType(content_type.to_string()))?;
        let style_text = self.styles.resolve(style);

        let mut prompt = content.fill(user_prompt);
        if let Some(format) = OutputFormat::from_name(output_format) {
            prompt.push_str(format.directive());
        }

        if !style_text.trim().is_empty() {
            prompt = format!("{}\n\n{}", style_text, prompt);
        }

        trace!(content_type, chars = prompt.len(), "Rendered prompt");
        Ok(prompt)
    }
}

//! Output formats and their prompt directives

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::LorewrightError;

/// Formats a generation can be requested in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    PlainText,
    Markdown,
    Html,
    Json,
    Xml,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::PlainText,
        OutputFormat::Markdown,
        OutputFormat::Html,
        OutputFormat::Json,
        OutputFormat::Xml,
    ];

    /// Exact, case-insensitive lookup by name or file extension
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        let format = match name.trim_start_matches('.') {
            "txt" | "text" | "plain" | "plain-text" => Self::PlainText,
            "md" | "markdown" => Self::Markdown,
            "html" | "htm" => Self::Html,
            "json" => Self::Json,
            "xml" => Self::Xml,
            _ => return None,
        };
        Some(format)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PlainText => "plain-text",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Json => "json",
            Self::Xml => "xml",
        }
    }

    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::PlainText => "txt",
            Self::Markdown => "md",
            Self::Html => "html",
            Self::Json => "json",
            Self::Xml => "xml",
        }
    }

    /// Block appended to the rendered prompt
    ///
    /// Every directive starts on its own paragraph with a `FORMAT REQUIREMENT:`
    /// marker so a leaked echo can be recognised and removed afterwards.
    pub fn directive(&self) -> &'static str {
        match self {
            Self::PlainText => {
                "\n\nFORMAT REQUIREMENT: Plain text only. Do not use markdown syntax \
                 (no *, #, _ or other markup). Do not include these instructions in your \
                 output. Write only the requested content as clean, readable prose."
            }
            Self::Markdown => {
                "\n\nFORMAT REQUIREMENT: Use markdown formatting (# headers, **bold**, \
                 *italics*, lists). Do not include these instructions in your output. \
                 Write only the requested content."
            }
            Self::Html => {
                "\n\nFORMAT REQUIREMENT: Output valid HTML using proper tags (<h1>, <h2>, \
                 <p>, <ul>, <ol>, <table>). Do not include these instructions in your \
                 output. Write only the HTML content."
            }
            Self::Json => {
                "\n\nFORMAT REQUIREMENT: Output only valid JSON. Do not include these \
                 instructions or any explanation. Start directly with { or [ and end \
                 with } or ]."
            }
            Self::Xml => {
                "\n\nFORMAT REQUIREMENT: Output only valid XML. Do not include these \
                 instructions or any explanation. Start directly with <?xml or the root \
                 element."
            }
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = LorewrightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| LorewrightError::UnknownOutputFormat(s.to_string()))
    }
}

//! Removal of leaked prompt instructions from generated text
//!
//! Models sometimes echo parts of the prompt back: the format directive, the
//! length target, a bare requirements header. Each rule below is a line-anchored,
//! case-insensitive pattern; a marker in the middle of a sentence is never
//! touched. When in doubt a rule leaves text in place.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error};

use crate::prompt::OutputFormat;

/// Optional indentation or markdown emphasis before a marker
const LEAD: &str = r"^[ \t>#*_]*";

/// Marker rules, applied in order
///
/// Only marker lines are removed. A `Requirements:` header goes only when
/// nothing follows it on the line and a blank line comes next; the lines
/// under a header are content and stay.
const RULES: &[(&str, &str)] = &[
    ("format-requirement", r"FORMAT REQUIREMENT:.*(?:\r?\n|$)"),
    ("important", r"IMPORTANT:.*(?:\r?\n|$)"),
    ("do-not-include", r"Do not include these instructions.*(?:\r?\n|$)"),
    ("scene-must-follow", r"The scene must follow all requirements.*(?:\r?\n|$)"),
    ("clear-and-concise", r"Each sentence should be clear and concise.*(?:\r?\n|$)"),
    (
        "skilled-understanding",
        r"(?:you (?:must|should) )?demonstrate a skilled understanding.*(?:\r?\n|$)",
    ),
    ("target-length", r"Target length:.*(?:\r?\n|$)"),
    (
        "requirements-header",
        r"Requirements:[*_]*[ \t]*(?:\r?\n[ \t]*(?:\r?\n|\z)|\z)",
    ),
];

struct Rule {
    name: &'static str,
    pattern: Regex,
}

static COMPILED: Lazy<Vec<Rule>> = Lazy::new(|| {
    RULES
        .iter()
        .filter_map(|&(name, body)| {
            match Regex::new(&format!("(?im){}{}", LEAD, body)) {
                Ok(pattern) => Some(Rule { name, pattern }),
                Err(e) => {
                    error!(rule = name, "Invalid sanitizer pattern: {}", e);
                    None
                }
            }
        })
        .collect()
});

static EXCESS_BLANK_LINES: Lazy<Option<Regex>> =
    Lazy::new(|| match Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+") {
        Ok(pattern) => Some(pattern),
        Err(e) => {
            error!("Invalid blank line pattern, gaps will not be collapsed: {}", e);
            None
        }
    });

/// Strips leaked instructional text from completions
#[derive(Debug, Default, Clone, Copy)]
pub struct Sanitizer;

impl Sanitizer {
    pub fn new() -> Self {
        Self
    }

    /// Names of the active rules, in application order
    pub fn rule_names(&self) -> Vec<&'static str> {
        COMPILED.iter().map(|r| r.name).collect()
    }

    /// Remove marker lines and trim the result
    ///
    /// Rules are reapplied until nothing changes, so removing one line can
    /// never leave a fresh match behind and `clean` is idempotent.
    /// `format` is accepted for format-aware cleaning; all formats are
    /// currently treated alike.
    pub fn clean(&self, raw: &str, format: OutputFormat) -> String {
        let mut text = raw.to_string();

        loop {
            let mut changed = false;
            for rule in COMPILED.iter() {
                if rule.pattern.is_match(&text) {
                    let replaced = rule.pattern.replace_all(&text, "").into_owned();
                    if replaced != text {
                        debug!(rule = rule.name, %format, "Removed leaked instruction text");
                        text = replaced;
                        changed = true;
                    }
                }
            }
            if let Some(blank) = EXCESS_BLANK_LINES.as_ref() {
                let collapsed = blank.replace_all(&text, "\n\n").into_owned();
                if collapsed != text {
                    text = collapsed;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        text.trim().to_string()
    }
}

/// Convenience wrapper around [`Sanitizer::clean`]
pub fn clean(raw: &str, format: OutputFormat) -> String {
    Sanitizer.clean(raw, format)
}

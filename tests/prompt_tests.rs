//! Prompt rendering across the whole catalogue

use lorewright::prompt::{templates, OutputFormat, PromptBuilder, StyleCatalogue, CATALOGUE};
use lorewright::LorewrightError;

const PROMPT: &str = "Vesh, a cartographer who maps places that do not exist yet";

#[test]
fn test_every_content_type_contains_prompt_once() {
    let builder = PromptBuilder::new();
    let styles = ["", "detailed", "concise", "creative", "mature"];

    for content in CATALOGUE {
        for format in OutputFormat::ALL {
            for style in styles {
                let prompt = builder
                    .render(content.id, PROMPT, format.name(), style)
                    .unwrap();
                assert_eq!(
                    prompt.matches(PROMPT).count(),
                    1,
                    "{} / {} / {:?}",
                    content.id,
                    format,
                    style
                );
                assert!(prompt.contains(format.directive()));
                assert!(!prompt.contains(templates::USER_PROMPT_SLOT));
            }
        }
    }
}

#[test]
fn test_markdown_character_scenario() {
    let prompt = PromptBuilder::new()
        .render("character", "Elf ranger", "markdown", "")
        .unwrap();

    assert!(prompt.contains("Elf ranger"));
    assert!(prompt.contains(OutputFormat::Markdown.directive()));
    assert!(!prompt.contains(OutputFormat::PlainText.directive()));
    assert!(prompt.ends_with(OutputFormat::Markdown.directive()));
}

#[test]
fn test_only_one_directive_is_appended() {
    let builder = PromptBuilder::new();
    for format in OutputFormat::ALL {
        let prompt = builder.render("concept", "x", format.extension(), "").unwrap();
        assert_eq!(prompt.matches("FORMAT REQUIREMENT:").count(), 1);
    }
}

#[test]
fn test_unknown_content_type_never_renders() {
    let builder = PromptBuilder::new();
    for id in ["", "Character", "scene", "scene-explicit", "character "] {
        assert!(matches!(
            builder.render(id, PROMPT, "md", ""),
            Err(LorewrightError::UnknownContentType(_))
        ));
    }
}

#[test]
fn test_custom_style_is_prepended() {
    let dir = tempfile::tempdir().unwrap();
    let mut styles = StyleCatalogue::load(dir.path().join("styles.json")).unwrap();
    styles
        .save_custom("saga", "Write in the cadence of a Norse saga.")
        .unwrap();
    let builder = PromptBuilder::with_styles(styles);

    let prompt = builder.render("culture", "Fjord clans", "txt", "saga").unwrap();
    assert!(prompt.starts_with("Write in the cadence of a Norse saga.\n\nYou are"));
}

#[test]
fn test_empty_style_contributes_nothing() {
    let builder = PromptBuilder::new();
    let with_default = builder.render("magic", "Blood tides", "md", "default").unwrap();
    let with_empty = builder.render("magic", "Blood tides", "md", "").unwrap();
    assert_eq!(with_default, with_empty);
    assert_eq!(
        with_empty,
        format!(
            "{}{}",
            templates::lookup("magic").unwrap().fill("Blood tides"),
            OutputFormat::Markdown.directive()
        )
    );
}

//! Error taxonomy and edge cases
//!
//! Configuration problems must be reported before anything is launched, with
//! a message that names the offending value.

use lorewright::prelude::*;
use lorewright::config::GENERAL_MODEL;
use lorewright::prompt::PromptBuilder;

#[cfg(test)]
mod configuration_error_tests {
    use super::*;

    fn pipeline_without_server(dir: &std::path::Path) -> Pipeline {
        let model = dir.join("general.gguf");
        std::fs::write(&model, b"GGUF").unwrap();

        let mut config = LorewrightConfig::default();
        config.models.clear();
        config.models.insert(GENERAL_MODEL.to_string(), model);
        config.server.executable_path = dir.join("no-such-server");
        config.server.timings.cooldown_ms = 0;
        Pipeline::new(config).unwrap()
    }

    #[test]
    fn test_messages_name_the_value() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline_without_server(dir.path());

        let err = pipeline
            .generate(&GenerationRequest::new("ode", "x"))
            .unwrap_err();
        assert!(err.to_string().contains("'ode'"));

        let err = pipeline
            .generate(&GenerationRequest::new("character", "x").format("rtf"))
            .unwrap_err();
        assert!(matches!(err, LorewrightError::UnknownOutputFormat(ref f) if f == "rtf"));

        let err = pipeline
            .generate(&GenerationRequest::new("character", "x"))
            .unwrap_err();
        assert!(matches!(err, LorewrightError::ExecutableNotFound(_)));
        assert!(err.to_string().contains("no-such-server"));
    }

    #[test]
    fn test_missing_model_file_is_reported_before_launch() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline_without_server(dir.path());
        std::fs::remove_file(dir.path().join("general.gguf")).unwrap();

        let err = pipeline
            .generate(&GenerationRequest::new("character", "x"))
            .unwrap_err();
        assert!(matches!(err, LorewrightError::ModelFileNotFound(_)));
        assert!(err.is_configuration_error());
        assert_eq!(pipeline.server_status().launches, 0);
    }

    #[test]
    fn test_invalid_config_is_rejected_up_front() {
        let mut config = LorewrightConfig::default();
        config.generation.max_tokens = 0;
        assert!(matches!(
            Pipeline::new(config),
            Err(LorewrightError::ConfigError(_))
        ));
    }
}

#[cfg(test)]
mod edge_case_tests {
    use super::*;

    #[test]
    fn test_empty_and_unusual_prompts_render() {
        let builder = PromptBuilder::new();
        for prompt in ["", "   ", "{user_prompt}", "日本語のプロンプト", "line one\nline two"] {
            let rendered = builder.render("scene-dialogue", prompt, "md", "").unwrap();
            assert!(rendered.contains(prompt));
        }
    }

    #[test]
    fn test_format_names_are_case_insensitive() {
        assert_eq!(OutputFormat::from_name("HTML"), Some(OutputFormat::Html));
        assert_eq!(OutputFormat::from_name(" .Xml "), Some(OutputFormat::Xml));
    }
}

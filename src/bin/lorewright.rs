//! # Lorewright CLI
//!
//! Generate narrative artifacts with a local llama.cpp server.
//!
//! ## Commands
//!
//! ```bash
//! lorewright generate character "An elf ranger who distrusts magic"
//! lorewright generate scene-combat "Duel on a frozen lake" -f txt -s concise
//! lorewright types --examples    # Content types with example prompts
//! lorewright styles list         # List style directives
//! lorewright models --scan       # Configured models and unmapped .gguf files
//! lorewright check               # Verify the installation
//! lorewright health              # Probe a running server
//! lorewright config init --preset 12gb
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use lorewright::config::presets::VramPreset;
use lorewright::prompt::{templates, CATALOGUE};
use lorewright::server::LOOPBACK_HOST;
use lorewright::setup::{self, CheckStatus};
use lorewright::{output, GenerationRequest, LorewrightConfig, Pipeline, StyleCatalogue};

#[derive(Parser)]
#[command(name = "lorewright")]
#[command(author, version, about = "Narrative writing assistant for local llama.cpp models")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (default: platform config dir, or LOREWRIGHT_CONFIG)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (same as RUST_LOG=lorewright=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one artifact
    #[command(alias = "gen")]
    Generate {
        /// Content type (see `lorewright types`)
        content_type: String,

        /// Free-text description inserted into the template
        prompt: String,

        /// Logical model identifier
        #[arg(short, long, default_value = lorewright::config::GENERAL_MODEL)]
        model: String,

        /// Output format: txt, md, html, json or xml
        #[arg(short, long, default_value = "md")]
        format: String,

        /// Style directive name (see `lorewright styles list`)
        #[arg(short, long, default_value = "")]
        style: String,

        /// Sampling temperature
        #[arg(short, long)]
        temperature: Option<f32>,

        /// Maximum tokens to generate
        #[arg(short = 'n', long)]
        max_tokens: Option<u32>,

        /// File name inside the content type's output folder
        #[arg(short, long)]
        output: Option<String>,

        /// Print only; do not save
        #[arg(long)]
        no_save: bool,
    },

    /// List content types
    Types {
        /// Also print an example prompt for each type
        #[arg(short, long)]
        examples: bool,
    },

    /// Manage style directives
    Styles {
        #[command(subcommand)]
        action: StylesAction,
    },

    /// List configured models
    Models {
        /// Also list .gguf files that no identifier maps to
        #[arg(long)]
        scan: bool,
    },

    /// Verify the installation
    Check,

    /// Probe the health endpoint of a running server
    Health {
        /// Port (default: configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum StylesAction {
    /// List built-in and custom styles
    List,
    /// Print a style's directive text
    Show { name: String },
    /// Add or replace a custom style
    Add { name: String, text: String },
    /// Remove a custom style
    Remove { name: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// VRAM preset: 8gb, 12gb, 16gb or 24gb
        #[arg(short, long)]
        preset: Option<String>,
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Apply a VRAM preset (detected from nvidia-smi when omitted)
    Preset { name: Option<String> },
}

fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(LorewrightConfig::default_path);

    if let Err(e) = run(cli, &config_path) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli, config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    // `config init` must work without a readable config file.
    if let Commands::Config {
        action: ConfigAction::Init { preset, force },
    } = &cli.command
    {
        init_logging("info", cli.verbose);
        return init_config(config_path, preset.as_deref(), *force);
    }

    let mut config = LorewrightConfig::load_or_create(config_path)?;
    config.apply_env()?;
    init_logging(&config.logging.level, cli.verbose);

    match cli.command {
        Commands::Generate {
            content_type,
            prompt,
            model,
            format,
            style,
            temperature,
            max_tokens,
            output,
            no_save,
        } => {
            let mut request = GenerationRequest::new(content_type, prompt)
                .model(model)
                .format(format)
                .style(style);
            if let Some(t) = temperature {
                request = request.temperature(t);
            }
            if let Some(n) = max_tokens {
                request = request.max_tokens(n);
            }
            generate(config, config_path, &request, output.as_deref(), no_save)?;
        }

        Commands::Types { examples } => list_types(examples),

        Commands::Styles { action } => {
            let mut styles = StyleCatalogue::load(LorewrightConfig::styles_path(config_path))?;
            handle_styles(&mut styles, action)?;
        }

        Commands::Models { scan } => list_models(&config, scan),

        Commands::Check => {
            if !run_check(&config) {
                std::process::exit(1);
            }
        }

        Commands::Health { port } => {
            let port = port.unwrap_or(config.server.port);
            if !probe(port, config.server.timings.probe_timeout()) {
                std::process::exit(1);
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Init { preset, force } => init_config(config_path, preset.as_deref(), force)?,
            ConfigAction::Show => println!("{}", serde_json::to_string_pretty(&config)?),
            ConfigAction::Path => println!("{}", config_path.display()),
            ConfigAction::Preset { name } => apply_preset(config_path, name.as_deref())?,
        },
    }

    Ok(())
}

fn init_logging(level: &str, verbose: bool) {
    let fallback = if verbose {
        "lorewright=debug".to_string()
    } else {
        format!("lorewright={}", level)
    };
    // Logs go to stderr; stdout carries generated text only.
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();
}

// ==================== Generation ====================

fn generate(
    config: LorewrightConfig,
    config_path: &Path,
    request: &GenerationRequest,
    filename: Option<&str>,
    no_save: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = config.output.directory.clone();
    let styles = StyleCatalogue::load(LorewrightConfig::styles_path(config_path))?;
    let mut pipeline = Pipeline::new(config)?.with_styles(styles);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!(
        "Generating {} with '{}' (model load can take minutes)",
        request.content_type, request.model
    ));

    let result = pipeline.generate(request);
    spinner.finish_and_clear();
    pipeline.shutdown();
    let result = result?;

    println!("{}", result.text);
    eprintln!();
    eprintln!(
        "{} words in {:.1}s ({}, {})",
        result.word_count,
        result.elapsed.as_secs_f64(),
        result.model,
        result.format
    );

    if !no_save {
        let path = output::save(&result, &output_dir, filename)?;
        eprintln!("Saved to {}", path.display());
    }
    Ok(())
}

// ==================== Catalogues ====================

fn list_types(examples: bool) {
    let mut category = None;
    for content in CATALOGUE {
        if category != Some(content.category) {
            if category.is_some() {
                println!();
            }
            println!("{}", content.category);
            category = Some(content.category);
        }
        println!("  {:<16} {}", content.id, content.display_name);
        println!("  {:<16} {}", "", content.description);
        if examples {
            println!("  {:<16} e.g. \"{}\"", "", content.example);
        }
    }
    println!();
    println!("{} content types", templates::identifiers().count());
}

fn handle_styles(
    styles: &mut StyleCatalogue,
    action: StylesAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        StylesAction::List => {
            for name in styles.names() {
                let marker = if styles.is_custom(name) { " (custom)" } else { "" };
                println!("{}{}", name, marker);
            }
        }
        StylesAction::Show { name } => {
            let text = styles
                .get(&name)
                .ok_or_else(|| lorewright::LorewrightError::UnknownStyle(name.clone()))?;
            if text.is_empty() {
                println!("(empty: the model uses its own voice)");
            } else {
                println!("{}", text);
            }
        }
        StylesAction::Add { name, text } => {
            styles.save_custom(&name, &text)?;
            println!("Saved style '{}'", name);
        }
        StylesAction::Remove { name } => {
            if styles.delete_custom(&name)? {
                println!("Removed style '{}'", name);
            } else {
                eprintln!("No custom style named '{}'", name);
            }
        }
    }
    Ok(())
}

fn list_models(config: &LorewrightConfig, scan: bool) {
    println!("Configured models:");
    for (id, path) in &config.models {
        let state = if path.is_file() { "" } else { "  [missing]" };
        println!("  {:<18} {}{}", id, path.display(), state);
    }

    if scan {
        let found = setup::scan_unconfigured_models(config);
        println!();
        if found.is_empty() {
            println!("No unconfigured .gguf files found.");
        } else {
            println!("Unconfigured model files:");
            for path in found {
                println!(
                    "  {:<18} {}",
                    setup::suggest_identifier(&path),
                    path.display()
                );
            }
        }
    }
}

// ==================== Setup ====================

fn run_check(config: &LorewrightConfig) -> bool {
    println!("Lorewright Installation Check");
    println!("=============================");
    let report = setup::check_installation(config);
    for check in &report.checks {
        println!("  [{}] {:<18} {}", check.status, check.name, check.detail);
    }

    match setup::detect_gpu() {
        Some(gpu) => println!(
            "  [{}] {:<18} {} ({:.1} GB, preset {})",
            CheckStatus::Ok,
            "gpu",
            gpu.name,
            gpu.vram_gb(),
            gpu.recommended_preset().name()
        ),
        None => println!("  [{}] {:<18} no NVIDIA GPU detected", CheckStatus::Warning, "gpu"),
    }

    println!();
    if report.is_ready() {
        println!("Ready.");
    } else {
        println!("Fix the failed checks above, then run `lorewright check` again.");
    }
    report.is_ready()
}

fn probe(port: u16, timeout: Duration) -> bool {
    let url = format!("http://{}:{}/health", LOOPBACK_HOST, port);
    let healthy = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .no_proxy()
        .build()
        .ok()
        .and_then(|client| client.get(&url).send().ok())
        .map(|resp| resp.status().is_success())
        .unwrap_or(false);

    if healthy {
        println!("Server on port {} is healthy", port);
    } else {
        println!("No healthy server on port {}", port);
    }
    healthy
}

fn init_config(
    path: &Path,
    preset: Option<&str>,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        return Err(format!("{} already exists (use --force to overwrite)", path.display()).into());
    }

    let mut config = LorewrightConfig::default();
    if let Some(name) = preset {
        let preset = VramPreset::from_name(name).ok_or_else(|| format!("Unknown preset '{}'", name))?;
        preset.apply(&mut config);
    }
    config.to_json_file(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn apply_preset(path: &Path, name: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let preset = match name {
        Some(name) => {
            VramPreset::from_name(name).ok_or_else(|| format!("Unknown preset '{}'", name))?
        }
        None => {
            let gpu = setup::detect_gpu().ok_or("No GPU detected; name a preset explicitly")?;
            println!("Detected {} ({:.1} GB)", gpu.name, gpu.vram_gb());
            gpu.recommended_preset()
        }
    };

    // Re-read without env overrides so they are not persisted.
    let mut config = LorewrightConfig::load_or_create(path)?;
    preset.apply(&mut config);
    config.to_json_file(path)?;
    println!(
        "Applied preset {}: context {}, max tokens {} ({})",
        preset.name(),
        config.server.context_size,
        config.generation.max_tokens,
        preset.description()
    );
    Ok(())
}

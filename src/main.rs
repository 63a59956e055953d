//! DWF Drill - carve embedded images and metadata out of DWF drawings
//!
//! Scans the raw bytes of a drawing without a full grammar for the format:
//! signature-based image carving, header inference, heuristic layer and
//! object recovery, and optional multimodal analysis of the primary image.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dwf_drill::analysis::{self, HttpInferenceClient, InferenceClient};
use dwf_drill::carve::{ScanOptions, Scanner};
use dwf_drill::cli::{render, Cli, Commands, OutputFormat};
use dwf_drill::config::{generate_sample_config, Config};
use dwf_drill::core::{parse_container, FormatKind, RawBuffer};
use dwf_drill::display::print_info;
use dwf_drill::extract::Extraction;
use dwf_drill::normalize::normalize_file;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path, cli.config.is_some())?;

    // Initialize logging
    let level = if cli.verbose {
        "debug"
    } else {
        config.general.log_level.as_str()
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive(format!("dwf_drill={}", level).parse()?),
        )
        .init();

    let output = cli.output_format();

    match cli.command {
        Commands::Metadata(args) => {
            let path = args.file.clone();
            let result = tokio::task::spawn_blocking(move || parse_container(&path))
                .await
                .context("Metadata task panicked")?;

            match result {
                Ok(parsed) => emit(output, &parsed, render::metadata)?,
                Err(failure) => {
                    emit(output, &failure, render::parse_failure)?;
                    std::process::exit(1);
                }
            }
        }
        Commands::Extract(args) => {
            let output_dir = args
                .output_dir
                .clone()
                .unwrap_or_else(|| config.extract.output_dir.clone());

            let report = tokio::task::spawn_blocking(move || -> Result<_> {
                let options = ScanOptions {
                    kinds: args
                        .kinds
                        .as_ref()
                        .map(|kinds| kinds.iter().map(|&k| FormatKind::from(k)).collect()),
                    parallel: !args.sequential,
                };
                let buf = RawBuffer::from_file(&args.file)?;
                let extraction = Extraction::from_buffer(&args.file, &buf, &Scanner::new(options));

                let persisted = if args.save {
                    Some(
                        extraction
                            .persist(&output_dir)
                            .context("Failed to save extracted streams")?,
                    )
                } else {
                    None
                };

                Ok((extraction.report(persisted), args.show_skipped))
            })
            .await
            .context("Extraction task panicked")??;

            let (report, show_skipped) = report;
            emit(output, &report, |r| render::extraction(r, show_skipped))?;
        }
        Commands::Normalize(args) => {
            let out = args
                .out
                .clone()
                .unwrap_or_else(|| args.input.with_extension("png"));
            if out == args.input {
                anyhow::bail!("Refusing to overwrite input file: {}", out.display());
            }

            let input = args.input.clone();
            let normalized = tokio::task::spawn_blocking(move || normalize_file(&input))
                .await
                .context("Normalize task panicked")??;

            tokio::fs::write(&out, normalized.bytes())
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;

            match output {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "input": args.input,
                    "output": out,
                    "status": normalized.status(),
                    "fallback_reason": normalized.fallback_reason(),
                    "size": normalized.bytes().len(),
                }))?,
                OutputFormat::Human => render::normalized(&normalized, &out),
            }
        }
        Commands::Analyze(args) => {
            let client = inference_client(&config);
            let focus = args.focus.unwrap_or(config.analysis.focus);
            let include_metadata = config.analysis.include_metadata && !args.no_metadata;

            let report = tokio::task::spawn_blocking(move || {
                analysis::analyze_container(client.as_ref(), &args.file, focus, include_metadata)
            })
            .await
            .context("Analysis task panicked")??;

            emit(output, &report, render::visual)?;
        }
        Commands::Comprehensive(args) => {
            let client = inference_client(&config);
            let report = tokio::task::spawn_blocking(move || {
                analysis::comprehensive_analysis(client.as_ref(), &args.file)
            })
            .await
            .context("Analysis task panicked")??;

            emit(output, &report, render::comprehensive)?;
        }
        Commands::Formats => {
            emit(output, &analysis::capabilities(), render::capabilities)?;
        }
        Commands::Health(args) => {
            let inference = config.inference.clone();
            let report =
                tokio::task::spawn_blocking(move || analysis::health_check(&inference, args.probe))
                    .await
                    .context("Health check task panicked")?;

            emit(output, &report, render::health)?;
            if !report.is_healthy() {
                std::process::exit(1);
            }
        }
        Commands::Config(args) => {
            if args.init {
                if Config::init_at(&config_path, args.force)? {
                    print_info(&format!("Wrote sample config to {}", config_path.display()));
                } else {
                    print_info(&format!(
                        "Config already exists at {} (use --force to overwrite)",
                        config_path.display()
                    ));
                }
            } else {
                match output {
                    OutputFormat::Json => print_json(&config)?,
                    OutputFormat::Human => {
                        print_info(&format!("Config path: {}", config_path.display()));
                        if config_path.exists() {
                            println!("{}", toml::to_string_pretty(&config)?);
                        } else {
                            println!("{}", generate_sample_config());
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

fn inference_client(config: &Config) -> Arc<dyn InferenceClient> {
    Arc::new(HttpInferenceClient::from_config(&config.inference))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn emit<T: Serialize>(output: OutputFormat, value: &T, human: impl FnOnce(&T)) -> Result<()> {
    match output {
        OutputFormat::Json => print_json(value),
        OutputFormat::Human => {
            human(value);
            Ok(())
        }
    }
}

mod cli;

use mediamend::config;
use mediamend::processor::{self, FileOutcome, Processor};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use mediamend_analysis::{analyze_file, AnalysisConfig, MediaFile};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediamend=trace,mediamend_analysis=trace,mediamend_repair=trace".to_string()
        } else {
            "mediamend=info,mediamend_analysis=info,mediamend_repair=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    match cli.command {
        Commands::Analyze { file, json } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            analyze(&file, json, &config.analysis)
        }
        Commands::Run { input, output } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_file(&input, &output, cli.config.as_deref()))
        }
        Commands::Batch { list } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_batch(&list, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("mediamend {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn analyze(file: &std::path::Path, json: bool, cfg: &AnalysisConfig) -> Result<()> {
    let media = MediaFile::open(file)?;
    let analysis = analyze_file(&media, cfg)?;
    let summary = analysis.summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("File: {}", media.path.display());
    println!("Size: {} bytes", media.len);
    println!("Container: {}", summary.container.unwrap_or("unknown"));
    println!("Video codec: {}", summary.video_codec.unwrap_or("unknown"));
    println!("Audio codec: {}", summary.audio_codec.unwrap_or("none"));
    println!(
        "Blocks: {} ({} valid)",
        summary.blocks, summary.valid_blocks
    );
    if !summary.missing_required.is_empty() {
        println!("Missing required: {}", summary.missing_required.join(", "));
    }
    println!("Stream units: {}", summary.stream_units);
    println!(
        "Corruption: {} regions, {} bytes ({:.2}%)",
        summary.corrupted_regions,
        summary.corrupted_bytes,
        summary.corruption_ratio * 100.0
    );
    println!("Severity: {}", summary.severity.as_str());
    if !summary.tags.is_empty() {
        let tags: Vec<_> = summary.tags.iter().map(|t| t.as_str()).collect();
        println!("Findings: {}", tags.join(", "));
    }
    println!("Planned strategies:");
    for s in &summary.strategies {
        println!("  {}. {}", s.priority, s.kind.as_str());
    }

    Ok(())
}

async fn run_file(
    input: &std::path::Path,
    output: &std::path::Path,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let processor = Processor::from_config(&config)?;

    match processor.process_one(input, output).await {
        FileOutcome::Skipped => {
            println!("Skipped: output already exists at {}", output.display());
            Ok(())
        }
        FileOutcome::Repaired(report) => {
            if let mediamend_repair::RepairOutcome::Repaired {
                strategy,
                duration_secs,
            } = &report.outcome
            {
                println!(
                    "Repaired with {} ({:.2}s of media): {}",
                    strategy,
                    duration_secs,
                    output.display()
                );
            }
            Ok(())
        }
        FileOutcome::Failed { reason } => {
            anyhow::bail!("repair failed: {reason}");
        }
    }
}

async fn run_batch(list: &std::path::Path, config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let content = std::fs::read_to_string(list)?;
    let pairs = processor::parse_batch_list(&content)?;
    if pairs.is_empty() {
        anyhow::bail!("batch list contains no files: {}", list.display());
    }

    let processor = Processor::from_config(&config)?;
    let summary = processor.process_batch(&pairs).await;

    println!(
        "Batch complete: {} processed, {} repaired, {} skipped, {} failed",
        summary.processed, summary.repaired, summary.skipped, summary.failed
    );

    // Per-file failures are logged; a fully failed batch still exits nonzero.
    if summary.failed > 0 && summary.repaired == 0 && summary.skipped == 0 {
        anyhow::bail!("no file in the batch could be repaired");
    }
    Ok(())
}

fn check_tools() -> Result<()> {
    let mut all_ok = true;
    for info in mediamend_repair::check_tools() {
        if info.available {
            println!(
                "{}: OK ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            println!("{}: NOT FOUND", info.name);
            all_ok = false;
        }
    }
    if !all_ok {
        anyhow::bail!("required tools are missing");
    }
    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(path)?;
    println!("Configuration OK");
    println!(
        "  zero-run threshold: {} bytes",
        config.analysis.zero_run_threshold
    );
    println!("  tool timeout: {}s", config.repair.tool_timeout_secs);
    println!(
        "  temp dir: {}",
        config
            .output
            .temp_dir
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "system default".to_string())
    );
    Ok(())
}

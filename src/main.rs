//! MadSpark CLI: thin front-end over `run_workflow`.
//!
//! Flags are parsed into a config struct and the router, cache, and agents
//! are constructed from it explicitly; the CLI never mutates the process
//! environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use madspark::batch_monitor::BatchMetrics;
use madspark::bookmark::{BookmarkRecord, BookmarkStore};
use madspark::config::{LlmConfig, ModelTier, ProviderChoice};
use madspark::display::format_results;
use madspark::inference::InferenceType;
use madspark::logging::{init_logging, LoggingConfig};
use madspark::orchestrator::ProgressCallback;
use madspark::temperature::TemperaturePreset;
use madspark::types::{OutputMode, WorkflowOptions};
use madspark::{run_workflow_with_progress, LlmRouter, RouterAgents};

#[derive(Parser, Debug)]
#[command(
    name = "madspark",
    version,
    about = "Multi-agent creative ideation orchestrator"
)]
struct Cli {
    /// Topic to generate ideas for
    topic: Option<String>,

    /// Contextual constraints for the ideas
    #[arg(short, long, default_value = "")]
    context: String,

    /// Number of top candidates to carry through the full pipeline (1-10)
    #[arg(long, default_value_t = 1)]
    top_ideas: usize,

    /// Creativity preset: conservative, balanced, creative, wild
    #[arg(long)]
    temperature_preset: Option<String>,

    /// Explicit base temperature in [0, 1] (overrides the preset)
    #[arg(long)]
    temperature: Option<f64>,

    /// Skip the advocate and skeptic stages
    #[arg(long)]
    no_enhanced_reasoning: bool,

    /// Score ideas across seven weighted dimensions
    #[arg(long)]
    multi_dimensional_eval: bool,

    /// Run logical inference: full, causal, constraints, contradiction,
    /// implications
    #[arg(long)]
    logical_inference: Option<String>,

    /// Disable near-duplicate filtering of generated ideas
    #[arg(long)]
    no_novelty_filter: bool,

    /// Similarity threshold for the novelty filter (0-1)
    #[arg(long, default_value_t = 0.8)]
    similarity_threshold: f64,

    /// Disable the response cache for this run
    #[arg(long)]
    no_cache: bool,

    /// Clear the response cache and exit
    #[arg(long)]
    clear_cache: bool,

    /// Overall workflow timeout in seconds
    #[arg(long, default_value_t = 1200)]
    timeout: u64,

    /// Provider: auto, local, remote
    #[arg(long)]
    provider: Option<String>,

    /// Model tier: fast, balanced, quality
    #[arg(long)]
    model_tier: Option<String>,

    /// Never fall back to the secondary provider
    #[arg(long)]
    no_fallback: bool,

    /// Output mode: brief, simple, detailed
    #[arg(long, default_value = "simple")]
    output_mode: String,

    /// Show the batch metrics summary and exit
    #[arg(long)]
    metrics: bool,

    /// Show the N most recent batch operations and exit
    #[arg(long, value_name = "N")]
    metrics_recent: Option<usize>,

    /// Clear the batch metrics log and exit
    #[arg(long)]
    clear_metrics: bool,

    /// Bookmark the top result after the run
    #[arg(long)]
    bookmark: bool,

    /// List saved bookmarks and exit
    #[arg(long)]
    list_bookmarks: bool,
}

fn metrics_log_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("madspark")
        .join("batch_metrics.jsonl")
}

fn load_persisted_metrics() -> Vec<BatchMetrics> {
    let path = metrics_log_path();
    let Ok(contents) = std::fs::read_to_string(&path) else {
        return Vec::new();
    };
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}

fn print_metrics_summary() {
    let metrics = load_persisted_metrics();
    if metrics.is_empty() {
        println!("No batch metrics found. Run some workflows first.");
        return;
    }

    let successful: Vec<&BatchMetrics> = metrics.iter().filter(|m| m.success).collect();
    let failed = metrics.len() - successful.len();
    let with_fallback = metrics.iter().filter(|m| m.fallback_used).count();
    let total_items: usize = successful.iter().map(|m| m.items_count).sum();
    let total_tokens: u64 = successful.iter().filter_map(|m| m.tokens_used).sum();
    let total_cost: f64 = successful.iter().filter_map(|m| m.estimated_cost_usd).sum();

    println!("{}", "Batch API Metrics Summary".bold());
    println!("{}", "=".repeat(40));
    println!(
        "Calls: {} successful, {failed} failed, {with_fallback} with fallback",
        successful.len()
    );
    println!("Items processed: {total_items}");
    if total_tokens > 0 {
        println!("Tokens: {total_tokens}");
    }
    if total_cost > 0.0 {
        println!("Cost: ~${total_cost:.4}");
    }
}

fn print_recent_metrics(limit: usize) {
    let mut metrics = load_persisted_metrics();
    if metrics.is_empty() {
        println!("No recent batch metrics found.");
        return;
    }
    metrics.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    metrics.truncate(limit);

    println!("{}", format!("Last {} Batch Operations", metrics.len()).bold());
    println!("{}", "=".repeat(40));
    for (index, m) in metrics.iter().enumerate() {
        let status = if m.success { "ok" } else { "failed" };
        let fallback = if m.fallback_used { " (fallback)" } else { "" };
        println!(
            "{:2}. {} {status} {}: {} items in {:.2}s{fallback}",
            index + 1,
            m.timestamp,
            m.batch_type,
            m.items_count,
            m.duration_seconds
        );
    }
}

fn build_config(cli: &Cli) -> Result<Arc<LlmConfig>> {
    let mut config = LlmConfig::from_env();
    if let Some(provider) = &cli.provider {
        config.default_provider =
            ProviderChoice::from_str(provider).map_err(|e| anyhow::anyhow!(e))?;
    }
    if let Some(tier) = &cli.model_tier {
        config.model_tier = ModelTier::from_str(tier).map_err(|e| anyhow::anyhow!(e))?;
    }
    if cli.no_fallback {
        config.fallback_enabled = false;
    }
    if cli.no_cache {
        config.cache_enabled = false;
    }
    Ok(Arc::new(config))
}

fn build_options(cli: &Cli) -> Result<WorkflowOptions> {
    let temperature_preset = cli
        .temperature_preset
        .as_deref()
        .map(TemperaturePreset::from_str)
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;
    let logical_inference = cli
        .logical_inference
        .as_deref()
        .map(InferenceType::from_str)
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;
    let output_mode = OutputMode::from_str(&cli.output_mode).map_err(|e| anyhow::anyhow!(e))?;

    if let Some(temperature) = cli.temperature {
        anyhow::ensure!(
            (0.0..=1.0).contains(&temperature),
            "temperature must be in [0, 1]"
        );
    }

    Ok(WorkflowOptions {
        num_top_candidates: cli.top_ideas,
        temperature_preset,
        temperature: cli.temperature,
        enhanced_reasoning: !cli.no_enhanced_reasoning,
        multi_dimensional_eval: cli.multi_dimensional_eval,
        logical_inference,
        novelty_filter_enabled: !cli.no_novelty_filter,
        similarity_threshold: cli.similarity_threshold,
        enable_cache: !cli.no_cache,
        timeout: Duration::from_secs(cli.timeout),
        no_fallback: cli.no_fallback,
        output_mode,
        ..Default::default()
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_logging(LoggingConfig::default()) {
        eprintln!("warning: failed to initialize logging: {e}");
    }

    if cli.clear_metrics {
        let path = metrics_log_path();
        if path.exists() {
            std::fs::remove_file(&path).context("failed to clear metrics log")?;
            println!("Batch metrics cleared");
        } else {
            println!("No metrics file found");
        }
        return Ok(());
    }
    if cli.metrics {
        print_metrics_summary();
        return Ok(());
    }
    if let Some(limit) = cli.metrics_recent {
        print_recent_metrics(limit.max(1));
        return Ok(());
    }
    if cli.list_bookmarks {
        let store = BookmarkStore::new();
        let bookmarks = store.list().map_err(|e| anyhow::anyhow!(e.to_string()))?;
        if bookmarks.is_empty() {
            println!("No bookmarks saved.");
        }
        for record in bookmarks {
            println!("{}  [{}] {}", record.id, record.score, record.text);
        }
        return Ok(());
    }
    if cli.clear_cache {
        madspark::cache::get_cache().clear();
        println!("Cache cleared");
        return Ok(());
    }

    let topic = cli
        .topic
        .clone()
        .context("a topic is required (see --help)")?;

    let config = build_config(&cli)?;
    let options = build_options(&cli)?;

    let router = Arc::new(LlmRouter::new(config, None, options.enable_cache));
    if !router.has_provider().await {
        eprintln!(
            "{}",
            "warning: no LLM provider available; running in [DEGRADED MODE] with mock output"
                .yellow()
        );
    }
    let agents = Arc::new(RouterAgents::new(Arc::clone(&router)));

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling workflow...");
            ctrl_c_cancel.cancel();
        }
    });

    let show_progress = atty::is(atty::Stream::Stderr);
    let progress: ProgressCallback = Arc::new(move |message: &str, fraction: f64| {
        if show_progress {
            eprintln!("[{:>3.0}%] {message}", fraction * 100.0);
        }
    });

    let results = run_workflow_with_progress(
        &topic,
        &cli.context,
        options.clone(),
        agents,
        cancel,
        progress,
    )
    .await
    .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    println!("{}", format_results(&results, options.output_mode));

    let metrics = router.metrics();
    tracing::info!(
        total_requests = metrics.total_requests,
        cache_hits = metrics.cache_hits,
        total_tokens = metrics.total_tokens,
        "Router metrics for this run"
    );

    if cli.bookmark {
        if let Some(top) = results.first() {
            let store = BookmarkStore::new();
            let id = store
                .save(BookmarkRecord {
                    id: String::new(),
                    text: top.improved_idea.clone().unwrap_or_else(|| top.text.clone()),
                    topic: topic.clone(),
                    context: cli.context.clone(),
                    score: top.improved_score.unwrap_or(top.score),
                    critique: top
                        .improved_critique
                        .clone()
                        .unwrap_or_else(|| top.critique.clone()),
                    advocacy: top
                        .advocacy
                        .as_ref()
                        .map(|a| a.formatted.clone())
                        .unwrap_or_default(),
                    skepticism: top
                        .skepticism
                        .as_ref()
                        .map(|s| s.formatted.clone())
                        .unwrap_or_default(),
                    bookmarked_at: chrono::Utc::now(),
                    tags: Vec::new(),
                })
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            println!("Bookmarked top idea as {id}");
        }
    }

    Ok(())
}

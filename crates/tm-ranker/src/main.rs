use std::collections::HashSet;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use serde::Deserialize;
use tm_common::compatibility::HttpReasoningService;
use tm_common::config::{MatchMode, RankerConfig, ReasoningConfig};
use tm_common::logging::{init_tracing_subscriber, install_tracing_panic_hook};
use tm_common::matching::{CandidatePool, MatchFilters, MatchRanker, Ranking};
use tm_common::Profile;
use tracing::{info, warn};

const APP_NAME: &str = "tm-ranker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
}

#[derive(Debug, Parser)]
#[command(
    name = "tm-ranker",
    about = "Rank hackathon teammate candidates for one participant"
)]
struct Cli {
    /// Ranking request JSON file; `-` reads stdin
    #[arg(long, short, default_value = "-")]
    input: String,

    /// Matching mode (overrides TM_MATCH_MODE): basic | enhanced
    #[arg(long)]
    mode: Option<MatchMode>,

    /// Seed for the low-signal baseline (overrides TM_BASELINE_SEED)
    #[arg(long)]
    seed: Option<u64>,

    /// Candidate pool shape (overrides TM_CANDIDATE_POOL): full | prefiltered
    #[arg(long)]
    pool: Option<CandidatePool>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Skip the reasoning service even in enhanced mode
    #[arg(long, default_value_t = false)]
    no_llm: bool,

    /// Serve Prometheus metrics on this port while the run is in progress
    #[arg(long, env = "TM_METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Print the Prometheus exposition text to stderr after ranking
    #[arg(long, default_value_t = false)]
    print_metrics: bool,
}

/// The caller-facing ranking request.
#[derive(Debug, Deserialize)]
struct RankRequest {
    current_user: Option<Profile>,
    #[serde(default)]
    candidates: Vec<Profile>,
    #[serde(default)]
    filters: MatchFilters,
    #[serde(default)]
    excluded_ids: HashSet<String>,
}

fn read_request(input: &str) -> Result<RankRequest, Box<dyn std::error::Error>> {
    let raw = if input == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(Path::new(input))?
    };

    Ok(serde_json::from_str(&raw)?)
}

fn ranker_config(args: &Cli) -> RankerConfig {
    let mut config = RankerConfig::from_env();
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(seed) = args.seed {
        config.baseline_seed = Some(seed);
    }
    if let Some(pool) = args.pool {
        config.candidate_pool = pool;
    }
    config
}

fn build_ranker(config: RankerConfig, reasoning: ReasoningConfig, no_llm: bool) -> MatchRanker {
    let wants_reasoning = config.mode == MatchMode::Enhanced && !no_llm;
    let ranker = MatchRanker::new(config);
    if !wants_reasoning {
        return ranker;
    }

    let provider = reasoning.provider.clone();
    let model = reasoning.model.clone();
    match HttpReasoningService::new(reasoning) {
        Ok(service) => {
            info!(llm_provider = %provider, llm_model = %model, "reasoning service enabled");
            ranker.with_reasoning_service(Arc::new(service))
        }
        Err(err) => {
            warn!(error = %err, "reasoning service unavailable; AI signals will be neutral");
            ranker
        }
    }
}

fn format_optional(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.3}"))
        .unwrap_or_else(|| "-".into())
}

fn clip(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}

fn write_table(out: &mut impl Write, ranking: &Ranking) -> io::Result<()> {
    writeln!(
        out,
        "{:>4}  {:<16} {:<20} {:>6} {:>6} {:>6} {:>7} {:>6} {:>6}",
        "#", "id", "name", "score", "skill", "field", "project", "goals", "vibe"
    )?;

    for (position, result) in ranking.results.iter().enumerate() {
        let breakdown = &result.breakdown;
        let name = result.candidate.name.as_deref().unwrap_or("");
        writeln!(
            out,
            "{:>4}  {:<16} {:<20} {:>6.3} {:>6.3} {:>6.3} {:>7} {:>6} {:>6}{}",
            position + 1,
            clip(&result.candidate.id, 16),
            clip(name, 20),
            result.score,
            breakdown.skill_similarity,
            breakdown.field_similarity,
            format_optional(breakdown.project_compatibility),
            format_optional(breakdown.goal_compatibility),
            format_optional(breakdown.team_vibe_match),
            if breakdown.low_signal_fallback {
                "  (low signal)"
            } else {
                ""
            },
        )?;
    }

    let summary = &ranking.summary;
    writeln!(out)?;
    writeln!(
        out,
        "{} ranked of {} considered, {} excluded ({} mode, run {})",
        summary.ranked,
        summary.considered,
        summary.excluded_total(),
        ranking.mode.as_ref(),
        ranking.run_id
    )?;
    for (reason, count) in &summary.excluded {
        writeln!(out, "  excluded {}: {count}", reason.as_ref())?;
    }

    Ok(())
}

fn write_output(out: &mut impl Write, ranking: &Ranking, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, ranking)?;
            writeln!(out)
        }
        OutputFormat::Table => write_table(out, ranking),
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_tracing_subscriber(APP_NAME);
    install_tracing_panic_hook(APP_NAME);

    let args = Cli::parse();
    let metrics = if args.print_metrics || args.metrics_port.is_some() {
        tm_metrics::init_metrics(args.metrics_port)
    } else {
        None
    };

    let request = read_request(&args.input)?;
    let config = ranker_config(&args);
    info!(
        mode = config.mode.as_ref(),
        field_policy = config.field_policy().as_ref(),
        candidate_pool = config.candidate_pool.as_ref(),
        candidates = request.candidates.len(),
        "loaded ranking request"
    );
    let ranker = build_ranker(config, ReasoningConfig::from_env(), args.no_llm);

    let ranking = ranker
        .rank_detailed(
            request.current_user.as_ref(),
            &request.candidates,
            &request.filters,
            &request.excluded_ids,
        )
        .await?;

    write_output(&mut io::stdout().lock(), &ranking, args.format)?;

    if args.print_metrics {
        if let Some(handle) = metrics {
            eprint!("{}", handle.render());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("tm-ranker failed: {err}");
        std::process::exit(1);
    }
}

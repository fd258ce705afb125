use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use macro_portfolio::AnalysisConfig;
use macro_portfolio::AnalysisRequest;
use macro_portfolio::analyze;
use macro_portfolio::portfolio::Strategy;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
  author,
  version,
  about = "Macro-scenario scoring and multi-strategy portfolio allocation",
  after_help = "EXAMPLES:
    # Analyze a request with default settings
    macro-portfolio request.json

    # Use a TOML config and write a readable report
    macro-portfolio request.json --config analysis.toml --pretty"
)]
struct Args {
  /// JSON analysis request: macro indicators, quotes and return series
  request: PathBuf,

  /// TOML configuration, defaults apply to anything omitted
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Ensemble blend weight on HRP, overrides the request and config
  #[arg(long)]
  alpha: Option<f64>,

  /// Report only this strategy (e.g. sharpe-macro, hrp, ensemble)
  #[arg(short, long)]
  strategy: Option<Strategy>,

  /// Add the efficient frontier to the report
  #[arg(long)]
  frontier: bool,

  /// Pretty-print the JSON report
  #[arg(long)]
  pretty: bool,
}

fn load_config(path: Option<&PathBuf>) -> Result<AnalysisConfig> {
  let Some(path) = path else {
    return Ok(AnalysisConfig::default());
  };
  let raw = fs::read_to_string(path)
    .with_context(|| format!("failed to read config {}", path.display()))?;
  let config = AnalysisConfig::from_toml_str(&raw)
    .with_context(|| format!("invalid config {}", path.display()))?;
  Ok(config)
}

fn main() -> Result<()> {
  let env_filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("macro_portfolio=info"));
  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_writer(std::io::stderr)
    .init();
  let args = Args::parse();

  let config = load_config(args.config.as_ref())?;
  let raw = fs::read_to_string(&args.request)
    .with_context(|| format!("failed to read request {}", args.request.display()))?;
  let mut request: AnalysisRequest = serde_json::from_str(&raw)
    .with_context(|| format!("invalid request {}", args.request.display()))?;
  if let Some(alpha) = args.alpha {
    anyhow::ensure!((0.0..=1.0).contains(&alpha), "--alpha must lie in [0, 1]");
    request.ensemble_alpha = Some(alpha);
  }
  request.include_frontier |= args.frontier;

  info!(
    quotes = request.quotes.len(),
    series = request.returns.len(),
    "running analysis"
  );
  let mut report = analyze(&request, &config);
  if let Some(strategy) = args.strategy {
    report.allocations.retain(|a| a.result.strategy == strategy);
  }

  let out = if args.pretty {
    serde_json::to_string_pretty(&report)?
  } else {
    serde_json::to_string(&report)?
  };
  println!("{out}");
  Ok(())
}

//! CLI entry point for the data cleaning engine.

use anyhow::{Result, anyhow};
use clap::Parser;
use dotenv::dotenv;
use lex_cleaning::{
    CleaningConfig, CleaningReport, DataQualityAnalyzer, ManualRules, Pipeline, QualitySummary,
    ReportFormatter, ReportGenerator,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

#[cfg(feature = "ai")]
use lex_cleaning::ai::OpenRouterProvider;
#[cfg(feature = "ai")]
use std::env;
#[cfg(feature = "ai")]
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Statistical data cleaning with optional AI recommendations",
    long_about = "Removes duplicates, fills missing values and treats outliers in a CSV file.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  OPENROUTER_API_KEY    API key for OpenRouter (enables AI recommendations)\n  \
                  OPENAI_API_KEY        Used when OPENROUTER_API_KEY is not set\n\n\
                  EXAMPLES:\n  \
                  # Clean with AI recommendations, falling back to heuristics\n  \
                  lex-cleaning -i data.csv\n\n  \
                  # Heuristics only, with a JSON report file\n  \
                  lex-cleaning -i data.csv --no-ai -r\n\n  \
                  # Fixed per-column rules\n  \
                  lex-cleaning -i data.csv --rules rules.json\n\n  \
                  # Preview without writing anything\n  \
                  lex-cleaning -i data.csv --dry-run"
)]
struct Args {
    /// Path to the CSV file to clean
    #[arg(short, long)]
    input: String,

    /// Output directory for results
    #[arg(short, long, default_value = "./outputs")]
    output: String,

    /// Custom output file name (without extension)
    ///
    /// If not specified, uses "cleaned_{input name}"
    #[arg(long)]
    output_name: Option<String>,

    /// JSON file with manual cleaning rules
    ///
    /// When given, no recommender runs; the rules are applied as written.
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Disable AI recommendations (use heuristics only)
    #[arg(long, default_value = "false")]
    no_ai: bool,

    /// Preview the profile, quality summary and recommendation without cleaning
    #[arg(long)]
    dry_run: bool,

    /// Output JSON to stdout instead of the text summary
    ///
    /// Disables all logs; only the final JSON report is written.
    #[arg(long)]
    json: bool,

    /// Write a JSON report to the output directory
    ///
    /// The report will be saved as <input_name>_report.json
    #[arg(short = 'r', long)]
    emit_report: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Z-score threshold for outlier detection
    #[arg(long)]
    zscore_threshold: Option<f64>,

    /// IQR multiplier for outlier detection
    #[arg(long)]
    iqr_multiplier: Option<f64>,
}

/// Initialize the tracing subscriber.
///
/// With `json_output` no subscriber is installed, so stdout carries only JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    dotenv().ok();

    if !Path::new(&args.input).exists() {
        return Err(anyhow!("Input file not found: {}", args.input));
    }

    info!("Loading dataset from: {}", args.input);
    let data = load_csv_with_fallbacks(&args.input)?;
    info!("Dataset loaded successfully: {:?}", data.shape());

    let mut config_builder = CleaningConfig::builder().use_ai_recommendations(!args.no_ai);
    if let Some(threshold) = args.zscore_threshold {
        config_builder = config_builder.zscore_threshold(threshold);
    }
    if let Some(multiplier) = args.iqr_multiplier {
        config_builder = config_builder.iqr_multiplier(multiplier);
    }
    let config = config_builder.build()?;

    let rules = args.rules.as_deref().map(load_rules).transpose()?;
    let pipeline = build_pipeline(&args, config)?;

    if args.dry_run {
        return run_dry_run(&args, &pipeline, &data, rules.as_ref());
    }

    run_pipeline(&pipeline, &args, &data, rules)
}

fn load_rules(path: &Path) -> Result<ManualRules> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("Could not read rules file {}: {}", path.display(), e))?;
    let rules: ManualRules = serde_json::from_str(&content)
        .map_err(|e| anyhow!("Invalid rules file {}: {}", path.display(), e))?;
    info!("Loaded manual rules from {}", path.display());
    Ok(rules)
}

/// Preview: profile, quality summary and the recommendation that would be applied.
///
/// Uses `println!` on purpose; this output is the point of `--dry-run`.
fn run_dry_run(
    args: &Args,
    pipeline: &Pipeline,
    data: &DataFrame,
    rules: Option<&ManualRules>,
) -> Result<()> {
    println!("\n{}", "=".repeat(80));
    println!("DRY RUN - Preview of cleaning actions");
    println!("{}\n", "=".repeat(80));

    println!("DATASET OVERVIEW");
    println!("{}", "-".repeat(40));
    println!("  File: {}", args.input);
    println!("  Rows: {}", data.height());
    println!("  Columns: {}", data.width());
    println!();

    println!("COLUMN PROFILES");
    println!("{}", "-".repeat(40));

    let profile = pipeline.profile(data)?;

    println!(
        "{:<20} {:<12} {:<12} {:<10} {:<10} {:<10}",
        "Column", "Type", "Kind", "Missing %", "Unique", "Outliers"
    );
    println!("{}", "-".repeat(76));

    for col in &profile.column_profiles {
        let outliers = col
            .outliers
            .as_ref()
            .map(|o| o.count.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20} {:<12} {:<12} {:<10.1} {:<10} {:<10}",
            truncate_str(&col.name, 19),
            truncate_str(&col.dtype, 11),
            col.kind,
            col.missing_percent,
            col.unique_count,
            outliers
        );
    }
    println!();

    println!("DATA QUALITY");
    println!("{}", "-".repeat(40));
    let quality = DataQualityAnalyzer::new(pipeline.config().clone()).summarize(data)?;
    print_quality(&quality);
    println!();

    println!("PROPOSED ACTIONS");
    println!("{}", "-".repeat(40));
    let (recommendation, source) = match rules {
        Some(rules) => (
            rules.to_recommendation(data),
            lex_cleaning::RecommendationSource::Manual,
        ),
        None => pipeline.recommend(data, &profile)?,
    };
    println!("  Source: {}", source.display_name());
    if recommendation.duplicate_removal {
        match &recommendation.duplicate_key {
            Some(key) => println!("  - Remove duplicates on: {}", key.join(", ")),
            None => println!("  - Remove duplicate rows"),
        }
    }
    for rec in &recommendation.column_recommendations {
        let mut steps = Vec::new();
        if rec.missing_values.method != lex_cleaning::MissingValueStrategy::None {
            steps.push(format!("missing: {}", rec.missing_values.method));
        }
        if rec.outliers.method != lex_cleaning::OutlierMethod::None {
            steps.push(format!("outliers: {} / {}", rec.outliers.method, rec.outliers.action));
        }
        steps.extend(
            rec.value_transformations
                .iter()
                .map(|t| format!("transform: {}", t)),
        );
        if !steps.is_empty() {
            println!("  - {}: {}", rec.column_name, steps.join("; "));
        }
    }
    if !recommendation.overall_advice.is_empty() {
        println!("  Advice: {}", recommendation.overall_advice);
    }
    println!();

    println!("OUTPUT FILES (will be created)");
    println!("{}", "-".repeat(40));
    println!("  - {}/{}.csv", args.output, output_name(args));
    if args.emit_report {
        println!("  - {}/{}_report.json", args.output, extract_file_stem(&args.input));
    }
    println!();

    println!("{}", "=".repeat(80));
    println!("To execute this cleaning, run without --dry-run");
    if !args.emit_report {
        println!("Add --emit-report to save a detailed JSON report");
    }
    println!("{}", "=".repeat(80));

    Ok(())
}

fn print_quality(quality: &QualitySummary) {
    println!(
        "  Missing values: {} in {} columns",
        quality.missing.total_missing,
        quality.missing.columns_with_missing.len()
    );
    println!(
        "  Duplicate rows: {} ({:.2}%)",
        quality.duplicates.duplicate_rows, quality.duplicates.duplicate_percent
    );
    if quality.outliers.is_empty() {
        println!("  No outliers detected ({})", quality.outlier_method);
    } else {
        for (column, finding) in &quality.outliers {
            println!(
                "  Outliers in {}: {} ({:.2}%, {})",
                column, finding.count, finding.percent, finding.method
            );
        }
    }
}

/// Truncate a string to max length with ellipsis
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

/// Build the pipeline, attaching an OpenRouter provider when a key is available.
#[cfg(feature = "ai")]
fn build_pipeline(args: &Args, config: CleaningConfig) -> Result<Pipeline> {
    let mut builder = Pipeline::builder().config(config);

    if args.no_ai || args.rules.is_some() {
        info!("Running without AI recommendations");
    } else {
        let api_key = env::var("OPENROUTER_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .unwrap_or_default();

        if api_key.trim().is_empty() {
            warn!("OPENROUTER_API_KEY not set. Falling back to heuristic recommendations.");
        } else {
            info!("Running with AI recommendations (OpenRouter)");
            builder = builder.ai_provider(Arc::new(OpenRouterProvider::new(api_key)?));
        }
    }

    Ok(with_progress(builder, args).build()?)
}

/// Build the pipeline without AI support (the "ai" feature is disabled).
#[cfg(not(feature = "ai"))]
fn build_pipeline(args: &Args, config: CleaningConfig) -> Result<Pipeline> {
    if !args.no_ai {
        warn!("AI support not compiled in. Using heuristic recommendations.");
        warn!("Compile with --features ai to enable AI support.");
    }

    let builder = Pipeline::builder().config(config);
    Ok(with_progress(builder, args).build()?)
}

fn with_progress(
    builder: lex_cleaning::PipelineBuilder,
    args: &Args,
) -> lex_cleaning::PipelineBuilder {
    if args.quiet || args.json {
        return builder;
    }
    builder.on_progress(|update| {
        info!(
            "[{:.0}%] {}: {}",
            update.progress * 100.0,
            update.stage.display_name(),
            update.message
        );
    })
}

fn run_pipeline(
    pipeline: &Pipeline,
    args: &Args,
    data: &DataFrame,
    rules: Option<ManualRules>,
) -> Result<()> {
    info!("{}", "=".repeat(80));
    info!("Starting data cleaning...");
    info!("{}", "=".repeat(80));

    let outcome = match rules {
        Some(rules) => pipeline.clean_with_rules(data, rules),
        None => pipeline.clean(data),
    };

    let mut result = match outcome {
        Ok(result) => result,
        Err(e) => {
            error!("Cleaning failed: {}", e);
            return Err(anyhow!("Cleaning failed: {}", e));
        }
    };

    let generator = ReportGenerator::new(&args.output);
    let output_path = generator.write_dataset(&mut result.data, &output_name(args))?;
    let output_file = output_path.to_string_lossy().to_string();

    if args.json || args.emit_report {
        let quality = match DataQualityAnalyzer::new(pipeline.config().clone()).summarize(data) {
            Ok(quality) => Some(quality),
            Err(e) => {
                warn!("Quality summary unavailable: {}", e);
                None
            }
        };
        let document = ReportGenerator::build_document(
            &result.report,
            Some(&args.input),
            Some(&output_file),
            quality,
        );

        if args.emit_report {
            let report_path =
                generator.write_report_to_file(&document, &extract_file_stem(&args.input))?;
            info!("Report written to: {}", report_path.display());
        }

        if args.json {
            println!("{}", serde_json::to_string_pretty(&document)?);
            return Ok(());
        }
    }

    print_human_readable_summary(&result.report, &args.input, &output_file);
    Ok(())
}

fn output_name(args: &Args) -> String {
    args.output_name
        .clone()
        .unwrap_or_else(|| format!("cleaned_{}", extract_file_stem(&args.input)))
}

/// Extract the file stem (name without extension) from a path.
fn extract_file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string()
}

/// Default output when neither `--json` nor `--quiet` suppress it.
fn print_human_readable_summary(report: &CleaningReport, input: &str, output: &str) {
    println!();
    println!("{}", "=".repeat(80));
    println!("CLEANING COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!(
        "Input:  {} ({} rows x {} columns)",
        input, report.original_rows, report.original_columns
    );
    println!(
        "Output: {} ({} rows x {} columns)",
        output, report.final_rows, report.final_columns
    );
    println!("Recommendations: {}", report.recommendation_source.display_name());
    println!("Duration: {}ms", report.duration_ms);
    println!();

    println!("{}", ReportFormatter::render(report));
    println!();

    if report.is_noop() {
        println!("No cleaning operations were needed.");
        println!();
    }

    println!("Use --json for machine-readable output");
    println!("Use --emit-report to save a detailed JSON report");
    println!("{}", "=".repeat(80));
}

/// Load CSV with fallback strategies
fn load_csv_with_fallbacks(path: &str) -> Result<DataFrame> {
    match CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => {
            debug!("Standard loading failed: {}", e);
        }
    }

    // Retry on pre-cleaned content
    let content = std::fs::read_to_string(path).map_err(|e| {
        error!("Could not read file: {}", e);
        e
    })?;
    let cursor = std::io::Cursor::new(clean_csv_content(&content));

    CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .into_reader_with_file_handle(cursor)
        .finish()
        .map_err(|e| e.into())
}

/// Collapse doubled quotes and drop blank lines.
fn clean_csv_content(content: &str) -> String {
    content
        .replace("\"\"\"", "\"")
        .replace("\"\"", "\"")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

use std::io::{self, Read};
use std::path::PathBuf;

use clap::{Parser as ClapParser, Subcommand};
use thiserror::Error;

use horolang::{
    ChartContext, ChartError, Evaluation, Evaluator, FormulaCache, FormulaError, Value,
};

#[derive(ClapParser)]
#[command(name = "horo")]
#[command(about = "Horolang - evaluate chart formulas against natal chart data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one or more formulas against a chart document
    Eval {
        /// Formulas to evaluate; each succeeds or fails on its own
        #[arg(required = true)]
        formulas: Vec<String>,

        /// Chart JSON file (reads from stdin if not provided)
        #[arg(short, long)]
        chart: Option<PathBuf>,

        /// Include a per-sub-expression explanation trace
        #[arg(long)]
        explain: bool,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Validate formula syntax without evaluating
    Check {
        /// The formula to check
        formula: String,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Formula(#[from] FormulaError),
    #[error("invalid chart: {0}")]
    Chart(#[from] ChartError),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("no chart provided; use --chart or pipe JSON to stdin")]
    NoChart,
    #[error("{failed} of {total} formulas failed")]
    BatchFailures { failed: usize, total: usize },
}

fn main() {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Eval {
            formulas,
            chart,
            explain,
            pretty,
        } => run_eval(formulas, chart, explain, pretty),
        Commands::Check { formula } => run_check(&formula),
    };

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run_check(formula: &str) -> Result<(), CliError> {
    horolang::compile(formula)?;
    println!("Syntax is valid");
    Ok(())
}

fn run_eval(
    formulas: Vec<String>,
    chart_path: Option<PathBuf>,
    explain: bool,
    pretty: bool,
) -> Result<(), CliError> {
    let chart_text = match chart_path {
        Some(path) => std::fs::read_to_string(path)?,
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
        None => return Err(CliError::NoChart),
    };

    let doc: serde_json::Value = serde_json::from_str(&chart_text)?;
    let chart = ChartContext::from_json(&doc)?;

    // One cache for the whole batch; repeated formulas parse once.
    let cache = FormulaCache::new(formulas.len().max(1));
    let evaluator = Evaluator::new(&chart);

    let mut failed = 0usize;
    let reports: Vec<serde_json::Value> = formulas
        .iter()
        .map(|formula| {
            // Each formula is evaluated independently: an error here is
            // recorded in place and never aborts its siblings.
            let outcome = cache
                .get_or_parse(formula)
                .and_then(|ast| {
                    if explain {
                        Ok(report_explained(
                            formula,
                            evaluator.explain(&ast).map_err(FormulaError::from)?,
                        ))
                    } else {
                        let value = evaluator.evaluate(&ast).map_err(FormulaError::from)?;
                        Ok(serde_json::json!({
                            "formula": formula,
                            "value": value_to_json(&value),
                        }))
                    }
                });
            outcome.unwrap_or_else(|e| {
                failed += 1;
                serde_json::json!({ "formula": formula, "error": e.to_string() })
            })
        })
        .collect();

    let output = if reports.len() == 1 {
        reports.into_iter().next().unwrap_or(serde_json::Value::Null)
    } else {
        serde_json::Value::Array(reports)
    };

    let rendered = if pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{rendered}");

    if failed > 0 {
        return Err(CliError::BatchFailures {
            failed,
            total: formulas.len(),
        });
    }
    Ok(())
}

fn report_explained(formula: &str, evaluation: Evaluation) -> serde_json::Value {
    let trace: Vec<serde_json::Value> = evaluation
        .trace
        .iter()
        .map(|entry| {
            serde_json::json!({
                "text": slice_chars(formula, entry.span.start, entry.span.end),
                "span": [entry.span.start, entry.span.end],
                "value": value_to_json(&entry.value),
            })
        })
        .collect();

    serde_json::json!({
        "formula": formula,
        "value": value_to_json(&evaluation.value),
        "trace": trace,
    })
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Number(n) => serde_json::json!(n),
        Value::Str(s) => serde_json::json!(s),
        Value::Bool(b) => serde_json::json!(b),
    }
}

// Spans are character offsets, so slicing must go through chars.
fn slice_chars(source: &str, start: usize, end: usize) -> String {
    source.chars().skip(start).take(end.saturating_sub(start)).collect()
}

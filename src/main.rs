mod aggregate;
mod batch;
mod checkpoint;
mod extract;
mod fetch;
mod resolver;
mod search;
mod store;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::warn;

use crate::batch::BatchOptions;
use crate::fetch::HttpFetcher;
use crate::resolver::{ProductResolver, ResolvePrice};
use crate::search::DuckDuckGo;

/// Prepended to the input file name when no output path is given.
const OUTPUT_PREFIX: &str = "updated_";

#[derive(Parser)]
#[command(name = "price_scout", about = "Fills product sheet prices from web search")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a price for every pending row of a product sheet (resumable)
    Run {
        /// Input CSV with id, name and price columns
        input: PathBuf,
        /// Max rows to visit this run (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Output CSV (default: updated_<input name> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Resolve one product name and print the price
    Lookup {
        /// Product name (words are joined)
        #[arg(required = true)]
        name: Vec<String>,
        /// Search results to consider
        #[arg(short = 'n', long, default_value = "3")]
        results: usize,
    },
    /// Show priced/unpriced counts for a sheet
    Stats {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { input, limit, output, yes } => run_batch(&input, limit, output, yes).await,
        Commands::Lookup { name, results } => lookup(&name.join(" "), results).await,
        Commands::Stats { file } => stats(&file),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run_batch(
    input: &Path,
    limit: Option<usize>,
    output: Option<PathBuf>,
    yes: bool,
) -> anyhow::Result<()> {
    let sheet = store::load(input)?;
    let output = output.unwrap_or_else(|| default_output(input));

    println!("Input:   {} ({} rows)", input.display(), sheet.rows.len());
    println!("Columns: {}", sheet.columns.join(", "));
    println!("Output:  {}", output.display());
    if let Some(n) = limit {
        println!("Limit:   first {} row(s)", n);
    }

    if !yes && !confirm("Proceed? This queries live search and merchant sites. [y/N] ")? {
        println!("Aborted.");
        return Ok(());
    }

    // The output doubles as the checkpoint: if a prior run left one behind,
    // its priced rows are carried over instead of resolved again.
    let prior = load_prior(&output);
    let reconciled = checkpoint::reconcile(sheet, prior.as_ref());
    if reconciled.resumed {
        println!(
            "Resuming: {} row(s) already priced in {}",
            reconciled.carried,
            output.display()
        );
    }
    let mut sheet = reconciled.sheet;

    let client = fetch::build_client()?;
    let resolver = ProductResolver::new(
        Arc::new(DuckDuckGo::new(client.clone())),
        Arc::new(HttpFetcher::new(client)),
    );

    let opts = BatchOptions { limit, ..Default::default() };
    let summary = batch::run(&mut sheet, &resolver, &output, opts).await;
    summary.print();
    if summary.persisted {
        println!("Saved: {}", output.display());
    } else {
        println!("Output could not be written to {}", output.display());
    }
    Ok(())
}

/// Prior output is best effort: a missing or unreadable file just means a
/// fresh run.
fn load_prior(output: &Path) -> Option<store::Sheet> {
    if !output.exists() {
        return None;
    }
    match store::load(output) {
        Ok(prior) => Some(prior),
        Err(e) => {
            warn!("prior output {} is unreadable ({}); starting fresh", output.display(), e);
            None
        }
    }
}

async fn lookup(name: &str, results: usize) -> anyhow::Result<()> {
    let client = fetch::build_client()?;
    let resolver = ProductResolver::new(
        Arc::new(DuckDuckGo::new(client.clone())),
        Arc::new(HttpFetcher::new(client)),
    )
    .with_max_results(results);

    match resolver.resolve(name).await? {
        Some(price) => println!("{}: {:.2}", name, price),
        None => println!("{}: no price found", name),
    }
    Ok(())
}

fn stats(file: &Path) -> anyhow::Result<()> {
    let sheet = store::load(file)?;
    let priced: Vec<f64> = sheet.rows.iter().filter_map(|r| r.price).collect();

    println!("Rows:     {}", sheet.rows.len());
    println!("Priced:   {}", priced.len());
    println!("Unpriced: {}", sheet.rows.len() - priced.len());
    if let Some(avg) = plain_average(&priced) {
        println!("Average:  {:.2}", avg);
    }
    Ok(())
}

/// Unfiltered mean of the already-priced rows; stats reports the sheet as
/// it stands, not an outlier-cleaned view.
fn plain_average(prices: &[f64]) -> Option<f64> {
    if prices.is_empty() {
        return None;
    }
    Some(prices.iter().sum::<f64>() / prices.len() as f64)
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{}", prompt);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn default_output(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{}{}", OUTPUT_PREFIX, name))
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_lands_next_to_input() {
        assert_eq!(
            default_output(Path::new("/data/products.csv")),
            PathBuf::from("/data/updated_products.csv")
        );
        assert_eq!(
            default_output(Path::new("products.csv")),
            PathBuf::from("updated_products.csv")
        );
    }

    #[test]
    fn prior_output_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_prior(&dir.path().join("absent.csv")).is_none());

        let readable = dir.path().join("updated_products.csv");
        std::fs::write(&readable, "id,name,price\n1,Bolt,10.00\n").unwrap();
        assert!(load_prior(&readable).is_some());
    }

    #[test]
    fn unreadable_prior_output_means_fresh_run() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("updated_products.csv");
        std::fs::write(&out, "stale junk\nnot,a,sheet\n").unwrap();
        assert!(load_prior(&out).is_none());

        let fresh = store::Sheet::new(vec![store::Row::new("1", "bolt m6 zinc")]);
        let merged = checkpoint::reconcile(fresh, load_prior(&out).as_ref());
        assert!(!merged.resumed);
        assert_eq!(merged.carried, 0);
    }

    #[test]
    fn average_is_the_plain_mean() {
        // One extreme value still weighs in; no outlier filtering here.
        let prices = [10.0, 11.0, 12.0, 11.5, 120.0];
        let avg = plain_average(&prices).unwrap();
        assert!((avg - 32.9).abs() < 1e-9);
        assert_eq!(plain_average(&[]), None);
    }
}

mod logging;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use dynocopy_aws::DynamoTableStore;
use dynocopy_engine::{run_copy, CopyConfig, CopyReport, JobStatus};

#[derive(Parser)]
#[command(
    name = "dynocopy",
    version,
    about = "Parallel segmented copy between DynamoDB tables"
)]
struct Cli {
    /// Source table name
    #[arg(short, long)]
    source: String,

    /// Target table name
    #[arg(short, long)]
    target: String,

    /// Number of parallel scan segments
    #[arg(short = 'n', long = "num-threads", default_value_t = 5)]
    num_threads: u32,

    /// Create the target table when it does not exist
    #[arg(short = 'c', long)]
    create_table: bool,

    /// Also replicate tags, encryption, and stream settings
    #[arg(short = 'v', long)]
    verbose_copy: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    let mut config = CopyConfig::new(cli.source, cli.target);
    config.parallelism = cli.num_threads;
    config.create_table = cli.create_table;
    config.verbose_copy = cli.verbose_copy;

    let store = Arc::new(DynamoTableStore::from_env().await);

    match run_copy(store, &config).await {
        Ok(report) => {
            print_report(&config, &report);
            // A partial failure still produced a usable (if incomplete)
            // copy; the report carries the failed counts.
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!(
                "Copy '{}' -> '{}' {}: {}",
                config.source,
                config.target,
                JobStatus::Aborted,
                err
            );
            ExitCode::FAILURE
        }
    }
}

fn print_report(config: &CopyConfig, report: &CopyReport) {
    println!(
        "Copy '{}' -> '{}' {} in {:.2}s.",
        config.source, config.target, report.status, report.duration_secs
    );
    println!("  Items scanned:  {}", report.counts.items_scanned);
    println!("  Items written:  {}", report.counts.items_written);
    if report.counts.items_failed > 0 {
        println!("  Items failed:   {}", report.counts.items_failed);
    }
    println!("  Segments:       {}", report.parallelism);
    if report.duration_secs > 0.0 {
        println!(
            "  Throughput:     {:.0} items/sec",
            report.counts.items_written as f64 / report.duration_secs
        );
    }
    for metric in &report.segments {
        tracing::debug!(
            segment = metric.segment_index,
            items_scanned = metric.items_scanned,
            items_written = metric.items_written,
            pages = metric.pages,
            batches = metric.batches,
            scan_secs = metric.scan_duration_secs,
            write_secs = metric.write_duration_secs,
            "Segment metrics"
        );
    }
    for failure in &report.segment_failures {
        println!(
            "  Segment {} failed: {}",
            failure.segment_index, failure.error
        );
    }

    // Machine-readable summary for scripting around the tool
    let json = serde_json::json!({
        "status": report.status.to_string(),
        "items_scanned": report.counts.items_scanned,
        "items_written": report.counts.items_written,
        "items_failed": report.counts.items_failed,
        "segments": report.parallelism,
        "segment_failures": report.segment_failures.len(),
        "duration_secs": report.duration_secs,
    });
    println!("@@COPY_JSON@@{}", json);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_long_flags_parse() {
        let cli = Cli::parse_from([
            "dynocopy",
            "--source",
            "users",
            "--target",
            "users_copy",
            "--num-threads",
            "8",
            "--create-table",
            "--verbose-copy",
        ]);
        assert_eq!(cli.source, "users");
        assert_eq!(cli.target, "users_copy");
        assert_eq!(cli.num_threads, 8);
        assert!(cli.create_table);
        assert!(cli.verbose_copy);
    }

    #[test]
    fn test_short_flags_parse() {
        let cli = Cli::parse_from(["dynocopy", "-s", "users", "-t", "users_copy", "-n", "8", "-c", "-v"]);
        assert_eq!(cli.source, "users");
        assert_eq!(cli.target, "users_copy");
        assert_eq!(cli.num_threads, 8);
        assert!(cli.create_table);
        assert!(cli.verbose_copy);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["dynocopy", "-s", "a", "-t", "b"]);
        assert_eq!(cli.num_threads, 5);
        assert!(!cli.create_table);
        assert!(!cli.verbose_copy);
        assert_eq!(cli.log_level, "info");
    }
}

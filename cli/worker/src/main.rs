//! ods-worker CLI
//!
//! Scan session worker for the object discovery service.

use clap::Parser;
use ods_cli_common::init_logging;

mod args;
mod run;

use args::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // Logs go to stderr, the summary below too
    init_logging(args.log_level)?;

    let stats = run::execute(args).await?;

    eprintln!();
    eprintln!("Worker stopped:");
    eprintln!("  Sessions claimed:   {}", stats.sessions_claimed);
    eprintln!("  Sessions completed: {}", stats.sessions_completed);
    eprintln!("  Sessions failed:    {}", stats.sessions_failed);
    eprintln!("  Buckets upserted:   {}", stats.buckets_upserted);
    eprintln!("  Objects upserted:   {}", stats.objects_upserted);

    if let Some(duration) = stats.duration() {
        let secs = duration.num_milliseconds() as f64 / 1000.0;
        eprintln!("  Duration:           {:.2}s", secs);

        if secs > 0.0 && stats.items_upserted() > 0 {
            eprintln!(
                "  Throughput:         {:.1} items/sec",
                stats.items_upserted() as f64 / secs
            );
        }
    }

    if stats.partitions_failed > 0 || stats.claim_errors > 0 {
        eprintln!(
            "  Errors:             {} partitions failed, {} claim errors",
            stats.partitions_failed, stats.claim_errors
        );
    }

    // Failed sessions stay in progress; signal it to the caller
    if stats.sessions_failed > 0 {
        std::process::exit(4);
    }

    Ok(())
}

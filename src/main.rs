use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sitewatch::cli;

#[derive(Debug, Parser)]
#[command(name = "sitewatch", version, about = "Website monitoring tool")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Database file
    #[arg(long, default_value = "sitewatch.db")]
    database: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start monitoring (default)
    Run,

    /// Show monitoring statistics
    Stats {
        /// Show stats for a specific site
        #[arg(long)]
        site: Option<String>,
        /// Time period (e.g. 1h, 24h, 7d)
        #[arg(long, default_value = "24h")]
        since: String,
    },

    /// Show monitoring history
    History {
        #[arg(long)]
        site: Option<String>,
        #[arg(long, default_value = "24h")]
        since: String,
        /// Limit number of entries
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show current status
    Status {
        /// Watch status with auto-refresh
        #[arg(long)]
        watch: bool,
        /// Refresh interval
        #[arg(long, default_value = "30s")]
        interval: String,
    },

    /// Start the web dashboard
    Dashboard {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },

    /// Export monitoring data
    Export {
        /// Export format (json, csv, html)
        #[arg(short, long, default_value = "json")]
        format: String,
        #[arg(short, long)]
        site: Option<String>,
        #[arg(long, default_value = "24h")]
        since: String,
        /// End time ('YYYY-MM-DD HH:MM:SS' or 'YYYY-MM-DD')
        #[arg(long)]
        until: Option<String>,
        #[arg(short, long)]
        limit: Option<usize>,
        /// Include statistical summary
        #[arg(long)]
        stats: bool,
        /// Write to stdout instead of a file
        #[arg(long)]
        stdout: bool,
        /// Output file path
        #[arg(short, long)]
        output: Option<String>,
        /// Show available formats
        #[arg(long)]
        list_formats: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::default()
            .add_directive(LevelFilter::WARN.into())
            .add_directive("sitewatch=info".parse().expect("static directive"))
    });

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Usage problems exit 1; --help/--version exit 0.
            let _ = e.print();
            return if e.use_stderr() {
                std::process::ExitCode::FAILURE
            } else {
                std::process::ExitCode::SUCCESS
            };
        }
    };

    let outcome = match args.command {
        None | Some(Command::Run) => cli::run_monitor(&args.config, &args.database).await,
        Some(Command::Stats { site, since }) => {
            cli::show_stats(&args.database, site, &since).await
        }
        Some(Command::History { site, since, limit }) => {
            cli::show_history(&args.database, site, &since, limit).await
        }
        Some(Command::Status { watch, interval }) => {
            cli::show_status(&args.database, watch, &interval).await
        }
        Some(Command::Dashboard { port }) => {
            cli::run_dashboard(&args.config, &args.database, port).await
        }
        Some(Command::Export {
            format,
            site,
            since,
            until,
            limit,
            stats,
            stdout,
            output,
            list_formats,
        }) => {
            if list_formats {
                cli::list_export_formats();
                Ok(())
            } else {
                cli::run_export(
                    &args.database,
                    cli::ExportArgs {
                        format,
                        site,
                        since,
                        until,
                        limit,
                        stats,
                        stdout,
                        output,
                    },
                )
                .await
            }
        }
    };

    match outcome {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

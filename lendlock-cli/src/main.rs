mod handlers;
mod options;
mod server;
mod shell;
mod stress;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::options::StoreArgs;

#[derive(Parser)]
#[command(
    name = "lendlock",
    about = "lendlock: quota-bounded reservations over a replicated store",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the lendlock HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3100")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Requests handled at once before callers queue
        #[arg(long, default_value = "256")]
        max_concurrency: usize,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Interactive console for one holder
    Shell {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Hammer the coordinator from many threads, then audit
    Stress {
        /// Concurrent clients (one holder and one thread each)
        #[arg(long, default_value = "8")]
        clients: usize,

        /// Items in the catalog
        #[arg(long, default_value = "16")]
        items: usize,

        /// Operations per client
        #[arg(long, default_value = "200")]
        ops: usize,

        /// RNG seed for reproducible runs
        #[arg(long, default_value = "42")]
        seed: u64,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Check the reservation invariants of a store and print the report
    Audit {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Print version information
    Version,
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!("cannot encode report: {}", e),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            host,
            max_concurrency,
            store,
        } => {
            init_logging("info");
            let client = match store.open_client() {
                Ok(client) => client,
                Err(e) => {
                    tracing::error!("cannot open store: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            if let Err(e) = server::run(&host, port, max_concurrency, client).await {
                tracing::error!("server error: {}", e);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Commands::Shell { store } => {
            init_logging("warn");
            let client = match store.open_client() {
                Ok(client) => client,
                Err(e) => {
                    eprintln!("cannot open store: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            let stdin = std::io::stdin();
            let mut shell = shell::Shell::new(&client, stdin.lock(), std::io::stdout());
            match shell.run() {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("console error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Stress {
            clients,
            items,
            ops,
            seed,
            store,
        } => {
            init_logging("warn");
            let plan = stress::StressPlan {
                clients,
                items,
                ops,
                seed,
            };
            let outcome = store
                .open_client()
                .and_then(|client| stress::run(&client, &plan));
            match outcome {
                Ok(report) => {
                    print_json(&report);
                    if report.audit.is_clean() {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::FAILURE
                    }
                }
                Err(e) => {
                    tracing::error!("stress run failed: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Audit { store } => {
            init_logging("warn");
            match store.open_client().and_then(|client| client.audit()) {
                Ok(report) => {
                    print_json(&report);
                    if report.is_clean() {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::FAILURE
                    }
                }
                Err(e) => {
                    tracing::error!("audit failed: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Version => {
            println!("lendlock {}", env!("CARGO_PKG_VERSION"));
            println!("Quota-bounded reservations coordinated with single-row conditional writes");
            ExitCode::SUCCESS
        }
    }
}

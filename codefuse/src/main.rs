mod cmd;
mod modules;

use crate::cmd::{
    contests::{self, ContestsArgs},
    remind::{self, RemindArgs},
    server::{self, ServerArgs},
};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::{env, str::FromStr};
use tokio::runtime::Builder;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{self, time::OffsetTime},
};

#[derive(Debug, Parser)]
#[command(name = "codefuse")]
#[command(about = "CodeFuse: your coding contest hub")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the contest aggregation api
    Server(ServerArgs),
    /// List upcoming and active contests
    Contests(ContestsArgs),
    /// Manage contest reminders
    Remind(RemindArgs),
}

fn main() {
    dotenv().ok();

    let log_level = env::var("RUST_LOG").unwrap_or(String::from("info"));
    let filter = EnvFilter::builder()
        .with_default_directive(
            LevelFilter::from_str(&log_level)
                .unwrap_or(LevelFilter::INFO)
                .into(),
        )
        .from_env_lossy();
    let format = fmt::format()
        .with_level(true)
        .with_target(true)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_timer(OffsetTime::local_rfc_3339().expect("couldn't determine local time offset"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .event_format(format)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime");

    let result = match Cli::parse().command {
        Commands::Server(args) => runtime.block_on(server::run(args)),
        Commands::Contests(args) => runtime.block_on(contests::run(args)),
        Commands::Remind(args) => runtime.block_on(remind::run(args)),
    };

    if let Err(e) = result {
        tracing::error!("command failed: {:?}", e);
        std::process::exit(1);
    }
}

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use war_stats_bot::commands::{Command, dispatch};
use war_stats_bot::reply::EMBED_FIELD_LIMIT;
use war_stats_bot::{BotConfig, WarStore, webhook};

/// War results bot: stores war sheets, trains the star model, serves predictions.
#[derive(Parser, Debug)]
#[command(name = "war_bot")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory holding one spreadsheet per war (overrides WAR_DATA_DIR).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Model file location (overrides WAR_MODEL_PATH).
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Send the reply to DISCORD_WEBHOOK_URL instead of printing it.
    #[arg(long, global = true)]
    post: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy a war .xlsx export into the data directory
    Upload { file: PathBuf },
    /// Train the model from every stored war
    Train,
    /// Predict next-war stars for every player
    Predict,
    /// Leaderboard of the best predicted attackers
    TopAttackers {
        /// Rows to show, 1 to 25 (a Discord embed holds at most 25 fields)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..=EMBED_FIELD_LIMIT as u64))]
        limit: Option<u64>,
    },
    /// Write the prediction table to a spreadsheet
    Export {
        #[arg(long, default_value = "predictions.xlsx")]
        out: PathBuf,
    },
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = BotConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(path) = cli.model {
        config.model_path = path;
    }
    let store = WarStore::from_config(&config);

    let command = match cli.command {
        Commands::Upload { file } => Command::Upload { source: file },
        Commands::Train => Command::Train,
        Commands::Predict => Command::Predict,
        Commands::TopAttackers { limit } => Command::TopAttackers {
            limit: limit.map(|n| n as usize),
        },
        Commands::Export { out } => Command::Export { out },
    };

    let outcome = dispatch(&store, &config, &command);
    let ok = outcome.is_success();
    let reply = outcome.into_reply();

    if cli.post {
        let url = config
            .webhook_url
            .as_deref()
            .ok_or_else(|| anyhow!("--post needs DISCORD_WEBHOOK_URL to be set"))?;
        webhook::post_reply(url, &reply)?;
    } else {
        println!("{}", reply.render_plain());
    }

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

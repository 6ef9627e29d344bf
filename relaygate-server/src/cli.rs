use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "relaygate",
    about = "Relaygate - unified gateway for LLM chat backends",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, env = "RELAYGATE_PORT", default_value = "8045")]
    pub port: u16,

    #[arg(long, env = "RELAYGATE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(short, long, env = "RELAYGATE_CONFIG", default_value = "relaygate.json")]
    pub config: PathBuf,

    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the gateway (default if no command specified)")]
    Serve,

    #[command(about = "Validate the configuration file and list its agents")]
    CheckConfig {
        #[arg(short, long, help = "Output as JSON")]
        json: bool,
    },
}

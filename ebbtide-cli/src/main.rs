//! Ebbtide CLI - Command-line interface
//!
//! Runs the reconciliation daemon and provides small magnet utilities.

mod commands;

use clap::Parser;

#[derive(Parser)]
#[command(name = "ebbtide")]
#[command(about = "A torrent orchestration daemon with a Transmission-compatible RPC facade")]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = commands::handle_command(cli.command).await {
        if err.is_user_error() {
            eprintln!("{}", err.user_message());
        } else {
            eprintln!("{}: {err}", err.user_message());
        }
        std::process::exit(1);
    }
}

use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use permguard::config::{ConfigArgs, GuardConfig};

/// Forward-auth server deciding whether API requests carry the permissions
/// they need.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct GuardArgs {
    /// Print the completed configuration (JSON) and exit.
    #[arg(long)]
    pub print_config: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}

async fn run(args: GuardArgs) -> Result<()> {
    let cfg: GuardConfig = args.config.load()?;

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        return Ok(());
    }

    cfg.logs.init()?;
    info!("Loaded config from {}", args.config.path().display());

    let pipeline = cfg.build_pipeline().context("build pipeline")?;
    let server = cfg.build_server(pipeline)?;

    server.run().await.context("run guard server")?;

    info!("Guard exited by user");
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = GuardArgs::parse();
    match run(args).await {
        Ok(()) => {}
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use movie_booker::{
    catalog,
    cli::{Cli, Command, ServerArgs},
    client,
    inventory::Inventory,
    server::Server,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Server(args) => run_server(args).await?,
        Command::Client(args) => client::run(args).await?,
    }

    Ok(())
}

async fn run_server(args: ServerArgs) -> Result<()> {
    let inventory = Arc::new(Inventory::new());
    if let Err(err) = catalog::load_from_path(&args.catalog, inventory.as_ref()) {
        warn!("starting with an empty catalog: {err:#}");
    }

    let server = Server::bind(args.listen, inventory).await?;
    info!("listening on {}", server.local_addr()?);
    if let Err(err) = server.run_until_ctrl_c().await {
        warn!("server exited with error: {err:?}");
        return Err(err);
    }

    Ok(())
}

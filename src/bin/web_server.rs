use clap::Parser;
use dsaforge::{config::ServerArgs, server, utils::init_log};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // a missing .env is fine; variables may come from the environment
    let _ = dotenvy::dotenv();
    let args = ServerArgs::parse();
    let _guard = init_log(args.log_dir.clone())?;
    server::serve(args).await
}

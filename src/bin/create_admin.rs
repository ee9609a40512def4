use clap::Parser;
use dsaforge::{
    config::DatabaseArgs,
    db,
    user::{self, NewUser},
    utils::init_log,
};
use tracing::info;

/// Create an administrator account directly in the database.
#[derive(Debug, Parser)]
#[command(author, version, long_about = None)]
struct Args {
    #[command(flatten)]
    database: DatabaseArgs,
    #[arg(short, long, default_value = "Admin User")]
    name: String,
    #[arg(short, long, env = "ADMIN_EMAIL", default_value = "admin@dsaforge.com")]
    email: String,
    #[arg(short, long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    password: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    let _guard = init_log(None)?;
    let database = db::connect(&args.database.database_url).await?;

    if let Some(existing) = user::find_by_email(&database, &args.email).await? {
        info!("user {} <{}> already exists", existing.id, existing.email);
        return Ok(());
    }
    let admin = user::create_admin(
        &database,
        &NewUser {
            name: args.name,
            email: args.email,
            password: args.password,
        },
    )
    .await?;
    info!("created admin {} <{}>", admin.id, admin.email);
    Ok(())
}

use clap::Parser;
use fidlygrid::db;
use fidlygrid::error::Result;

#[derive(Parser, Debug)]
#[command(name = "fidlygrid-migrate")]
#[command(about = "Apply pending FidlyGrid database migrations")]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value_t = fidlygrid::runtime_paths::default_db_path())]
    db: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fidlygrid::logging::init_tracing("fidlygrid_migrate");
    let cli = Cli::parse();

    db::ensure_parent_dir(&cli.db)?;
    let applied = db::run_migrations(&cli.db).await?;
    if applied.is_empty() {
        println!("{}: schema is up to date", cli.db);
    }
    for version in applied {
        println!("applied {version}");
    }
    Ok(())
}

//! Replace the category table with the marketplace's default categories.

use anyhow::Context;
use apimarket::{app, categories::seed::seed_categories, config::AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    app::init_tracing("apimarket=info,sqlx=warn");

    let config = AppConfig::from_env()?;
    let db = sqlx::postgres::PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.database_url)
        .await
        .context("connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("run migrations")?;

    let inserted = seed_categories(&db).await?;
    tracing::info!(inserted, "seed complete");
    Ok(())
}

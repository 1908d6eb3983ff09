//! Apply the schema and the demo data set to the configured database.

use creditpost_infra::config::DatabaseConfig;
use creditpost_infra::db::seed::seed;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    creditpost_observability::init();

    let config = DatabaseConfig::from_env()?;
    let pool = config.connect().await?;
    seed(&pool).await?;

    pool.close().await;
    Ok(())
}

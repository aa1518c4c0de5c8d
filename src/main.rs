use actix_web::{middleware::Logger, web::Data, App, HttpServer};
use anyhow::Context;
use log::info;
use sqlx::postgres::PgPoolOptions;

use clubhouse::{config::Config, core::services::workflow::Workflow, database::PgSqlxManager, handlers, impls::codec::json::JsonCodec};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("clubhouse=info,actix_web=info")).init();
    let config = Config::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    sqlx::migrate!("./migrations").run(&pool).await.context("failed to run migrations")?;
    let workflow = Workflow::new(PgSqlxManager::new(pool), JsonCodec, config.workflow_deadline);
    info!("listening on {}", config.bind_addr);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(Data::new(workflow.clone()))
            .configure(handlers::routes::<PgSqlxManager>)
    })
    .bind(&config.bind_addr)?
    .run()
    .await?;
    Ok(())
}

use crate::config::Config;
use mongodb::{Client as MongoClient, Database};
use thiserror::Error;

/// Marker for lookups that found nothing. Services wrap it in anyhow and the
/// handler layer downcasts it to answer 404 instead of a generic 400.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct NoEncontrado(pub String);

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
}

impl AppState {
    pub async fn new(config: Config, mongo_client: MongoClient) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        // Connections are lazy; ping once so a bad URI fails at startup
        // instead of on the first request.
        tokio::time::timeout(
            std::time::Duration::from_secs(10),
            mongo.run_command(mongodb::bson::doc! { "ping": 1 }),
        )
        .await
        .map_err(|_| anyhow::anyhow!("MongoDB ping timeout after 10s"))??;

        tracing::info!("MongoDB connection established");

        Ok(Self { config, mongo })
    }
}

pub mod auth_service;
pub mod cita_service;
pub mod email_service;
pub mod horario_service;
pub mod mensaje_service;
pub mod user_service;

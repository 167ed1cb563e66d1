//! services/api/src/bin/api.rs

use adaptive_learning_core::{ports::LanguageModelService, service::TutoringService};
use api_lib::{
    adapters::{
        db::{DbAdapter, DEFAULT_LEARNING_GOALS},
        tutor_llm::OpenAiTutorAdapter,
    },
    config::{Config, ModelGateway},
    error::ApiError,
    web::{cors_layer, rest::ApiDoc, router, state::AppState},
};
use async_openai::{
    config::{AzureConfig, OpenAIConfig},
    Client,
};
use axum::Router;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database, Run Migrations & Seed ---
    info!("Connecting to database...");
    let db_pool = DbAdapter::connect(&config.database_url, config.db_max_connections).await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");
    if config.seed_learning_goals {
        let inserted = db_adapter.seed_learning_goals(DEFAULT_LEARNING_GOALS).await?;
        info!("Seeded {} learning goals.", inserted);
    }

    // --- 3. Initialize the Model Gateway ---
    let tutor_adapter: Arc<dyn LanguageModelService> = match config.model_gateway()? {
        ModelGateway::OpenAi {
            api_key,
            api_base,
            model,
        } => {
            let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
            if let Some(api_base) = api_base {
                openai_config = openai_config.with_api_base(api_base);
            }
            info!("Using the OpenAI gateway with model {}", model);
            Arc::new(OpenAiTutorAdapter::new(Client::with_config(openai_config), model))
        }
        ModelGateway::Azure {
            endpoint,
            api_key,
            deployment,
            api_version,
        } => {
            let azure_config = AzureConfig::new()
                .with_api_base(endpoint)
                .with_deployment_id(deployment.clone())
                .with_api_version(api_version)
                .with_api_key(api_key);
            info!("Using the Azure OpenAI gateway with deployment {}", deployment);
            Arc::new(OpenAiTutorAdapter::new(Client::with_config(azure_config), deployment))
        }
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        tutoring: TutoringService::new(db_adapter, tutor_adapter),
    });

    // --- 5. Create the Web Router ---
    let cors = cors_layer(&config.cors_allowed_origin)
        .map_err(|e| ApiError::Internal(format!("Invalid CORS_ALLOWED_ORIGIN: {}", e)))?;

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

use std::sync::Arc;

use anyhow::Context;
use storage::{Database, ScoreLedger};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod error;
mod features;
mod routes;

use config::Config;

#[derive(OpenApi)]
#[openapi(
    paths(
        features::scores::handlers::submit_score,
        features::scores::handlers::get_score,
        features::scores::handlers::update_score,
        features::scores::handlers::delete_score,
        features::scores::handlers::compare_score,
        features::athletes::handlers::list_athlete_scores,
        features::leaderboard::handlers::get_leaderboard,
        features::admin::handlers::reconcile_workout,
    ),
    components(
        schemas(
            storage::dto::score::SubmitScoreRequest,
            storage::dto::score::UpdateScoreRequest,
            storage::dto::score::ScoreMetricsInput,
            storage::dto::score::ScoreResponse,
            storage::dto::score::DisplayQuantity,
            storage::dto::score::ScoreComparisonResponse,
            storage::dto::score::ReconcileWorkoutResponse,
            storage::dto::common::PaginationMeta,
            storage::models::ScalingLevel,
            storage::models::ScoringType,
            storage::models::UnitPreferences,
            storage::models::MassUnit,
            storage::models::DistanceUnit,
            storage::models::TimeUnit,
        )
    ),
    tags(
        (name = "scores", description = "Score submission, revision and comparison"),
        (name = "athletes", description = "Athlete score history"),
        (name = "leaderboard", description = "Personal record leaderboards"),
        (name = "admin", description = "Maintenance endpoints"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting score ledger API");

    let config = Config::from_env().context("Failed to load API configuration")?;
    tracing::info!("Configuration loaded successfully");

    tracing::info!(
        "Connecting to database at: {}",
        config
            .database_url
            .split('@')
            .next_back()
            .unwrap_or("unknown")
    );
    let db = Database::new(&config.database_url, config.db_max_connections)
        .await
        .context("Failed to initialize database")?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations");
    db.run_migrations()
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database migrations completed successfully");

    let settings = config.ledger_settings();
    tracing::info!(
        "Reconciliation: {} attempt(s), {:?} initial backoff, {:?} lock timeout",
        settings.max_attempts,
        settings.backoff,
        config.db_lock_timeout
    );
    let ledger = ScoreLedger::new(Arc::new(db.score_store(config.db_lock_timeout)), settings);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::create_router(ledger)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let bind_address = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server at http://{}", bind_address);
    tracing::info!(
        "Swagger UI available at http://{}/swagger-ui/",
        bind_address
    );

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    axum::serve(listener, app).await?;

    Ok(())
}

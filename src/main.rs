use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;

use campus_attendance::config::Config;
use campus_attendance::db::init_db;
use campus_attendance::docs::ApiDoc;
use campus_attendance::routes::{self, RateLimits};
use campus_attendance::seed::{self, SeedConfig};
use campus_attendance::state::AppState;

use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Campus attendance service"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let seed_only = std::env::args().skip(1).any(|arg| arg == "--seed");

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config).await?;

    if seed_only {
        let seed_config = SeedConfig::from_env()?;
        let outcomes = seed::run(&pool, &config, &seed_config, chrono::Utc::now()).await;
        let failed = seed::report(&outcomes);
        anyhow::ensure!(failed == 0, "{failed} seed items failed, see the log");
        return Ok(());
    }

    let limits = RateLimits::from_config(&config)?;
    let state = Data::new(AppState::new(pool.clone(), &config));
    let server_addr = config.server_addr.clone();

    info!(addr = %server_addr, "Listening");

    HttpServer::new(move || {
        let config = config.clone();
        let limits = limits.clone();
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(state.clone())
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .service(index)
            // Public + protected routes with rate limiting
            .configure(move |cfg| routes::configure(cfg, &config, &limits))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}

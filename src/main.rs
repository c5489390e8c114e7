use rocket_cors::{AllowedOrigins, CorsOptions};
use statusbar::config::Config;
use statusbar::db::Db;
use statusbar::engine::{Engine, EngineOptions};
use statusbar::hooks::HookRunner;
use statusbar::sse::EventBroadcaster;
use statusbar::{catchers, checker, notifications, routes};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("statusbar=info,rocket=warn")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env();
    tracing::info!(
        database = %config.database_path,
        history = %config.history_path.display(),
        interval_secs = config.refresh_interval.as_secs(),
        "starting statusbar"
    );

    let database = Arc::new(Db::new(&config.database_path)?);
    let sources = database.load_sources()?;
    tracing::info!(sources = sources.len(), "loaded source registry");

    let broadcaster = Arc::new(EventBroadcaster::new(256));
    let (engine, flusher) = Engine::new(EngineOptions::from(&config), sources, broadcaster.clone())?;
    let engine = Arc::new(engine);

    let hooks = config.hooks_dir.clone().map(|dir| {
        let runner = HookRunner::new(dir, config.hook_timeout);
        tracing::info!(dir = %runner.dir().display(), scripts = runner.discover().len(), "hook scripts enabled");
        runner
    });

    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .to_cors()?;

    let checker_engine = engine.clone();
    let dispatcher_db = database.clone();
    let dispatcher_broadcaster = broadcaster.clone();
    let webhook_client = engine.http().inner().clone();
    let interval = config.refresh_interval;

    tokio::spawn(flusher.run());

    let result = rocket::build()
        .attach(cors)
        .manage(database)
        .manage(engine.clone())
        .manage(broadcaster)
        .mount("/api/v1", routes::api())
        .register("/", catchers::all())
        .attach(rocket::fairing::AdHoc::on_liftoff("Background tasks", move |rocket| {
            Box::pin(async move {
                let shutdown = rocket.shutdown();
                tokio::spawn(notifications::run_dispatcher(
                    dispatcher_broadcaster,
                    dispatcher_db,
                    webhook_client,
                    hooks,
                    shutdown.clone(),
                ));
                let handle = tokio::spawn(checker::run_checker(checker_engine, interval, shutdown));
                tokio::spawn(async move {
                    if let Err(e) = handle.await {
                        tracing::error!(error = %e, "scheduler task failed");
                    }
                });
            })
        }))
        .launch()
        .await;

    if let Err(e) = engine.flush_history() {
        tracing::error!(error = %e, "failed to flush history");
    }
    match result {
        Ok(_) => {
            tracing::info!("statusbar stopped");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "server failed");
            Err(e.to_string().into())
        }
    }
}

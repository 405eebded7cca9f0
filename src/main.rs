use std::{net::SocketAddr, sync::Arc};

use axum::{routing::get, Router};
use http::HeaderValue;
use tokio::{signal, sync::mpsc};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use studio_booking_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);
    api::errors::set_error_detail_exposure(cfg.is_development());

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let event_sender = api::events::EventSender::new(event_tx);

    // Aggregate app services used by HTTP handlers
    let services = api::handlers::AppServices::new(db_arc.clone(), &cfg, event_sender.clone());

    // Optional marketing side effects, wired only when configured
    let audience = match (&cfg.email_api_key, &cfg.email_audience_id) {
        (Some(api_key), Some(audience_id)) => Some(api::marketing::AudienceClient::new(
            cfg.email_api_url.clone(),
            api_key.clone(),
            audience_id.clone(),
        )),
        _ => {
            info!("marketing audience sync disabled (no audience configured)");
            None
        }
    };
    let ads = match (&cfg.ads_pixel_id, &cfg.ads_access_token) {
        (Some(pixel_id), Some(access_token)) => Some(api::marketing::AdConversionClient::new(
            pixel_id.clone(),
            access_token.clone(),
        )),
        _ => {
            info!("ad conversion tracking disabled (no pixel configured)");
            None
        }
    };

    // Spawn the post-commit side-effect processor
    tokio::spawn(api::events::process_events(
        event_rx,
        api::events::SideEffects {
            email: services.email.clone(),
            audience,
            ads,
        },
    ));

    // Compose shared app state
    let app_state = api::AppState {
        db: db_arc.clone(),
        config: cfg.clone(),
        event_sender,
        services,
    };

    // Build CORS layer from config
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    let cors_layer = if let Some(origins) = configured_origins {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.should_allow_permissive_cors() {
        info!("Using permissive CORS (development or explicit override)");
        CorsLayer::permissive()
    } else {
        error!("Missing CORS configuration; set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true");
        return Err("Missing CORS configuration".into());
    };

    // Checkout endpoints get the per-IP limiter; the rest do not
    let checkout = api::handlers::checkout::checkout_routes().layer(
        axum::middleware::from_fn_with_state(
            app_state.services.rate_limiter.clone(),
            api::rate_limiter::rate_limit_middleware,
        ),
    );

    let api_v1 = Router::new()
        .nest("/checkout", checkout)
        .nest("/bookings", api::handlers::bookings::booking_routes())
        .nest("/recovery", api::handlers::recovery::recovery_routes())
        .nest("/webhooks", api::handlers::webhooks::webhook_routes());

    let app = Router::new()
        .route("/", get(|| async { "studio-booking-api up" }))
        .merge(api::handlers::health::health_routes())
        .nest("/api/v1", api_v1)
        .merge(api::openapi::swagger_ui())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors_layer)
        .with_state(app_state);

    // Bind and serve
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    info!("studio-booking-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

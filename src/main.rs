mod entity;
mod error;
mod handlers;
mod prelude;
mod state;
mod sv;
mod utils;

use std::{env, net::SocketAddr};

use axum::{
  Router,
  routing::{get, patch, post},
};
use tower::ServiceBuilder;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};
use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
  prelude::*,
  state::{AppState, Config},
};

#[tokio::main]
async fn main() {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "nutrifit=debug,tower_http=debug,axum=trace,sea_orm=warn".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  let db_url = env::var("DATABASE_URL")
    .unwrap_or_else(|_| "sqlite:nutrifit.db?mode=rwc".into());

  info!("Starting NutriFit backend v{}", env!("CARGO_PKG_VERSION"));

  let app_state = Arc::new(
    AppState::new(&db_url, Config::load())
      .await
      .expect("Failed to initialize app state"),
  );

  let governor_conf = Arc::new(
    GovernorConfigBuilder::default()
      .per_second(2)
      .burst_size(100)
      .finish()
      .expect("Failed to build rate limiter config"),
  );

  let governor_limiter = governor_conf.limiter().clone();

  tokio::spawn(async move {
    loop {
      tokio::time::sleep(Duration::from_secs(60)).await;
      governor_limiter.retain_recent();
    }
  });

  let app = Router::new()
    .route("/health", get(handlers::health))
    .route(
      "/api/subscription/verify-receipt",
      post(handlers::verify_receipt),
    )
    .route(
      "/api/subscription/status/{user_id}",
      get(handlers::subscription_status),
    )
    .route(
      "/api/subscription/check-premium/{user_id}",
      get(handlers::check_premium),
    )
    .route("/api/subscription/cancel", post(handlers::cancel_subscription))
    .route(
      "/api/subscription/history/{user_id}",
      get(handlers::subscription_history),
    )
    .route("/api/billing/webhook", post(handlers::billing_webhook))
    .route(
      "/api/affiliate/codes",
      post(handlers::create_code).get(handlers::list_codes),
    )
    .route(
      "/api/affiliate/codes/{id}/activate",
      patch(handlers::activate_code),
    )
    .route(
      "/api/affiliate/codes/{id}/deactivate",
      patch(handlers::deactivate_code),
    )
    .route(
      "/api/affiliate/codes/{id}/percentage",
      patch(handlers::update_percentage),
    )
    .route("/api/affiliate/referrals", post(handlers::register_referral))
    .route(
      "/api/affiliate/referrals/{code}",
      get(handlers::list_referrals),
    )
    .route(
      "/api/affiliate/referrals/{code}/stats",
      get(handlers::referral_stats),
    )
    .route(
      "/api/affiliate/commissions/{code}",
      get(handlers::list_commissions),
    )
    .route(
      "/api/affiliate/commissions/{code}/stats",
      get(handlers::commission_stats),
    )
    .route(
      "/api/affiliate/commission/{id}/mark-paid",
      post(handlers::mark_paid),
    )
    .route("/api/affiliate/payments", post(handlers::bulk_payment))
    .layer(
      ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf))
        .layer(
          CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        ),
    )
    .with_state(app_state);

  let port: u16 =
    env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(3000);
  let addr = SocketAddr::from(([0, 0, 0, 0], port));

  info!("HTTP server listening on {}", addr);

  let listener =
    tokio::net::TcpListener::bind(addr).await.expect("Failed to bind");
  axum::serve(
    listener,
    app.into_make_service_with_connect_info::<SocketAddr>(),
  )
  .await
  .expect("Server error");
}

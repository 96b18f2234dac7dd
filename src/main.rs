use std::{net::SocketAddr, sync::Arc};

use axum::{
  routing::{delete, get},
  Router,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod audio;
mod auth;
mod bilibili;
mod collections;
mod error;
mod extractor;
mod history;
mod store;
mod util;

pub use error::{Error, Result};

use bilibili::{BiliClient, HttpTransport, USER_AGENT};
use collections::Collections;
use extractor::Extractor;
use history::History;
use store::{JsonFileStore, Store};
use util::{Clock, SystemClock};

#[derive(Clone)]
pub struct AppState {
  extractor: Arc<dyn Extractor>,
  store: Arc<dyn Store>,
  history: Arc<History>,
  collections: Arc<Collections>,
  // plain client for proxying audio bytes
  http: reqwest::Client,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .init();

  let store: Arc<dyn Store> =
    Arc::new(JsonFileStore::open(util::data_dir()).await?);
  let clock: Arc<dyn Clock> = Arc::new(SystemClock);
  let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

  let transport = Arc::new(HttpTransport::new(http.clone(), util::api_base()));
  let client = BiliClient::new(transport, store.clone(), clock.clone());

  let state = AppState {
    extractor: Arc::new(client),
    history: Arc::new(History::new(
      store.clone(),
      clock.clone(),
      util::history_limit(),
    )),
    collections: Arc::new(Collections::new(store.clone(), clock)),
    store,
    http,
  };

  let app = Router::new()
    .route("/health", get(health))
    .route("/audio/:bvid", get(audio::get_audio))
    .route("/api/resolve", get(audio::resolve))
    .route("/api/is-video-page", get(audio::video_page))
    .route("/api/auth", get(auth::get_auth).put(auth::put_auth))
    .route(
      "/api/history",
      get(history::list_history).delete(history::clear_history),
    )
    .route("/api/history/:bvid", delete(history::remove_history))
    .route(
      "/api/collections",
      get(collections::list_collections).post(collections::create_collection),
    )
    .route(
      "/api/collections/:id",
      get(collections::get_collection)
        .patch(collections::rename_collection)
        .delete(collections::delete_collection),
    )
    .route(
      "/api/collections/:id/items",
      axum::routing::post(collections::add_collection_item),
    )
    .route(
      "/api/collections/:id/items/:item_id",
      delete(collections::remove_collection_item),
    )
    .with_state(state);

  let addr: SocketAddr = util::listen_addr().parse().map_err(|_| {
    Error::InvalidInput(format!("bad listen address {}", util::listen_addr()))
  })?;
  info!("listening on {addr}");

  axum::Server::bind(&addr)
    .serve(app.into_make_service())
    .await
    .expect("Failed to start server");

  Ok(())
}

async fn health() -> &'static str {
  "ok"
}

//! # Distributed Binary
//!
//! Assembles the forum from the backends selected at compile time and serves
//! the JSON endpoints next to the static front-end.

use std::sync::Arc;

use actix_files::Files;
use actix_web::{web, App, HttpServer};
use ds_api::middleware::{cors_policy, standard_middleware};
use ds_api::{configure_routes, AppState};
use ds_core::{AccountService, ForumConfig, RecordStore, SeededWeigher};

#[cfg(not(any(feature = "m3o", feature = "local")))]
compile_error!("enable the `m3o` or `local` feature to pick a backend");

#[cfg(feature = "m3o")]
fn backends(config: &ForumConfig) -> anyhow::Result<(Arc<dyn RecordStore>, Arc<dyn AccountService>)> {
    use ds_m3o::{M3oAccounts, M3oClient, M3oRecordStore};

    let client = M3oClient::new(&config.api_url, &config.api_token)?;
    log::info!("using hosted backends at {}", config.api_url);
    Ok((
        Arc::new(M3oRecordStore::new(client.clone())),
        Arc::new(M3oAccounts::new(client)),
    ))
}

#[cfg(all(feature = "local", not(feature = "m3o")))]
fn backends(_config: &ForumConfig) -> anyhow::Result<(Arc<dyn RecordStore>, Arc<dyn AccountService>)> {
    use ds_auth_local::LocalAccounts;
    use ds_db_memory::MemoryRecordStore;

    log::info!("using in-process backends; nothing will be persisted");
    Ok((
        Arc::new(MemoryRecordStore::new()),
        Arc::new(LocalAccounts::new()),
    ))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = ForumConfig::from_env()?;
    log::debug!("{config:?}");

    let (store, accounts) = backends(&config)?;
    let state = web::Data::new(AppState::new(
        &config,
        store,
        accounts,
        Arc::new(SeededWeigher::from_entropy()),
    ));

    if config.moderators.is_empty() {
        log::warn!("DISTRIBUTED_MODS is empty; every vote counts once");
    }
    log::info!("distributed starting on http://{}", config.bind_addr);

    let html_dir = config.html_dir.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(cors_policy())
            .wrap(standard_middleware())
            .configure(configure_routes)
            .service(Files::new("/", html_dir.clone()).index_file("index.html"))
    })
    .bind(config.bind_addr.as_str())?
    .run()
    .await?;

    Ok(())
}

//! Application state wiring the realtime hub, the dispatcher, and storage.
//!
//! Services are generic over repository traits; `AppState` pins them to the
//! SQLite implementations from jugo-infra.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use jugo_core::realtime::hub::Hub;
use jugo_core::realtime::router::ProtocolRouter;
use jugo_core::service::save::ChapterSaveService;
use jugo_core::service::work::WorkService;
use jugo_core::task::dispatcher::TaskDispatcher;
use jugo_core::task::notifier::TaskNotifier;
use jugo_infra::llm::{ProviderKeys, build_providers};
use jugo_infra::sqlite::credential::SqliteCredentialStore;
use jugo_infra::sqlite::pool::{DatabasePool, database_url};
use jugo_infra::sqlite::task::SqliteTaskRepository;
use jugo_infra::sqlite::work::{SqliteChapterRepository, SqliteWorkRepository};
use jugo_types::config::AppConfig;

pub type ConcreteSaveService = ChapterSaveService<SqliteWorkRepository, SqliteChapterRepository>;

pub type ConcreteWorkService = WorkService<SqliteWorkRepository, SqliteChapterRepository>;

pub type ConcreteDispatcher =
    TaskDispatcher<SqliteTaskRepository, SqliteWorkRepository, SqliteChapterRepository>;

/// Shared state handed to every HTTP and WebSocket handler.
#[derive(Clone)]
pub struct AppState {
    pub hub: Hub,
    pub dispatcher: ConcreteDispatcher,
    pub save_service: Arc<ConcreteSaveService>,
    pub work_service: Arc<ConcreteWorkService>,
    pub credentials: SqliteCredentialStore,
    pub db_pool: DatabasePool,
    pub config: Arc<AppConfig>,
}

/// Create the data directory and open (and migrate) `jugo.db` in it.
pub async fn open_database(data_dir: &Path) -> anyhow::Result<DatabasePool> {
    tokio::fs::create_dir_all(data_dir).await?;
    let url = format!("{}?mode=rwc", database_url(data_dir));
    Ok(DatabasePool::new(&url).await?)
}

impl AppState {
    /// Connect storage, start the hub, and build the dispatcher.
    ///
    /// Tasks left running by a previous process are failed before the
    /// dispatcher accepts new work.
    pub async fn init(data_dir: PathBuf, config: AppConfig) -> anyhow::Result<Self> {
        let db_pool = open_database(&data_dir).await?;

        let save_service = Arc::new(ChapterSaveService::new(
            SqliteWorkRepository::new(db_pool.clone()),
            SqliteChapterRepository::new(db_pool.clone()),
        ));

        let hub = Hub::start(
            ProtocolRouter::new(save_service.clone()),
            config.realtime.hub_queue,
        );

        let providers = build_providers(&config.providers, ProviderKeys::from_env())?;
        let notifier: Arc<dyn TaskNotifier> = Arc::new(hub.clone());
        let dispatcher = TaskDispatcher::new(
            SqliteTaskRepository::new(db_pool.clone()),
            SqliteWorkRepository::new(db_pool.clone()),
            SqliteChapterRepository::new(db_pool.clone()),
            providers,
            Some(notifier),
            &config.dispatcher,
        );

        dispatcher.recover_interrupted().await?;

        tracing::info!(data_dir = %data_dir.display(), "application state ready");

        Ok(Self {
            hub,
            dispatcher,
            save_service,
            work_service: Arc::new(WorkService::new(
                SqliteWorkRepository::new(db_pool.clone()),
                SqliteChapterRepository::new(db_pool.clone()),
            )),
            credentials: SqliteCredentialStore::new(db_pool.clone()),
            db_pool,
            config: Arc::new(config),
        })
    }
}

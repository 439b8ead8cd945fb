use std::sync::Arc;

use tracing::info;

use super::{
    apps::AppResolver,
    auth::Credentials,
    classifier::{Categorizer, HttpClassifier, IdentityClassifier},
    config::{Config, StorageBackend},
    database::RedisStore,
    grievance::GrievanceManager,
    identity::IdentityService,
    memory::MemoryStore,
    store::Store,
};

pub struct State {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub credentials: Credentials,
    pub identity: IdentityService,
    pub apps: AppResolver,
    pub grievances: GrievanceManager,
}

impl State {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let store: Arc<dyn Store> = match config.storage {
            StorageBackend::Redis => {
                info!("Connecting to Redis...");
                Arc::new(
                    RedisStore::connect(&config.redis_url)
                        .await
                        .expect("Redis unreachable!"),
                )
            }
            StorageBackend::Memory => {
                info!("Using in-memory storage");
                Arc::new(MemoryStore::new())
            }
        };

        let classifier = Arc::new(HttpClassifier::new(&config));

        Self::assemble(config, store, classifier.clone(), classifier)
    }

    pub fn assemble(
        config: Config,
        store: Arc<dyn Store>,
        identity_classifier: Arc<dyn IdentityClassifier>,
        categorizer: Arc<dyn Categorizer>,
    ) -> Arc<Self> {
        Arc::new(Self {
            credentials: Credentials::new(store.clone(), &config),
            identity: IdentityService::new(store.clone(), identity_classifier),
            apps: AppResolver::new(store.clone()),
            grievances: GrievanceManager::new(store.clone(), categorizer),
            store,
            config,
        })
    }
}

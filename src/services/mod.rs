use crate::clients::chat::ChatClient;
use crate::clients::email::EmailClient;
use crate::config::AppConfig;
use crate::db::{Repository, Store};
use std::sync::Arc;

pub mod assembler;
pub mod generator;
pub mod render;
pub mod sender;

use assembler::AssemblerService;
use generator::GeneratorService;
use sender::SenderService;

// A container for all services to be injected into routes
#[derive(Clone)]
pub struct AppState {
    pub assembler: Arc<AssemblerService>,
    pub generator: Arc<GeneratorService>,
    pub sender: Arc<SenderService>,
    pub repo: Repository,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        repo: Repository,
        chat: Arc<dyn ChatClient>,
        email: Arc<dyn EmailClient>,
        config: Arc<AppConfig>,
    ) -> Self {
        // Repository is cheap to clone (Arc<DatabaseConnection> inside)
        let store: Arc<dyn Store> = Arc::new(repo.clone());
        Self {
            assembler: Arc::new(AssemblerService::new(store.clone(), config.clone())),
            generator: Arc::new(GeneratorService::new(store.clone(), chat)),
            sender: Arc::new(SenderService::new(store, email, config.clone())),
            repo,
            config,
        }
    }
}

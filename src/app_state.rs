use crate::{backend::Backends, config::AppConfig, models::BackendKind, session::SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// Recursos de solo lectura; los modelos se cargan una vez al arrancar.
    pub backends: Backends,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: AppConfig, backends: Backends) -> Self {
        let sessions = SessionStore::new(config.session_ttl);
        Self {
            config,
            backends,
            sessions,
        }
    }
}

/// Estado de los backends expuesto en `/api/status`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Status {
    pub model_loaded: bool,
    pub model_error: Option<String>,
    pub backends: Vec<BackendKind>,
    pub active_sessions: usize,
}

//! Estado de cada sesión interactiva: consulta analizada, grupos,
//! sugerencias, términos seleccionables y la consulta en construcción.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::models::{KeywordGroup, Suggestions};
use crate::{query_builder, query_parser};

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub query: String,
    pub groups: Vec<KeywordGroup>,
    pub suggestions: Suggestions,
    /// Consulta MeSH en construcción; sobrevive a los ciclos de sugerencia.
    pub builder: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            query: String::new(),
            groups: Vec::new(),
            suggestions: Suggestions::default(),
            builder: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Analiza `text` y sustituye los grupos actuales.
    pub fn parse(&mut self, text: &str) -> &[KeywordGroup] {
        self.query = text.to_string();
        self.groups = query_parser::decompose(text);
        self.touch();
        &self.groups
    }

    pub fn set_suggestions(&mut self, suggestions: Suggestions) {
        self.suggestions = suggestions;
        self.touch();
    }

    /// Tras un fallo no queda ningún término seleccionable.
    pub fn discard_suggestions(&mut self) {
        self.set_suggestions(Suggestions::default());
    }

    /// Añade a la consulta en construcción los términos seleccionados.
    pub fn add_selection(&mut self, selected: &[String]) -> &str {
        self.builder = query_builder::append(selected, &self.suggestions.choices, &self.builder);
        self.touch();
        &self.builder
    }

    /// El usuario también puede editar la consulta directamente.
    pub fn set_builder(&mut self, text: &str) {
        self.builder = text.to_string();
        self.touch();
    }

    /// Vuelve al estado inicial en un único paso.
    pub fn clear(&mut self) {
        *self = Self {
            created_at: self.created_at,
            ..Self::new()
        };
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        (now - self.updated_at).to_std().is_ok_and(|idle| idle > ttl)
    }
}

/// Sesiones activas, compartidas entre peticiones.
/// El candado nunca se mantiene a través de un `.await`.
///
/// Cada `create` descarta antes las sesiones inactivas durante más de `ttl`,
/// así que el mapa no crece con las sesiones abandonadas.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::default(),
            ttl,
        }
    }

    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.lock();
        Self::retain_active(&mut sessions, self.ttl);
        sessions.insert(id, Session::new());
        id
    }

    /// Elimina las sesiones caducadas y devuelve cuántas había.
    pub fn evict_expired(&self) -> usize {
        Self::retain_active(&mut self.lock(), self.ttl)
    }

    fn retain_active(sessions: &mut HashMap<Uuid, Session>, ttl: Duration) -> usize {
        let now = Utc::now();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now, ttl));
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!("{evicted} sesión(es) caducada(s) eliminada(s)");
        }
        evicted
    }

    pub fn get(&self, id: &Uuid) -> Option<Session> {
        self.lock().get(id).cloned()
    }

    /// Aplica `f` a la sesión bajo el candado; `None` si no existe.
    pub fn update<R>(&self, id: &Uuid, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.lock().get_mut(id).map(f)
    }

    pub fn remove(&self, id: &Uuid) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

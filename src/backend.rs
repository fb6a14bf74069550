//! Contrato común de los backends de sugerencia y selección del backend
//! concreto para cada petición.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::atm::AtmClient;
use crate::embedding::{EmbeddingBackend, EmbeddingMode, ModelState};
use crate::error::SuggestError;
use crate::models::{BackendKind, SuggestionRecord};
use crate::umls::UmlsClient;

/// Dada una lista de palabras clave, devuelve registros de términos sugeridos.
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    async fn suggest(&self, keywords: &[String]) -> Result<Vec<SuggestionRecord>>;
}

/// Conjunto cerrado de backends.
pub enum Backend<'a> {
    Embedding(EmbeddingBackend<'a>),
    Atm(&'a AtmClient),
    Umls(&'a UmlsClient),
}

#[async_trait]
impl SuggestionSource for Backend<'_> {
    async fn suggest(&self, keywords: &[String]) -> Result<Vec<SuggestionRecord>> {
        match self {
            Backend::Embedding(backend) => backend.suggest(keywords).await,
            Backend::Atm(client) => client.suggest(keywords).await,
            Backend::Umls(client) => client.suggest(keywords).await,
        }
    }
}

/// Recursos de todos los backends, construidos una vez al arrancar.
#[derive(Clone)]
pub struct Backends {
    model: Arc<ModelState>,
    atm: AtmClient,
    umls: Option<UmlsClient>,
}

impl Backends {
    pub fn new(model: Arc<ModelState>, atm: AtmClient) -> Self {
        Self {
            model,
            atm,
            umls: None,
        }
    }

    pub fn with_umls(mut self, umls: Option<UmlsClient>) -> Self {
        self.umls = umls;
        self
    }

    pub fn model_state(&self) -> &ModelState {
        &self.model
    }

    /// Falla sin llamar a nada si el backend elegido necesita unos modelos
    /// que no se pudieron cargar (`ModelUnavailable`) o no está configurado.
    pub fn select(&self, kind: BackendKind) -> Result<Backend<'_>, SuggestError> {
        if let Some(mode) = EmbeddingMode::from_kind(kind) {
            let resources = self.model.resources()?;
            return Ok(Backend::Embedding(EmbeddingBackend::new(resources, mode)));
        }

        match kind {
            BackendKind::Umls => self
                .umls
                .as_ref()
                .map(Backend::Umls)
                .ok_or_else(|| SuggestError::NotConfigured("UMLS necesita UMLS_URL".to_string())),
            _ => Ok(Backend::Atm(&self.atm)),
        }
    }

    /// Backends que se pueden usar ahora mismo.
    pub fn available(&self) -> Vec<BackendKind> {
        BackendKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                BackendKind::Umls => self.umls.is_some(),
                kind if kind.requires_model() => self.model.is_loaded(),
                _ => true,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backends_without_model() -> Backends {
        Backends::new(
            Arc::new(ModelState::Unavailable("sin modelos".to_string())),
            AtmClient::new("http://127.0.0.1:9", None),
        )
    }

    #[test]
    fn test_select_embedding_without_model_fails_fast() {
        let backends = backends_without_model();
        for kind in [BackendKind::Semantic, BackendKind::Fragment, BackendKind::Atomic] {
            match backends.select(kind) {
                Err(SuggestError::ModelUnavailable(cause)) => assert_eq!(cause, "sin modelos"),
                _ => panic!("se esperaba ModelUnavailable para {kind}"),
            }
        }
    }

    #[test]
    fn test_select_atm_without_model() {
        let backends = backends_without_model();
        assert!(matches!(backends.select(BackendKind::Atm), Ok(Backend::Atm(_))));
        assert_eq!(backends.available(), [BackendKind::Atm]);
    }

    #[test]
    fn test_select_umls_requires_url() {
        let backends = backends_without_model();
        assert!(matches!(
            backends.select(BackendKind::Umls),
            Err(SuggestError::NotConfigured(_))
        ));

        let backends = backends.with_umls(Some(UmlsClient::new("http://127.0.0.1:9/umls/")));
        assert!(matches!(backends.select(BackendKind::Umls), Ok(Backend::Umls(_))));
        assert_eq!(backends.available(), [BackendKind::Atm, BackendKind::Umls]);
    }
}

//! Backends densos (Semantic / Fragment / Atomic) y el conjunto de recursos
//! que necesitan: encoder (embeddings vía Rig) + retriever (índice vectorial
//! de Neo4j sobre `:MeshTerm`).
//!
//! Los recursos se cargan una sola vez al arrancar (`ModelState::load`) y no
//! se modifican después. Si la carga falla el estado queda en
//! `Unavailable` con la causa y cada petición densa falla inmediatamente.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use neo4rs::Graph;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::SuggestError;
use crate::llm::LlmManager;
use crate::models::{BackendKind, SuggestionRecord};
use crate::{neo4j_client, vector_store};

/// Recursos compartidos de solo lectura de los backends densos.
#[derive(Clone)]
pub struct EmbeddingResources {
    pub graph: Arc<Graph>,
    pub llm: LlmManager,
    pub top_k: usize,
}

impl EmbeddingResources {
    async fn load(cfg: &AppConfig) -> Result<Self> {
        let neo4j = cfg
            .neo4j
            .as_ref()
            .ok_or_else(|| anyhow!("Faltan NEO4J_URI, NEO4J_USER o NEO4J_PASSWORD en el entorno"))?;

        let llm = LlmManager::from_config(cfg)?;

        let graph = neo4j_client::connect_from_config(neo4j).await?;
        neo4j_client::ensure_schema(&graph).await?;
        vector_store::ensure_mesh_vector_index(&graph, cfg.vector_dimensions).await?;

        Ok(Self {
            graph: Arc::new(graph),
            llm,
            top_k: cfg.top_k,
        })
    }
}

/// Estado de los modelos, fijado al arrancar el proceso.
#[derive(Clone)]
pub enum ModelState {
    Ready(EmbeddingResources),
    Unavailable(String),
}

impl ModelState {
    /// Nunca falla: un error de inicialización deja el estado en `Unavailable`.
    pub async fn load(cfg: &AppConfig) -> Self {
        match EmbeddingResources::load(cfg).await {
            Ok(resources) => {
                info!("Modelos de embeddings cargados correctamente.");
                Self::Ready(resources)
            }
            Err(err) => {
                warn!("No se pudieron cargar los modelos de embeddings: {err:#}. Sólo ATM estará disponible.");
                Self::Unavailable(format!("{err:#}"))
            }
        }
    }

    pub fn resources(&self) -> Result<&EmbeddingResources, SuggestError> {
        match self {
            Self::Ready(resources) => Ok(resources),
            Self::Unavailable(cause) => Err(SuggestError::ModelUnavailable(cause.clone())),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Ready(_) => None,
            Self::Unavailable(cause) => Some(cause),
        }
    }
}

/// Cómo se convierten las palabras clave de un grupo en consultas densas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingMode {
    Semantic,
    Fragment,
    Atomic,
}

impl EmbeddingMode {
    pub fn from_kind(kind: BackendKind) -> Option<Self> {
        match kind {
            BackendKind::Semantic => Some(Self::Semantic),
            BackendKind::Fragment => Some(Self::Fragment),
            BackendKind::Atomic => Some(Self::Atomic),
            BackendKind::Atm | BackendKind::Umls => None,
        }
    }

    pub fn kind(self) -> BackendKind {
        match self {
            Self::Semantic => BackendKind::Semantic,
            Self::Fragment => BackendKind::Fragment,
            Self::Atomic => BackendKind::Atomic,
        }
    }
}

/// Una consulta densa: el texto a codificar y las palabras clave que cubre.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingQuery {
    pub keywords: Vec<String>,
    pub text: String,
}

/// Semantic: una consulta con todo el grupo.
/// Fragment: una consulta por palabra clave.
/// Atomic: una consulta por palabra individual, sin repetir.
pub fn embedding_queries(mode: EmbeddingMode, keywords: &[String]) -> Vec<EmbeddingQuery> {
    match mode {
        EmbeddingMode::Semantic => {
            if keywords.is_empty() {
                return Vec::new();
            }
            vec![EmbeddingQuery {
                keywords: keywords.to_vec(),
                text: keywords.join(" "),
            }]
        }
        EmbeddingMode::Fragment => keywords
            .iter()
            .map(|keyword| EmbeddingQuery {
                keywords: vec![keyword.clone()],
                text: keyword.clone(),
            })
            .collect(),
        EmbeddingMode::Atomic => {
            let mut words: Vec<&str> = Vec::new();
            for word in keywords.iter().flat_map(|k| k.split_whitespace()) {
                if !words.contains(&word) {
                    words.push(word);
                }
            }
            words
                .into_iter()
                .map(|word| EmbeddingQuery {
                    keywords: vec![word.to_string()],
                    text: word.to_string(),
                })
                .collect()
        }
    }
}

/// Backend denso listo para usar sobre unos recursos cargados.
#[derive(Clone, Copy)]
pub struct EmbeddingBackend<'a> {
    resources: &'a EmbeddingResources,
    mode: EmbeddingMode,
}

impl<'a> EmbeddingBackend<'a> {
    pub fn new(resources: &'a EmbeddingResources, mode: EmbeddingMode) -> Self {
        Self { resources, mode }
    }

    pub async fn suggest(&self, keywords: &[String]) -> Result<Vec<SuggestionRecord>> {
        let queries = embedding_queries(self.mode, keywords);
        let texts: Vec<String> = queries.iter().map(|q| q.text.clone()).collect();

        // Un único lote de embeddings para todas las consultas del grupo.
        let vectors = self.resources.llm.embed_texts(&texts).await?;

        let mut records = Vec::with_capacity(queries.len());
        for (query, vector) in queries.into_iter().zip(vectors) {
            let hits =
                vector_store::search_top_terms(&self.resources.graph, vector, self.resources.top_k)
                    .await?;
            debug!("'{}' → {} términos MeSH ({})", query.text, hits.len(), self.mode.kind());

            let mut record = SuggestionRecord::new(query.keywords, self.mode.kind());
            for (_, name) in hits {
                record.push_term(name);
            }
            records.push(record);
        }

        Ok(records)
    }
}

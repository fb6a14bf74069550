//! Backend UMLS: búsqueda en un índice Elasticsearch del Metatesauro.
//!
//! Cada palabra clave se concatena a `UMLS_URL` y de los resultados se
//! quedan las entradas de `MRCONSO` cuya fuente (`MRCONSO_SAB`) es `MSH`.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::AppConfig;
use crate::models::{BackendKind, SuggestionRecord};

const MESH_SOURCE: &str = "MSH";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: HitSource,
}

#[derive(Debug, Deserialize)]
struct HitSource {
    #[serde(default)]
    thesaurus: Vec<ThesaurusEntry>,
}

#[derive(Debug, Deserialize)]
struct ThesaurusEntry {
    #[serde(rename = "MRCONSO_STR")]
    name: Option<String>,
    #[serde(rename = "MRCONSO_SAB")]
    vocabulary: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UmlsClient {
    client: Client,
    base_url: String,
}

impl UmlsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// `None` si no hay `UMLS_URL` configurada.
    pub fn from_config(cfg: &AppConfig) -> Option<Self> {
        cfg.umls_url.as_deref().map(Self::new)
    }

    /// Un registro por palabra clave, aunque no tenga términos MeSH.
    pub async fn suggest(&self, keywords: &[String]) -> Result<Vec<SuggestionRecord>> {
        let mut records = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            let response: SearchResponse = self
                .client
                .get(format!("{}{}", self.base_url, keyword))
                .send()
                .await
                .with_context(|| format!("Error llamando a UMLS para '{keyword}'"))?
                .error_for_status()
                .with_context(|| format!("UMLS devolvió un estado de error para '{keyword}'"))?
                .json()
                .await
                .with_context(|| format!("Respuesta de UMLS inválida para '{keyword}'"))?;

            let mut record = SuggestionRecord::new(vec![keyword.clone()], BackendKind::Umls);
            for term in mesh_terms(&response) {
                record.push_term(term);
            }
            debug!("UMLS: {} término(s) MeSH para '{keyword}'", record.mesh_terms.len());
            records.push(record);
        }
        Ok(records)
    }
}

/// Nombres MeSH de todos los resultados, sin repetir y en orden de aparición.
fn mesh_terms(response: &SearchResponse) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    let entries = response
        .hits
        .hits
        .iter()
        .flat_map(|hit| &hit.source.thesaurus)
        .filter(|entry| entry.vocabulary.as_deref() == Some(MESH_SOURCE));
    for entry in entries {
        if let Some(name) = entry.name.as_deref() {
            if !terms.iter().any(|t| t == name) {
                terms.push(name.to_string());
            }
        }
    }
    terms
}

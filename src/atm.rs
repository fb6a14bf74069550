//! Backend ATM: Automatic Term Mapping de PubMed a través de NCBI E-utilities.
//!
//! Por cada palabra clave se llama a `esearch` y se leen las traducciones
//! (`translationset`) que PubMed aplica a la consulta; los fragmentos
//! etiquetados con `[MeSH Terms]` son los términos sugeridos.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::AppConfig;
use crate::models::{BackendKind, SuggestionRecord};

const MESH_TAG: &str = "[MeSH Terms]";

static TRANSLATION_OR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bOR\b").expect("regex OR de traducción válida"));

#[derive(Debug, Deserialize)]
struct EsearchResponse {
    esearchresult: EsearchResult,
}

#[derive(Debug, Deserialize)]
struct EsearchResult {
    #[serde(default)]
    translationset: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    to: String,
}

/// Cliente HTTP para el servicio `esearch`.
#[derive(Debug, Clone)]
pub struct AtmClient {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl AtmClient {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            api_key,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(cfg.atm_url.clone(), cfg.atm_api_key.clone())
    }

    /// Un registro por palabra clave con traducción; las palabras sin
    /// traducción no producen registro.
    pub async fn suggest(&self, keywords: &[String]) -> Result<Vec<SuggestionRecord>> {
        let mut records = Vec::new();
        for keyword in keywords {
            if let Some(record) = self.lookup(keyword).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn lookup(&self, keyword: &str) -> Result<Option<SuggestionRecord>> {
        let mut params = vec![("db", "pubmed"), ("retmode", "json"), ("term", keyword)];
        if let Some(key) = self.api_key.as_deref() {
            params.push(("api_key", key));
        }

        let response: EsearchResponse = self
            .client
            .get(&self.url)
            .query(&params)
            .send()
            .await
            .with_context(|| format!("Error llamando a ATM para '{keyword}'"))?
            .error_for_status()
            .with_context(|| format!("ATM devolvió un estado de error para '{keyword}'"))?
            .json()
            .await
            .with_context(|| format!("Respuesta de ATM inválida para '{keyword}'"))?;

        let translations = response.esearchresult.translationset;
        if translations.is_empty() {
            debug!("ATM sin traducción para '{keyword}'");
            return Ok(None);
        }

        let mut record = SuggestionRecord::new(vec![keyword.to_string()], BackendKind::Atm);
        for translation in &translations {
            for term in mesh_terms_from_translation(&translation.to) {
                if !record.mesh_terms.values().any(|t| *t == term) {
                    record.push_term(term);
                }
            }
        }
        Ok(Some(record))
    }
}

/// Extrae los términos `[MeSH Terms]` de una traducción de PubMed, p. ej.
/// `"diabetes mellitus"[MeSH Terms] OR "diabetes"[All Fields]`.
pub fn mesh_terms_from_translation(to: &str) -> Vec<String> {
    TRANSLATION_OR
        .split(to)
        .map(|piece| piece.trim().trim_matches(|c: char| c == '(' || c == ')'))
        .filter(|piece| piece.ends_with(MESH_TAG))
        .map(|piece| {
            piece
                .trim_end_matches(MESH_TAG)
                .chars()
                .filter(|c| !matches!(c, '"' | '*' | '(' | ')'))
                .collect::<String>()
                .trim()
                .to_string()
        })
        .filter(|term| !term.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_terms_from_translation() {
        let to = r#""diabetes mellitus"[MeSH Terms] OR ("diabetes"[All Fields] AND "mellitus"[All Fields]) OR "diabetes mellitus"[All Fields]"#;
        assert_eq!(mesh_terms_from_translation(to), ["diabetes mellitus"]);
    }

    #[test]
    fn test_mesh_terms_from_translation_multiple_and_parenthesised() {
        let to = r#"("insulin"[MeSH Terms] OR "insulin"[All Fields] OR "insulin's"[All Fields] OR "insulins"[MeSH Terms])"#;
        assert_eq!(mesh_terms_from_translation(to), ["insulin", "insulins"]);

        let to = r#"("neoplasms"[MeSH Terms] OR "neoplasms"[All Fields] OR "cancer"[All Fields]) OR "ORGAN TRANSPLANTATION"[MeSH Terms]"#;
        assert_eq!(mesh_terms_from_translation(to), ["neoplasms", "ORGAN TRANSPLANTATION"]);
    }

    #[test]
    fn test_mesh_terms_from_translation_without_mesh() {
        assert!(mesh_terms_from_translation(r#""foo"[All Fields]"#).is_empty());
    }

    #[test]
    fn test_esearch_response_missing_translationset() {
        let response: EsearchResponse =
            serde_json::from_str(r#"{"esearchresult": {"count": "0"}}"#).unwrap();
        assert!(response.esearchresult.translationset.is_empty());
    }
}

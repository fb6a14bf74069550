//! Abstracción sobre Rig para calcular embeddings con distintos proveedores.
//! De momento se implementa OpenAI; Gemini/Ollama quedan preparados para el futuro.

use std::env;

use anyhow::{anyhow, Result};
use rig::embeddings::EmbeddingModel; // <- para .embed_texts

use crate::config::{AppConfig, LlmProvider};

const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Gestor de embeddings (el "encoder" de los backends densos).
#[derive(Debug, Clone)]
pub struct LlmManager {
    pub provider: LlmProvider,
    pub embedding_model: String,
}

impl LlmManager {
    /// Construye el manager a partir de la configuración.
    ///
    /// Comprueba aquí la clave del proveedor: `openai::Client::from_env`
    /// entra en pánico si falta.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        match cfg.llm_provider {
            LlmProvider::OpenAI => {
                if env::var(OPENAI_API_KEY).map(|k| k.trim().is_empty()).unwrap_or(true) {
                    return Err(anyhow!("Falta {OPENAI_API_KEY} en el entorno"));
                }
            }
            ref other => {
                return Err(anyhow!(
                    "Proveedor LLM {:?} aún no implementado para embeddings",
                    other
                ))
            }
        }

        Ok(Self {
            provider: cfg.llm_provider.clone(),
            embedding_model: cfg.llm_embedding_model.clone(),
        })
    }

    /// Calcula un embedding por texto, en el mismo orden.
    pub async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        match self.provider {
            LlmProvider::OpenAI => self.embed_with_openai(texts).await,
            ref other => Err(anyhow!(
                "Proveedor LLM {:?} aún no implementado para embeddings",
                other
            )),
        }
    }

    async fn embed_with_openai(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        use rig::providers::openai::{self, TEXT_EMBEDDING_3_SMALL};
        // Trait para client.embedding_model(...)
        use rig::client::EmbeddingsClient as _;

        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let client = openai::Client::from_env();

        let model_name = if self.embedding_model.is_empty() {
            TEXT_EMBEDDING_3_SMALL
        } else {
            self.embedding_model.as_str()
        };

        let embedding_model = client.embedding_model(model_name);

        // Embeddings en bloque (.embed_texts viene de EmbeddingModel)
        let embeddings = embedding_model.embed_texts(texts.to_vec()).await?;

        if embeddings.len() != texts.len() {
            return Err(anyhow!(
                "Número de embeddings ({}) distinto al número de textos ({})",
                embeddings.len(),
                texts.len()
            ));
        }

        Ok(embeddings.into_iter().map(|emb| emb.vec).collect())
    }
}

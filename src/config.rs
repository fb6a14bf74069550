//! Carga y gestión de configuración de la aplicación (Neo4j + embeddings + ATM).

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::session::DEFAULT_SESSION_TTL;

/// URL por defecto del servicio `esearch` de NCBI E-utilities.
pub const DEFAULT_ATM_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Gemini,
    Ollama,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(anyhow!("Proveedor LLM no soportado: {other}")),
        }
    }
}

/// Credenciales de Neo4j, donde vive el índice vectorial de términos MeSH.
#[derive(Clone, Debug)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// `None` si falta alguna variable: los backends de embeddings quedan
    /// deshabilitados, pero ATM sigue funcionando.
    pub neo4j: Option<Neo4jConfig>,

    pub llm_provider: LlmProvider,
    pub llm_embedding_model: String,
    pub vector_dimensions: usize,
    pub top_k: usize,

    pub atm_url: String,
    pub atm_api_key: Option<String>,

    /// Prefijo de búsqueda UMLS; el término se concatena al final.
    pub umls_url: Option<String>,

    pub backend_timeout: Duration,
    /// Las sesiones sin actividad durante más tiempo se descartan.
    pub session_ttl: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            neo4j: None,
            llm_provider: LlmProvider::OpenAI,
            llm_embedding_model: "text-embedding-3-small".to_string(),
            vector_dimensions: 1536,
            top_k: 10,
            atm_url: DEFAULT_ATM_URL.to_string(),
            atm_api_key: None,
            umls_url: None,
            backend_timeout: Duration::from_secs(30),
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let neo4j = match (
            env::var("NEO4J_URI"),
            env::var("NEO4J_USER"),
            env::var("NEO4J_PASSWORD"),
        ) {
            (Ok(uri), Ok(user), Ok(password)) => Some(Neo4jConfig { uri, user, password }),
            _ => None,
        };

        let llm_provider_str = env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let llm_provider = LlmProvider::from_str(&llm_provider_str)?;

        let llm_embedding_model =
            env::var("LLM_EMBEDDING_MODEL").unwrap_or(defaults.llm_embedding_model);

        let vector_dimensions = parse_var("MESH_VECTOR_DIMENSIONS", defaults.vector_dimensions)?;
        let top_k = parse_positive("MESH_TOP_K", defaults.top_k)?;

        let atm_url = env::var("ATM_URL").unwrap_or(defaults.atm_url);
        let atm_api_key = env::var("ATM_API_KEY").ok().filter(|k| !k.trim().is_empty());

        let umls_url = env::var("UMLS_URL").ok().filter(|u| !u.trim().is_empty());

        let timeout_secs = parse_positive("BACKEND_TIMEOUT_SECS", defaults.backend_timeout.as_secs())?;
        let session_ttl_secs = parse_positive("SESSION_TTL_SECS", defaults.session_ttl.as_secs())?;

        Ok(Self {
            neo4j,
            llm_provider,
            llm_embedding_model,
            vector_dimensions,
            top_k,
            atm_url,
            atm_api_key,
            umls_url,
            backend_timeout: Duration::from_secs(timeout_secs),
            session_ttl: Duration::from_secs(session_ttl_secs),
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Valor inválido para {name}: '{raw}'")),
        Err(_) => Ok(default),
    }
}

/// Como `parse_var`, pero un cero es un error de configuración.
fn parse_positive<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + Default + PartialEq,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = parse_var(name, default)?;
    if value == T::default() {
        return Err(anyhow!("{name} debe ser mayor que cero"));
    }
    Ok(value)
}

//! Errores del ciclo de sugerencia.
//!
//! Una entrada vacía no es un error (produce un resultado vacío) y las
//! selecciones que no se pueden resolver se descartan sin avisar.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SuggestError {
    /// Se eligió un backend de embeddings pero sus recursos no se cargaron.
    #[error("Modelos de embeddings no disponibles: {0}")]
    ModelUnavailable(String),

    /// Fallo (o timeout) en la llamada al backend para algún grupo.
    /// Aborta la agregación completa.
    #[error("Error en el backend de sugerencias: {0}")]
    BackendCall(String),

    /// Backend conocido pero sin configuración (p. ej. falta `UMLS_URL`).
    #[error("Backend no configurado: {0}")]
    NotConfigured(String),

    #[error("Tipo de backend no soportado: {0}")]
    UnknownBackend(String),
}

impl SuggestError {
    /// Identificador estable para el objeto de error de la API.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModelUnavailable(_) => "model_unavailable",
            Self::BackendCall(_) => "backend_call_failure",
            Self::NotConfigured(_) => "backend_not_configured",
            Self::UnknownBackend(_) => "unknown_backend",
        }
    }
}

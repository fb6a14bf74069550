//! Modelos de dominio: grupos de palabras clave, backends de sugerencia,
//! registros devueltos por los backends y claves de selección.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Grupo de palabras clave combinadas con OR.
/// Los grupos se combinan entre sí con AND. Nunca está vacío.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct KeywordGroup(Vec<String>);

impl KeywordGroup {
    /// Devuelve `None` si la lista está vacía.
    pub fn new(keywords: Vec<String>) -> Option<Self> {
        if keywords.is_empty() {
            None
        } else {
            Some(Self(keywords))
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.0
    }

    pub fn into_keywords(self) -> Vec<String> {
        self.0
    }
}

impl<'de> Deserialize<'de> for KeywordGroup {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let keywords = Vec::<String>::deserialize(deserializer)?;
        KeywordGroup::new(keywords)
            .ok_or_else(|| serde::de::Error::custom("un grupo de palabras clave no puede estar vacío"))
    }
}

/// Estrategias de sugerencia disponibles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// Todas las palabras clave del grupo como una única consulta densa.
    Semantic,
    /// Una consulta densa por palabra clave.
    Fragment,
    /// Una consulta densa por cada palabra individual.
    Atomic,
    /// Automatic Term Mapping de PubMed (API externa, no necesita modelo).
    #[serde(rename = "ATM")]
    Atm,
    /// Búsqueda en el Metatesauro UMLS filtrada a la fuente MSH.
    #[serde(rename = "UMLS")]
    Umls,
}

impl BackendKind {
    pub const ALL: [BackendKind; 5] = [
        Self::Semantic,
        Self::Fragment,
        Self::Atomic,
        Self::Atm,
        Self::Umls,
    ];

    pub fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "semantic" | "semantic-bert" => Ok(Self::Semantic),
            "fragment" | "fragment-bert" => Ok(Self::Fragment),
            "atomic" | "atomic-bert" => Ok(Self::Atomic),
            "atm" => Ok(Self::Atm),
            "umls" => Ok(Self::Umls),
            other => Err(anyhow!("Tipo de backend no soportado: {other}")),
        }
    }

    /// Etiqueta usada en el formato de intercambio (`type`).
    pub fn tag(self) -> &'static str {
        match self {
            Self::Semantic => "Semantic",
            Self::Fragment => "Fragment",
            Self::Atomic => "Atomic",
            Self::Atm => "ATM",
            Self::Umls => "UMLS",
        }
    }

    /// Los backends basados en embeddings necesitan los recursos del modelo.
    pub fn requires_model(self) -> bool {
        matches!(self, Self::Semantic | Self::Fragment | Self::Atomic)
    }

    /// Llamadas simultáneas (una por grupo) que admite el backend.
    /// NCBI limita `esearch` a unas 3 peticiones por segundo sin clave.
    pub fn max_concurrent_calls(self) -> usize {
        match self {
            Self::Atm => 1,
            Self::Umls => 2,
            Self::Semantic | Self::Fragment | Self::Atomic => 4,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Registro devuelto por un backend para una o varias palabras clave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionRecord {
    #[serde(rename = "Keywords")]
    pub keywords: Vec<String>,
    #[serde(rename = "type")]
    pub kind: BackendKind,
    /// Índice arbitrario → término MeSH. Se recorre en orden de índice.
    #[serde(rename = "MeSH_Terms")]
    pub mesh_terms: BTreeMap<usize, String>,
}

impl SuggestionRecord {
    pub fn new(keywords: Vec<String>, kind: BackendKind) -> Self {
        Self {
            keywords,
            kind,
            mesh_terms: BTreeMap::new(),
        }
    }

    /// Añade un término con el siguiente índice libre.
    pub fn push_term(&mut self, term: impl Into<String>) {
        let next = self.mesh_terms.len();
        self.mesh_terms.insert(next, term.into());
    }
}

/// Resultado agregado de un grupo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionResult {
    pub group_index: usize,
    pub keywords: Vec<String>,
    pub terms: Vec<String>,
}

/// Clave tipada de un término sugerido dentro de su grupo.
/// Sólo se serializa como `"<grupo>::<término>"` en la frontera de la API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SelectionKey {
    pub group_index: usize,
    pub term: String,
}

impl SelectionKey {
    pub const SEPARATOR: &'static str = "::";

    pub fn new(group_index: usize, term: impl Into<String>) -> Self {
        Self {
            group_index,
            term: term.into(),
        }
    }

    pub fn encode(&self) -> String {
        format!("{}{}{}", self.group_index, Self::SEPARATOR, self.term)
    }

    /// Divide por el primer `::`; el término puede contener más separadores.
    pub fn decode(encoded: &str) -> Option<Self> {
        let (group, term) = encoded.split_once(Self::SEPARATOR)?;
        let group_index = group.parse().ok()?;
        Some(Self::new(group_index, term))
    }

    /// Etiqueta legible que el usuario selecciona.
    pub fn label(&self) -> String {
        format!("[G{}]  {}", self.group_index + 1, self.term)
    }
}

impl From<SelectionKey> for String {
    fn from(key: SelectionKey) -> Self {
        key.encode()
    }
}

impl TryFrom<String> for SelectionKey {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        SelectionKey::decode(&value).ok_or_else(|| format!("Clave de selección inválida: {value}"))
    }
}

/// Término seleccionable: etiqueta visible + clave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectableTerm {
    pub label: String,
    pub key: SelectionKey,
}

impl From<SelectionKey> for SelectableTerm {
    fn from(key: SelectionKey) -> Self {
        Self {
            label: key.label(),
            key,
        }
    }
}

/// Salida completa de un ciclo de sugerencia.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suggestions {
    pub results: Vec<SuggestionResult>,
    pub choices: Vec<SelectableTerm>,
}

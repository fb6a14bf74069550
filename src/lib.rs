//! Sugerencia de términos MeSH para consultas booleanas de revisiones sistemáticas.
//!
//! Flujo:
//!   consulta → `query_parser` (grupos) → `aggregator` (un backend por grupo)
//!   → términos seleccionables → `query_builder` → consulta MeSH actualizada.
//!
//! El servidor HTTP (`api`) expone el endpoint original
//! `/api/v1/resources/mesh` y el flujo interactivo por sesiones.

pub mod aggregator;
pub mod api;
pub mod app_state;
pub mod atm;
pub mod backend;
pub mod config;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod models;
pub mod neo4j_client;
pub mod query_builder;
pub mod query_parser;
pub mod session;
pub mod umls;
pub mod vector_store;

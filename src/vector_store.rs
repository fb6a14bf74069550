//! Integración con Neo4j como vector store para los `:MeshTerm`.
//!
//! Cada término del vocabulario es un nodo `(:MeshTerm {name, embedding})`;
//! el índice vectorial hace de retriever y el propio nodo de tabla de
//! búsqueda índice → término.
//!
//! API pública:
//!   - `ensure_mesh_vector_index(&Graph, usize)`
//!   - `search_top_terms(&Graph, Vec<f64>, usize)`.

use anyhow::{anyhow, Result};
use neo4rs::{query, Graph};
use tracing::info;

pub const MESH_INDEX_NAME: &str = "meshTermEmbeddingIndex";

/// Garantiza que el índice vectorial sobre `:MeshTerm(embedding)` exista.
pub async fn ensure_mesh_vector_index(graph: &Graph, dimensions: usize) -> Result<()> {
    // ¿Ya existe el índice? Usamos la sintaxis moderna SHOW VECTOR INDEXES.
    let mut cursor = graph
        .execute(
            query("SHOW VECTOR INDEXES YIELD name WHERE name = $name RETURN name")
                .param("name", MESH_INDEX_NAME),
        )
        .await?;

    if cursor.next().await?.is_some() {
        info!("Índice vectorial '{MESH_INDEX_NAME}' ya existe.");
        return Ok(());
    }

    graph.run(query(&create_index_cypher(dimensions))).await?;
    info!("Índice vectorial '{MESH_INDEX_NAME}' creado ({dimensions} dimensiones).");

    Ok(())
}

fn create_index_cypher(dimensions: usize) -> String {
    format!(
        "\
CREATE VECTOR INDEX {MESH_INDEX_NAME}
FOR (m:MeshTerm)
ON (m.embedding)
OPTIONS {{
  indexConfig: {{
    `vector.dimensions`: {dimensions},
    `vector.similarity_function`: 'cosine'
  }}
}}"
    )
}

/// Búsqueda vectorial de los `top_k` términos MeSH más cercanos.
/// Devuelve `(score, término)` ordenado por score descendente.
pub async fn search_top_terms(
    graph: &Graph,
    embedding: Vec<f64>,
    top_k: usize,
) -> Result<Vec<(f64, String)>> {
    let mut cursor = graph
        .execute(
            query(
                "CALL db.index.vector.queryNodes($index_name, $k, $embedding)
                 YIELD node, score
                 RETURN node.name AS name, score
                 ORDER BY score DESC",
            )
            .param("index_name", MESH_INDEX_NAME)
            .param("k", top_k as i64)
            .param("embedding", embedding),
        )
        .await?;

    let mut output = Vec::new();
    while let Some(row) = cursor.next().await? {
        let name: String = row
            .get("name")
            .ok_or_else(|| anyhow!("Falta campo 'name' en resultado de Neo4j"))?;
        let score: f64 = row
            .get("score")
            .ok_or_else(|| anyhow!("Falta campo 'score' en resultado de Neo4j"))?;
        output.push((score, name));
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_index_cypher_uses_dimensions() {
        let cypher = create_index_cypher(768);
        assert!(cypher.contains("CREATE VECTOR INDEX meshTermEmbeddingIndex"));
        assert!(cypher.contains("`vector.dimensions`: 768"));
        assert!(cypher.contains("FOR (m:MeshTerm)"));
    }
}

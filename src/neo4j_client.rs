use anyhow::Result;
use neo4rs::{query, Graph};
use tracing::info;
use url::Url;

use crate::config::Neo4jConfig;

pub async fn connect_from_config(cfg: &Neo4jConfig) -> Result<Graph> {
    let addr = bolt_address(&cfg.uri)?;

    info!("Conectando a Neo4j en {addr}...");
    let graph = Graph::new(&addr, &cfg.user, &cfg.password).await?;
    info!("Conexión a Neo4j OK");
    Ok(graph)
}

/// `neo4j://host:port` → `host:port` (puerto 7687 por defecto).
fn bolt_address(uri: &str) -> Result<String> {
    let url = Url::parse(uri)?;
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port().unwrap_or(7687);
    Ok(format!("{host}:{port}"))
}

/// Crea el constraint de unicidad de los términos del vocabulario.
pub async fn ensure_schema(graph: &Graph) -> Result<()> {
    let statements = [
        // MeshTerm.name único
        "CREATE CONSTRAINT mesh_term_name IF NOT EXISTS
         FOR (m:MeshTerm)
         REQUIRE m.name IS UNIQUE",
    ];

    for stmt in statements {
        graph.run(query(stmt)).await?;
    }

    info!("Esquema de Neo4j asegurado (constraint de :MeshTerm).");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bolt_address() {
        assert_eq!(bolt_address("neo4j://db.local:7688").unwrap(), "db.local:7688");
        assert_eq!(bolt_address("bolt://localhost").unwrap(), "localhost:7687");
        assert!(bolt_address("not a uri").is_err());
    }
}

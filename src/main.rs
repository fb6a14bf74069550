use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mesh_suggester::{
    api,
    app_state::AppState,
    atm::AtmClient,
    backend::Backends,
    config::AppConfig,
    embedding::ModelState,
    umls::UmlsClient,
};

#[derive(Parser)]
#[command(name = "mesh-suggester", about = "Sugerencia de términos MeSH para consultas booleanas")]
struct Cli {
    /// Dirección en la que escucha el servidor.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, env = "MESH_SUGGESTER_PORT", default_value_t = 7860)]
    port: u16,

    /// Escucha en todas las interfaces (0.0.0.0), ignorando --host.
    #[arg(long)]
    share: bool,
}

impl Cli {
    fn bind_addr(&self) -> Result<SocketAddr> {
        let host = if self.share { "0.0.0.0" } else { self.host.as_str() };
        format!("{host}:{}", self.port)
            .parse()
            .with_context(|| format!("Dirección inválida: {host}:{}", self.port))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // 2. Cargar configuración
    let cfg = AppConfig::from_env().context("Error al cargar la configuración")?;

    // 3. Cargar los modelos una sola vez; si falla, sólo ATM queda disponible
    let model_state = ModelState::load(&cfg).await;
    let backends = Backends::new(Arc::new(model_state), AtmClient::from_config(&cfg))
        .with_umls(UmlsClient::from_config(&cfg));

    // 4. Crear estado compartido de la aplicación
    let app_state = AppState::new(cfg, backends);
    let app = api::create_router(app_state);

    // 5. Iniciar el servidor
    let server_addr = cli.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .with_context(|| format!("No se pudo escuchar en {server_addr}"))?;
    info!("🚀 Servidor escuchando en http://{server_addr}");
    if cli.share {
        info!("Modo compartido: accesible desde todas las interfaces de red.");
    }

    // Apagado ordenado con Ctrl-C.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("No se pudo escuchar Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await
        .context("Error en el servidor HTTP")?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}

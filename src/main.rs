use clap::Parser;
use oci_openai_proxy::{build_router, AppState, ProxyConfig, ProxyError, SharedLogger};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "oci-openai-proxy",
    about = "OpenAI-compatible front for OCI Generative AI",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// OCI region, e.g. us-chicago-1 (overrides config)
    #[arg(long, env = "OCI_REGION")]
    region: Option<String>,

    /// Compartment OCID sent with every backend call (overrides config)
    #[arg(long, env = "OCI_COMPARTMENT_ID")]
    compartment_id: Option<String>,

    /// Send rewritten requests to this origin instead of the public endpoint
    #[arg(long)]
    upstream_url: Option<String>,

    /// Log file path
    #[arg(long, default_value = "oci-openai-proxy.log")]
    log_file: PathBuf,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oci_openai_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        println!("  1. oci-openai-proxy.toml (current directory)");
        if cfg!(target_os = "macos") {
            println!("  2. ~/Library/Application Support/oci-openai-proxy/config.toml");
        } else {
            println!("  2. $XDG_CONFIG_HOME/oci-openai-proxy/config.toml");
            println!("     ~/.config/oci-openai-proxy/config.toml");
        }
        println!("  3. ~/.oci-openai-proxy.toml");
        return Ok(());
    }

    let mut config = match ProxyConfig::find_and_load(cli.config.as_deref()) {
        Ok(config) => config,
        // Everything required can come from the command line.
        Err(ProxyError::Config { .. })
            if cli.config.is_none() && cli.region.is_some() && cli.compartment_id.is_some() =>
        {
            ProxyConfig::default()
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(region) = cli.region {
        config.oci.region = region;
    }
    if let Some(compartment_id) = cli.compartment_id {
        config.oci.compartment_id = compartment_id;
    }
    if let Some(upstream_url) = cli.upstream_url {
        config.oci.upstream_url = Some(upstream_url);
    }

    config.validate()?;
    let logger = SharedLogger::new(&cli.log_file)?;
    let backend_host = config.backend_host()?;

    info!("╔═══════════════════════════════════════════════════════╗");
    info!("║           oci-openai-proxy v{}                  ║", env!("CARGO_PKG_VERSION"));
    info!("╚═══════════════════════════════════════════════════════╝");
    info!("  Region:    {}", config.oci.region);
    info!("  Backend:   https://{}", backend_host);
    if let Some(ref upstream) = config.oci.upstream_url {
        info!("  Upstream:  {}", upstream);
    }
    info!("  Format:    {:?}", config.translation.api_format);
    info!("  Port:      {}", config.port);
    info!("  Log file:  {}", cli.log_file.display());

    logger.info(
        "startup",
        format!(
            "Starting oci-openai-proxy region={} backend={} port={}",
            config.oci.region, backend_host, config.port
        ),
    );

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let port = config.port;
    let state = Arc::new(AppState::new(config, client, logger)?);

    let app = build_router(state);
    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);
    info!("");
    info!("  Point an OpenAI client at it:");
    info!("    OPENAI_BASE_URL=http://localhost:{}/v1", port);
    info!("");

    axum::serve(listener, app).await?;

    Ok(())
}

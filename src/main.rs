use mcp_xlsx_report::common::config::AppConfig;
use mcp_xlsx_report::mcp::server::McpServer;
use tracing::info;

fn main() {
    // Logging goes to stderr so stdout stays reserved for JSON-RPC responses.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::install(AppConfig::from_env());
    info!(template_dirs = ?config.template_dirs, "starting xlsx report server");

    if let Err(err) = McpServer::run_stdio() {
        eprintln!("server error: {err}");
        std::process::exit(1);
    }
}

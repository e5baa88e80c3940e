use clap::Parser;
use std::sync::Arc;
use testrail_mcp::app::App;
use testrail_mcp::config::{Cli, Transport};
use testrail_mcp::mcp::{http, server::McpServer};

#[tokio::main]
async fn main() {
    let settings = match Cli::parse().into_settings() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("testrail-mcp: {}", err);
            std::process::exit(2);
        }
    };
    let app = match App::initialize(&settings) {
        Ok(app) => Arc::new(app),
        Err(err) => {
            eprintln!("testrail-mcp: {}", err);
            std::process::exit(1);
        }
    };
    let server = McpServer::new(app);
    let outcome = match settings.transport {
        Transport::Stdio => server.run_stdio().await,
        Transport::Http => http::serve(server, settings.bind).await,
    };
    if let Err(err) = outcome {
        eprintln!("testrail-mcp: {}", err);
        std::process::exit(1);
    }
}

use actix_web::{web, App, HttpServer};
use clap::Parser;
use std::sync::Arc;

mod api;
mod cli;
mod config;
mod errors;
mod metrics;
mod models;
mod services;
mod state;

use cli::CommandArgs;
use config::EngineConfig;
use services::{EngineRuntime, FileMessageSource, MessageSource, RuntimeIntervals};
use state::new_state;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = CommandArgs::parse();
    let bind_address = format!("{}:{}", args.address, args.port);

    let config = match args.engine_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("❌ Invalid configuration: {}", e);
            let mut current_error: Option<&dyn std::error::Error> = std::error::Error::source(&e);
            while let Some(err) = current_error {
                log::error!("     - {}", err);
                current_error = err.source();
            }
            return Err(e.into());
        }
    };

    let state = new_state(config)?;
    let intervals = RuntimeIntervals::from(state.engine.config());
    print_banner(&args, state.engine.config());

    let source: Option<Arc<dyn MessageSource>> = args
        .messages_file
        .as_ref()
        .map(|path| Arc::new(FileMessageSource::new(path)) as Arc<dyn MessageSource>);
    if source.is_none() {
        log::info!("No messages file configured, accepting webhook pushes only");
    }

    let runtime = EngineRuntime::start(state.engine.clone(), intervals, source);

    let app_state = state.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .configure(api::configure)
    })
        .bind(&bind_address)?
        .run();

    let result = server.await;

    log::info!("🛑 Shutting down background tasks...");
    runtime.shutdown().await;
    state.engine.shutdown();

    result.map_err(Into::into)
}

fn print_banner(args: &CommandArgs, config: &EngineConfig) {
    println!("╔═══════════════════════════════════════════════════════════╗");
    println!("║      Job Monitor v0.1.1                                   ║");
    println!("║      Batch job tracking from chat status messages         ║");
    println!("╚═══════════════════════════════════════════════════════════╝");
    println!();
    println!("🚀 Server starting on http://{}:{}", args.address, args.port);
    println!();
    println!("📋 Available endpoints:");
    println!("  POST   /api/messages              - Ingest chat messages (webhook)");
    println!("  GET    /api/channels              - List channel states");
    println!("  GET    /api/channels/{{id}}         - Channel state");
    println!("  GET    /api/channels/{{id}}/events  - Channel event history");
    println!("  DELETE /api/channels/{{id}}         - Remove a channel");
    println!("  GET    /api/processes             - Running processes");
    println!("  POST   /api/sweep                 - Run delay sweep now");
    println!("  GET    /api/updates?since=N       - Buffered updates");
    println!("  GET    /api/updates/stream        - Server-sent updates");
    println!("  GET    /metrics                   - Prometheus metrics");
    println!("  GET    /health                    - Health check");
    println!();
    println!("⚙️  Settings:");
    println!("  • Profile: {:?}", args.profile);
    println!("  • Delay threshold: {} min", config.delay_threshold_minutes);
    println!("  • Check interval: {} s", config.check_interval_seconds);
    println!("  • Fetch interval: {} s", config.fetch_interval_seconds);
    println!("  • Channel timeout: {} min", config.channel_timeout_minutes);
    println!("═══════════════════════════════════════════════════════════");
}

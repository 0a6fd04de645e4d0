//! fleetmon — device fleet monitor CLI
//!
//! Discovery, classification and fleet status inspection backed by the
//! shared SQLite store. Long-running polling and discovery loops are
//! embedded through the library API; this binary covers the one-shot
//! operator commands.

#[tokio::main]
async fn main() {
    if let Err(e) = fleetmon::logging::init_logging() {
        eprintln!("[WARN] Failed to initialize structured logging: {}", e);
    }

    if let Err(e) = fleetmon::app::run(std::env::args()).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

use dotenvy::dotenv;
use log::info;
use market_engine::events::EventHooks;
use market_server::{cli::handle_command_line_args, config::ServerConfig, server::run_server};

#[actix_web::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    if handle_command_line_args() {
        return;
    }
    let config = ServerConfig::from_env_or_default();

    // Downstream collaborators (trust scoring, notifications) subscribe here. Until they are wired
    // up, a log line stands in for them.
    let mut hooks = EventHooks::default();
    hooks.on_listing_sold(|ev| {
        Box::pin(async move {
            info!("📬️ Listing #{} sold to {:?}", ev.listing.id, ev.listing.reserved_by);
        })
    });
    hooks.on_reservation_cancelled(|ev| {
        Box::pin(async move {
            info!("📬️ Reservation on listing #{} cancelled. At fault: {}", ev.record.listing_id, ev.record.fault);
        })
    });

    info!("🚀️ Starting server on {}:{}", config.host, config.port);
    match run_server(config, hooks).await {
        Ok(_) => println!("Bye!"),
        Err(e) => eprintln!("{e}"),
    }
}

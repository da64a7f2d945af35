use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use market_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    HandoverFlowApi,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    reconciliation_worker::start_reconciliation_worker,
    routes::{
        health,
        CancelRoute,
        ConfirmMeetRoute,
        CreateListingRoute,
        DisputeRoute,
        GetLocationsRoute,
        GetProductRoute,
        ProposeLocationsRoute,
        RejectRescheduleRoute,
        ReserveRoute,
        RescheduleRoute,
        SelectLocationRoute,
        VerifyOtpRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 25;

pub async fn run_server(config: ServerConfig, hooks: EventHooks) -> Result<(), ServerError> {
    let db = SqliteDatabase::initialize(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    start_reconciliation_worker(
        db.clone(),
        producers.clone(),
        config.abandonment_window,
        config.sweep_interval_secs,
    );
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    info!("💻️ Server will listen on {host}:{port}");
    let srv = HttpServer::new(move || {
        let api = HandoverFlowApi::new(db.clone(), producers.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("cm::access_log"))
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(config.clone()))
            .service(health)
            .service(CreateListingRoute::<SqliteDatabase>::new())
            .service(GetProductRoute::<SqliteDatabase>::new())
            .service(ReserveRoute::<SqliteDatabase>::new())
            .service(ProposeLocationsRoute::<SqliteDatabase>::new())
            .service(GetLocationsRoute::<SqliteDatabase>::new())
            .service(SelectLocationRoute::<SqliteDatabase>::new())
            .service(ConfirmMeetRoute::<SqliteDatabase>::new())
            .service(VerifyOtpRoute::<SqliteDatabase>::new())
            .service(RescheduleRoute::<SqliteDatabase>::new())
            .service(RejectRescheduleRoute::<SqliteDatabase>::new())
            .service(CancelRoute::<SqliteDatabase>::new())
            .service(DisputeRoute::<SqliteDatabase>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

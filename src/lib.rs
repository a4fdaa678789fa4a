pub mod application;
pub mod auth;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod schema;
pub mod services;

#[cfg(test)]
pub mod test_support;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use db::{create_pool, DbPool};
pub use services::advisor::AdvisorClient;
pub use services::gateway::PaymentGateway;
pub use services::geocoding::GeocodingClient;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) {
    let mut conn = pool.get().expect("Failed to get DB connection for migrations");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run database migrations");
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::users::register,
        handlers::users::approve_user,
        handlers::listings::browse_listings,
        handlers::listings::create_listing,
        handlers::listings::approve_listing,
        handlers::listings::restock_listing,
        handlers::orders::create_order,
        handlers::orders::get_order,
        handlers::orders::list_orders,
        handlers::orders::update_status,
        handlers::orders::assign_agent,
        handlers::payments::webhook,
        handlers::payments::verify_checkout,
        handlers::payments::cash_collected,
        handlers::coupons::validate_coupon,
        handlers::refunds::request_refund,
        handlers::refunds::approve_refund,
        handlers::refunds::reject_refund,
        handlers::payouts::request_payout,
        handlers::payouts::list_payouts,
        handlers::payouts::approve_payout,
        handlers::payouts::reject_payout,
        handlers::earnings::list_earnings,
        handlers::advisor::chat,
        handlers::advisor::price_suggestion,
    ),
    tags(
        (name = "orders", description = "Order lifecycle"),
        (name = "payments", description = "Gateway confirmations and COD"),
        (name = "payouts", description = "Earnings settlement"),
        (name = "listings", description = "Produce catalog"),
        (name = "refunds", description = "Refund review"),
    )
)]
pub struct ApiDoc;

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    pool: DbPool,
    geocoder: GeocodingClient,
    gateway: PaymentGateway,
    advisor: AdvisorClient,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(geocoder.clone()))
            .app_data(web::Data::new(gateway.clone()))
            .app_data(web::Data::new(advisor.clone()))
            .wrap(Logger::default())
            .route("/health", web::get().to(handlers::health::health))
            .service(
                web::scope("/users")
                    .route("", web::post().to(handlers::users::register))
                    .route(
                        "/{id}/approve",
                        web::post().to(handlers::users::approve_user),
                    ),
            )
            .service(
                web::scope("/listings")
                    .route("", web::get().to(handlers::listings::browse_listings))
                    .route("", web::post().to(handlers::listings::create_listing))
                    .route(
                        "/{id}/approve",
                        web::post().to(handlers::listings::approve_listing),
                    )
                    .route(
                        "/{id}/restock",
                        web::post().to(handlers::listings::restock_listing),
                    ),
            )
            .service(
                web::scope("/orders")
                    .route("", web::post().to(handlers::orders::create_order))
                    .route("", web::get().to(handlers::orders::list_orders))
                    .route("/{id}", web::get().to(handlers::orders::get_order))
                    .route(
                        "/{id}/status",
                        web::patch().to(handlers::orders::update_status),
                    )
                    .route(
                        "/{id}/assign-agent",
                        web::post().to(handlers::orders::assign_agent),
                    )
                    .route(
                        "/{id}/cash-collected",
                        web::post().to(handlers::payments::cash_collected),
                    )
                    .route(
                        "/{id}/refunds",
                        web::post().to(handlers::refunds::request_refund),
                    ),
            )
            .service(
                web::scope("/payments")
                    .route("/webhook", web::post().to(handlers::payments::webhook))
                    .route(
                        "/verify",
                        web::post().to(handlers::payments::verify_checkout),
                    ),
            )
            .service(
                web::scope("/payouts")
                    .route("", web::post().to(handlers::payouts::request_payout))
                    .route("", web::get().to(handlers::payouts::list_payouts))
                    .route(
                        "/{id}/approve",
                        web::post().to(handlers::payouts::approve_payout),
                    )
                    .route(
                        "/{id}/reject",
                        web::post().to(handlers::payouts::reject_payout),
                    ),
            )
            .service(
                web::scope("/refunds")
                    .route(
                        "/{id}/approve",
                        web::post().to(handlers::refunds::approve_refund),
                    )
                    .route(
                        "/{id}/reject",
                        web::post().to(handlers::refunds::reject_refund),
                    ),
            )
            .route("/earnings", web::get().to(handlers::earnings::list_earnings))
            .route(
                "/coupons/validate",
                web::post().to(handlers::coupons::validate_coupon),
            )
            .service(
                web::scope("/advisor")
                    .route("/chat", web::post().to(handlers::advisor::chat))
                    .route(
                        "/price-suggestion",
                        web::post().to(handlers::advisor::price_suggestion),
                    ),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}

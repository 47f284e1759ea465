pub mod companies;
pub mod health;

pub use companies::{get_data, CompanyHandlerState, GetDataQuery};
pub use health::{health_check, metrics_handler};

use actix_web::web;

/// Configure all routes for the application
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/metrics", web::get().to(metrics_handler))
        .service(get_data);
}

use actix_web::{HttpResponse, Responder};
use prometheus::{Encoder, TextEncoder};

pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("OK")
}

/// Prometheus text exposition of the default registry
pub async fn metrics_handler() -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => HttpResponse::Ok()
            .content_type(encoder.format_type())
            .body(buffer),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

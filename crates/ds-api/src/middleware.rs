//! ds-api/src/middleware.rs Middleware
//!
//! Access logging and CORS for the forum API.

use actix_cors::Cors;
use actix_web::middleware::Logger;

/// One access-log line per request, emitted through `log` at info level.
pub fn standard_middleware() -> Logger {
    Logger::default()
}

/// Browsers may call the API from any origin; preflight answers are cached for an hour.
pub fn cors_policy() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600)
}

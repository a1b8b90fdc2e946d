//! # ds-api
//!
//! The HTTP surface of the forum: JSON endpoints over the core services.

pub mod error;
pub mod handlers;
pub mod middleware;

use actix_web::http::Method;
use actix_web::{web, Resource};

pub use error::ApiError;
pub use handlers::AppState;

/// Configures the forum endpoints.
///
/// # Developer Note
/// Every endpoint is registered twice, at the root and under `/api`, because
/// existing clients use both. Endpoints are plain resources rather than a
/// catch-all scope so unmatched paths fall through to the static file service.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api").configure(register_endpoints));
    register_endpoints(cfg);
}

fn register_endpoints(cfg: &mut web::ServiceConfig) {
    cfg
        // Voting
        .service(endpoint("/upvotePost").route(web::post().to(handlers::upvote_post)))
        .service(endpoint("/downvotePost").route(web::post().to(handlers::downvote_post)))
        .service(endpoint("/upvoteComment").route(web::post().to(handlers::upvote_comment)))
        .service(endpoint("/downvoteComment").route(web::post().to(handlers::downvote_comment)))
        // Creation
        .service(endpoint("/board").route(web::post().to(handlers::create_board)))
        .service(endpoint("/post").route(web::post().to(handlers::create_post)))
        .service(endpoint("/comment").route(web::post().to(handlers::create_comment)))
        // Ranked listings
        .service(endpoint("/boards").route(web::post().to(handlers::list_boards)))
        .service(endpoint("/posts").route(web::post().to(handlers::list_posts)))
        .service(endpoint("/comments").route(web::post().to(handlers::list_comments)))
        // Accounts
        .service(endpoint("/login").route(web::post().to(handlers::login)))
        .service(endpoint("/signup").route(web::post().to(handlers::signup)))
        .service(endpoint("/logout").route(web::post().to(handlers::logout)))
        .service(endpoint("/readSession").route(web::post().to(handlers::read_session)));
}

/// A resource that answers bare `OPTIONS` requests with permissive CORS headers.
fn endpoint(path: &str) -> Resource {
    web::resource(path).route(web::method(Method::OPTIONS).to(handlers::preflight))
}

pub mod config;
pub mod core;
pub mod follow;
pub mod models;
pub mod posts;
pub mod sitemap;
pub mod users;

use actix_web::http::Method;
use actix_web::{web, HttpResponse};

use crate::core::errors::ApiError;

pub use crate::config::Config;
pub use crate::core::db::{connect, AppState};

/// Declares the route table once: `ROUTES` feeds the sitemap, `mount_routes` registers the handlers.
macro_rules! routes {
    ($($method:ident $path:literal => $handler:path),* $(,)?) => {
        /// Every mounted route, as (method, path).
        pub const ROUTES: &[(&str, &str)] = &[$((stringify!($method), $path)),*];

        fn mount_routes(cfg: &mut web::ServiceConfig) {
            $(cfg.route($path, web::method(Method::$method).to($handler));)*
        }
    };
}

routes! {
    GET "/" => sitemap::serve_sitemap,
    GET "/user" => users::hello,
    POST "/register" => users::handle_register,
    POST "/follow" => follow::handle_follow,
    GET "/users" => users::get_users_list,
    GET "/user/{id}" => users::get_user_details,
    DELETE "/user/{id}" => users::handle_delete_user,
    GET "/user/{id}/following" => follow::get_followings_list,
    GET "/user/{id}/followers" => follow::get_followers_list,
    GET "/user/{id}/posts" => posts::get_user_posts,
    POST "/posts" => posts::handle_create_post,
    GET "/posts/{id}" => posts::get_post_details,
    POST "/posts/{id}/media" => posts::handle_attach_media,
    POST "/posts/{id}/comments" => posts::handle_add_comment,
    GET "/posts/{id}/comments" => posts::get_post_comments,
}

/// Mounts every route in [`ROUTES`], JSON body errors as `ApiError`, and a JSON 404 fallback.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    );
    mount_routes(cfg);
    cfg.default_service(web::route().to(not_found));
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({"error": "No route found"}))
}

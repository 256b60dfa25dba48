use actix_web::HttpResponse;

use crate::ROUTES;

/// Parameterless GET routes get a link; the rest are listed as text.
pub fn render_sitemap() -> String {
    let items: String = ROUTES
        .iter()
        .filter(|(_, path)| *path != "/")
        .map(|(method, path)| {
            if *method == "GET" && !path.contains('{') {
                format!("<li><a href=\"{path}\">{method} {path}</a></li>")
            } else {
                format!("<li>{method} {path}</li>")
            }
        })
        .collect();

    format!(
        "<div style=\"text-align: center;\">\
         <h1>Social graph API</h1>\
         <p>Start working on your project by following the links below.</p>\
         <ul style=\"text-align: left;\">{items}</ul>\
         </div>"
    )
}

pub async fn serve_sitemap() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(render_sitemap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_only_concrete_get_routes() {
        let html = render_sitemap();
        assert!(html.contains("<a href=\"/user\">GET /user</a>"));
        assert!(html.contains("<a href=\"/users\">GET /users</a>"));
        assert!(html.contains("<li>POST /follow</li>"));
        assert!(html.contains("<li>GET /user/{id}/followers</li>"));
        assert!(!html.contains("href=\"/user/{id}"));
    }
}

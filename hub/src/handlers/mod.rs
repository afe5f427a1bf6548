use crate::connection::ws_index;
use actix_web::web;

/// Browsers open the channel at the site root, so the socket lives at `/`.
pub fn root(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(ws_index)));
}

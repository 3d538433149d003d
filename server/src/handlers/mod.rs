use crate::connection::ws_index;
use crate::handlers::state::configure_state_handlers;
use actix_web::web;

mod state;

pub fn root(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws").route(web::get().to(ws_index)));

    configure_state_handlers(cfg);
}

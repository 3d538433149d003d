use crate::server::Server;
use actix_web::{web, HttpResponse, Responder};
use presence_system::serde_json::json;

pub fn configure_state_handlers(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/state").route(web::get().to(get)));
}

async fn get(server: web::Data<Server>) -> Result<impl Responder, actix_web::error::Error> {
    let hub = server.hub();
    Ok(HttpResponse::Ok().json(json!({
        "roster": hub.roster(),
        "cells": hub.cell_state(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use presence_system::serde_json::Value;
    use presence_system::uuid::Uuid;
    use presence_system::HubConfig;
    use std::time::Duration;

    #[actix_web::test]
    async fn it_lists_roster_and_cells() {
        let server = Server::new(HubConfig::default().with_tick_interval(Duration::from_secs(3600)));
        let connection = server.hub().connect(Uuid::new_v4()).expect("");
        server
            .hub()
            .select_cell(&connection.connection_id, "r1c1".into())
            .expect("");

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(server.clone()))
                .configure(configure_state_handlers),
        )
        .await;
        let req = test::TestRequest::get().uri("/state").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["roster"][0]["userName"], "User1");
        assert_eq!(body["cells"][0]["cellId"], "r1c1");
        assert_eq!(
            body["cells"][0]["userId"],
            connection.connection_id.to_string()
        );
    }
}

use actix::{Actor, ActorContext, AsyncContext, Handler, Message, Running, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use actix_web_actors::ws::{CloseCode, CloseReason};
use tokio::sync::mpsc::unbounded_channel;

use presence_system::uuid::Uuid;
use presence_system::{serde_json, ClientCommand, ConnectionId, SystemEvent};

use crate::server::{Server, SessionTx};

#[derive(Debug)]
pub enum ConnectionCommand {
    Connect,
    Client(ClientCommand),
    Disconnect { cause: Option<String> },
}

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(SystemEvent);

struct ConnectionActor {
    connection_id: ConnectionId,
    server: Server,
    session_tx: Option<SessionTx>,
}

impl ConnectionActor {
    fn send(&self, command: ConnectionCommand) {
        if let Some(session_tx) = &self.session_tx {
            if session_tx.send(command).is_err() {
                log::warn!("Session of {} is already gone", self.connection_id);
            }
        }
    }

    /// Hands the disconnect to the session once; later calls are no-ops.
    fn disconnect(&mut self, cause: Option<String>) {
        if let Some(session_tx) = self.session_tx.take() {
            if session_tx
                .send(ConnectionCommand::Disconnect { cause })
                .is_err()
            {
                log::warn!("Session of {} ended before disconnect", self.connection_id);
            }
        }
    }

    fn ingress(&mut self, payload: &[u8], ctx: &mut ws::WebsocketContext<Self>) {
        log::debug!("Ingress size: {}", payload.len());
        match serde_json::from_slice::<ClientCommand>(payload) {
            Ok(command) => {
                log::debug!("Ingress {:?}", command);
                self.send(ConnectionCommand::Client(command));
            }
            Err(error) => {
                log::warn!(
                    "Closing {} after undecodable frame: {}",
                    self.connection_id,
                    error
                );
                self.disconnect(Some("invalid frame".into()));
                ctx.close(Some(CloseReason {
                    code: CloseCode::Invalid,
                    description: Some(error.to_string()),
                }));
                ctx.stop();
            }
        }
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, mut rx) = unbounded_channel::<SystemEvent>();
        self.session_tx = Some(self.server.spawn_session(self.connection_id, tx));
        self.send(ConnectionCommand::Connect);

        let addr = ctx.address();
        let connection_id = self.connection_id;
        actix::spawn(async move {
            log::debug!("connection {} egress - started", connection_id);
            while let Some(event) = rx.recv().await {
                if !addr.connected() {
                    break;
                }
                addr.do_send(ConnectionActorMessage(event));
            }
            log::debug!("connection {} egress - terminated", connection_id);
        });
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        self.disconnect(None);
        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Text(text)) => self.ingress(text.as_bytes(), ctx),
            Ok(ws::Message::Binary(bin)) => self.ingress(&bin, ctx),
            Ok(ws::Message::Close(reason)) => {
                let cause = reason
                    .as_ref()
                    .and_then(|reason| reason.description.clone())
                    .unwrap_or_else(|| "closed by client".into());
                self.disconnect(Some(cause));
                ctx.close(reason);
                ctx.stop();
            }
            Err(error) => {
                log::warn!("Protocol error on {}: {}", self.connection_id, error);
                self.disconnect(Some(error.to_string()));
                ctx.stop();
            }
            _ => (),
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(
        &mut self,
        msg: ConnectionActorMessage,
        ctx: &mut ws::WebsocketContext<Self>,
    ) -> Self::Result {
        let event = &msg.0;
        log::debug!("Egress {:?}", event);
        match serde_json::to_string(event) {
            Ok(serialized) => ctx.text(serialized),
            Err(error) => log::warn!("Dropping unserializable {}: {}", event.name(), error),
        }
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    server: web::Data<Server>,
) -> Result<HttpResponse, Error> {
    ws::start(
        ConnectionActor {
            connection_id: Uuid::new_v4(),
            server: server.get_ref().clone(),
            session_tx: None,
        },
        &req,
        stream,
    )
}

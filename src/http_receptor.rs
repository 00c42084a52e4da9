// The HTTP interface. This module runs a tiny_http server on a
// blocking thread. The thread only reads requests and moves them onto
// a channel; the server answers them through [Incoming::respond].

use crate::message::Endpoint;
use anyhow::anyhow;
use serde::Serialize;
use std::io::Read;
use tiny_http::{Header, Response};
use tokio::sync::mpsc;
use tracing::trace;

/// A routed request waiting for its response.
pub struct Incoming {
    pub endpoint: Endpoint,
    pub body: String,
    request: tiny_http::Request,
}

impl std::fmt::Debug for Incoming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}", self.endpoint.as_str(), self.body)
    }
}

impl Incoming {
    /// Send `body` back as JSON with `status`. Blocks until written.
    pub fn respond<T: Serialize>(self, status: u16, body: &T) {
        let json = match serde_json::to_string(body) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!("Failed to serialize response: {}", err);
                let _ = self
                    .request
                    .respond(Response::from_string("").with_status_code(500));
                return;
            }
        };
        let mut response = Response::from_string(json).with_status_code(status);
        if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
            response = response.with_header(header);
        }
        if let Err(err) = self.request.respond(response) {
            tracing::warn!("Failed to send response: {}", err);
        }
    }
}

/// Bind the HTTP server to `addr`.
pub fn bind(addr: &str) -> anyhow::Result<tiny_http::Server> {
    let server = tiny_http::Server::http(addr)
        .map_err(|err| anyhow!("Failed to listen on {}: {}", addr, err))?;
    tracing::info!("Started listening for HTTP requests on {}", addr);
    Ok(server)
}

/// Run the receptor on `addr`. Blocks, returns when fatal error
/// occurs or the server side of `msg_tx` is dropped.
pub fn run(addr: &str, msg_tx: mpsc::Sender<Incoming>) -> anyhow::Result<()> {
    let server = bind(addr)?;
    main_loop(&server, msg_tx);
    Ok(())
}

/// Read requests from `server` and send them to `msg_tx`. Unknown
/// routes are answered here with 404.
pub fn main_loop(server: &tiny_http::Server, msg_tx: mpsc::Sender<Incoming>) {
    loop {
        let mut request = match server.recv() {
            Ok(request) => request,
            Err(err) => {
                tracing::error!("Failed to receive HTTP request: {}", err);
                break;
            }
        };
        trace!("Received request: {} {}", request.method(), request.url());

        let method = request.method().to_string();
        let Some(endpoint) = Endpoint::route(&method, request.url()) else {
            let _ = request.respond(Response::from_string("Not Found").with_status_code(404));
            continue;
        };

        let mut body = String::new();
        if let Err(err) = request.as_reader().read_to_string(&mut body) {
            tracing::warn!("Failed to read request body: {}", err);
            let _ = request.respond(Response::from_string("Bad Request").with_status_code(400));
            continue;
        }

        let res = msg_tx.blocking_send(Incoming {
            endpoint,
            body,
            request,
        });
        if res.is_err() {
            tracing::error!("Server stopped taking requests");
            break;
        }
    }
}

//! This module provides [Server], which keeps one document and one
//! [CorrectionCoordinator] per document name and answers the requests
//! the HTTP receptor hands it.

use crate::config_man::Config;
use crate::coordinator::{CorrectionCoordinator, CorrectionOutcome};
use crate::delta::compile_document;
use crate::doc::{LocalDoc, Presence, SharedText};
use crate::http_receptor::Incoming;
use crate::message::{DocParams, DocResp, Endpoint, SuccessResp, TextParams};
use crate::oracle::CorrectionOracle;
use crate::types::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Client id the server uses on the presence channel of its docs.
pub const SERVER_CLIENT_ID: ClientId = 0;

pub type DocCoordinator = CorrectionCoordinator<LocalDoc>;

pub struct Server {
    config: Config,
    oracle: Arc<dyn CorrectionOracle>,
    /// Docs hosted by this server, by name.
    docs: HashMap<DocName, Arc<DocCoordinator>>,
}

impl Server {
    /// Create a server hosting the (empty) default doc.
    pub fn new(config: Config, oracle: Arc<dyn CorrectionOracle>) -> Server {
        let mut server = Server {
            config,
            oracle,
            docs: HashMap::new(),
        };
        server.coordinator_or_create(None);
        server
    }

    fn doc_name(&self, name: Option<&str>) -> DocName {
        name.unwrap_or(&self.config.doc_name).to_string()
    }

    /// Return the coordinator of doc `name` (the default doc if None).
    pub fn coordinator(&self, name: Option<&str>) -> Option<Arc<DocCoordinator>> {
        self.docs.get(&self.doc_name(name)).map(Arc::clone)
    }

    /// Like [Server::coordinator], but create an empty doc if `name`
    /// doesn't exist yet.
    pub fn coordinator_or_create(&mut self, name: Option<&str>) -> Arc<DocCoordinator> {
        let name = self.doc_name(name);
        let entry = self.docs.entry(name).or_insert_with_key(|name| {
            tracing::info!("Created doc {}", name);
            let doc = Arc::new(Mutex::new(LocalDoc::new(SERVER_CLIENT_ID, "")));
            Arc::new(CorrectionCoordinator::new(
                doc,
                Arc::clone(&self.oracle),
                self.config.replay_config(),
            ))
        });
        Arc::clone(entry)
    }

    /// Serve requests from `msg_rx` until the channel closes. Each
    /// request is answered from its own task, so a slow oracle doesn't
    /// hold up other requests. Only edits create docs; requests to
    /// other docs that don't exist get a 404.
    pub async fn run(&mut self, mut msg_rx: mpsc::Receiver<Incoming>) -> anyhow::Result<()> {
        while let Some(incoming) = msg_rx.recv().await {
            tracing::debug!("From client: {:?}", incoming);
            let params = DocParams::from_body(&incoming.body);
            let coordinator = if incoming.endpoint == Endpoint::Edit {
                Some(self.coordinator_or_create(params.doc.as_deref()))
            } else {
                self.coordinator(params.doc.as_deref())
            };
            tokio::spawn(async move {
                let (status, reply) = match coordinator {
                    Some(coordinator) => {
                        handle_request(&coordinator, incoming.endpoint, &incoming.body).await
                    }
                    None => {
                        tracing::info!("Request to unknown doc {:?}", params.doc);
                        (404, serde_json::json!(SuccessResp { success: false }))
                    }
                };
                let res =
                    tokio::task::spawn_blocking(move || incoming.respond(status, &reply)).await;
                if let Err(err) = res {
                    tracing::error!("Response task failed: {}", err);
                }
            });
        }
        tracing::info!("Request channel closed, stopping server");
        Ok(())
    }
}

/// Answer a request to `coordinator`. Return the HTTP status and the
/// JSON body.
#[tracing::instrument(skip(coordinator, body), fields(endpoint = endpoint.as_str()))]
pub async fn handle_request(
    coordinator: &DocCoordinator,
    endpoint: Endpoint,
    body: &str,
) -> (u16, serde_json::Value) {
    let res = match endpoint {
        Endpoint::Fix => handle_fix(coordinator, body).await,
        Endpoint::Cancel => {
            coordinator.cancel();
            Ok(true)
        }
        Endpoint::Edit => handle_edit(coordinator, body),
        Endpoint::Doc => {
            return match doc_snapshot(coordinator) {
                Ok(resp) => (200, serde_json::json!(resp)),
                Err(err) => {
                    tracing::error!("Failed to read doc: {}", err);
                    (500, serde_json::json!(SuccessResp { success: false }))
                }
            };
        }
    };
    match res {
        Ok(success) => (200, serde_json::json!(SuccessResp { success })),
        Err(err) => {
            tracing::warn!("Request failed: {}", err);
            (status_of(&err), serde_json::json!(SuccessResp { success: false }))
        }
    }
}

fn status_of(err: &FixError) -> u16 {
    match err {
        FixError::AlreadyInProgress | FixError::TextMismatch => 409,
        FixError::ParseError(_) => 400,
        FixError::CorrectionRejected { .. } => 422,
        FixError::OracleFailure(_) => 502,
        FixError::OpOutOfBound(..) | FixError::Fatal(_) => 500,
    }
}

/// Correct `text` of the request, which has to be the doc's current
/// text.
async fn handle_fix(coordinator: &DocCoordinator, body: &str) -> FixResult<bool> {
    let params: TextParams = serde_json::from_str(body)?;
    let outcome = coordinator.request_correction(&params.text).await?;
    Ok(outcome == CorrectionOutcome::Started)
}

/// Replace the doc's text with a person's edit. Interrupts any
/// correction in flight.
fn handle_edit(coordinator: &DocCoordinator, body: &str) -> FixResult<bool> {
    let params: TextParams = serde_json::from_str(body)?;
    coordinator.on_local_edit();

    let mut doc = coordinator.doc().lock()?;
    for batch in edit_batches(&doc.text(), &params.text, doc.len()) {
        doc.apply_batch(&batch)?;
    }
    Ok(true)
}

/// Batches that turn `old` into `new`. Line-wise minimal edits when
/// the line count is unchanged (so others' cursors stay put),
/// otherwise one whole replacement.
fn edit_batches(old: &str, new: &str, old_len: u64) -> Vec<OperationBatch> {
    if let Ok(batches) = compile_document(old, new) {
        return batches;
    }
    let mut batch = vec![];
    if old_len > 0 {
        batch.push(Operation::Delete(old_len));
    }
    if !new.is_empty() {
        batch.push(Operation::Insert(new.to_string()));
    }
    vec![batch]
}

fn doc_snapshot(coordinator: &DocCoordinator) -> FixResult<DocResp> {
    let active = coordinator.is_active();
    let doc = coordinator.doc().lock()?;
    let selection = doc
        .local_state()
        .and_then(|state| doc.resolve_selection(state));
    Ok(DocResp {
        text: doc.text(),
        active,
        selection,
    })
}

use std::collections::HashMap;
use std::sync::Arc;

use notify_api::{
    CreatePort, DeletePort, Inbound, Outbound, OwnerExited, OwnerId, Request, Response, RpcError,
    StartWatching, StopWatching, WatchFlags,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite, BufReader, BufWriter};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ipc::{read_frame, write_frame};
use crate::owner::Owner;
use crate::ports::{PortReceiver, PortTable};
use crate::registry::Registry;
use crate::target::WatchTarget;

const UNKNOWN_METHOD: i32 = -32601;

/// Service state behind the stdio protocol.
pub struct Host {
    registry: Registry,
    ports: Arc<PortTable>,
    owners: Mutex<HashMap<OwnerId, Arc<Owner>>>,
    outbound: UnboundedSender<Outbound>,
}

impl Host {
    pub fn new(config: &Config, outbound: UnboundedSender<Outbound>) -> Self {
        let ports = Arc::new(PortTable::new(config.port_capacity));
        let registry = Registry::with_max_listeners(ports.clone(), config.max_listeners);
        Self {
            registry,
            ports,
            owners: Mutex::new(HashMap::new()),
            outbound,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Handle one inbound frame. Requests yield a response; events do not.
    pub fn handle(&self, frame: Inbound) -> Option<Outbound> {
        match frame {
            Inbound::Event(record) => {
                self.registry.notify(&record);
                None
            }
            Inbound::Request(request) => Some(Outbound::Response(self.call(request))),
        }
    }

    fn call(&self, request: Request) -> Response {
        let Request { id, method, params } = request;
        match self.dispatch(&method, params) {
            Some(Ok(result)) => Response::ok(id, result),
            Some(Err(err)) => {
                debug!(id, method, "request failed: {err}");
                Response::err(id, RpcError::from(&err))
            }
            None => Response::err(
                id,
                RpcError {
                    code: UNKNOWN_METHOD,
                    message: format!("unknown method {method}"),
                },
            ),
        }
    }

    fn dispatch(&self, method: &str, params: Value) -> Option<Result<Value>> {
        let result = match method {
            "create_port" => parse(params).map(|p| self.create_port(p)),
            "delete_port" => parse(params).and_then(|p| self.delete_port(p)),
            "start_watching" => parse(params).and_then(|p| self.start_watching(p)),
            "stop_watching" => parse(params).and_then(|p| self.stop_watching(p)),
            "owner_exited" => parse(params).map(|p| self.owner_exited(p)),
            "stats" => serde_json::to_value(self.registry.stats()).map_err(Error::from),
            _ => return None,
        };
        Some(result)
    }

    fn create_port(&self, params: CreatePort) -> Value {
        let (port, rx) = self.ports.create_port(params.capacity);
        tokio::spawn(forward(rx, self.outbound.clone()));
        json!({ "port": port })
    }

    fn delete_port(&self, params: DeletePort) -> Result<Value> {
        if !self.ports.delete_port(params.port) {
            return Err(Error::InvalidArgument(format!("unknown port {}", params.port)));
        }
        Ok(json!({}))
    }

    fn start_watching(&self, params: StartWatching) -> Result<Value> {
        let target = WatchTarget::from_raw(params.object)?;
        let flags = watch_flags(params.flags)?;
        // the map stays locked so a concurrent prune cannot orphan the owner
        let mut owners = self.owners.lock();
        let owner = owners
            .entry(params.owner)
            .or_insert_with(|| Owner::new(params.owner))
            .clone();
        let subscribed = self
            .registry
            .subscribe(target, flags, params.port, params.token, &owner);
        if subscribed.is_err() && owner.attached() == 0 {
            owners.remove(&params.owner);
        }
        let listener = subscribed?;
        Ok(json!({ "listener": listener }))
    }

    fn stop_watching(&self, params: StopWatching) -> Result<Value> {
        let target = WatchTarget::from_raw(params.object)?;
        let flags = watch_flags(params.flags)?;
        self.registry
            .unsubscribe(target, flags, params.port, params.token)?;
        self.prune_owners();
        Ok(json!({}))
    }

    fn owner_exited(&self, params: OwnerExited) -> Value {
        let owner = self.owners.lock().remove(&params.owner);
        let removed = owner.map(|o| o.destroy()).unwrap_or(0);
        debug!(owner = params.owner, removed, "owner exited");
        json!({ "removed": removed })
    }

    /// Forget owners left without listeners, whether unsubscribed or
    /// dropped because their port went away.
    fn prune_owners(&self) {
        let mut owners = self.owners.lock();
        let before = owners.len();
        owners.retain(|_, owner| owner.attached() > 0);
        if owners.len() != before {
            debug!(pruned = before - owners.len(), "idle owners forgotten");
        }
    }

    pub fn owner_count(&self) -> usize {
        self.owners.lock().len()
    }

    /// Destroy every owner and close every port.
    pub fn shutdown(&self) {
        let owners: Vec<_> = self.owners.lock().drain().map(|(_, o)| o).collect();
        for owner in owners {
            owner.destroy();
        }
        self.ports.close_all();
    }
}

fn parse<T: DeserializeOwned>(params: Value) -> Result<T> {
    let params = if params.is_null() { json!({}) } else { params };
    Ok(serde_json::from_value(params)?)
}

fn watch_flags(bits: u32) -> Result<WatchFlags> {
    WatchFlags::from_bits(bits)
        .ok_or_else(|| Error::InvalidArgument(format!("unknown watch flags {bits:#x}")))
}

async fn forward(mut rx: PortReceiver, outbound: UnboundedSender<Outbound>) {
    while let Some(delivery) = rx.recv().await {
        if outbound.send(Outbound::Notification(delivery)).is_err() {
            break;
        }
    }
}

/// Serve the protocol until `input` reaches EOF.
pub async fn serve<R, W>(input: R, output: W, config: &Config) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    let writer = tokio::spawn(async move {
        let mut output = BufWriter::new(output);
        while let Some(frame) = rx.recv().await {
            if let Err(err) = write_frame(&mut output, &frame).await {
                error!("error writing frame: {err}");
                break;
            }
        }
    });

    let host = Host::new(config, tx.clone());
    let mut reader = BufReader::new(input);
    let outcome = loop {
        match read_frame::<Inbound, _>(&mut reader).await {
            Ok(Some(frame)) => {
                if let Some(reply) = host.handle(frame) {
                    if tx.send(reply).is_err() {
                        warn!("output closed, dropping remaining input");
                        break Ok(());
                    }
                }
            }
            Ok(None) => break Ok(()),
            Err(Error::Json(err)) => warn!("skipping malformed frame: {err}"),
            Err(err) => break Err(err),
        }
    };

    info!(listeners = host.registry().listener_count(), "input closed, shutting down");
    host.shutdown();
    drop(host);
    drop(tx);
    if let Err(err) = writer.await {
        error!("writer task failed: {err}");
    }
    outcome
}

/// Serve the protocol on the process's stdin and stdout.
pub async fn run_stdio(config: &Config) -> Result<()> {
    serve(tokio::io::stdin(), tokio::io::stdout(), config).await
}

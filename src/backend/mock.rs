//! Scripted in-process instance client for unit tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Value};

use crate::backend::client::InstanceClient;
use crate::backend::types::{BackendError, InferRequest, InstanceAddress};

/// How a scripted instance answers, keyed by port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Answer immediately, echoing every item.
    Echo,
    /// Echo after a delay.
    Delay(Duration),
    /// Fail with a transport error.
    Fail,
    /// Never answer.
    Hang,
    /// Answer with one result too few.
    ShortResponse,
    /// Panic inside the call.
    Panic,
}

#[derive(Debug, Default)]
pub struct ScriptedClient {
    infer: Mutex<HashMap<u16, Behavior>>,
    probe: Mutex<HashMap<u16, Behavior>>,
    calls: Mutex<Vec<(u16, Vec<Value>)>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_infer(&self, port: u16, behavior: Behavior) {
        self.infer.lock().unwrap().insert(port, behavior);
    }

    pub fn set_probe(&self, port: u16, behavior: Behavior) {
        self.probe.lock().unwrap().insert(port, behavior);
    }

    /// Every inference call seen so far, as `(port, items)`.
    pub fn calls(&self) -> Vec<(u16, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    fn lookup(map: &Mutex<HashMap<u16, Behavior>>, port: u16) -> Behavior {
        map.lock().unwrap().get(&port).copied().unwrap_or(Behavior::Echo)
    }
}

/// The value an echoing instance returns for `item`.
pub fn echoed(port: u16, item: &Value) -> Value {
    json!({ "port": port, "item": item })
}

impl InstanceClient for ScriptedClient {
    fn probe(
        &self,
        address: &InstanceAddress,
    ) -> impl Future<Output = Result<(), BackendError>> + Send {
        let behavior = Self::lookup(&self.probe, address.port());
        async move {
            match behavior {
                Behavior::Echo | Behavior::ShortResponse => Ok(()),
                Behavior::Delay(d) => {
                    tokio::time::sleep(d).await;
                    Ok(())
                }
                Behavior::Fail | Behavior::Panic => {
                    Err(BackendError::Transport("connection refused".into()))
                }
                Behavior::Hang => std::future::pending().await,
            }
        }
    }

    fn infer(
        &self,
        address: &InstanceAddress,
        request: InferRequest,
    ) -> impl Future<Output = Result<Vec<Value>, BackendError>> + Send {
        let port = address.port();
        let behavior = Self::lookup(&self.infer, port);
        self.calls.lock().unwrap().push((port, request.items.clone()));

        async move {
            let echo = |items: &[Value]| items.iter().map(|i| echoed(port, i)).collect::<Vec<_>>();
            match behavior {
                Behavior::Echo => Ok(echo(&request.items)),
                Behavior::Delay(d) => {
                    tokio::time::sleep(d).await;
                    Ok(echo(&request.items))
                }
                Behavior::Fail => Err(BackendError::Transport("connection reset".into())),
                Behavior::Hang => std::future::pending().await,
                Behavior::ShortResponse => {
                    let mut results = echo(&request.items);
                    results.pop();
                    Ok(results)
                }
                Behavior::Panic => panic!("scripted instance {port} panicked"),
            }
        }
    }
}

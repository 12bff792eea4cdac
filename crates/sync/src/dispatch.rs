//! Off-thread execution of gateway calls.
//!
//! A [`Dispatcher`] accepts [`RemoteCall`]s without blocking and hands back a
//! [`Completion`] per call. With [`Dispatcher::spawn`] a named worker thread
//! runs the calls against a gateway in submission order. With
//! [`Dispatcher::detached`] nothing runs on its own: the returned
//! [`DispatchLink`] receives the calls and decides when, and in which order,
//! completions are delivered.

use crate::gateway::{GatewayError, HighlightGateway};
use crate::switcher::LoadTicket;
use highlight_model::{Highlight, HighlightId};
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    List(LoadTicket),
    Create(Highlight),
    Delete(HighlightId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Listed { ticket: LoadTicket, result: Result<Vec<Highlight>, GatewayError> },
    Created { id: HighlightId, result: Result<(), GatewayError> },
    Deleted { id: HighlightId, result: Result<bool, GatewayError> },
}

/// Run one call to completion against `gateway`.
pub fn execute(gateway: &dyn HighlightGateway, call: RemoteCall) -> Completion {
    match call {
        RemoteCall::List(ticket) => {
            let result = gateway.list_for_document(ticket.document());
            Completion::Listed { ticket, result }
        }
        RemoteCall::Create(highlight) => {
            let result = gateway.create(&highlight);
            Completion::Created { id: highlight.id().clone(), result }
        }
        RemoteCall::Delete(id) => {
            let result = gateway.delete(&id);
            Completion::Deleted { id, result }
        }
    }
}

pub struct Dispatcher {
    calls: Sender<RemoteCall>,
    completions: Receiver<Completion>,
    in_flight: usize,
    _worker: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Start a worker thread that owns `gateway`.
    ///
    /// The worker exits once the dispatcher is dropped and its current call returns.
    pub fn spawn<G>(gateway: G) -> io::Result<Self>
    where
        G: HighlightGateway + Send + 'static,
    {
        let (call_tx, call_rx) = mpsc::channel::<RemoteCall>();
        let (done_tx, done_rx) = mpsc::channel();

        let worker = thread::Builder::new().name("highlight-gateway".to_owned()).spawn(move || {
            for call in call_rx {
                if done_tx.send(execute(&gateway, call)).is_err() {
                    break;
                }
            }
        })?;

        Ok(Self { calls: call_tx, completions: done_rx, in_flight: 0, _worker: Some(worker) })
    }

    pub fn detached() -> (Self, DispatchLink) {
        let (call_tx, call_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let dispatcher =
            Self { calls: call_tx, completions: done_rx, in_flight: 0, _worker: None };
        (dispatcher, DispatchLink { calls: call_rx, completions: done_tx })
    }

    pub fn submit(&mut self, call: RemoteCall) {
        tracing::debug!(?call, "dispatching remote call");
        if self.calls.send(call).is_err() {
            tracing::warn!("gateway worker has stopped; remote call dropped");
            return;
        }
        self.in_flight += 1;
    }

    pub fn try_next(&mut self) -> Option<Completion> {
        match self.completions.try_recv() {
            Ok(completion) => Some(self.received(completion)),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn next_timeout(&mut self, timeout: Duration) -> Option<Completion> {
        match self.completions.recv_timeout(timeout) {
            Ok(completion) => Some(self.received(completion)),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Calls submitted whose completion has not been received yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    fn received(&mut self, completion: Completion) -> Completion {
        self.in_flight = self.in_flight.saturating_sub(1);
        completion
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("in_flight", &self.in_flight)
            .field("threaded", &self._worker.is_some())
            .finish()
    }
}

/// The far end of a detached [`Dispatcher`].
#[derive(Debug)]
pub struct DispatchLink {
    calls: Receiver<RemoteCall>,
    completions: Sender<Completion>,
}

impl DispatchLink {
    /// Every call submitted and not yet taken, oldest first.
    pub fn take_calls(&self) -> Vec<RemoteCall> {
        self.calls.try_iter().collect()
    }

    pub fn complete(&self, completion: Completion) {
        if self.completions.send(completion).is_err() {
            tracing::debug!("dispatcher dropped before completion was delivered");
        }
    }

    /// Execute `call` against `gateway` and deliver the completion.
    pub fn resolve(&self, gateway: &dyn HighlightGateway, call: RemoteCall) {
        self.complete(execute(gateway, call));
    }

    /// Resolve every pending call in submission order; returns how many ran.
    pub fn run_all(&self, gateway: &dyn HighlightGateway) -> usize {
        let calls = self.take_calls();
        let count = calls.len();
        for call in calls {
            self.resolve(gateway, call);
        }
        count
    }
}

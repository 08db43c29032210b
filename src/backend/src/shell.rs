//! Driver for the dashboard core
//!
//! One task owns the core. API handlers and stream tasks feed it events
//! through a channel; it carries out the effects the core requests and
//! publishes every rendered view model.

use crate::{firebase::DatabaseClient, realtime::Subscriptions};
use anyhow::{Context, Result, anyhow};
use crux_core::{Core, Request};
use crux_http::protocol::{HttpRequest, HttpResult};
use log::{debug, error, info};
use pump_dashboard_core::{App, ClockReading, Effect, Event, Model};
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::{
        mpsc::{self, UnboundedReceiver, UnboundedSender},
        oneshot, watch,
    },
    task::JoinHandle,
};

/// Cloneable access to a running shell
#[derive(Clone)]
pub struct ShellHandle {
    events: UnboundedSender<Event>,
    view: watch::Receiver<Model>,
}

impl ShellHandle {
    pub fn new(events: UnboundedSender<Event>, view: watch::Receiver<Model>) -> Self {
        Self { events, view }
    }

    /// Queue an event for the core
    pub fn send(&self, event: Event) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| anyhow!("failed to send event: shell stopped"))
    }

    /// Latest rendered view model
    pub fn view(&self) -> Model {
        self.view.borrow().clone()
    }

    /// Receiver that is notified on every render
    pub fn watch(&self) -> watch::Receiver<Model> {
        self.view.clone()
    }
}

/// Owner side of a running shell, used to stop it
pub struct ShellDriver {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ShellDriver {
    /// Close all subscriptions and wait for the driver task to finish
    pub async fn shutdown(self) -> Result<()> {
        // an error means the task has already finished
        let _ = self.stop.send(());
        self.task.await.context("failed to join shell task")
    }
}

/// Start a shell and hand `Initialize` to its core
pub fn start<C>(
    client: C,
    session: pump_dashboard_core::SessionConfig,
    reconnect_delay: Duration,
) -> (ShellHandle, ShellDriver)
where
    C: DatabaseClient + Sync + 'static,
{
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (http_tx, http_rx) = mpsc::unbounded_channel();
    let (view_tx, view_rx) = watch::channel(Model::default());
    let (stop_tx, stop_rx) = oneshot::channel();

    let client = Arc::new(client);
    let shell = Shell {
        core: Core::new(),
        subscriptions: Subscriptions::new(Arc::clone(&client), events_tx.clone(), reconnect_delay),
        client,
        view: view_tx,
        http: http_tx,
        pending: HashMap::new(),
        next_request_id: 0,
    };

    let handle = ShellHandle::new(events_tx, view_rx);

    // cannot fail, the receiver is alive
    let _ = handle.send(Event::Initialize(session));

    let task = tokio::spawn(shell.run(events_rx, http_rx, stop_rx));

    (handle, ShellDriver { stop: stop_tx, task })
}

struct Shell<C> {
    core: Core<App>,
    client: Arc<C>,
    subscriptions: Subscriptions<C>,
    view: watch::Sender<Model>,
    http: UnboundedSender<(u64, HttpResult)>,
    pending: HashMap<u64, Request<HttpRequest>>,
    next_request_id: u64,
}

impl<C> Shell<C>
where
    C: DatabaseClient + Sync + 'static,
{
    async fn run(
        mut self,
        mut events: UnboundedReceiver<Event>,
        mut responses: UnboundedReceiver<(u64, HttpResult)>,
        mut stop: oneshot::Receiver<()>,
    ) {
        info!("shell started");

        loop {
            tokio::select! {
                _ = &mut stop => break,
                Some(event) = events.recv() => {
                    debug!("event: {event:?}");
                    let effects = self.core.process_event(event);
                    self.process(effects);
                }
                Some((id, result)) = responses.recv() => self.resolve_http(id, result),
                else => break,
            }
        }

        let effects = self.core.process_event(Event::Shutdown);
        self.process(effects);
        self.subscriptions.stop_all();

        info!("shell stopped");
    }

    fn process(&mut self, effects: Vec<Effect>) {
        let mut queue = VecDeque::from(effects);

        while let Some(effect) = queue.pop_front() {
            let resolved = match effect {
                Effect::Render(_) => {
                    self.view.send_replace(self.core.view());
                    continue;
                }
                Effect::Http(request) => {
                    self.spawn_http(request);
                    continue;
                }
                Effect::Clock(mut request) => {
                    let now = ClockReading {
                        epoch_millis: chrono::Utc::now().timestamp_millis(),
                    };
                    self.core.resolve(&mut request, now)
                }
                Effect::Realtime(mut request) => {
                    let output = self.subscriptions.apply(request.operation.clone());
                    self.core.resolve(&mut request, output)
                }
            };

            match resolved {
                Ok(effects) => queue.extend(effects),
                Err(e) => error!("failed to resolve effect: {e:?}"),
            }
        }
    }

    fn spawn_http(&mut self, request: Request<HttpRequest>) {
        let id = self.next_request_id;
        self.next_request_id += 1;

        let operation = request.operation.clone();
        self.pending.insert(id, request);

        let client = Arc::clone(&self.client);
        let responses = self.http.clone();
        tokio::spawn(async move {
            let result = client.execute(operation).await;
            // the shell may have stopped meanwhile
            let _ = responses.send((id, result));
        });
    }

    fn resolve_http(&mut self, id: u64, result: HttpResult) {
        let Some(mut request) = self.pending.remove(&id) else {
            error!("failed to resolve http request {id}: unknown request");
            return;
        };

        match self.core.resolve(&mut request, result) {
            Ok(effects) => self.process(effects),
            Err(e) => error!("failed to resolve http request {id}: {e:?}"),
        }
    }
}

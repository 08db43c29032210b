//! Firebase REST streaming
//!
//! A subscription keeps one event stream open per channel, folds `put` and
//! `patch` messages into a local copy of the node and forwards the whole node
//! to the core after every change.

use crate::firebase::{DatabaseClient, redact};
use anyhow::{Context, Result, bail};
use reqwest::Url;
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use pump_dashboard_core::{
    Event, RealtimeOperation, RealtimeOutput,
    events::DatabaseEvent,
    types::Channel,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};

/// One server-sent event
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental parser for `text/event-stream` bodies
///
/// Chunks may split lines and even UTF-8 sequences; complete events are
/// returned as soon as their terminating blank line arrives.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    current: SseEvent,
    has_data: bool,
}

impl SseParser {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if self.has_data || !self.current.event.is_empty() {
                    events.push(std::mem::take(&mut self.current));
                }
                self.has_data = false;
                continue;
            }

            // comment
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };

            match field {
                "event" => self.current.event = value.to_string(),
                "data" => {
                    if self.has_data {
                        self.current.data.push('\n');
                    }
                    self.current.data.push_str(value);
                    self.has_data = true;
                }
                _ => debug!("ignoring sse field {field}"),
            }
        }

        events
    }
}

#[derive(Debug, Deserialize)]
struct PathData {
    path: String,
    data: Value,
}

/// Messages of the Firebase streaming protocol
#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    Put { path: String, data: Value },
    Patch { path: String, data: Value },
    KeepAlive,
    Cancel(String),
    AuthRevoked(String),
}

impl TryFrom<&SseEvent> for StreamMessage {
    type Error = anyhow::Error;

    fn try_from(event: &SseEvent) -> Result<Self> {
        match event.event.as_str() {
            "put" | "patch" => {
                let PathData { path, data } = serde_json::from_str(&event.data)
                    .with_context(|| format!("failed to parse {} message", event.event))?;
                if event.event == "put" {
                    Ok(StreamMessage::Put { path, data })
                } else {
                    Ok(StreamMessage::Patch { path, data })
                }
            }
            "keep-alive" => Ok(StreamMessage::KeepAlive),
            "cancel" => Ok(StreamMessage::Cancel(event.data.clone())),
            "auth_revoked" => Ok(StreamMessage::AuthRevoked(event.data.clone())),
            other => bail!("failed to handle stream message: unknown event {other}"),
        }
    }
}

/// Local copy of the subscribed node
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnapshotTree {
    root: Value,
}

impl SnapshotTree {
    pub fn value(&self) -> &Value {
        &self.root
    }

    /// Serialized node, `None` if it does not exist
    pub fn snapshot(&self) -> Option<String> {
        (!self.root.is_null()).then(|| self.root.to_string())
    }

    /// Replace the value at `path`; `null` deletes it
    pub fn put(&mut self, path: &str, data: Value) {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        set_at(&mut self.root, &segments, data);
    }

    /// Replace each child of `path` named in `data`
    pub fn patch(&mut self, path: &str, data: Value) {
        let Value::Object(children) = data else {
            warn!("ignoring patch at {path}: data is not an object");
            return;
        };

        let base = path.trim_end_matches('/');
        for (key, value) in children {
            self.put(&format!("{base}/{key}"), value);
        }
    }

    /// Apply one stream message; returns whether the node changed
    pub fn apply(&mut self, message: StreamMessage) -> bool {
        let before = self.root.clone();
        match message {
            StreamMessage::Put { path, data } => self.put(&path, data),
            StreamMessage::Patch { path, data } => self.patch(&path, data),
            _ => return false,
        }
        before != self.root
    }
}

// Returns whether `node` is empty afterwards so empty parents are pruned.
fn set_at(node: &mut Value, segments: &[&str], data: Value) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        *node = data;
        return node.is_null();
    };

    if !node.is_object() {
        if data.is_null() {
            return node.is_null();
        }
        *node = Value::Object(Map::new());
    }

    let Value::Object(children) = node else {
        return false;
    };

    let child = children.entry(first.to_string()).or_insert(Value::Null);
    if set_at(child, rest, data) {
        children.remove(*first);
    }

    if children.is_empty() {
        *node = Value::Null;
        true
    } else {
        false
    }
}

/// Open realtime subscriptions, one stream task per channel
pub struct Subscriptions<C> {
    client: Arc<C>,
    events: UnboundedSender<Event>,
    reconnect_delay: Duration,
    tasks: HashMap<Channel, JoinHandle<()>>,
}

impl<C> Subscriptions<C>
where
    C: DatabaseClient + Sync + 'static,
{
    pub fn new(client: Arc<C>, events: UnboundedSender<Event>, reconnect_delay: Duration) -> Self {
        Self {
            client,
            events,
            reconnect_delay,
            tasks: HashMap::new(),
        }
    }

    /// Carry out a realtime request of the core
    pub fn apply(&mut self, operation: RealtimeOperation) -> RealtimeOutput {
        match operation {
            RealtimeOperation::Subscribe { channel, url } => {
                if let Err(e) = Url::parse(&url) {
                    return RealtimeOutput::Error {
                        channel: Some(channel),
                        message: format!("invalid stream address for {channel:?}: {e}"),
                    };
                }

                self.stop(channel);
                let task = tokio::spawn(stream_channel(
                    Arc::clone(&self.client),
                    channel,
                    url,
                    self.events.clone(),
                    self.reconnect_delay,
                ));
                self.tasks.insert(channel, task);
                RealtimeOutput::Subscribed { channel }
            }
            RealtimeOperation::UnsubscribeAll => {
                self.stop_all();
                RealtimeOutput::Unsubscribed
            }
        }
    }

    fn stop(&mut self, channel: Channel) {
        if let Some(task) = self.tasks.remove(&channel) {
            debug!("closing {channel:?} stream");
            task.abort();
        }
    }

    pub fn stop_all(&mut self) {
        for (channel, task) in self.tasks.drain() {
            debug!("closing {channel:?} stream");
            task.abort();
        }
    }
}

impl<C> Drop for Subscriptions<C> {
    fn drop(&mut self) {
        for task in self.tasks.values() {
            task.abort();
        }
    }
}

/// Keep a stream on `url` open until the task is aborted
async fn stream_channel<C>(
    client: Arc<C>,
    channel: Channel,
    url: String,
    events: UnboundedSender<Event>,
    reconnect_delay: Duration,
) where
    C: DatabaseClient + Sync + 'static,
{
    loop {
        match follow_stream(client.as_ref(), channel, &url, &events).await {
            Ok(()) => info!("{channel:?} stream closed by server"),
            Err(e) => {
                let message = redact(&format!("{e:#}"));
                error!("{channel:?} stream failed: {message}");
                let failed = Event::Database(DatabaseEvent::StreamError { channel, message });
                if events.send(failed).is_err() {
                    return;
                }
            }
        }

        if events.send(Event::Database(DatabaseEvent::Disconnected)).is_err() {
            return;
        }

        debug!(
            "reopening {channel:?} stream {} in {reconnect_delay:?}",
            redact(&url)
        );
        tokio::time::sleep(reconnect_delay).await;
    }
}

async fn follow_stream<C>(
    client: &C,
    channel: Channel,
    url: &str,
    events: &UnboundedSender<Event>,
) -> Result<()>
where
    C: DatabaseClient + Sync,
{
    let mut stream = client.open_stream(url.to_string()).await?;
    let mut parser = SseParser::default();
    let mut tree = SnapshotTree::default();
    let mut connected = false;

    while let Some(chunk) = stream.next().await {
        for event in parser.push(&chunk?) {
            let message = match StreamMessage::try_from(&event) {
                Ok(message) => message,
                Err(e) => {
                    warn!("{channel:?}: {e:#}");
                    continue;
                }
            };

            match message {
                StreamMessage::KeepAlive => continue,
                StreamMessage::Cancel(reason) => bail!("stream cancelled: {reason}"),
                StreamMessage::AuthRevoked(reason) => bail!("stream auth revoked: {reason}"),
                message => {
                    // the first put carries the full node, even if it is empty
                    if tree.apply(message) || !connected {
                        send(
                            events,
                            Event::Database(DatabaseEvent::Snapshot {
                                channel,
                                data: tree.snapshot(),
                            }),
                        )?;
                    }
                    if !connected {
                        connected = true;
                        send(events, Event::Database(DatabaseEvent::Connected))?;
                    }
                }
            }
        }
    }

    Ok(())
}

fn send(events: &UnboundedSender<Event>, event: Event) -> Result<()> {
    events
        .send(event)
        .map_err(|_| anyhow::anyhow!("failed to forward snapshot: shell stopped"))
}

//! Realtime command definitions.
//!
//! These types define the interface between the Core and the Shell for
//! realtime database subscriptions. Snapshots themselves are not outputs of
//! these requests: the shell sends them to the core as
//! `DatabaseEvent::Snapshot` events for as long as a subscription is open.

use crux_core::{capability::Operation, command, Command};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

use crate::types::Channel;

// Operations that the Shell needs to perform for realtime subscriptions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RealtimeOperation {
    /// Open a stream on `url` and report every snapshot for `channel`
    Subscribe { channel: Channel, url: String },
    UnsubscribeAll,
}

// The output from realtime operations (shell tells us what happened)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RealtimeOutput {
    Subscribed {
        channel: Channel,
    },
    Unsubscribed,
    Error {
        channel: Option<Channel>,
        message: String,
    },
}

impl Operation for RealtimeOperation {
    type Output = RealtimeOutput;
}

/// Command-based realtime API
pub struct Realtime<Effect, Event> {
    _effect: PhantomData<Effect>,
    _event: PhantomData<Event>,
}

impl<Effect, Event> Realtime<Effect, Event>
where
    Effect: Send + From<crux_core::Request<RealtimeOperation>> + 'static,
    Event: Send + 'static,
{
    /// Subscribe to a channel at the given streaming URL
    pub fn subscribe(channel: Channel, url: impl Into<String>) -> RequestBuilder<Effect, Event> {
        RequestBuilder::new(RealtimeOperation::Subscribe {
            channel,
            url: url.into(),
        })
    }

    /// Close every open subscription
    pub fn unsubscribe_all() -> RequestBuilder<Effect, Event> {
        RequestBuilder::new(RealtimeOperation::UnsubscribeAll)
    }
}

/// Request builder for realtime operations
#[must_use]
pub struct RequestBuilder<Effect, Event> {
    operation: RealtimeOperation,
    _effect: PhantomData<Effect>,
    _event: PhantomData<fn() -> Event>,
}

impl<Effect, Event> RequestBuilder<Effect, Event>
where
    Effect: Send + From<crux_core::Request<RealtimeOperation>> + 'static,
    Event: Send + 'static,
{
    fn new(operation: RealtimeOperation) -> Self {
        Self {
            operation,
            _effect: PhantomData,
            _event: PhantomData,
        }
    }

    /// Build the request into a Command RequestBuilder
    pub fn build(
        self,
    ) -> command::RequestBuilder<Effect, Event, impl std::future::Future<Output = RealtimeOutput>>
    {
        command::RequestBuilder::new(move |ctx| async move {
            Command::request_from_shell(self.operation)
                .into_future(ctx)
                .await
        })
    }
}

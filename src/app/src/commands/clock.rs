//! Clock command definitions.
//!
//! The core never reads the system time itself; it asks the shell.

use crux_core::{capability::Operation, command, Command};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

use crate::types::ClockReading;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClockOperation {
    Now,
}

impl Operation for ClockOperation {
    type Output = ClockReading;
}

/// Command-based clock API
pub struct Clock<Effect, Event> {
    _effect: PhantomData<Effect>,
    _event: PhantomData<Event>,
}

impl<Effect, Event> Clock<Effect, Event>
where
    Effect: Send + From<crux_core::Request<ClockOperation>> + 'static,
    Event: Send + 'static,
{
    /// Current wall clock time as epoch milliseconds
    pub fn now() -> RequestBuilder<Effect, Event> {
        RequestBuilder {
            operation: ClockOperation::Now,
            _effect: PhantomData,
            _event: PhantomData,
        }
    }
}

#[must_use]
pub struct RequestBuilder<Effect, Event> {
    operation: ClockOperation,
    _effect: PhantomData<Effect>,
    _event: PhantomData<fn() -> Event>,
}

impl<Effect, Event> RequestBuilder<Effect, Event>
where
    Effect: Send + From<crux_core::Request<ClockOperation>> + 'static,
    Event: Send + 'static,
{
    pub fn build(
        self,
    ) -> command::RequestBuilder<Effect, Event, impl std::future::Future<Output = ClockReading>> {
        command::RequestBuilder::new(move |ctx| async move {
            Command::request_from_shell(self.operation)
                .into_future(ctx)
                .await
        })
    }
}

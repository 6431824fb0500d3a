//! Subscription configuration, callbacks and channel delivery.

use crate::composite::Composite;
use crate::error::FlattenError;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{trace, warn};

use super::registry::SubscriptionHandle;

/// How many times a node notifies per snapshot before nested data arrives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NotifyMode {
    /// Base projection, then the per-document overwrite pass.
    #[default]
    TwoPhase,
    /// Only the overwrite pass.
    Single,
}

/// Configuration for a [`Flattener`](super::Flattener).
#[derive(Clone, Debug)]
pub struct FlattenConfig {
    /// Notification mode for every node.
    /// Default: TwoPhase
    pub notify: NotifyMode,

    /// Deepest node depth a subscription may reach (None = unlimited).
    pub max_depth: Option<u32>,

    /// Buffer for channel subscriptions (None = unbounded).
    pub channel_capacity: Option<usize>,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            notify: NotifyMode::TwoPhase,
            max_depth: None,
            channel_capacity: None,
        }
    }
}

/// Receives the composite of a subscription tree.
///
/// Any `Fn(&Composite)` closure is an updater.
pub trait Updater: Send + Sync + 'static {
    /// Called with the full composite after every change.
    fn update(&self, composite: &Composite);

    /// Called when the store reports a failure anywhere in the tree.
    fn on_error(&self, error: &FlattenError) {
        warn!(%error, "Unhandled subscription error");
    }
}

impl<F> Updater for F
where
    F: Fn(&Composite) + Send + Sync + 'static,
{
    fn update(&self, composite: &Composite) {
        self(composite)
    }
}

/// Events delivered to a [`ChannelSubscription`].
#[derive(Clone, Debug, PartialEq)]
pub enum FlattenEvent {
    /// The composite changed.
    Update(Composite),
    /// The store reported a failure.
    Error(FlattenError),
}

/// Updater forwarding into a channel.
pub(crate) struct ChannelUpdater {
    pub(crate) sender: Sender<FlattenEvent>,
}

impl ChannelUpdater {
    fn send(&self, event: FlattenEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("Channel full, dropping flatten event"),
            Err(TrySendError::Disconnected(_)) => trace!("Channel receiver gone"),
        }
    }
}

impl Updater for ChannelUpdater {
    fn update(&self, composite: &Composite) {
        self.send(FlattenEvent::Update(composite.clone()));
    }

    fn on_error(&self, error: &FlattenError) {
        self.send(FlattenEvent::Error(error.clone()));
    }
}

/// A subscription whose updates arrive on a channel.
///
/// Unlike a bare [`SubscriptionHandle`], dropping a channel subscription
/// cancels its tree, since nothing is left to read the events.
pub struct ChannelSubscription {
    pub(crate) handle: SubscriptionHandle,
    pub(crate) receiver: Receiver<FlattenEvent>,
}

impl ChannelSubscription {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<FlattenEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<FlattenEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<FlattenEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain pending events and return the most recent composite, if any.
    pub fn latest(&self) -> Option<Composite> {
        let mut latest = None;
        while let Ok(event) = self.receiver.try_recv() {
            if let FlattenEvent::Update(composite) = event {
                latest = Some(composite);
            }
        }
        latest
    }

    pub fn handle(&self) -> &SubscriptionHandle {
        &self.handle
    }

    /// Cancel the subscription tree, returning the receiver so events
    /// already queued stay readable.
    pub fn cancel(self) -> Receiver<FlattenEvent> {
        self.handle.node.cancel();
        self.receiver.clone()
    }
}

impl Drop for ChannelSubscription {
    fn drop(&mut self) {
        self.handle.node.cancel();
    }
}

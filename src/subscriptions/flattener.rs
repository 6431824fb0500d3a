//! Entry point for building subscription trees.

use crate::error::{FlattenError, Result};
use crate::rules::Ruleset;
use crate::store::SnapshotStore;
use crate::types::{Depth, Location};
use crossbeam_channel::{bounded, unbounded};
use std::sync::Arc;

use super::node::{Context, Node};
use super::registry::SubscriptionHandle;
use super::types::{ChannelSubscription, ChannelUpdater, FlattenConfig, Updater};

/// Builds live subscription trees over one store.
#[derive(Clone)]
pub struct Flattener {
    store: Arc<dyn SnapshotStore>,
    config: FlattenConfig,
}

impl Flattener {
    /// Create a flattener with the default configuration.
    pub fn new(store: impl SnapshotStore) -> Self {
        Self {
            store: Arc::new(store),
            config: FlattenConfig::default(),
        }
    }

    pub fn with_config(mut self, config: FlattenConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &FlattenConfig {
        &self.config
    }

    /// Subscribe at the root depth.
    ///
    /// `updater` is called with the full composite on every change at any
    /// level of the tree. The tree stays live until the returned handle is
    /// cancelled.
    pub fn subscribe(
        &self,
        rules: Ruleset,
        location: impl Into<Location>,
        updater: impl Updater,
    ) -> Result<SubscriptionHandle> {
        self.subscribe_at_depth(rules, location, Depth::ROOT, updater)
    }

    /// Subscribe with an explicit starting depth.
    pub fn subscribe_at_depth(
        &self,
        rules: Ruleset,
        location: impl Into<Location>,
        depth: Depth,
        updater: impl Updater,
    ) -> Result<SubscriptionHandle> {
        self.check_depth(&rules, depth)?;
        let context = Arc::new(Context {
            store: Arc::clone(&self.store),
            notify: self.config.notify,
        });
        Node::subscribe(context, rules, location.into(), depth, Arc::new(updater))
    }

    /// Subscribe and receive updates and errors on a channel.
    pub fn subscribe_channel(
        &self,
        rules: Ruleset,
        location: impl Into<Location>,
    ) -> Result<ChannelSubscription> {
        let (sender, receiver) = match self.config.channel_capacity {
            Some(capacity) => bounded(capacity),
            None => unbounded(),
        };
        let handle = self.subscribe(rules, location, ChannelUpdater { sender })?;
        Ok(ChannelSubscription { handle, receiver })
    }

    /// The root sits at depth 1 or deeper, and the deepest node the rules
    /// can reach must fit in a `u32` and within `max_depth`.
    fn check_depth(&self, rules: &Ruleset, depth: Depth) -> Result<()> {
        if depth < Depth::ROOT {
            return Err(FlattenError::InvalidDepth(depth.0));
        }
        let deepest = depth
            .0
            .checked_add(rules.depth())
            .ok_or(FlattenError::InvalidDepth(depth.0))?;
        if let Some(limit) = self.config.max_depth {
            if deepest > limit {
                return Err(FlattenError::DepthLimitExceeded {
                    depth: deepest,
                    limit,
                });
            }
        }
        Ok(())
    }
}

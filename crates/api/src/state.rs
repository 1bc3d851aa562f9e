// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use kernelci_core::bus::TransientBus;
use kernelci_core::delivery::DeliveryEngine;
use kernelci_core::event_log::EventLog;
use kernelci_core::store::NodeStore;
use kernelci_core::subscription::SubscriptionRegistry;
use tokio_util::sync::CancellationToken;

use crate::auth::{AsAuthenticator, Authenticator};
use crate::config::ApiConfig;

/// Shared application handles, grounded on `crates/mux/src/state.rs`'s
/// `Arc`-wrapped shared state passed into every route.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<NodeStore>,
    pub event_log: Arc<EventLog>,
    pub bus: Arc<TransientBus>,
    pub registry: Arc<SubscriptionRegistry>,
    pub delivery: Arc<DeliveryEngine>,
    pub authenticator: Arc<dyn Authenticator>,
    pub shutdown: CancellationToken,
    pub listen_wait_budget: Duration,
}

impl AppState {
    pub fn new(config: &ApiConfig, authenticator: Arc<dyn Authenticator>, shutdown: CancellationToken) -> Self {
        let store = NodeStore::shared();
        let event_log = EventLog::shared(config.core.event_history_ttl());
        let bus = Arc::new(TransientBus::new());
        let registry = SubscriptionRegistry::shared(Arc::clone(&event_log));
        let delivery = DeliveryEngine::shared(Arc::clone(&event_log), Arc::clone(&bus), Arc::clone(&registry));
        Self {
            store,
            event_log,
            bus,
            registry,
            delivery,
            authenticator,
            shutdown,
            listen_wait_budget: config.core.listen_wait_budget(),
        }
    }
}

impl AsAuthenticator for AppState {
    fn authenticator(&self) -> &Arc<dyn Authenticator> {
        &self.authenticator
    }
}

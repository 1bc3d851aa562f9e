// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Core configuration, independent of the HTTP transport. Mirrors
/// `crates/mux/src/config.rs::MuxConfig`'s `clap::Args` + `env` pattern so
/// the API crate can `#[command(flatten)]` this struct.
#[derive(Debug, Clone, clap::Args)]
pub struct CoreConfig {
    /// Event retention in seconds.
    #[arg(long, default_value_t = 604_800, env = "EVENT_HISTORY_TTL_SECONDS")]
    pub event_history_ttl_seconds: u64,

    /// Node/event store connection string. Accepted for forward
    /// compatibility with a real backend; the in-memory `NodeStore`/`EventLog`
    /// do not consult it.
    #[arg(long, env = "STORE_URL")]
    pub store_url: Option<String>,

    /// Transient bus connection string. Accepted for forward compatibility;
    /// the in-process `TransientBus` does not consult it.
    #[arg(long, env = "BUS_URL")]
    pub bus_url: Option<String>,

    /// State machine driver tick cadence in seconds.
    #[arg(long, default_value_t = 60, env = "DRIVER_TICK_SECONDS")]
    pub driver_tick_seconds: u64,

    /// Server-side long-poll budget for `Listen`, in seconds.
    #[arg(long, default_value_t = 30, env = "LISTEN_WAIT_BUDGET_SECONDS")]
    pub listen_wait_budget_seconds: u64,
}

impl CoreConfig {
    pub fn event_history_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.event_history_ttl_seconds as i64)
    }

    pub fn driver_tick_interval(&self) -> Duration {
        Duration::from_secs(self.driver_tick_seconds)
    }

    pub fn listen_wait_budget(&self) -> Duration {
        Duration::from_secs(self.listen_wait_budget_seconds)
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            event_history_ttl_seconds: 604_800,
            store_url: None,
            bus_url: None,
            driver_tick_seconds: 60,
            listen_wait_budget_seconds: 30,
        }
    }
}

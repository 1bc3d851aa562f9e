// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use kernelci_core::config::CoreConfig;

/// HTTP-facing configuration, flattening the transport-agnostic
/// [`CoreConfig`]. Mirrors `crates/mux/src/config.rs::MuxConfig`'s
/// `clap::Parser` + `env` layering.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "kernelci-api", version, about)]
pub struct ApiConfig {
    #[arg(long, default_value = "0.0.0.0", env = "HOST")]
    pub host: String,

    #[arg(long, default_value_t = 8080, env = "PORT")]
    pub port: u16,

    /// Shared secret the bearer auth collaborator validates requests
    /// against.
    #[arg(long, env = "SECRET_KEY")]
    pub secret_key: String,

    #[command(flatten)]
    pub core: CoreConfig,
}

impl ApiConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

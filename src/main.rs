//! socks-lb-installer — build socks-lb from source and run it under systemd.
//!
//! Installs Java and build tooling as needed, builds the load balancer, and
//! provisions a dedicated service user, directories, a default config and a
//! systemd unit. Run `socks-lb-installer --help` for usage.

use anyhow::Result;
use clap::Parser;
use host_provision::{privilege, signal, SystemHost};
use tracing_subscriber::EnvFilter;

mod cli;
mod color;
mod config;
mod install;
mod provision;
mod service;
mod settings;
mod uninstall;

use cli::Cli;
use settings::{Layout, ServiceIdentity, Settings};

fn main() {
    // --help and --version print and exit here, before any side effect.
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .without_time()
        .init();

    if let Err(e) = run(&cli) {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    privilege::require_root()?;
    signal::install_handlers();

    let host = SystemHost;
    let layout = Layout::standard();
    let identity = ServiceIdentity::standard();

    if cli.uninstall {
        uninstall::run(&host, &layout, &identity)
    } else {
        install::run(&host, &Settings::from_cli(cli), &layout, &identity)
    }
}

//! Reconciliation loop embedding example for ipvs-netstate
//!
//! Shows the caller side of the handle: ensure the dummy device, ensure the
//! desired service IPs, read back what the kernel owns, and unbind whatever
//! is no longer wanted. The handle blocks, so each call runs on the blocking
//! pool under a caller-chosen deadline.
//!
//! ## Configuration
//!
//! - `NETSTATE_BACKEND`: `netlink` (default) or `memory`
//! - `NETSTATE_DUMMY_DEVICE`: dummy device name (default `kube-ipvs0`)
//! - `NETSTATE_ADDRESSES`: comma-separated service IPs to keep bound
//! - `NETSTATE_CALL_TIMEOUT_MS`: deadline per kernel call (default 2000)
//! - `NETSTATE_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//!
//! ```bash
//! NETSTATE_BACKEND=memory NETSTATE_ADDRESSES=10.96.0.1,10.96.0.10 reconcile_demo
//! ```

use anyhow::{Context, Result};
use ipvs_netstate_core::{MemoryKernel, NetStateConfig, NetStateHandle};
use std::collections::HashSet;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Demo configuration, read from the environment
struct Config {
    backend: String,
    netstate: NetStateConfig,
    addresses: Vec<String>,
    call_timeout: Duration,
    log_level: String,
}

impl Config {
    fn from_env() -> Result<Self> {
        let mut netstate = NetStateConfig::new();
        if let Ok(device) = env::var("NETSTATE_DUMMY_DEVICE") {
            netstate = netstate.with_dummy_device(device);
        }
        netstate.validate()?;

        let call_timeout_ms = match env::var("NETSTATE_CALL_TIMEOUT_MS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("NETSTATE_CALL_TIMEOUT_MS '{raw}' is not a number"))?,
            Err(_) => 2000,
        };

        Ok(Self {
            backend: env::var("NETSTATE_BACKEND").unwrap_or_else(|_| "netlink".to_string()),
            netstate,
            addresses: env::var("NETSTATE_ADDRESSES")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            call_timeout: Duration::from_millis(call_timeout_ms),
            log_level: env::var("NETSTATE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn build_handle(config: &Config) -> Result<NetStateHandle> {
    match config.backend.as_str() {
        "netlink" => ipvs_netstate_netlink::open_handle(&config.netstate)
            .context("failed to open rtnetlink socket"),
        "memory" => Ok(NetStateHandle::with_config(
            Box::new(MemoryKernel::with_loopback()),
            &config.netstate,
        )),
        other => anyhow::bail!(
            "NETSTATE_BACKEND '{}' is not supported. Supported backends: netlink, memory",
            other
        ),
    }
}

/// Run one blocking handle call on the blocking pool, bounded by `deadline`
async fn call<T, F>(handle: &Arc<NetStateHandle>, deadline: Duration, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&NetStateHandle) -> ipvs_netstate_core::Result<T> + Send + 'static,
{
    let handle = Arc::clone(handle);
    let task = tokio::task::spawn_blocking(move || op(&handle));
    let joined = tokio::time::timeout(deadline, task)
        .await
        .context("kernel call exceeded deadline")?;
    Ok(joined.context("kernel call panicked")??)
}

/// One reconciliation pass; returns the addresses left bound on the device
async fn reconcile(
    handle: &Arc<NetStateHandle>,
    config: &Config,
) -> Result<HashSet<String>> {
    let device = config.netstate.dummy_device.clone();
    let deadline = config.call_timeout;

    let dev = device.clone();
    let existed = call(handle, deadline, move |h| h.ensure_dummy_device(&dev)).await?;
    info!("Dummy device {} {}", device, if existed { "present" } else { "created" });

    for address in &config.addresses {
        let (dev, addr) = (device.clone(), address.clone());
        match call(handle, deadline, move |h| h.ensure_address_bind(&addr, &dev)).await {
            Ok(true) => info!("{} already bound", address),
            Ok(false) => info!("{} bound", address),
            Err(e) => warn!("Failed to bind {}: {:#}", address, e),
        }
    }

    let dev = device.clone();
    let bound = call(handle, deadline, move |h| h.get_local_addresses(&dev)).await?;

    let desired: HashSet<&str> = config.addresses.iter().map(String::as_str).collect();
    for stale in bound.iter().filter(|a| !desired.contains(a.as_str())) {
        let (dev, addr) = (device.clone(), stale.clone());
        match call(handle, deadline, move |h| h.unbind_address(&addr, &dev)).await {
            Ok(()) => info!("{} unbound (no longer desired)", stale),
            Err(e) => warn!("Failed to unbind {}: {:#}", stale, e),
        }
    }

    let dev = device.clone();
    call(handle, deadline, move |h| h.get_local_addresses(&dev)).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    info!(
        "Reconciling {} address(es) on {} via {} backend",
        config.addresses.len(),
        config.netstate.dummy_device,
        config.backend
    );

    let handle = Arc::new(build_handle(&config)?);

    // Two passes: the second must be a no-op
    for pass in 1..=2 {
        let bound = reconcile(&handle, &config).await?;
        let mut sorted: Vec<_> = bound.into_iter().collect();
        sorted.sort();
        info!("Pass {}: bound on {}: {:?}", pass, config.netstate.dummy_device, sorted);
    }

    Ok(())
}

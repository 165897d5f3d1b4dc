//! Entry point for the **cardwin** daemon.
//!
//! Detects the host platform, checks its automation tools, starts the
//! reconciliation poller and the socket listener, and then processes
//! incoming commands one at a time until interrupted.

use cardwin::command::Envelope;
use cardwin::config::Config;
use cardwin::context::Context;
use cardwin::ipc::{Endpoint, SocketListener};
use cardwin::platform::{Capability, Host};
use cardwin::poller;
use cardwin::service::WindowService;
use cardwin::traits::CommandSource;
use log::{error, info};
use tokio::sync::mpsc;

/// Resolve the config directory (`$XDG_CONFIG_HOME/cardwin`).
fn config_dir() -> std::path::PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{}/.config", home)
    });
    std::path::PathBuf::from(base).join("cardwin")
}

/// Try to load the config from `$XDG_CONFIG_HOME/cardwin/config.json`,
/// falling back to compiled-in defaults.
fn load_config() -> Config {
    let path = config_dir().join("config.json");
    match Config::load(&path) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Err(e) => {
            info!("no config file ({}), using defaults", e);
            Config::default()
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = load_config();
    let host = match Host::detect(&config) {
        Ok(host) => host,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    let capability = Capability::check(host.required_tools());
    if !capability.is_available() {
        error!(
            "missing {}; window features are disabled",
            capability.missing_tools().join(", ")
        );
    }

    let endpoint = Endpoint::from_config(&config.ipc);
    let ctx = Context::new(host, config, capability);
    let poller = poller::spawn(ctx.clone());
    let service = WindowService::new(ctx, poller);

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Envelope>(64);
    let mut listener = SocketListener::new(endpoint.clone(), service.subscribe());
    tokio::spawn(async move {
        if let Err(e) = listener.run(cmd_tx).await {
            error!("socket listener error: {}", e);
        }
    });

    info!("cardwin running");
    loop {
        tokio::select! {
            envelope = cmd_rx.recv() => match envelope {
                Some(Envelope { command, reply }) => {
                    let answer = service.handle(command).await;
                    let _ = reply.send(answer);
                }
                None => {
                    info!("all command sources closed, exiting");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, exiting");
                break;
            }
        }
    }

    #[cfg(unix)]
    if let Endpoint::Unix(path) = &endpoint {
        let _ = std::fs::remove_file(path);
    }
}

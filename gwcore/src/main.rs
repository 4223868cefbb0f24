//! main - starts a single-instance gateway with its control plane and userplane

use anyhow::Result;
use async_std::channel::Sender;
use async_std::prelude::*;
use clap::Parser;
use gwcore::{Gateway, load_config_file};
use signal_hook::consts::signal::*;
use signal_hook_async_std::Signals;
use slog::{Drain, Logger, o};
use std::net::Ipv4Addr;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML file listing APNs, ports and any sessions to provision at startup.
    #[arg(long, default_value = "gwcore.toml")]
    config: String,

    /// Local IPv4 address.  The gateway binds its S1-U GTP-U port and its SGi port on
    /// this address.  Overrides local_ip in the config file.
    #[arg(long)]
    local_ip: Option<Ipv4Addr>,
}

#[async_std::main]
async fn main() -> Result<()> {
    exit_on_panic();
    let logger = init_logging();

    let args = Args::parse();
    let mut config = load_config_file(&args.config, &logger)?;
    if args.local_ip.is_some() {
        config.local_ip = args.local_ip;
    }

    let gw = Gateway::start(config, logger)?;

    wait_for_signal().await?;
    gw.graceful_shutdown().await;

    Ok(())
}

fn init_logging() -> Logger {
    // Use info level logging by default
    if std::env::var("RUST_LOG").is_err() {
        unsafe { std::env::set_var("RUST_LOG", "info") }
    }
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = slog_envlogger::new(drain);
    slog::Logger::root(drain, o!())
}

fn exit_on_panic() {
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        std::process::exit(1);
    }));
}

async fn wait_for_signal() -> Result<i32> {
    let signals = Signals::new([SIGTERM, SIGINT, SIGQUIT])?;
    let handle = signals.handle();
    let (sig_sender, sig_receiver) = async_std::channel::unbounded();
    let signals_task = async_std::task::spawn(handle_signals(signals, sig_sender));
    let signal = sig_receiver.recv().await;
    handle.close();
    signals_task.await;
    Ok(signal?)
}

async fn handle_signals(signals: Signals, sig_sender: Sender<i32>) {
    let mut signals = signals.fuse();
    // Only shutdown signals are registered.
    while let Some(signal) = signals.next().await {
        let _ = sig_sender.send(signal).await;
    }
}

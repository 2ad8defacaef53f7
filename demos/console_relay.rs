//! Console-driven relay.
//!
//! Connects to the control process and simulates the browser side on the
//! terminal: deliveries are printed instead of injected, and stdin lines
//! drive tab events and originator commands.
//!
//! Commands:
//!   ready <tab>         tab finished loading a target page
//!   gone <tab>          tab closed
//!   register <role>     e.g. `register Hero Creator`
//!   reset
//!   panic <tab>         inject the recovery prompt into a tab
//!   { ...json... }      arbitrary command, as pasted from the clipboard
//!
//! Usage:
//!   cargo run --example console_relay
//!   cargo run --example console_relay -- --debug
//!   TAB_RELAY_ENDPOINT=ws://127.0.0.1:9000 cargo run --example console_relay

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use tab_relay::{
    Command, Delivery, Environment, Injector, RECOVERY_PROMPT, Relay, RelayConfig, Result, Role,
    TabEvent, TabId,
};

// ============================================================================
// Console Browser
// ============================================================================

/// Tabs opened on the console.
#[derive(Default)]
struct ConsoleBrowser {
    live: Mutex<FxHashSet<TabId>>,
}

#[async_trait]
impl Environment for ConsoleBrowser {
    async fn live_destinations(&self) -> Result<Vec<TabId>> {
        Ok(self.live.lock().iter().copied().collect())
    }

    async fn focus(&self, tab_id: TabId) -> Result<()> {
        println!("[tab {tab_id}] focused");
        Ok(())
    }

    async fn open_originator(&self, tab_id: TabId) -> Result<()> {
        println!("[tab {tab_id}] ready; pick a role with `register <role>`");
        Ok(())
    }
}

#[async_trait]
impl Injector for ConsoleBrowser {
    async fn prepare(&self, tab_id: TabId) -> Result<()> {
        println!("[tab {tab_id}] buttons added: Send Message, PANIC!");
        Ok(())
    }

    async fn deliver(&self, tab_id: TabId, payload: &str) -> Result<Delivery> {
        if !self.live.lock().contains(&tab_id) {
            return Ok(Delivery::InputNotFound);
        }
        println!("[tab {tab_id}] <- {payload}");
        Ok(Delivery::Delivered)
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let debug = std::env::args().any(|a| a == "--debug");
    let filter = if debug { "tab_relay=debug" } else { "tab_relay=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    if let Err(e) = run().await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = RelayConfig::from_env();
    let browser = Arc::new(ConsoleBrowser::default());

    let handle = Relay::new(config.clone(), browser.clone(), browser.clone())?
        .with_report_handler(Box::new(|e| eprintln!("[report] {e}")))
        .start()
        .await;

    println!("Relay {} ({})", config.endpoint, handle.connection_state());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));

        match verb {
            "" => {}
            "ready" | "gone" | "panic" => {
                let Some(tab_id) = rest.trim().parse().ok().and_then(TabId::new) else {
                    eprintln!("expected a non-zero tab id");
                    continue;
                };
                match verb {
                    "ready" => {
                        browser.live.lock().insert(tab_id);
                        handle.tab_event(TabEvent::loaded(tab_id, &config.target_url_prefix))?;
                    }
                    "gone" => {
                        browser.live.lock().remove(&tab_id);
                        handle.tab_event(TabEvent::removed(tab_id))?;
                    }
                    _ => {
                        browser.deliver(tab_id, RECOVERY_PROMPT).await?;
                    }
                }
            }
            "register" => match rest.trim().parse::<Role>() {
                Ok(role) => handle.submit(Command::register(role))?,
                Err(e) => eprintln!("{e}"),
            },
            "reset" => handle.submit(Command::reset())?,
            "quit" => break,
            _ => match Command::from_json(line) {
                Ok(command) => handle.submit(command)?,
                Err(e) => eprintln!("{e}"),
            },
        }
    }

    handle.shutdown();
    handle.closed().await;
    Ok(())
}

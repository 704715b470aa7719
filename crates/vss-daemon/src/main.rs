// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vss_broker::BrokerContext;
use vss_daemon::{build_app, AppState};
use vss_subscriptions::NoopRepublisher;
use vss_tree::{loader::load_tree_with_overlays, SignalTree};

#[derive(Parser, Debug)]
#[command(name = "vss-daemon", version, about = "VSS signal broker")]
struct Args {
    /// Bind address for the HTTP/WebSocket listener.
    #[arg(long, default_value = "127.0.0.1:8090")]
    bind: String,

    /// Path to the base tree-definition JSON document.
    #[arg(long)]
    tree: PathBuf,

    /// Directory of `*.json` overlay documents, applied in alphanumeric
    /// filename order on top of the base tree.
    #[arg(long)]
    overlay_dir: Option<PathBuf>,

    /// Path to the RS256 public key (PEM) used to verify bearer tokens.
    #[arg(long)]
    public_key: Option<PathBuf>,

    /// Enable verbose request/response debug logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("vss=debug")
    } else {
        EnvFilter::new("vss=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let base_text = std::fs::read_to_string(&args.tree)
        .with_context(|| format!("reading tree definition {}", args.tree.display()))?;
    let base_doc: serde_json::Value =
        serde_json::from_str(&base_text).context("parsing tree definition as JSON")?;

    let root = match &args.overlay_dir {
        Some(dir) => load_tree_with_overlays(&base_doc, dir)
            .map_err(|e| anyhow::anyhow!("loading VSS tree: {e}"))?,
        None => vss_tree::loader::load_tree(&base_doc)
            .map_err(|e| anyhow::anyhow!("loading VSS tree: {e}"))?,
    };
    let tree = Arc::new(SignalTree::new(root));

    let public_key_pem = match &args.public_key {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("reading public key {}", path.display()))?,
        None => Vec::new(),
    };
    let authenticator = Arc::new(vss_auth::Authenticator::new(public_key_pem));

    let ctx = Arc::new(BrokerContext::new(tree, authenticator, Arc::new(NoopRepublisher)));
    let state = AppState::new(ctx);

    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("bind {}", args.bind))?;
    info!(bind = %args.bind, tree = %args.tree.display(), "vss-daemon listening");

    axum::serve(listener, app).await.context("serve")
}

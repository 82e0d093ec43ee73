//! # Liberty Tools
//!
//! Replays a recorded `textDocument/publishDiagnostics` notification
//! against a file and prints the annotations a code-action pass produces.
//!
//! ## Quick Start
//!
//! ```bash
//! # Diagnostics only, no server answers
//! cargo run -- src/main/liberty/config/server.env --diagnostics publish.json
//!
//! # With scripted code actions from lsp4mp
//! cargo run -- Greeting.java --diagnostics publish.json --replies lsp4mp.json -v
//! ```

use anyhow::Context;
use clap::Parser;
use liberty_core::{AnnotatorConfig, Config, Document, Workbench, Workspace};
use liberty_lsp::lsp_types::{Diagnostic, PublishDiagnosticsParams};
use liberty_lsp::{
    Annotation, AnnotationStore, CodeActionAnnotator, Connection, ConnectionPool, ReplayClient,
    ReplayScript, ServerId, ui,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Liberty Tools - code-action annotations from recorded language server traffic
#[derive(Parser, Debug)]
#[command(name = "liberty-tools")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File to annotate
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Workspace directory (defaults to the file's directory)
    #[arg(short, long, value_name = "DIR")]
    workspace: Option<PathBuf>,

    /// Recorded publishDiagnostics params (JSON)
    #[arg(short, long, value_name = "JSON")]
    diagnostics: PathBuf,

    /// Scripted code-action answers (JSON)
    #[arg(short, long, value_name = "JSON")]
    replies: Option<PathBuf>,

    /// Server id the diagnostics came from
    #[arg(short, long, default_value = "lsp4mp")]
    server: String,

    /// Config file (defaults to the user config directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the code-action timeout
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// The part of a recorded notification we replay; the URI always comes
/// from FILE.
#[derive(Debug, Deserialize)]
struct Recorded {
    diagnostics: Vec<Diagnostic>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    tracing::info!("Starting Liberty Tools v{}", env!("CARGO_PKG_VERSION"));

    for line in annotate_file(&args)? {
        println!("{line}");
    }
    Ok(())
}

/// Runs one annotation pass over `args.file` and formats the result.
fn annotate_file(args: &Args) -> anyhow::Result<Vec<String>> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load(),
    };
    if let Some(ms) = args.timeout_ms {
        config.annotator.code_action_timeout_ms = ms;
    }
    // Render once, after the replayed publish
    let annotator_config = AnnotatorConfig {
        render_on_publish: false,
        ..config.annotator.clone()
    };

    let file = args
        .file
        .canonicalize()
        .with_context(|| format!("cannot open {}", args.file.display()))?;
    let workspace = match &args.workspace {
        Some(dir) => Workspace::open(dir)?,
        None => Workspace::open(file.parent().unwrap_or(Path::new("/")))?,
    };

    let recorded: Recorded = read_json(&args.diagnostics)?;
    let script = match &args.replies {
        Some(path) => ReplayScript::from_file(path)
            .with_context(|| format!("failed to read replies {}", path.display()))?,
        None => ReplayScript::default(),
    };

    let workbench = Arc::new(Workbench::new(workspace.clone()));
    let pool = Arc::new(ConnectionPool::new(workspace, &config));
    let server = ServerId::new(&args.server);
    pool.register(Connection::new(
        server.clone(),
        script.capabilities(),
        Arc::new(ReplayClient::new(script)),
    ));

    let editor = workbench.open_file(&file)?;
    let uri = workbench.document_for(editor)?.uri().clone();

    // The main thread plays the UI thread
    let (ui_handle, mut ui_thread) = ui::channel();
    let sink = Arc::new(AnnotationStore::new());
    let annotator = Arc::new(CodeActionAnnotator::new(
        workbench.clone(),
        pool,
        Arc::new(ui_handle),
        sink.clone(),
        annotator_config,
    ));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        annotator.on_publish_diagnostics(
            server,
            PublishDiagnosticsParams::new(uri, recorded.diagnostics, None),
        );
        annotator.annotate(editor).await
    })?;
    ui_thread.run_pending();

    let document = workbench.document_for(editor)?;
    let name = file.display().to_string();
    let mut lines = Vec::new();
    for annotation in sink.annotations(editor) {
        lines.extend(format_annotation(&name, &document, &annotation));
    }
    tracing::info!(annotations = lines.len(), "pass finished");

    // Late answers are abandoned with the runtime
    runtime.shutdown_background();
    Ok(lines)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("invalid JSON in {}", path.display()))
}

/// `file:line:col: severity: message`, then one indented line per fix.
fn format_annotation(name: &str, document: &Document, annotation: &Annotation) -> Vec<String> {
    let location = document
        .buffer()
        .char_idx_to_position(annotation.range.start)
        .map(|position| position.to_string())
        .unwrap_or_else(|_| "?".to_string());

    let mut lines = vec![format!(
        "{name}:{location}: {:?}: {} [{}]",
        annotation.severity, annotation.message, annotation.source
    )];
    lines.extend(
        annotation
            .fixes
            .iter()
            .map(|fix| format!("    fix: {}", fix.title)),
    );
    lines
}

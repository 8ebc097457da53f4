use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use svcmap::Result;
use svcmap::config::Config;
use svcmap::domain::Verdict;
use svcmap::filter::{FilterEntry, HttpStatusFilter, VisualToggle};
use svcmap::prefs::{JsonFilePreferences, MemoryPreferences, Preferences};
use svcmap::render;
use svcmap::runtime::{EngineHandle, JsonLinesSource, StreamEnd, StreamSupervisor};
use svcmap::store::{FrameEngine, ResetCounter};

use anyhow::Context;

#[derive(Parser)]
#[command(name = "svcmap")]
#[command(about = "Service map state engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a change-record file through the engine and render the result.
    Replay {
        /// One JSON change record per line.
        #[arg(long)]
        events: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        /// Overrides `flow_capacity` from the config.
        #[arg(long)]
        flow_capacity: Option<usize>,

        #[arg(long)]
        namespace: Option<String>,

        #[arg(long)]
        verdict: Option<Verdict>,

        /// Exact code (`404`) or class (`4+`).
        #[arg(long)]
        http_status: Option<HttpStatusFilter>,

        /// `[from:|to:|both:]kind=query`, repeatable.
        #[arg(long = "filter")]
        filters: Vec<FilterEntry>,

        /// host, kube-dns, remote-node, prometheus-app, kube-apiserver.
        #[arg(long = "hide")]
        hide: Vec<VisualToggle>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Summary)]
        format: OutputFormat,

        /// Write here instead of stdout.
        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },

    /// Inspect or edit a preferences file.
    Prefs {
        #[arg(long)]
        path: PathBuf,

        #[command(subcommand)]
        action: PrefsAction,
    },
}

#[derive(Subcommand)]
enum PrefsAction {
    Show,
    Set {
        toggle: VisualToggle,
        #[arg(action = clap::ArgAction::Set)]
        shown: bool,
    },
    Namespace {
        name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Html,
    Summary,
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Replay {
            events,
            config,
            flow_capacity,
            namespace,
            verdict,
            http_status,
            filters,
            hide,
            format,
            out,
        } => {
            // 1) Config + logging.
            let mut config = Config::load(config.as_deref())?;
            if let Some(cap) = flow_capacity {
                config.flow_capacity = cap;
                config.validate()?;
            }
            init_tracing(&config.log_filter);

            // 2) Engine on its own task.
            let prefs: Box<dyn Preferences> = match &config.preferences_path {
                Some(path) => Box::new(JsonFilePreferences::open(path)?),
                None => Box::new(MemoryPreferences::new()),
            };
            let mut engine = FrameEngine::new(config.flow_capacity, prefs);
            let resets = ResetCounter::new();
            engine.add_layout(Box::new(resets.clone()));
            let (handle, task) = EngineHandle::spawn(engine);

            // 3) Stream the file in.
            let source = JsonLinesSource::open(&events)
                .await
                .with_context(|| format!("open events file {}", events.display()))?;
            let mut streams = StreamSupervisor::new(handle.clone());
            streams.switch(source).await;
            if let Some(report) = streams.join().await {
                if report.end == StreamEnd::TransportFailed {
                    warn!(
                        applied = report.applied,
                        "event file could not be read to the end"
                    );
                }
            }

            // 4) Filters last, so the current frame is replayed from global.
            let wants_filters = namespace.is_some()
                || verdict.is_some()
                || http_status.is_some()
                || !filters.is_empty()
                || !hide.is_empty();
            if wants_filters {
                handle
                    .with_engine(move |engine| {
                        let mut next = engine.filters().clone();
                        if namespace.is_some() {
                            next.namespace = namespace;
                        }
                        next.verdict = verdict.or(next.verdict);
                        next.http_status = http_status.or(next.http_status);
                        if !filters.is_empty() {
                            next.entries = filters;
                        }
                        for toggle in hide {
                            next.visual.set(toggle, false);
                        }
                        engine.set_filters(next);
                    })
                    .await?;
            }

            // 5) Render.
            let snapshot = handle.snapshot();
            let rendered = match format {
                OutputFormat::Json => render::render_json(&snapshot)?,
                OutputFormat::Html => render::render_html_page(&snapshot)?,
                OutputFormat::Summary => render::render_summary(&snapshot)?,
            };

            drop(streams);
            drop(handle);
            let engine = task.await.context("engine task panicked")?;
            info!(
                generation = engine.generation(),
                layout_resets = resets.count(),
                "replay done"
            );

            match out {
                Some(out) => {
                    std::fs::write(&out, rendered)
                        .with_context(|| format!("write {}", out.display()))?;
                    println!("Wrote {}", out.display());
                }
                None => print!("{rendered}"),
            }
        }

        Commands::Prefs { path, action } => {
            init_tracing("warn");
            let mut prefs = JsonFilePreferences::open(&path)?;

            match action {
                PrefsAction::Show => {
                    for toggle in VisualToggle::ALL {
                        let shown = prefs.flag(toggle).unwrap_or(true);
                        println!("{:<16} {}", toggle.to_string(), shown);
                    }
                    println!(
                        "{:<16} {}",
                        "namespace",
                        prefs.last_namespace().as_deref().unwrap_or("-")
                    );
                }
                PrefsAction::Set { toggle, shown } => {
                    prefs.set_flag(toggle, shown)?;
                    println!("Wrote {}", prefs.path().display());
                }
                PrefsAction::Namespace { name } => {
                    prefs.set_last_namespace(&name)?;
                    println!("Wrote {}", prefs.path().display());
                }
            }
        }
    }

    Ok(())
}

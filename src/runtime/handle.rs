//! Single-writer task owning the [`FrameEngine`].
//!
//! Everything that mutates the engine travels through one command queue and
//! runs to completion before the next command starts. A fresh
//! [`StoreSnapshot`] is published after each command, so readers never see a
//! frame halfway through a reset.

use crate::domain::ChangeEvent;
use crate::error::EngineClosed;
use crate::store::{FrameEngine, StoreSnapshot};

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

// A command mutates the engine and returns its reply, which is only sent once
// the resulting snapshot is published.
type Reply = Box<dyn FnOnce() + Send>;
type Command = Box<dyn FnOnce(&mut FrameEngine) -> Reply + Send>;

#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<Arc<StoreSnapshot>>,
}

impl EngineHandle {
    /// Move `engine` onto its own task. The join handle yields the engine back
    /// once every handle is dropped.
    pub fn spawn(mut engine: FrameEngine) -> (Self, JoinHandle<FrameEngine>) {
        let (commands, mut rx) = mpsc::unbounded_channel::<Command>();
        let (publish, snapshots) = watch::channel(Arc::new(engine.snapshot()));

        let task = tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                let reply = cmd(&mut engine);
                publish.send_replace(Arc::new(engine.snapshot()));
                reply();
            }
            debug!(generation = engine.generation(), "engine task stopped");
            engine
        });

        (
            Self {
                commands,
                snapshots,
            },
            task,
        )
    }

    /// Run `f` on the engine task and hand back its result. By the time it
    /// returns, [`snapshot`](Self::snapshot) reflects the change.
    pub async fn with_engine<R, F>(&self, f: F) -> Result<R, EngineClosed>
    where
        F: FnOnce(&mut FrameEngine) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Box::new(move |engine: &mut FrameEngine| -> Reply {
                let out = f(engine);
                Box::new(move || {
                    let _ = tx.send(out);
                })
            }))
            .map_err(|_| EngineClosed)?;
        rx.await.map_err(|_| EngineClosed)
    }

    /// Apply one validated event; returns the current-frame flow diff.
    pub async fn apply(&self, event: ChangeEvent) -> Result<usize, EngineClosed> {
        self.with_engine(move |engine| engine.apply(event)).await
    }

    /// The snapshot published after the last completed command.
    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<Arc<StoreSnapshot>> {
        self.snapshots.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangeKind, Endpoint, Flow, L4Protocol, Link, Service, Verdict};
    use crate::prefs::MemoryPreferences;
    use pretty_assertions::assert_eq;

    fn engine() -> FrameEngine {
        FrameEngine::new(1000, Box::new(MemoryPreferences::new()))
    }

    #[tokio::test]
    async fn commands_apply_in_order_and_publish() {
        let (handle, task) = EngineHandle::spawn(engine());
        let mut updates = handle.subscribe_snapshots();

        handle
            .apply(ChangeEvent::Service {
                service: Service::new("a", "a"),
                change: ChangeKind::Added,
            })
            .await
            .unwrap();
        updates.changed().await.unwrap();
        assert_eq!(handle.snapshot().current.services.len(), 1);

        let len = handle
            .with_engine(|e| e.current().services().len())
            .await
            .unwrap();
        assert_eq!(len, 1);

        drop(updates);
        drop(handle);
        let engine = task.await.unwrap();
        assert_eq!(engine.global().services().len(), 1);
    }

    #[tokio::test]
    async fn closed_engine_is_reported() {
        let (handle, task) = EngineHandle::spawn(engine());
        task.abort();
        let _ = task.await;

        let res = handle.with_engine(|e| e.generation()).await;
        assert_eq!(res, Err(EngineClosed));
        assert!(handle.is_closed());
    }

    // Readers hammering snapshots while filters flip back and forth must never
    // see a rendered link whose access point is missing.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn readers_never_observe_half_reset_frames() {
        let mut e = engine();
        let services: Vec<Service> = (0..20).map(|i| Service::new(i.to_string(), "")).collect();
        let links: Vec<Link> = (1..20)
            .map(|i| {
                Link::new("0", i.to_string(), 8000 + i, L4Protocol::Tcp)
                    .with_verdicts([Verdict::Forwarded])
            })
            .collect();
        let flows = (0..50)
            .map(|i| {
                Flow::new(
                    i,
                    Endpoint::service("0"),
                    Endpoint::service((i % 20).to_string()),
                    Verdict::Forwarded,
                )
            })
            .collect();
        e.setup(services, links, flows);

        let (handle, _task) = EngineHandle::spawn(e);
        let mut updates = handle.subscribe_snapshots();

        let reader = tokio::spawn(async move {
            let mut seen = 0;
            while updates.changed().await.is_ok() {
                let snap = updates.borrow_and_update().clone();
                for link in &snap.current.links {
                    let served = snap
                        .current
                        .access_points
                        .for_service(&link.destination_id)
                        .any(|ap| ap.port == link.destination_port);
                    assert!(served, "link without access point in generation {}", snap.generation);
                }
                seen += 1;
            }
            seen
        });

        for i in 0..50 {
            let verdict = if i % 2 == 0 {
                Some(Verdict::Dropped)
            } else {
                None
            };
            handle.with_engine(move |e| e.set_verdict(verdict)).await.unwrap();
        }
        let last = handle.with_engine(|e| e.generation()).await.unwrap();
        assert_eq!(last, 51);

        drop(handle);
        let seen = reader.await.unwrap();
        assert!(seen >= 1);
    }
}

//! Stream lifecycle: pump events from a source into the engine until the
//! source ends, fails or is stopped.

use crate::error::StreamError;
use crate::runtime::handle::EngineHandle;
use crate::runtime::source::EventSource;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Why a stream stopped delivering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEnd {
    /// The source ran out of events.
    #[default]
    Exhausted,
    Stopped,
    TransportFailed,
    EngineClosed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamReport {
    pub applied: usize,
    pub malformed: usize,
    pub end: StreamEnd,
}

/// A running stream. Dropping it leaves the task running; call [`stop`] or
/// [`join`] to wait for it.
///
/// [`stop`]: StreamHandle::stop
/// [`join`]: StreamHandle::join
#[derive(Debug)]
pub struct StreamHandle {
    cancel: CancellationToken,
    task: JoinHandle<StreamReport>,
}

impl StreamHandle {
    pub fn start<S: EventSource>(source: S, engine: EngineHandle) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(pump(source, engine, cancel.clone()));
        Self { cancel, task }
    }

    /// Resolves once no further event from this stream can reach the engine.
    pub async fn stop(self) -> StreamReport {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the stream to end on its own.
    pub async fn join(self) -> StreamReport {
        self.task.await.unwrap_or_else(|err| {
            error!(error = %err, "stream task failed");
            StreamReport {
                end: StreamEnd::TransportFailed,
                ..StreamReport::default()
            }
        })
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn pump<S: EventSource>(
    mut source: S,
    engine: EngineHandle,
    cancel: CancellationToken,
) -> StreamReport {
    let mut report = StreamReport::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                report.end = StreamEnd::Stopped;
                break;
            }
            next = source.next_event() => next,
        };

        let event = match next {
            None => {
                report.end = StreamEnd::Exhausted;
                break;
            }
            Some(Err(StreamError::Malformed(err))) => {
                warn!(error = %err, "skipping malformed change record");
                report.malformed += 1;
                continue;
            }
            Some(Err(StreamError::Transport(err))) => {
                error!(error = %err, "event stream failed");
                report.end = StreamEnd::TransportFailed;
                break;
            }
            Some(Ok(event)) => event,
        };

        let kind = event.kind_name();
        let event = match event.validate() {
            Ok(event) => event,
            Err(err) => {
                warn!(kind, error = %err, "rejecting change record");
                report.malformed += 1;
                continue;
            }
        };

        if cancel.is_cancelled() {
            report.end = StreamEnd::Stopped;
            break;
        }
        match engine.apply(event).await {
            Ok(diff) => {
                report.applied += 1;
                debug!(kind, diff, "applied change record");
            }
            Err(_) => {
                report.end = StreamEnd::EngineClosed;
                break;
            }
        }
    }

    info!(
        applied = report.applied,
        malformed = report.malformed,
        end = ?report.end,
        "event stream finished"
    );
    report
}

/// Keeps at most one stream feeding the engine.
#[derive(Debug)]
pub struct StreamSupervisor {
    engine: EngineHandle,
    active: Option<StreamHandle>,
}

impl StreamSupervisor {
    pub fn new(engine: EngineHandle) -> Self {
        Self {
            engine,
            active: None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.active.as_ref().is_some_and(|s| !s.is_finished())
    }

    /// Stop the running stream, wait for it, then start `source`. Returns the
    /// report of the stream that was replaced.
    pub async fn switch<S: EventSource>(&mut self, source: S) -> Option<StreamReport> {
        let previous = self.stop().await;
        info!("starting event stream");
        self.active = Some(StreamHandle::start(source, self.engine.clone()));
        previous
    }

    pub async fn stop(&mut self) -> Option<StreamReport> {
        let handle = self.active.take()?;
        Some(handle.stop().await)
    }

    /// Wait for the running stream to end by itself.
    pub async fn join(&mut self) -> Option<StreamReport> {
        let handle = self.active.take()?;
        Some(handle.join().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangeEvent, ChangeKind, Service};
    use crate::error::IngestError;
    use crate::prefs::MemoryPreferences;
    use crate::runtime::source::ChannelSource;
    use crate::store::FrameEngine;
    use pretty_assertions::assert_eq;

    fn spawn_engine() -> EngineHandle {
        let engine = FrameEngine::new(100, Box::new(MemoryPreferences::new()));
        EngineHandle::spawn(engine).0
    }

    fn added(id: &str) -> ChangeEvent {
        ChangeEvent::Service {
            service: Service::new(id, id),
            change: ChangeKind::Added,
        }
    }

    #[tokio::test]
    async fn malformed_records_are_skipped() {
        let engine = spawn_engine();
        let (tx, source) = ChannelSource::channel(8);

        tx.send(Ok(added("a"))).await.unwrap();
        tx.send(Err(IngestError::Decode("junk".into()).into()))
            .await
            .unwrap();
        tx.send(Ok(added(""))).await.unwrap();
        tx.send(Ok(added("b"))).await.unwrap();
        drop(tx);

        let report = StreamHandle::start(source, engine.clone()).join().await;
        assert_eq!(
            report,
            StreamReport {
                applied: 2,
                malformed: 2,
                end: StreamEnd::Exhausted,
            }
        );

        let ids = engine
            .with_engine(|e| e.global().services().len())
            .await
            .unwrap();
        assert_eq!(ids, 2);
    }

    #[tokio::test]
    async fn transport_failure_ends_stream_and_keeps_state() {
        let engine = spawn_engine();
        let (tx, source) = ChannelSource::channel(8);

        tx.send(Ok(added("a"))).await.unwrap();
        tx.send(Err(std::io::Error::other("reset by peer").into()))
            .await
            .unwrap();
        tx.send(Ok(added("b"))).await.unwrap();

        let report = StreamHandle::start(source, engine.clone()).join().await;
        assert_eq!(report.end, StreamEnd::TransportFailed);
        assert_eq!(report.applied, 1);

        let len = engine
            .with_engine(|e| e.current().services().len())
            .await
            .unwrap();
        assert_eq!(len, 1);
    }

    #[tokio::test]
    async fn stopped_stream_delivers_nothing_more() {
        let engine = spawn_engine();
        let (tx, source) = ChannelSource::channel(8);
        let mut supervisor = StreamSupervisor::new(engine.clone());

        assert!(supervisor.switch(source).await.is_none());
        tx.send(Ok(added("a"))).await.unwrap();

        // wait until the first event made it through
        let mut updates = engine.subscribe_snapshots();
        while updates.borrow_and_update().global.services == 0 {
            updates.changed().await.unwrap();
        }

        let report = supervisor.stop().await.unwrap();
        assert_eq!(report.end, StreamEnd::Stopped);
        assert!(!supervisor.is_streaming());

        // the receiver is gone with the task
        assert!(tx.send(Ok(added("b"))).await.is_err());
        let len = engine
            .with_engine(|e| e.global().services().len())
            .await
            .unwrap();
        assert_eq!(len, 1);
    }

    #[tokio::test]
    async fn switch_waits_for_previous_stream() {
        let engine = spawn_engine();
        let (first_tx, first) = ChannelSource::channel(8);
        let (second_tx, second) = ChannelSource::channel(8);
        let mut supervisor = StreamSupervisor::new(engine.clone());

        supervisor.switch(first).await;
        let replaced = supervisor.switch(second).await.unwrap();
        assert_eq!(replaced.end, StreamEnd::Stopped);
        assert!(first_tx.is_closed());

        second_tx.send(Ok(added("x"))).await.unwrap();
        drop(second_tx);
        let report = supervisor.join().await.unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.end, StreamEnd::Exhausted);
    }
}

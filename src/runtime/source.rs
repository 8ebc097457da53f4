//! Where change events come from.

use crate::domain::ChangeEvent;
use crate::error::{IngestError, StreamError};

use std::future::Future;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;

/// A stream of change events.
///
/// `None` means the stream is exhausted. A `Malformed` error skips one record;
/// a `Transport` error ends the stream. `next_event` must be cancel safe: it
/// is raced against the stop signal.
pub trait EventSource: Send + 'static {
    fn next_event(
        &mut self,
    ) -> impl Future<Output = Option<Result<ChangeEvent, StreamError>>> + Send;
}

/// One JSON change record per line. Blank lines are skipped.
#[derive(Debug)]
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl JsonLinesSource<BufReader<File>> {
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::open(path).await?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin> JsonLinesSource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R> EventSource for JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn next_event(&mut self) -> Option<Result<ChangeEvent, StreamError>> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(err) => return Some(Err(StreamError::Transport(err))),
            };
            self.line_no += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            return Some(serde_json::from_str(line).map_err(|err| {
                IngestError::Decode(format!("line {}: {err}", self.line_no)).into()
            }));
        }
    }
}

/// Events pushed by another task. Ends when every sender is dropped.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<Result<ChangeEvent, StreamError>>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<Result<ChangeEvent, StreamError>>) -> Self {
        Self { rx }
    }

    pub fn channel(buffer: usize) -> (mpsc::Sender<Result<ChangeEvent, StreamError>>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx))
    }
}

impl EventSource for ChannelSource {
    async fn next_event(&mut self) -> Option<Result<ChangeEvent, StreamError>> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChangeKind;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[tokio::test]
    async fn json_lines_decode_and_report_bad_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"kind":"namespace","change":"added","name":"shop"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file, r#"{{"kind":"flows","flows":[]}}"#).unwrap();
        file.flush().unwrap();

        let mut source = JsonLinesSource::open(file.path()).await.unwrap();

        assert_eq!(
            source.next_event().await.unwrap().unwrap(),
            ChangeEvent::Namespace {
                name: "shop".to_string(),
                change: ChangeKind::Added,
            }
        );

        match source.next_event().await {
            Some(Err(StreamError::Malformed(IngestError::Decode(msg)))) => {
                assert!(msg.starts_with("line 3:"), "{msg}");
            }
            other => panic!("expected decode error, got {other:?}"),
        }

        assert_eq!(
            source.next_event().await.unwrap().unwrap(),
            ChangeEvent::Flows { flows: Vec::new() }
        );
        assert!(source.next_event().await.is_none());
    }

    #[tokio::test]
    async fn channel_source_ends_with_senders() {
        let (tx, mut source) = ChannelSource::channel(4);
        tx.send(Ok(ChangeEvent::Flows { flows: Vec::new() }))
            .await
            .unwrap();
        drop(tx);

        assert!(matches!(source.next_event().await, Some(Ok(_))));
        assert!(source.next_event().await.is_none());
    }
}

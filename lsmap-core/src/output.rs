// Log writers: one task per output stream, each owning its file

use crate::error::{CoreError, Result};
use chrono::Local;
use lsmap_scanner::{Line, OutputReceivers, Stream};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, error};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Where the three logs of a run live
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPaths {
    pub edges: PathBuf,
    pub summaries: PathBuf,
    pub results: PathBuf,
}

impl OutputPaths {
    pub fn new(dir: &Path, timestamp: &str) -> Self {
        let file = |stream: Stream| dir.join(format!("{}-{}.json", timestamp, stream.suffix()));
        Self {
            edges: file(Stream::Edges),
            summaries: file(Stream::Summaries),
            results: file(Stream::Results),
        }
    }

    /// Paths named after the current local time
    pub fn for_startup(dir: &Path) -> Self {
        Self::new(dir, &Local::now().format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn path(&self, stream: Stream) -> &Path {
        match stream {
            Stream::Edges => &self.edges,
            Stream::Summaries => &self.summaries,
            Stream::Results => &self.results,
        }
    }
}

/// Lines written to each log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LineCounts {
    pub edges: usize,
    pub summaries: usize,
    pub results: usize,
}

/// Appends newline-terminated lines to a single file
pub struct LogWriter {
    path: PathBuf,
    file: File,
}

impl LogWriter {
    pub async fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|source| CoreError::Output {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn spawn(self, rx: UnboundedReceiver<Line>) -> JoinHandle<Result<usize>> {
        tokio::spawn(self.run(rx))
    }

    /// Drain `rx` into the file until every sender is gone
    pub async fn run(self, mut rx: UnboundedReceiver<Line>) -> Result<usize> {
        let path = self.path;
        let mut out = BufWriter::new(self.file);
        let mut written = 0usize;

        let result = async {
            while let Some(line) = rx.recv().await {
                write_line(&mut out, &line).await?;
                written += 1;
                // Batch whatever is already queued, then flush
                while let Ok(line) = rx.try_recv() {
                    write_line(&mut out, &line).await?;
                    written += 1;
                }
                out.flush().await?;
            }
            out.flush().await
        }
        .await;

        match result {
            Ok(()) => {
                debug!(path = %path.display(), lines = written, "Log writer finished");
                Ok(written)
            }
            Err(source) => {
                error!(path = %path.display(), "Log writer failed: {}", source);
                Err(CoreError::Output { path, source })
            }
        }
    }
}

async fn write_line(out: &mut BufWriter<File>, line: &[u8]) -> std::io::Result<()> {
    out.write_all(line).await?;
    out.write_all(b"\n").await
}

/// The three running writers of a crawl
pub struct OutputWriters {
    edges: JoinHandle<Result<usize>>,
    summaries: JoinHandle<Result<usize>>,
    results: JoinHandle<Result<usize>>,
}

impl OutputWriters {
    /// Open all three files before anything is produced. Failing to open one is fatal.
    pub async fn open(paths: &OutputPaths, receivers: OutputReceivers) -> Result<Self> {
        let edges = LogWriter::create(&paths.edges).await?;
        let summaries = LogWriter::create(&paths.summaries).await?;
        let results = LogWriter::create(&paths.results).await?;

        Ok(Self {
            edges: edges.spawn(receivers.edges),
            summaries: summaries.spawn(receivers.summaries),
            results: results.spawn(receivers.results),
        })
    }

    /// Wait for the writers to drain. Only returns once every sender has been dropped.
    pub async fn join(self) -> Result<LineCounts> {
        Ok(LineCounts {
            edges: join_writer(self.edges).await?,
            summaries: join_writer(self.summaries).await?,
            results: join_writer(self.results).await?,
        })
    }
}

async fn join_writer(handle: JoinHandle<Result<usize>>) -> Result<usize> {
    handle
        .await
        .map_err(|e| CoreError::Writer(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsmap_scanner::OutputSink;
    use tempfile::TempDir;

    #[test]
    fn test_paths_share_timestamp() {
        let paths = OutputPaths::new(Path::new("/var/lib/lsmap"), "2026-10-14T09-30-00");
        assert_eq!(
            paths.edges,
            PathBuf::from("/var/lib/lsmap/2026-10-14T09-30-00-link.json")
        );
        assert_eq!(
            paths.path(Stream::Summaries),
            Path::new("/var/lib/lsmap/2026-10-14T09-30-00-summary.json")
        );
        assert_eq!(
            paths.results,
            PathBuf::from("/var/lib/lsmap/2026-10-14T09-30-00-results.json")
        );
    }

    #[tokio::test]
    async fn test_writers_drain_after_senders_drop() {
        let dir = TempDir::new().unwrap();
        let paths = OutputPaths::new(dir.path(), "run");
        let (sink, receivers) = OutputSink::channel();
        let writers = OutputWriters::open(&paths, receivers).await.unwrap();

        sink.send(Stream::Edges, br#"{"address":"10.0.0.1","origin":"a"}"#.to_vec());
        sink.send(Stream::Edges, br#"{"address":"10.0.0.1","origin":"b"}"#.to_vec());
        sink.send(Stream::Results, br#"{"r":1}"#.to_vec());
        drop(sink);

        let counts = writers.join().await.unwrap();
        assert_eq!(
            counts,
            LineCounts {
                edges: 2,
                summaries: 0,
                results: 1
            }
        );

        let edges = std::fs::read_to_string(&paths.edges).unwrap();
        assert_eq!(
            edges,
            "{\"address\":\"10.0.0.1\",\"origin\":\"a\"}\n{\"address\":\"10.0.0.1\",\"origin\":\"b\"}\n"
        );
        assert_eq!(std::fs::read_to_string(&paths.summaries).unwrap(), "");
        assert_eq!(std::fs::read_to_string(&paths.results).unwrap(), "{\"r\":1}\n");
    }

    #[tokio::test]
    async fn test_writer_appends_to_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("existing-link.json");
        std::fs::write(&path, "earlier\n").unwrap();

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let writer = LogWriter::create(&path).await.unwrap().spawn(rx);
        tx.send(b"later".to_vec()).unwrap();
        drop(tx);

        assert_eq!(writer.await.unwrap().unwrap(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "earlier\nlater\n");
    }

    #[tokio::test]
    async fn test_unopenable_output_is_fatal() {
        let dir = TempDir::new().unwrap();
        let paths = OutputPaths::new(&dir.path().join("missing"), "run");
        let (_sink, receivers) = OutputSink::channel();
        let err = OutputWriters::open(&paths, receivers).await.err().unwrap();
        assert!(matches!(err, CoreError::Output { .. }));
    }
}

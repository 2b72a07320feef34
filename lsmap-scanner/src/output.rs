use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::debug;

/// One line of output, without its trailing newline
pub type Line = Vec<u8>;

/// Which of the three logs a line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Edges,
    Summaries,
    Results,
}

impl Stream {
    pub fn suffix(&self) -> &'static str {
        match self {
            Stream::Edges => "link",
            Stream::Summaries => "summary",
            Stream::Results => "results",
        }
    }
}

/// Producer half of the three output queues. Cloning is cheap and sends never block.
#[derive(Debug, Clone)]
pub struct OutputSink {
    edges: UnboundedSender<Line>,
    summaries: UnboundedSender<Line>,
    results: UnboundedSender<Line>,
}

/// Consumer halves, one per writer
#[derive(Debug)]
pub struct OutputReceivers {
    pub edges: UnboundedReceiver<Line>,
    pub summaries: UnboundedReceiver<Line>,
    pub results: UnboundedReceiver<Line>,
}

impl OutputSink {
    pub fn channel() -> (OutputSink, OutputReceivers) {
        let (edges, edges_rx) = unbounded_channel();
        let (summaries, summaries_rx) = unbounded_channel();
        let (results, results_rx) = unbounded_channel();
        (
            OutputSink {
                edges,
                summaries,
                results,
            },
            OutputReceivers {
                edges: edges_rx,
                summaries: summaries_rx,
                results: results_rx,
            },
        )
    }

    pub fn send(&self, stream: Stream, line: Line) {
        let sender = match stream {
            Stream::Edges => &self.edges,
            Stream::Summaries => &self.summaries,
            Stream::Results => &self.results,
        };
        if sender.send(line).is_err() {
            debug!(stream = stream.suffix(), "Writer has stopped, dropping line");
        }
    }
}

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tradestream_models::aggregate::AggregateResult;
use tradestream_models::config::StreamSettings;
use tradestream_models::event::Event;
use tradestream_models::run::{LogEntry, RunSnapshot, RunState};
use tradestream_models::trade_request::TradeRequest;
use uuid::Uuid;

use crate::accumulator::apply_update;
use crate::classify::classify;
use crate::decoder::decode_stream;
use crate::error::StreamError;
use crate::recorder::{LogRecorder, Recorded};
use crate::transport::{ChunkStream, Transport};

/// Mutable state of a single run. Once terminal, every further input is ignored.
#[derive(Debug, Clone)]
pub struct Run {
    snapshot: RunSnapshot,
    recorder: LogRecorder,
}

impl Run {
    pub fn new(run_id: Uuid, ticker: &str) -> Self {
        Self::with_recorder(run_id, ticker, LogRecorder::new())
    }

    pub fn with_recorder(run_id: Uuid, ticker: &str, recorder: LogRecorder) -> Self {
        Self {
            snapshot: RunSnapshot::started(run_id, ticker),
            recorder,
        }
    }

    pub fn state(&self) -> RunState {
        self.snapshot.state
    }

    pub fn snapshot(&self) -> &RunSnapshot {
        &self.snapshot
    }

    /// Route one event: accumulate first, then log, then apply any transition.
    pub fn process(&mut self, event: &Event) {
        if self.is_closed() {
            debug!(kind = event.kind(), "Dropping event after run ended");
            return;
        }
        if let Event::Update(update) = event {
            self.snapshot.result = apply_update(&self.snapshot.result, update);
        }
        let recorded = self.recorder.record(event);
        self.apply(recorded);
    }

    pub fn record_decode_error(&mut self, error: &StreamError) {
        if self.is_closed() {
            return;
        }
        let entry = self.recorder.record_decode_error(error);
        self.snapshot.logs.push(entry);
    }

    /// The transport failed; `streaming` tells whether any body had been opened.
    pub fn fail_transport(&mut self, error: &StreamError, streaming: bool) {
        if self.is_closed() {
            return;
        }
        let entry = self.recorder.record_transport_failure(error, streaming);
        self.close(entry, RunState::Failed);
    }

    pub fn end_of_stream(&mut self, implicit_completion: bool) {
        if self.is_closed() {
            return;
        }
        let recorded = self.recorder.record_end_of_stream(implicit_completion);
        self.apply(recorded);
    }

    pub fn cancel(&mut self) {
        if self.is_closed() {
            return;
        }
        let entry = self.recorder.record_cancelled();
        self.close(entry, RunState::Failed);
    }

    fn is_closed(&self) -> bool {
        self.snapshot.state.is_terminal()
    }

    fn apply(&mut self, recorded: Recorded) {
        if let Some(entry) = recorded.entry {
            self.snapshot.logs.push(entry);
        }
        if let Some(state) = recorded.transition {
            self.snapshot.state = state;
        }
    }

    fn close(&mut self, entry: LogEntry, state: RunState) {
        self.snapshot.logs.push(entry);
        self.snapshot.state = state;
    }
}

struct ActiveRun {
    run_id: Uuid,
    cancel: CancellationToken,
}

/// Drives analysis runs and publishes their progress.
///
/// Readers see whole `RunSnapshot`s swapped in through a watch channel, never a
/// half-applied update. Starting a run cancels the one in flight; a superseded
/// run can no longer publish.
pub struct RunController {
    transport: Arc<dyn Transport>,
    settings: StreamSettings,
    recorder: LogRecorder,
    snapshot_tx: watch::Sender<Arc<RunSnapshot>>,
    active: Mutex<Option<ActiveRun>>,
}

impl RunController {
    pub fn new(transport: Arc<dyn Transport>, settings: StreamSettings) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(RunSnapshot::default()));
        Self {
            transport,
            settings,
            recorder: LogRecorder::new(),
            snapshot_tx,
            active: Mutex::new(None),
        }
    }

    pub fn with_recorder(mut self, recorder: LogRecorder) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<RunSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> Arc<RunSnapshot> {
        Arc::clone(&self.snapshot_tx.borrow())
    }

    pub fn state(&self) -> RunState {
        self.snapshot_tx.borrow().state
    }

    pub fn result(&self) -> AggregateResult {
        self.snapshot_tx.borrow().result.clone()
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.snapshot_tx.borrow().logs.clone()
    }

    /// Cancel the run in flight, if any. It ends `Failed` with a cancellation line.
    pub fn cancel(&self) -> bool {
        match self.active.lock() {
            Ok(active) => match active.as_ref() {
                Some(run) => {
                    info!(run_id = %run.run_id, "Cancelling analysis run");
                    run.cancel.cancel();
                    true
                }
                None => false,
            },
            Err(e) => {
                error!(error = %e, "Active run lock poisoned");
                false
            }
        }
    }

    /// Run one analysis to a terminal state and return its final snapshot.
    pub async fn run(&self, request: TradeRequest) -> Arc<RunSnapshot> {
        let start = Instant::now();
        let run_id = Uuid::new_v4();
        let cancel = self.begin(run_id, &request.ticker);
        let mut run = Run::with_recorder(run_id, &request.ticker, self.recorder.clone());

        info!(%run_id, ticker = %request.ticker, "Starting analysis run");

        let opened = tokio::select! {
            _ = cancel.cancelled() => None,
            opened = self.transport.open(&request) => Some(opened),
        };

        match opened {
            None => run.cancel(),
            Some(Err(e)) => {
                error!(%run_id, error = %e, "Failed to open analysis stream");
                run.fail_transport(&e, false);
            }
            Some(Ok(chunks)) => self.consume(&mut run, chunks, &cancel).await,
        }

        let snapshot = self.finish(run);
        info!(
            %run_id,
            state = %snapshot.state,
            filled = snapshot.result.filled(),
            logs = snapshot.logs.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Analysis run finished"
        );
        snapshot
    }

    async fn consume(&self, run: &mut Run, chunks: ChunkStream, cancel: &CancellationToken) {
        let idle = self.settings.idle_timeout_seconds.map(Duration::from_secs);
        let records = decode_stream(chunks);
        tokio::pin!(records);

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    run.cancel();
                    break;
                }
                next = async {
                    match idle {
                        Some(limit) => tokio::time::timeout(limit, records.next())
                            .await
                            .map_err(|_| StreamError::Stalled(limit.as_secs())),
                        None => Ok(records.next().await),
                    }
                } => next,
            };

            match next {
                Ok(Some(Ok(value))) => {
                    let event = classify(value);
                    debug!(
                        kind = event.kind(),
                        terminal = event.is_terminal(),
                        "Processing event"
                    );
                    run.process(&event);
                }
                Ok(Some(Err(e))) if e.is_recoverable() => run.record_decode_error(&e),
                Ok(Some(Err(e))) | Err(e) => run.fail_transport(&e, true),
                Ok(None) => {
                    if !self.settings.implicit_completion {
                        warn!("Stream closed without a terminal record");
                    }
                    run.end_of_stream(self.settings.implicit_completion);
                }
            }

            self.publish(run);
            if run.state().is_terminal() {
                break;
            }
        }
    }

    /// Register a new run, cancelling any previous one, and publish its empty snapshot.
    fn begin(&self, run_id: Uuid, ticker: &str) -> CancellationToken {
        let cancel = CancellationToken::new();
        match self.active.lock() {
            Ok(mut active) => {
                if let Some(previous) = active.take() {
                    warn!(previous = %previous.run_id, "Superseding run still in flight");
                    previous.cancel.cancel();
                }
                *active = Some(ActiveRun {
                    run_id,
                    cancel: cancel.clone(),
                });
                self.snapshot_tx
                    .send_replace(Arc::new(RunSnapshot::started(run_id, ticker)));
            }
            Err(e) => {
                error!(error = %e, "Active run lock poisoned");
            }
        }
        cancel
    }

    /// Swap in the run's snapshot if it is still the current run.
    fn publish(&self, run: &Run) -> bool {
        let snapshot = Arc::new(run.snapshot().clone());
        self.snapshot_tx.send_if_modified(move |current| {
            if current.run_id != snapshot.run_id {
                return false;
            }
            *current = snapshot;
            true
        })
    }

    fn finish(&self, run: Run) -> Arc<RunSnapshot> {
        self.publish(&run);
        if let Ok(mut active) = self.active.lock() {
            if active
                .as_ref()
                .is_some_and(|a| a.run_id == run.snapshot().run_id)
            {
                *active = None;
            }
        }
        Arc::new(run.snapshot)
    }
}

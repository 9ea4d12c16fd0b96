//! The poll loop: registry load, per-cycle reads, batched submission and
//! heartbeats.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use scadalink_agent_framework::{
    AgentError, CentralApi, HeartbeatSchedule, Reading, Result, SystemProbe, Tag,
};

use crate::config::ModbusAgentConfig;
use crate::decoder::{UnknownClassPolicy, read_tag};
use crate::transport::{ModbusTransport, TransportError};

/// Version reported in heartbeats.
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Tunables for the poll loop.
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub plc_id: u32,
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
    pub batch_size: usize,
    pub unknown_class: UnknownClassPolicy,
}

impl PollSettings {
    pub fn from_config(config: &ModbusAgentConfig) -> Self {
        Self {
            plc_id: config.plc.plc_id,
            poll_interval: Duration::from_secs(config.agent.poll_interval_secs),
            heartbeat_interval: Duration::from_secs(config.agent.heartbeat_interval_secs),
            batch_size: config.agent.batch_size,
            unknown_class: config.agent.unknown_tag_class,
        }
    }
}

/// Where the agent is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    Connecting,
    Polling,
    Submitting,
    Sleeping,
    Stopped,
}

/// Summary of one completed poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Readings produced, good and bad.
    pub readings: usize,
    pub bad_readings: usize,
    pub batches_submitted: usize,
    /// Batches the API did not accept. These are dropped, not retried.
    pub batches_failed: usize,
    /// The cycle stopped early because shutdown was requested.
    pub interrupted: bool,
}

/// Drives one controller through repeated poll cycles.
///
/// A cycle opens the transport, reads every tag in registry order,
/// submits readings in batches of at most `batch_size` as they fill, then
/// closes the transport. Cycles start every `poll_interval` unless a cycle
/// overruns, in which case the next one starts immediately.
pub struct Scheduler<T, A> {
    transport: T,
    api: A,
    settings: PollSettings,
    probe: SystemProbe,
    heartbeat: HeartbeatSchedule,
    started: Instant,
    state: AgentState,
}

impl<T: ModbusTransport, A: CentralApi> Scheduler<T, A> {
    pub fn new(transport: T, api: A, settings: PollSettings) -> Self {
        let heartbeat = HeartbeatSchedule::new(settings.heartbeat_interval);
        Self {
            transport,
            api,
            settings,
            probe: SystemProbe::new(),
            heartbeat,
            started: Instant::now(),
            state: AgentState::Idle,
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run until shutdown is requested or the registry cannot be loaded.
    ///
    /// The transport is closed on every exit path.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let result = self.run_loop(&mut shutdown).await;

        self.transport.close().await;
        self.set_state(AgentState::Stopped);

        match &result {
            Ok(()) => info!(plc_id = self.settings.plc_id, "Poll loop stopped"),
            Err(e) => error!(plc_id = self.settings.plc_id, error = %e, "Poll loop aborted"),
        }
        result
    }

    async fn run_loop(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<()> {
        info!(
            plc_id = self.settings.plc_id,
            interval_secs = self.settings.poll_interval.as_secs(),
            batch_size = self.settings.batch_size,
            "Starting poll loop"
        );

        self.send_heartbeat().await;
        let tags = self.load_registry().await?;

        loop {
            if stop_requested(shutdown) {
                break;
            }

            let cycle_start = Instant::now();
            match self.poll_cycle(&tags, shutdown).await {
                Ok(report) => {
                    info!(
                        readings = report.readings,
                        bad = report.bad_readings,
                        batches = report.batches_submitted,
                        failed_batches = report.batches_failed,
                        elapsed_ms = cycle_start.elapsed().as_millis() as u64,
                        "Poll cycle complete"
                    );
                    if report.interrupted {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to connect to controller");
                    self.set_state(AgentState::Sleeping);
                    if sleep_or_stop(self.settings.poll_interval, shutdown).await {
                        break;
                    }
                    continue;
                }
            }

            if self.heartbeat.is_due(Instant::now()) {
                self.send_heartbeat().await;
            }

            let remaining = self
                .settings
                .poll_interval
                .saturating_sub(cycle_start.elapsed());
            if remaining.is_zero() {
                debug!("Cycle overran poll interval, starting next cycle immediately");
            }
            self.set_state(AgentState::Sleeping);
            if sleep_or_stop(remaining, shutdown).await {
                break;
            }
        }

        Ok(())
    }

    /// Fetch the tag registry for this controller. An empty registry is an
    /// error: there is nothing to poll.
    pub async fn load_registry(&self) -> Result<Vec<Tag>> {
        let tags = self
            .api
            .fetch_tags(self.settings.plc_id)
            .await
            .map_err(|e| AgentError::registry(format!("failed to load tag registry: {}", e)))?;

        if tags.is_empty() {
            return Err(AgentError::registry(format!(
                "no tags configured for PLC {}",
                self.settings.plc_id
            )));
        }

        info!(plc_id = self.settings.plc_id, count = tags.len(), "Loaded tag registry");
        Ok(tags)
    }

    /// Run a single poll cycle over `tags`.
    ///
    /// Fails only when the connection cannot be opened. Shutdown is checked
    /// before each tag; readings gathered so far are still submitted.
    pub async fn poll_cycle(
        &mut self,
        tags: &[Tag],
        shutdown: &watch::Receiver<bool>,
    ) -> std::result::Result<CycleReport, TransportError> {
        self.set_state(AgentState::Connecting);
        if let Err(e) = self.transport.connect().await {
            self.transport.close().await;
            return Err(e);
        }

        self.set_state(AgentState::Polling);
        let policy = self.settings.unknown_class;
        let batch_size = self.settings.batch_size.max(1);
        let mut report = CycleReport::default();
        let mut batch: Vec<Reading> = Vec::with_capacity(batch_size.min(tags.len()));

        for tag in tags {
            if stop_requested(shutdown) {
                info!(
                    read = report.readings,
                    total = tags.len(),
                    "Shutdown requested, ending cycle early"
                );
                report.interrupted = true;
                break;
            }

            let reading = read_tag(&mut self.transport, tag, policy).await;
            report.readings += 1;
            if !reading.is_good() {
                report.bad_readings += 1;
            }
            batch.push(reading);

            if batch.len() >= batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                self.submit(full, &mut report).await;
            }
        }

        if !batch.is_empty() {
            self.submit(batch, &mut report).await;
        }

        self.transport.close().await;
        Ok(report)
    }

    /// Send a heartbeat, returning whether it was accepted.
    pub async fn send_heartbeat(&mut self) -> bool {
        let heartbeat = self.probe.heartbeat(AGENT_VERSION, self.started.elapsed());
        match self.api.send_heartbeat(&heartbeat).await {
            Ok(()) => {
                self.heartbeat.record_success(Instant::now());
                debug!(
                    cpu = heartbeat.cpu_usage,
                    memory = heartbeat.memory_usage,
                    "Heartbeat sent"
                );
                true
            }
            Err(e) => {
                warn!(error = %e, "Heartbeat failed");
                false
            }
        }
    }

    async fn submit(&mut self, batch: Vec<Reading>, report: &mut CycleReport) {
        self.set_state(AgentState::Submitting);

        match self.api.submit_readings(self.settings.plc_id, &batch).await {
            Ok(result) if result.is_partial() => {
                report.batches_submitted += 1;
                warn!(
                    submission_id = ?result.submission_id,
                    processed = result.processed,
                    errors = result.errors,
                    details = ?result.error_details,
                    "Submission partially rejected"
                );
            }
            Ok(result) => {
                report.batches_submitted += 1;
                info!(
                    count = batch.len(),
                    submission_id = ?result.submission_id,
                    "Submitted readings"
                );
            }
            Err(e) => {
                report.batches_failed += 1;
                error!(count = batch.len(), error = %e, "Submission failed, dropping batch");
            }
        }

        self.set_state(AgentState::Polling);
    }

    fn set_state(&mut self, state: AgentState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "State change");
            self.state = state;
        }
    }
}

fn stop_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// Sleep for `duration` unless shutdown is requested first. Returns `true`
/// when the caller should stop.
async fn sleep_or_stop(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if stop_requested(shutdown) {
        return true;
    }
    if duration.is_zero() {
        return false;
    }

    let deadline = Instant::now() + duration;
    tokio::select! {
        _ = tokio::time::sleep_until(deadline) => false,
        changed = shutdown.wait_for(|stop| *stop) => match changed {
            Ok(_) => true,
            // Sender gone: nobody can ask us to stop any more
            Err(_) => {
                tokio::time::sleep_until(deadline).await;
                false
            }
        },
    }
}

//! Scripted controller and recording central API shared by the
//! integration tests.
//!
//! Both write to a common [`Timeline`] so tests can assert on the order
//! and (virtual) timing of everything the agent did.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use scadalink_agent_framework::{
    AgentError, CentralApi, Encoding, Heartbeat, Reading, Result, SubmitReport, Tag, TagClass,
};
use scadalink_agent_modbus::{ModbusTransport, TransportError};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Heartbeat,
    FetchTags,
    Connect,
    ConnectFailed,
    Read { table: &'static str, offset: u16 },
    Close,
    Submit(usize),
}

/// Ordered log of agent activity with offsets from test start.
#[derive(Clone)]
pub struct Timeline {
    origin: Instant,
    events: Arc<Mutex<Vec<(Duration, Event)>>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            events: Arc::default(),
        }
    }

    pub fn push(&self, event: Event) {
        let at = self.origin.elapsed();
        self.events.lock().unwrap().push((at, event));
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Whole-second offsets at which events matching `pred` happened.
    pub fn seconds_of(&self, pred: impl Fn(&Event) -> bool) -> Vec<u64> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e)| pred(e))
            .map(|(at, _)| at.as_secs())
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|(_, e)| pred(e)).count()
    }
}

#[derive(Default)]
struct PlcState {
    holding: HashMap<u16, u16>,
    discrete: HashMap<u16, bool>,
    coils: HashMap<u16, bool>,
    connect_failures: usize,
    read_delay: Duration,
    stop_after: Option<(usize, watch::Sender<bool>)>,
    reads: usize,
    connected: bool,
    disconnects: usize,
}

/// In-memory controller implementing [`ModbusTransport`].
///
/// Reads of unmapped addresses fail with an `IllegalDataAddress`
/// exception, like a real device would.
#[derive(Clone)]
pub struct MockPlc {
    state: Arc<Mutex<PlcState>>,
    timeline: Timeline,
}

impl MockPlc {
    pub fn new(timeline: &Timeline) -> Self {
        Self {
            state: Arc::default(),
            timeline: timeline.clone(),
        }
    }

    pub fn with_holding(self, offset: u16, regs: &[u16]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for (i, reg) in regs.iter().enumerate() {
                state.holding.insert(offset + i as u16, *reg);
            }
        }
        self
    }

    pub fn with_discrete(self, offset: u16, on: bool) -> Self {
        self.state.lock().unwrap().discrete.insert(offset, on);
        self
    }

    pub fn with_coil(self, offset: u16, on: bool) -> Self {
        self.state.lock().unwrap().coils.insert(offset, on);
        self
    }

    /// Refuse the next `n` connection attempts.
    pub fn failing_connects(self, n: usize) -> Self {
        self.state.lock().unwrap().connect_failures = n;
        self
    }

    /// Every read takes `delay` of (virtual) time.
    pub fn read_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().read_delay = delay;
        self
    }

    /// Flip the shutdown flag once `reads` reads have completed.
    pub fn stop_after_reads(self, reads: usize, shutdown: watch::Sender<bool>) -> Self {
        self.state.lock().unwrap().stop_after = Some((reads, shutdown));
        self
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    /// Number of times an open connection was closed.
    pub fn disconnects(&self) -> usize {
        self.state.lock().unwrap().disconnects
    }

    fn begin_read(&self, table: &'static str, offset: u16) -> std::result::Result<Duration, TransportError> {
        let state = self.state.lock().unwrap();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        self.timeline.push(Event::Read { table, offset });
        Ok(state.read_delay)
    }

    async fn wait(delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn finish_read<V>(
        &self,
        lookup: impl FnOnce(&PlcState) -> Option<V>,
    ) -> std::result::Result<V, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        let result = lookup(&state)
            .ok_or_else(|| TransportError::Exception("IllegalDataAddress".to_string()));

        if let Some((after, tx)) = &state.stop_after {
            if state.reads >= *after {
                let _ = tx.send(true);
            }
        }
        result
    }
}

impl ModbusTransport for MockPlc {
    async fn connect(&mut self) -> std::result::Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            self.timeline.push(Event::ConnectFailed);
            return Err(TransportError::Connect("connection refused".to_string()));
        }
        state.connected = true;
        self.timeline.push(Event::Connect);
        Ok(())
    }

    async fn read_holding_registers(
        &mut self,
        offset: u16,
        count: u16,
    ) -> std::result::Result<Vec<u16>, TransportError> {
        let delay = self.begin_read("holding", offset)?;
        Self::wait(delay).await;
        self.finish_read(|state| {
            (offset..offset + count)
                .map(|addr| state.holding.get(&addr).copied())
                .collect()
        })
    }

    async fn read_discrete_inputs(
        &mut self,
        offset: u16,
        count: u16,
    ) -> std::result::Result<Vec<bool>, TransportError> {
        let delay = self.begin_read("discrete", offset)?;
        Self::wait(delay).await;
        self.finish_read(|state| {
            (offset..offset + count)
                .map(|addr| state.discrete.get(&addr).copied())
                .collect()
        })
    }

    async fn read_coils(
        &mut self,
        offset: u16,
        count: u16,
    ) -> std::result::Result<Vec<bool>, TransportError> {
        let delay = self.begin_read("coil", offset)?;
        Self::wait(delay).await;
        self.finish_read(|state| {
            (offset..offset + count)
                .map(|addr| state.coils.get(&addr).copied())
                .collect()
        })
    }

    async fn close(&mut self) {
        let mut state = self.state.lock().unwrap();
        if state.connected {
            state.connected = false;
            state.disconnects += 1;
            self.timeline.push(Event::Close);
        }
    }

    fn is_connected(&self) -> bool {
        MockPlc::is_connected(self)
    }
}

/// Central API double that records everything it is sent.
#[derive(Clone)]
pub struct RecordingApi {
    tags: Vec<Tag>,
    registry_down: bool,
    failing_heartbeats: Arc<Mutex<usize>>,
    failing_submissions: Arc<Mutex<usize>>,
    heartbeats: Arc<Mutex<Vec<Heartbeat>>>,
    submissions: Arc<Mutex<Vec<Vec<Reading>>>>,
    timeline: Timeline,
}

impl RecordingApi {
    pub fn new(timeline: &Timeline, tags: Vec<Tag>) -> Self {
        Self {
            tags,
            registry_down: false,
            failing_heartbeats: Arc::default(),
            failing_submissions: Arc::default(),
            heartbeats: Arc::default(),
            submissions: Arc::default(),
            timeline: timeline.clone(),
        }
    }

    pub fn registry_down(mut self) -> Self {
        self.registry_down = true;
        self
    }

    pub fn failing_heartbeats(self, n: usize) -> Self {
        *self.failing_heartbeats.lock().unwrap() = n;
        self
    }

    pub fn failing_submissions(self, n: usize) -> Self {
        *self.failing_submissions.lock().unwrap() = n;
        self
    }

    /// Accepted heartbeats.
    pub fn heartbeats(&self) -> Vec<Heartbeat> {
        self.heartbeats.lock().unwrap().clone()
    }

    /// Accepted submissions, one entry per batch.
    pub fn submissions(&self) -> Vec<Vec<Reading>> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.submissions().iter().map(Vec::len).collect()
    }
}

fn take_failure(counter: &Mutex<usize>) -> bool {
    let mut remaining = counter.lock().unwrap();
    if *remaining > 0 {
        *remaining -= 1;
        true
    } else {
        false
    }
}

impl CentralApi for RecordingApi {
    async fn fetch_tags(&self, _plc_id: u32) -> Result<Vec<Tag>> {
        self.timeline.push(Event::FetchTags);
        if self.registry_down {
            return Err(AgentError::Http {
                action: "get_tags",
                message: "HTTP 500: Database error".to_string(),
            });
        }
        Ok(self.tags.clone())
    }

    async fn send_heartbeat(&self, heartbeat: &Heartbeat) -> Result<()> {
        self.timeline.push(Event::Heartbeat);
        if take_failure(&self.failing_heartbeats) {
            return Err(AgentError::Api {
                action: "heartbeat",
                message: "Agent disabled".to_string(),
            });
        }
        self.heartbeats.lock().unwrap().push(heartbeat.clone());
        Ok(())
    }

    async fn submit_readings(&self, _plc_id: u32, readings: &[Reading]) -> Result<SubmitReport> {
        self.timeline.push(Event::Submit(readings.len()));
        if take_failure(&self.failing_submissions) {
            return Err(AgentError::Http {
                action: "submit_data",
                message: "HTTP 503: Service Unavailable".to_string(),
            });
        }
        self.submissions.lock().unwrap().push(readings.to_vec());
        Ok(SubmitReport {
            submission_id: Some(self.submissions.lock().unwrap().len() as u64),
            total_readings: readings.len() as u64,
            processed: readings.len() as u64,
            ..SubmitReport::default()
        })
    }
}

pub fn analog(name: &str, address: u32, encoding: Encoding) -> Tag {
    Tag::new(name, address, TagClass::AnalogInput, encoding)
}

pub fn digital_in(name: &str, address: u32) -> Tag {
    Tag::new(name, address, TagClass::DigitalInput, Encoding::Uint16)
}

pub fn digital_out(name: &str, address: u32) -> Tag {
    Tag::new(name, address, TagClass::DigitalOutput, Encoding::Uint16)
}

/// `n` uint16 analog tags at consecutive holding addresses from 40001.
pub fn analog_bank(n: u16) -> Vec<Tag> {
    (0..n)
        .map(|i| analog(&format!("AI-{}", i + 1), 40001 + i as u32, Encoding::Uint16))
        .collect()
}

/// Shutdown receiver that flips to `true` after `secs` of virtual time.
pub fn shutdown_after(secs: u64) -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(secs)).await;
        let _ = tx.send(true);
    });
    rx
}

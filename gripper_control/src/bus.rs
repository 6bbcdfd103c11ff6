//! Bus seams: command ingestion and outbound sinks.
//!
//! The wire format and transport of the robot bus are a collaborator's
//! concern. The engine consumes three narrow traits; in-process mpsc
//! implementations ship here for the test suites and `--simulate` runs.
//!
//! Commands are values, not callbacks: ingestion drains whatever is pending
//! and keeps only the newest message, and the control loop polls once per
//! cycle. No bus thread ever touches shared state.

use std::sync::mpsc;

use tracing::trace;

use gripper_common::command::JointCommand;
use gripper_common::telemetry::{ControlTelemetry, GripperStateMessage};

// ─── Traits ─────────────────────────────────────────────────────────

/// Inbound command topic.
pub trait CommandSource: Send {
    /// Non-blocking drain: the newest pending command, discarding older
    /// ones unacknowledged. `None` when nothing arrived since last poll.
    fn poll_latest(&mut self) -> Option<JointCommand>;
}

/// Robot-facing state topic (200 Hz).
pub trait StateSink: Send {
    /// Fire-and-forget publish; the bus has no delivery guarantees here.
    fn publish(&mut self, msg: &GripperStateMessage);
}

/// Internal telemetry topic (30 Hz).
pub trait TelemetrySink: Send {
    fn publish(&mut self, record: &ControlTelemetry);
}

/// The three endpoints the supervisor wires into the threads.
pub struct BusEndpoints {
    pub commands: Box<dyn CommandSource>,
    pub state: Box<dyn StateSink>,
    pub telemetry: Box<dyn TelemetrySink>,
}

// ─── In-process channel implementations ─────────────────────────────

/// mpsc-backed command source.
pub struct ChannelCommandSource {
    rx: mpsc::Receiver<JointCommand>,
}

impl CommandSource for ChannelCommandSource {
    fn poll_latest(&mut self) -> Option<JointCommand> {
        let mut latest = None;
        while let Ok(cmd) = self.rx.try_recv() {
            latest = Some(cmd);
        }
        latest
    }
}

/// Command channel pair.
pub fn command_channel() -> (mpsc::Sender<JointCommand>, ChannelCommandSource) {
    let (tx, rx) = mpsc::channel();
    (tx, ChannelCommandSource { rx })
}

/// mpsc-backed state sink. A disconnected receiver is not an error — the
/// publisher keeps its cadence regardless of listeners.
pub struct ChannelStateSink {
    tx: mpsc::Sender<GripperStateMessage>,
}

impl StateSink for ChannelStateSink {
    fn publish(&mut self, msg: &GripperStateMessage) {
        if self.tx.send(*msg).is_err() {
            trace!("state listener gone; dropping message");
        }
    }
}

/// State channel pair.
pub fn state_channel() -> (ChannelStateSink, mpsc::Receiver<GripperStateMessage>) {
    let (tx, rx) = mpsc::channel();
    (ChannelStateSink { tx }, rx)
}

/// mpsc-backed telemetry sink.
pub struct ChannelTelemetrySink {
    tx: mpsc::Sender<ControlTelemetry>,
}

impl TelemetrySink for ChannelTelemetrySink {
    fn publish(&mut self, record: &ControlTelemetry) {
        if self.tx.send(*record).is_err() {
            trace!("telemetry listener gone; dropping record");
        }
    }
}

/// Telemetry channel pair.
pub fn telemetry_channel() -> (ChannelTelemetrySink, mpsc::Receiver<ControlTelemetry>) {
    let (tx, rx) = mpsc::channel();
    (ChannelTelemetrySink { tx }, rx)
}

//! Shared record of recent bus traffic and gateway liveness.
//!
//! The dispatcher, the inbound decoder, and the watchdog all look at the
//! same traffic picture: which frames went out recently (for echo
//! suppression), which frames came in recently (for command
//! confirmation), and when the last valid frame arrived (for quiet-window
//! gating and the silence watchdog).

use std::collections::HashSet;
use std::time::Duration;

use parking_lot::Mutex;
// tokio's Instant so that tests driving the watchdog can pause and
// advance time.
use tokio::time::Instant;

/// How many sent and received frames are remembered, each.
///
/// Eviction order is arbitrary; the sets only need to cover the last few
/// report bursts, and on a bus this slow 100 frames is several seconds of
/// traffic.
pub const RECENT_FRAME_CAP: usize = 100;

#[derive(Default)]
struct RecentFrames {
    sent: HashSet<String>,
    received: HashSet<String>,
}

fn insert_capped(set: &mut HashSet<String>, frame_hex: String) {
    if set.len() >= RECENT_FRAME_CAP {
        if let Some(victim) = set.iter().next().cloned() {
            set.remove(&victim);
        }
    }
    set.insert(frame_hex);
}

/// Recent traffic and liveness, shared across tasks behind an `Arc`.
pub struct TrafficLog {
    frames: Mutex<RecentFrames>,
    last_valid_rx: Mutex<Instant>,
}

impl TrafficLog {
    /// New log; the gateway counts as alive at creation time.
    pub fn new() -> Self {
        TrafficLog {
            frames: Mutex::new(RecentFrames::default()),
            last_valid_rx: Mutex::new(Instant::now()),
        }
    }

    /// Remember a frame the bridge just sent.
    pub fn record_sent(&self, frame_hex: &str) {
        insert_capped(&mut self.frames.lock().sent, frame_hex.to_string());
    }

    /// Remember a frame seen on the bus.
    pub fn record_received(&self, frame_hex: &str) {
        insert_capped(&mut self.frames.lock().received, frame_hex.to_string());
    }

    /// Whether the bridge itself sent this frame recently. Serial
    /// gateways echo outbound bytes back on the receive side; echoes must
    /// not be decoded as device reports.
    pub fn sent_recently(&self, frame_hex: &str) -> bool {
        self.frames.lock().sent.contains(frame_hex)
    }

    /// Snapshot of recently received frames, order unspecified.
    pub fn recent_received(&self) -> Vec<String> {
        self.frames.lock().received.iter().cloned().collect()
    }

    /// Note that a checksum-valid frame just arrived.
    pub fn mark_valid_rx(&self) {
        *self.last_valid_rx.lock() = Instant::now();
    }

    /// Time since the last checksum-valid inbound frame.
    pub fn silence(&self) -> Duration {
        self.last_valid_rx.lock().elapsed()
    }
}

impl Default for TrafficLog {
    fn default() -> Self {
        TrafficLog::new()
    }
}

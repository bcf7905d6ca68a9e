//! Command dispatch queue with confirmation-driven retry.
//!
//! The bus gives no acknowledgements, so delivery is probabilistic: a
//! queued command is resent every tick until enough inbound state frames
//! match its prediction, or until the send budget runs out. Commands
//! without a prediction are resent on the same budget without any
//! confirmation check.

use std::collections::VecDeque;

use tracing::{debug, info, warn};
use wallpad_protocol::{ExpectedState, Frame};

/// Sink for outbound command frames.
///
/// The production implementation publishes to the serial gateway's MQTT
/// send topic; tests substitute an in-memory recorder.
pub trait FramePublisher {
    /// Hand one frame to the gateway. Must not block.
    fn publish_frame(&self, frame: &Frame) -> anyhow::Result<()>;
}

/// One command awaiting delivery confirmation.
#[derive(Debug, Clone)]
struct PendingCommand {
    frame: Frame,
    expected: Option<ExpectedState>,
    sends: u32,
    confirms: u32,
}

/// What one dispatch tick did. Every outcome except `Idle` and
/// `PublishFailed` put the frame on the wire first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Queue was empty.
    Idle,
    /// Head command was sent, then accumulated enough matching frames
    /// and was dropped.
    Confirmed(Frame),
    /// Head command was sent and exhausted its budget unconfirmed; it
    /// was dropped.
    Abandoned(Frame),
    /// Head command was sent and requeued at the front for another
    /// attempt.
    Requeued(Frame),
    /// The publisher failed; the command stays at the front with its send
    /// budget untouched.
    PublishFailed(Frame),
}

/// FIFO of pending commands, one dispatch attempt per tick.
pub struct CommandQueue {
    pending: VecDeque<PendingCommand>,
    confirm_threshold: u32,
    max_sends: u32,
}

impl CommandQueue {
    /// New queue with the given confirmation threshold and send budget.
    pub fn new(confirm_threshold: u32, max_sends: u32) -> Self {
        CommandQueue {
            pending: VecDeque::new(),
            confirm_threshold,
            max_sends,
        }
    }

    /// Append a command. `expected` of `None` selects fire-and-hope.
    pub fn enqueue(&mut self, frame: Frame, expected: Option<ExpectedState>) {
        debug!(frame = %frame, confirmed = expected.is_some(), "command queued");
        self.pending.push_back(PendingCommand {
            frame,
            expected,
            sends: 0,
            confirms: 0,
        });
    }

    /// Number of pending commands.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no commands are pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Run one dispatch tick against the current set of recently received
    /// frames.
    ///
    /// The head command is published first, every tick; only then is the
    /// received window scanned. Stale reports can therefore contribute to
    /// confirmation, but never spare the command its transmission. The
    /// confirmation count is cumulative across ticks; the set is a
    /// deduplicated window, so each tick credits the distinct matching
    /// frames currently visible.
    pub fn tick(
        &mut self,
        publisher: &dyn FramePublisher,
        recent_received: &[String],
    ) -> TickOutcome {
        let Some(mut command) = self.pending.pop_front() else {
            return TickOutcome::Idle;
        };

        if let Err(e) = publisher.publish_frame(&command.frame) {
            warn!(frame = %command.frame, error = %e, "publish failed, will retry");
            let frame = command.frame;
            self.pending.push_front(command);
            return TickOutcome::PublishFailed(frame);
        }
        command.sends += 1;

        if let Some(expected) = &command.expected {
            let matching = recent_received
                .iter()
                .filter(|f| expected.matches_hex(f))
                .count() as u32;
            command.confirms += matching;
            if command.confirms >= self.confirm_threshold {
                info!(
                    frame = %command.frame,
                    sends = command.sends,
                    confirms = command.confirms,
                    "command confirmed"
                );
                return TickOutcome::Confirmed(command.frame);
            }
        }

        if command.sends >= self.max_sends {
            warn!(
                frame = %command.frame,
                sends = command.sends,
                confirms = command.confirms,
                "command abandoned, send budget exhausted"
            );
            return TickOutcome::Abandoned(command.frame);
        }

        debug!(
            frame = %command.frame,
            sends = command.sends,
            confirms = command.confirms,
            "command requeued"
        );
        let frame = command.frame;
        self.pending.push_front(command);
        TickOutcome::Requeued(frame)
    }
}

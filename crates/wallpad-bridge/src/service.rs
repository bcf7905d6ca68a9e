//! The bridge service: one event loop tying transport, codec, queue, and
//! watchdog together.
//!
//! Inbound MQTT traffic is handled as it arrives; the dispatch tick runs
//! on a fixed interval and is gated on bus silence so commands never land
//! in the middle of a device report burst.

use std::sync::Arc;

use rumqttc::{Event, EventLoop, Packet, Publish};
use tracing::{debug, error, info, trace, warn};
use wallpad_protocol::{
    decode_state_frame, encode_command, predict_state, split_hex_frames, DeviceKind, Frame,
    SchemaSet,
};

use crate::config::BridgeConfig;
use crate::discovery::discovery_messages;
use crate::mqtt::MqttTransport;
use crate::queue::{CommandQueue, TickOutcome};
use crate::reboot::GatewayRebooter;
use crate::state::{build_command, state_messages, TopicScheme};
use crate::traffic::TrafficLog;
use crate::watchdog::{LogOnlyRecovery, RecoveryAction, SilenceWatchdog};

/// The assembled bridge.
pub struct BridgeService {
    config: BridgeConfig,
    schemas: SchemaSet,
    scheme: TopicScheme,
    traffic: Arc<TrafficLog>,
    queue: CommandQueue,
    transport: MqttTransport,
    watchdog: SilenceWatchdog,
    recovery: Box<dyn RecoveryAction>,
}

impl BridgeService {
    /// Assemble the service and its MQTT event loop.
    pub fn new(config: BridgeConfig, schemas: SchemaSet) -> (Self, EventLoop) {
        let (transport, eventloop) =
            MqttTransport::connect(&config.mqtt, &config.topics.gateway_prefix);
        let scheme = TopicScheme::new(config.topics.bridge_prefix.clone());
        let queue = CommandQueue::new(
            config.dispatch.confirm_threshold,
            config.dispatch.max_sends,
        );
        let watchdog = SilenceWatchdog::new(
            config.watchdog.silence_timeout(),
            config.watchdog.cooldown(),
        );
        let recovery: Box<dyn RecoveryAction> = if config.watchdog.auto_reboot {
            Box::new(GatewayRebooter::new(config.gateway.clone()))
        } else {
            Box::new(LogOnlyRecovery)
        };
        let service = BridgeService {
            config,
            schemas,
            scheme,
            traffic: Arc::new(TrafficLog::new()),
            queue,
            transport,
            watchdog,
            recovery,
        };
        (service, eventloop)
    }

    /// Run until the task is cancelled.
    pub async fn run(mut self, mut eventloop: EventLoop) -> anyhow::Result<()> {
        self.transport
            .subscribe(&self.scheme.command_wildcard())
            .await?;
        self.announce_devices();

        let mut ticker = tokio::time::interval(self.config.dispatch.queue_interval());
        loop {
            tokio::select! {
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        self.handle_publish(&publish);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "mqtt connection error, reconnecting");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                },
                _ = ticker.tick() => self.tick().await,
            }
        }
    }

    fn announce_devices(&self) {
        let messages = discovery_messages(
            &self.scheme,
            &self.config.climate,
            &self.config.topics.discovery_prefix,
            &self.config.devices,
        );
        info!(entities = messages.len(), "announcing devices");
        for (topic, payload) in messages {
            if let Err(e) = self.transport.publish_retained(&topic, &payload) {
                warn!(topic = %topic, error = %e, "discovery announcement failed");
            }
        }
    }

    fn handle_publish(&mut self, publish: &Publish) {
        if publish.topic == self.transport.recv_topic() {
            self.handle_bus_payload(&publish.payload);
        } else if publish.topic == self.transport.send_topic() {
            // Frames headed for the bus, from this process or any other
            // publisher; remembered so their echoes are not decoded.
            let raw = hex::encode_upper(&publish.payload);
            for frame_hex in split_hex_frames(&raw) {
                self.traffic.record_sent(frame_hex);
            }
        } else if let Some((device, index, attr)) = self.scheme.parse_command_topic(&publish.topic)
        {
            let payload = String::from_utf8_lossy(&publish.payload).into_owned();
            self.handle_command(device, index, &attr, &payload);
        } else {
            trace!(topic = %publish.topic, "ignoring unrelated topic");
        }
    }

    /// Process one chunk of raw bus bytes from the gateway.
    fn handle_bus_payload(&mut self, payload: &[u8]) {
        let raw = hex::encode_upper(payload);
        for frame_hex in split_hex_frames(&raw) {
            metrics::counter!("wallpad_frames_received_total").increment(1);
            let Ok(frame) = Frame::from_hex(frame_hex) else {
                continue;
            };
            if !frame.is_valid() {
                metrics::counter!("wallpad_frames_invalid_total").increment(1);
                debug!(target: "signal", frame = %frame, "checksum mismatch, dropping frame");
                continue;
            }
            self.traffic.mark_valid_rx();
            self.traffic.record_received(frame_hex);
            if self.traffic.sent_recently(frame_hex) {
                trace!(target: "signal", frame = %frame, "own frame echoed back, skipping");
                continue;
            }
            match decode_state_frame(&self.schemas, &frame) {
                Ok(Some(event)) => {
                    trace!(target: "signal", device = %event.device, index = event.index, "state decoded");
                    for (topic, payload) in state_messages(&self.scheme, &event) {
                        if let Err(e) = self.transport.publish_state(&topic, &payload) {
                            warn!(topic = %topic, error = %e, "state publish failed");
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(frame = %frame, error = %e, "cannot decode state frame"),
            }
        }
    }

    /// Translate and queue one control-plane command.
    fn handle_command(&mut self, device: DeviceKind, index: u8, attr: &str, payload: &str) {
        metrics::counter!("wallpad_commands_received_total").increment(1);
        let request = match build_command(&self.config.climate, device, index, attr, payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(%device, index, attr, payload, error = %e, "rejected command");
                return;
            }
        };
        let frame = match encode_command(&self.schemas, &request) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%device, index, error = %e, "cannot encode command");
                return;
            }
        };
        let expected = predict_state(&self.schemas, &frame);
        if expected.is_none() {
            debug!(frame = %frame, "no prediction available, sending unconfirmed");
        }
        self.queue.enqueue(frame, expected);
    }

    /// One dispatch tick: watchdog first, then at most one send, gated on
    /// bus silence.
    async fn tick(&mut self) {
        if self
            .watchdog
            .check(&self.traffic, self.recovery.as_ref())
            .await
        {
            return;
        }
        if self.queue.is_empty() {
            return;
        }
        if self.traffic.silence() < self.config.dispatch.quiet_interval() {
            return;
        }
        let recent = self.traffic.recent_received();
        // Every outcome below except Idle/PublishFailed put a frame on
        // the wire this tick.
        match self.queue.tick(&self.transport, &recent) {
            TickOutcome::Requeued(frame) => {
                self.traffic.record_sent(&frame.to_hex());
                metrics::counter!("wallpad_frames_sent_total").increment(1);
            }
            TickOutcome::Confirmed(frame) => {
                self.traffic.record_sent(&frame.to_hex());
                metrics::counter!("wallpad_frames_sent_total").increment(1);
                metrics::counter!("wallpad_commands_confirmed_total").increment(1);
            }
            TickOutcome::Abandoned(frame) => {
                self.traffic.record_sent(&frame.to_hex());
                metrics::counter!("wallpad_frames_sent_total").increment(1);
                metrics::counter!("wallpad_commands_abandoned_total").increment(1);
            }
            TickOutcome::Idle | TickOutcome::PublishFailed(_) => {}
        }
    }
}

//! MQTT transport.
//!
//! One client serves all three surfaces: the serial gateway's raw topics,
//! the bridge's own state/command topics, and the controller's discovery
//! tree. Outbound command frames go to the gateway as raw bytes, exactly
//! as they must appear on the RS485 wire.

use anyhow::Context;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use std::time::Duration;
use tracing::info;
use wallpad_protocol::Frame;

use crate::config::MqttSettings;
use crate::queue::FramePublisher;

const CHANNEL_CAPACITY: usize = 64;

/// MQTT client wrapper bound to one gateway prefix.
pub struct MqttTransport {
    client: AsyncClient,
    send_topic: String,
    recv_topic: String,
}

impl MqttTransport {
    /// Create the client and its event loop. The connection is
    /// established lazily by polling the returned event loop.
    pub fn connect(settings: &MqttSettings, gateway_prefix: &str) -> (Self, EventLoop) {
        let mut options = MqttOptions::new(
            settings.client_id.clone(),
            settings.broker_host.clone(),
            settings.broker_port,
        );
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            options.set_credentials(user.clone(), pass.clone());
        }
        let (client, eventloop) = AsyncClient::new(options, CHANNEL_CAPACITY);
        info!(
            broker = %settings.broker_host,
            port = settings.broker_port,
            "mqtt client created"
        );
        let transport = MqttTransport {
            client,
            send_topic: format!("{gateway_prefix}/send"),
            recv_topic: format!("{gateway_prefix}/recv"),
        };
        (transport, eventloop)
    }

    /// Topic the gateway publishes inbound bus bytes on.
    pub fn recv_topic(&self) -> &str {
        &self.recv_topic
    }

    /// Topic outbound frames are sent to the gateway on.
    pub fn send_topic(&self) -> &str {
        &self.send_topic
    }

    /// Subscribe to the gateway receive topic, the outbound echo topic,
    /// and the command wildcard. The echo subscription records frames
    /// sent by any publisher, not just this process.
    pub async fn subscribe(&self, command_wildcard: &str) -> anyhow::Result<()> {
        self.client
            .subscribe(&self.recv_topic, QoS::AtMostOnce)
            .await
            .context("cannot subscribe to gateway receive topic")?;
        self.client
            .subscribe(&self.send_topic, QoS::AtMostOnce)
            .await
            .context("cannot subscribe to gateway send topic")?;
        self.client
            .subscribe(command_wildcard, QoS::AtLeastOnce)
            .await
            .context("cannot subscribe to command topics")?;
        Ok(())
    }

    /// Publish a state payload, not retained.
    pub fn publish_state(&self, topic: &str, payload: &str) -> anyhow::Result<()> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes())
            .with_context(|| format!("cannot publish state to {topic}"))
    }

    /// Publish a retained document (discovery configs).
    pub fn publish_retained(&self, topic: &str, payload: &str) -> anyhow::Result<()> {
        self.client
            .try_publish(topic, QoS::AtLeastOnce, true, payload.as_bytes())
            .with_context(|| format!("cannot publish retained document to {topic}"))
    }
}

impl FramePublisher for MqttTransport {
    fn publish_frame(&self, frame: &Frame) -> anyhow::Result<()> {
        self.client
            .try_publish(
                &self.send_topic,
                QoS::AtLeastOnce,
                false,
                frame.as_bytes().to_vec(),
            )
            .with_context(|| format!("cannot publish frame to {}", self.send_topic))
    }
}

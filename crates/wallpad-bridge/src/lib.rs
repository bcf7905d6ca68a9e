//! RS485 wallpad bus to MQTT bridge.
//!
//! A serial-to-network gateway (EW11 or similar) mirrors the apartment
//! wallpad's RS485 bus onto a pair of MQTT topics. This crate turns that
//! raw byte stream into per-device state topics a home automation
//! controller can consume, and turns controller commands back into bus
//! frames with confirmation-driven retry, since the bus itself never
//! acknowledges anything.
//!
//! The packet engine lives in `wallpad-protocol`; this crate adds the
//! transport, dispatch, discovery, and gateway health layers.

pub mod config;
pub mod discovery;
pub mod mqtt;
pub mod queue;
pub mod reboot;
pub mod service;
pub mod state;
pub mod traffic;
pub mod watchdog;

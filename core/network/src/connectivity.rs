//! Connectivity monitoring and network quality classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::watch;
use tracing::{debug, info};

use finpro_common::Error;

/// Downlink (Mbps) above which a top-tier link counts as fast.
const FAST_DOWNLINK_MBPS: f64 = 5.0;
/// Downlink (Mbps) below which any link counts as slow.
const SLOW_DOWNLINK_MBPS: f64 = 1.0;

/// Effective link type reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectiveType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    Cellular2g,
    #[serde(rename = "3g")]
    Cellular3g,
    #[serde(rename = "4g")]
    Cellular4g,
}

impl EffectiveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectiveType::Slow2g => "slow-2g",
            EffectiveType::Cellular2g => "2g",
            EffectiveType::Cellular3g => "3g",
            EffectiveType::Cellular4g => "4g",
        }
    }

    fn is_top_tier(&self) -> bool {
        matches!(self, EffectiveType::Cellular4g)
    }

    fn is_bottom_tier(&self) -> bool {
        matches!(self, EffectiveType::Slow2g | EffectiveType::Cellular2g)
    }
}

impl fmt::Display for EffectiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectiveType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "slow-2g" => Ok(EffectiveType::Slow2g),
            "2g" => Ok(EffectiveType::Cellular2g),
            "3g" => Ok(EffectiveType::Cellular3g),
            "4g" => Ok(EffectiveType::Cellular4g),
            other => Err(Error::InvalidInput(format!(
                "Unknown effective connection type: {}",
                other
            ))),
        }
    }
}

/// Network information snapshot. Every field is optional on the platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub effective_type: Option<EffectiveType>,
    /// Downlink estimate in Mbps.
    pub downlink: Option<f64>,
    /// Round-trip time estimate in milliseconds.
    pub rtt: Option<u32>,
    pub save_data: bool,
}

impl NetworkInfo {
    /// Latency class of the round-trip estimate, if any.
    pub fn latency(&self) -> Option<LatencyClass> {
        self.rtt.map(LatencyClass::from_rtt)
    }
}

/// Best-effort connection quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkQuality {
    Slow,
    #[default]
    Medium,
    Fast,
}

impl fmt::Display for NetworkQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NetworkQuality::Slow => "slow",
            NetworkQuality::Medium => "medium",
            NetworkQuality::Fast => "fast",
        })
    }
}

/// Classify a connection.
///
/// - no information: medium
/// - data saver: slow, regardless of anything else
/// - top-tier link with downlink above 5 Mbps: fast
/// - bottom-tier link or downlink below 1 Mbps: slow
/// - otherwise: medium
pub fn classify(info: Option<&NetworkInfo>) -> NetworkQuality {
    let Some(info) = info else {
        return NetworkQuality::Medium;
    };

    if info.save_data {
        return NetworkQuality::Slow;
    }

    let top_tier = info.effective_type.is_some_and(|t| t.is_top_tier());
    let bottom_tier = info.effective_type.is_some_and(|t| t.is_bottom_tier());

    if top_tier && info.downlink.is_some_and(|d| d > FAST_DOWNLINK_MBPS) {
        NetworkQuality::Fast
    } else if bottom_tier || info.downlink.is_some_and(|d| d < SLOW_DOWNLINK_MBPS) {
        NetworkQuality::Slow
    } else {
        NetworkQuality::Medium
    }
}

/// Round-trip latency bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LatencyClass {
    Low,
    Medium,
    High,
}

impl LatencyClass {
    pub fn from_rtt(rtt_ms: u32) -> Self {
        if rtt_ms < 100 {
            LatencyClass::Low
        } else if rtt_ms < 500 {
            LatencyClass::Medium
        } else {
            LatencyClass::High
        }
    }
}

impl fmt::Display for LatencyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LatencyClass::Low => "Low Latency",
            LatencyClass::Medium => "Medium Latency",
            LatencyClass::High => "High Latency",
        })
    }
}

/// Human-readable downlink speed.
pub fn format_speed(mbps: f64) -> String {
    if mbps < 1.0 {
        format!("{:.0} Kbps", mbps * 1000.0)
    } else {
        format!("{:.1} Mbps", mbps)
    }
}

/// Current connectivity as published by the monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityState {
    pub online: bool,
    pub quality: NetworkQuality,
    pub info: Option<NetworkInfo>,
}

impl ConnectivityState {
    fn new(online: bool) -> Self {
        Self {
            online,
            quality: classify(None),
            info: None,
        }
    }
}

/// Publishes the offline flag and network quality to any number of
/// observers. Clones share the same state.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<ConnectivityState>,
}

impl ConnectivityMonitor {
    /// Create a monitor with the given initial online flag.
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(ConnectivityState::new(online));
        Self { tx }
    }

    /// Record a platform online/offline event.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|state| {
            if state.online == online {
                return false;
            }
            state.online = online;
            true
        });

        if changed {
            if online {
                info!("Connectivity restored");
            } else {
                info!("Connectivity lost");
            }
        }
    }

    /// Record a network information change. `None` means the platform
    /// exposes no network information.
    pub fn update_network_info(&self, info: Option<NetworkInfo>) {
        self.tx.send_if_modified(|state| {
            let quality = classify(info.as_ref());
            if state.info == info && state.quality == quality {
                return false;
            }
            debug!(%quality, "Network quality updated");
            state.quality = quality;
            state.info = info;
            true
        });
    }

    pub fn is_offline(&self) -> bool {
        !self.tx.borrow().online
    }

    pub fn quality(&self) -> NetworkQuality {
        self.tx.borrow().quality
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> ConnectivityState {
        self.tx.borrow().clone()
    }

    /// Watch every state change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }

    /// Stream of offline-to-online transitions.
    pub fn restored_events(&self) -> RestoredEvents {
        let rx = self.tx.subscribe();
        let was_online = rx.borrow().online;
        RestoredEvents { rx, was_online }
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Yields once per offline-to-online transition.
pub struct RestoredEvents {
    rx: watch::Receiver<ConnectivityState>,
    was_online: bool,
}

impl RestoredEvents {
    /// Wait for the next transition. Returns `None` once the monitor is gone.
    pub async fn recv(&mut self) -> Option<()> {
        loop {
            self.rx.changed().await.ok()?;
            let online = self.rx.borrow_and_update().online;
            let restored = online && !self.was_online;
            self.was_online = online;
            if restored {
                return Some(());
            }
        }
    }
}

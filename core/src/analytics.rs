use std::collections::VecDeque;

use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};

/// Messages sent during one round (synchronous) or one event (asynchronous).
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct RoundPoint {
    pub time: u64,
    pub messages: u64,
}

/// Delivery outcomes and transit-time distribution of a simulation.
pub struct MessageStats {
    pub history: VecDeque<RoundPoint>,
    pub max_points: usize,
    transit: Histogram<u64>,
    delivered: u64,
    nacked: u64,
    dropped: u64,
}

impl MessageStats {
    pub fn new(max_points: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(max_points.min(4096)),
            max_points,
            transit: Histogram::new(3).expect("3 significant figures is a valid precision"),
            delivered: 0,
            nacked: 0,
            dropped: 0,
        }
    }

    pub fn record_round(&mut self, time: u64, messages: u64) {
        self.history.push_back(RoundPoint { time, messages });
        if self.history.len() > self.max_points {
            self.history.pop_front();
        }
    }

    pub fn record_delivery(&mut self, transit_time: u64) {
        self.delivered += 1;
        self.transit.saturating_record(transit_time);
    }

    pub fn record_nack(&mut self) {
        self.nacked += 1;
    }

    pub fn record_drop(&mut self) {
        self.dropped += 1;
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn nacked(&self) -> u64 {
        self.nacked
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Transit time at percentile `p` (0-100) over all delivered packets.
    pub fn transit_percentile(&self, p: f64) -> Option<u64> {
        if self.transit.is_empty() {
            return None;
        }
        Some(self.transit.value_at_quantile(p / 100.0))
    }

    pub fn mean_transit(&self) -> Option<f64> {
        (!self.transit.is_empty()).then(|| self.transit.mean())
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.transit.reset();
        self.delivered = 0;
        self.nacked = 0;
        self.dropped = 0;
    }
}

impl Default for MessageStats {
    fn default() -> Self {
        Self::new(10_000)
    }
}

/// Outcome of a `run` call, suitable for printing as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub steps: u64,
    pub current_time: u64,
    pub messages_over_all: u64,
    pub delivered: u64,
    pub nacked: u64,
    pub dropped: u64,
    pub transit_p50: Option<u64>,
    pub transit_p99: Option<u64>,
    pub terminated: bool,
}

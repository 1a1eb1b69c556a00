// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Suppression of our own publishes coming back from the broker.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Upper bound on remembered publishes; older ones are evicted first.
const MAX_ENTRIES: usize = 32;

#[derive(Debug)]
struct Entry {
    topic: String,
    payload: Vec<u8>,
    expires: Instant,
}

/// Remembers recent outbound publishes so their echoes can be dropped.
///
/// The controller subscribes to the same topic it reports state on, so each
/// status publish is delivered straight back to it. The notifier records
/// every publish here first, and the inbound handler consumes one matching
/// record per delivery instead of decoding it. Records expire after the
/// configured window in case the broker never echoes. A zero window turns
/// the filter off.
#[derive(Debug)]
pub struct EchoFilter {
    window: Duration,
    entries: Mutex<VecDeque<Entry>>,
}

impl EchoFilter {
    /// Creates a filter that remembers publishes for `window`.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Returns the echo window.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Records a publish made now.
    pub fn remember(&self, topic: &str, payload: &[u8]) {
        self.remember_at(topic, payload, Instant::now());
    }

    /// Records a publish made at `now`.
    pub fn remember_at(&self, topic: &str, payload: &[u8], now: Instant) {
        if self.window.is_zero() {
            return;
        }
        let mut entries = self.entries.lock();
        purge(&mut entries, now);
        if entries.len() == MAX_ENTRIES {
            entries.pop_front();
        }
        entries.push_back(Entry {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            expires: now + self.window,
        });
    }

    /// Drops the newest record of a publish that never reached the broker.
    pub fn forget(&self, topic: &str, payload: &[u8]) {
        let mut entries = self.entries.lock();
        if let Some(index) = entries
            .iter()
            .rposition(|e| e.topic == topic && e.payload == payload)
        {
            entries.remove(index);
        }
    }

    /// Returns `true` and consumes the record if a delivery received now is
    /// an echo.
    pub fn take_echo(&self, topic: &str, payload: &[u8]) -> bool {
        self.take_echo_at(topic, payload, Instant::now())
    }

    /// Returns `true` and consumes the record if a delivery received at
    /// `now` is an echo.
    pub fn take_echo_at(&self, topic: &str, payload: &[u8], now: Instant) -> bool {
        let mut entries = self.entries.lock();
        purge(&mut entries, now);
        match entries
            .iter()
            .position(|e| e.topic == topic && e.payload == payload)
        {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Number of publishes currently awaiting their echo.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.entries.lock().len()
    }
}

fn purge(entries: &mut VecDeque<Entry>, now: Instant) {
    entries.retain(|e| e.expires > now);
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(2);

    #[test]
    fn echo_is_consumed_once() {
        let filter = EchoFilter::new(WINDOW);
        let t0 = Instant::now();

        filter.remember_at("lamp/status", b"on", t0);
        assert!(filter.take_echo_at("lamp/status", b"on", t0));
        assert!(!filter.take_echo_at("lamp/status", b"on", t0));
    }

    #[test]
    fn different_payload_is_not_an_echo() {
        let filter = EchoFilter::new(WINDOW);
        let t0 = Instant::now();

        filter.remember_at("lamp/status", b"on", t0);
        assert!(!filter.take_echo_at("lamp/status", b"off", t0));
        assert!(!filter.take_echo_at("lamp/button", b"on", t0));
        assert_eq!(filter.outstanding(), 1);
    }

    #[test]
    fn records_expire() {
        let filter = EchoFilter::new(WINDOW);
        let t0 = Instant::now();

        filter.remember_at("lamp/status", b"on", t0);
        assert!(!filter.take_echo_at("lamp/status", b"on", t0 + WINDOW));
        assert_eq!(filter.outstanding(), 0);
    }

    #[test]
    fn two_publishes_two_echoes() {
        let filter = EchoFilter::new(WINDOW);
        let t0 = Instant::now();

        filter.remember_at("lamp/status", b"on", t0);
        filter.remember_at("lamp/status", b"on", t0);
        assert!(filter.take_echo_at("lamp/status", b"on", t0));
        assert!(filter.take_echo_at("lamp/status", b"on", t0));
        assert!(!filter.take_echo_at("lamp/status", b"on", t0));
    }

    #[test]
    fn forget_removes_record() {
        let filter = EchoFilter::new(WINDOW);

        filter.remember("lamp/status", b"off");
        filter.forget("lamp/status", b"off");
        assert_eq!(filter.outstanding(), 0);
    }

    #[test]
    fn zero_window_disables_filter() {
        let filter = EchoFilter::new(Duration::ZERO);

        filter.remember("lamp/status", b"on");
        assert!(!filter.take_echo("lamp/status", b"on"));
    }

    #[test]
    fn capacity_is_bounded() {
        let filter = EchoFilter::new(WINDOW);
        let t0 = Instant::now();

        for _ in 0..MAX_ENTRIES + 5 {
            filter.remember_at("lamp/status", b"on", t0);
        }
        assert_eq!(filter.outstanding(), MAX_ENTRIES);
    }
}

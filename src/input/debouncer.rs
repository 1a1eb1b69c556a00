// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Time-window debouncing of a sampled button line.

use std::time::Duration;

use tokio::time::Instant;

use crate::types::{Edge, InputLevel};

/// Turns a periodically sampled, noisy level into clean [`Edge`]s.
///
/// A level different from the stable one opens a candidate window. The edge
/// fires on the first sample, taken at or after the end of the window, that
/// still reads the candidate level. Going back to the stable level before
/// then discards the candidate. The window is never waited on: it is only
/// evaluated when the next sample arrives.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tokio::time::Instant;
/// use ledsync::input::Debouncer;
/// use ledsync::types::{Edge, InputLevel};
///
/// let mut debouncer = Debouncer::new(Duration::from_millis(200), InputLevel::High);
/// let t0 = Instant::now();
///
/// assert_eq!(debouncer.sample_at(InputLevel::Low, t0), None);
/// assert_eq!(
///     debouncer.sample_at(InputLevel::Low, t0 + Duration::from_millis(200)),
///     Some(Edge::Pressed)
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    stable: InputLevel,
    candidate: Option<Candidate>,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    level: InputLevel,
    since: Instant,
}

impl Debouncer {
    /// Creates a debouncer that starts out stable at `initial`.
    ///
    /// A zero `window` commits every change on the sample that sees it.
    #[must_use]
    pub fn new(window: Duration, initial: InputLevel) -> Self {
        Self {
            window,
            stable: initial,
            candidate: None,
        }
    }

    /// Returns the debounce window.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns the last committed level.
    #[must_use]
    pub fn stable_level(&self) -> InputLevel {
        self.stable
    }

    /// Returns `true` while a change is waiting for its window to elapse.
    #[must_use]
    pub fn is_settling(&self) -> bool {
        self.candidate.is_some()
    }

    /// Feeds a sample taken now.
    pub fn sample(&mut self, level: InputLevel) -> Option<Edge> {
        self.sample_at(level, Instant::now())
    }

    /// Feeds a sample taken at `now`.
    ///
    /// Returns the edge when this sample confirms a stable transition.
    pub fn sample_at(&mut self, level: InputLevel, now: Instant) -> Option<Edge> {
        if level == self.stable {
            if self.candidate.take().is_some() {
                tracing::trace!(level = %level, "Bounce discarded");
            }
            return None;
        }

        let since = match self.candidate {
            Some(candidate) if candidate.level == level => candidate.since,
            _ => {
                self.candidate = Some(Candidate { level, since: now });
                now
            }
        };

        if now.saturating_duration_since(since) < self.window {
            return None;
        }

        self.stable = level;
        self.candidate = None;
        Some(Edge::settled_at(level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(200);

    fn ms(t0: Instant, offset: u64) -> Instant {
        t0 + Duration::from_millis(offset)
    }

    /// Samples `level` every 10 ms over `[from, to]` and collects edges.
    fn hold(
        debouncer: &mut Debouncer,
        t0: Instant,
        level: InputLevel,
        from: u64,
        to: u64,
    ) -> Vec<Edge> {
        (from..=to)
            .step_by(10)
            .filter_map(|t| debouncer.sample_at(level, ms(t0, t)))
            .collect()
    }

    #[test]
    fn steady_level_emits_nothing() {
        let mut debouncer = Debouncer::new(WINDOW, InputLevel::High);
        let t0 = Instant::now();
        assert!(hold(&mut debouncer, t0, InputLevel::High, 0, 1000).is_empty());
        assert!(!debouncer.is_settling());
    }

    #[test]
    fn press_held_past_window_emits_one_edge() {
        let mut debouncer = Debouncer::new(WINDOW, InputLevel::High);
        let t0 = Instant::now();

        let edges = hold(&mut debouncer, t0, InputLevel::Low, 0, 250);
        assert_eq!(edges, vec![Edge::Pressed]);
        assert_eq!(debouncer.stable_level(), InputLevel::Low);
    }

    #[test]
    fn short_bounce_emits_nothing() {
        let mut debouncer = Debouncer::new(WINDOW, InputLevel::High);
        let t0 = Instant::now();

        assert_eq!(debouncer.sample_at(InputLevel::Low, ms(t0, 0)), None);
        assert_eq!(debouncer.sample_at(InputLevel::High, ms(t0, 20)), None);
        assert_eq!(debouncer.sample_at(InputLevel::Low, ms(t0, 40)), None);
        assert!(hold(&mut debouncer, t0, InputLevel::High, 50, 600).is_empty());
        assert_eq!(debouncer.stable_level(), InputLevel::High);
    }

    #[test]
    fn bounce_restarts_window() {
        let mut debouncer = Debouncer::new(WINDOW, InputLevel::High);
        let t0 = Instant::now();

        assert_eq!(debouncer.sample_at(InputLevel::Low, ms(t0, 0)), None);
        assert_eq!(debouncer.sample_at(InputLevel::High, ms(t0, 150)), None);
        // Window counts from 160, not from 0.
        assert_eq!(debouncer.sample_at(InputLevel::Low, ms(t0, 160)), None);
        assert_eq!(debouncer.sample_at(InputLevel::Low, ms(t0, 300)), None);
        assert_eq!(
            debouncer.sample_at(InputLevel::Low, ms(t0, 360)),
            Some(Edge::Pressed)
        );
    }

    #[test]
    fn boundary_is_confirmed_by_a_sample() {
        let mut debouncer = Debouncer::new(WINDOW, InputLevel::High);
        let t0 = Instant::now();

        assert_eq!(debouncer.sample_at(InputLevel::Low, ms(t0, 0)), None);
        assert_eq!(debouncer.sample_at(InputLevel::Low, ms(t0, 199)), None);
        // Line went back up exactly at the boundary: no edge.
        assert_eq!(debouncer.sample_at(InputLevel::High, ms(t0, 200)), None);
        assert_eq!(debouncer.stable_level(), InputLevel::High);
    }

    #[test]
    fn press_and_release_emit_one_edge_each() {
        let mut debouncer = Debouncer::new(WINDOW, InputLevel::High);
        let t0 = Instant::now();

        let mut edges = hold(&mut debouncer, t0, InputLevel::Low, 0, 400);
        edges.extend(hold(&mut debouncer, t0, InputLevel::High, 410, 800));
        assert_eq!(edges, vec![Edge::Pressed, Edge::Released]);
    }

    #[test]
    fn zero_window_commits_immediately() {
        let mut debouncer = Debouncer::new(Duration::ZERO, InputLevel::High);
        let t0 = Instant::now();

        assert_eq!(
            debouncer.sample_at(InputLevel::Low, t0),
            Some(Edge::Pressed)
        );
        assert_eq!(
            debouncer.sample_at(InputLevel::High, t0),
            Some(Edge::Released)
        );
    }
}

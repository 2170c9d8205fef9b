//! Source health and dispatch gating.
//!
//! Every adapter call reports back here. A source that keeps failing is
//! marked `unavailable` in `source_stats` and, when
//! [`CircuitBreakerConfig::enabled`] is set, stops receiving queries until
//! its cooldown runs out. The first query after the cooldown is a trial:
//! success clears the record, failure benches the source again.
//!
//! ```text
//! active/degraded --threshold--> unavailable --cooldown--> recovering
//!        ^                            ^                        |
//!        |                            +-------- failure -------+
//!        +------------------------- success ------------------+
//! ```
//!
//! The breaker belongs to one [`crate::Aggregator`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::types::SourceStatus;

/// Dispatch state of one source, as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    /// Benched after too many failures in a row.
    Open,
    /// Cooldown over; the next call decides.
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
enum Circuit {
    Closed { failures: u32 },
    Open { since: Instant },
    Trial,
}

impl Circuit {
    fn state(self) -> CircuitState {
        match self {
            Self::Closed { .. } => CircuitState::Closed,
            Self::Open { .. } => CircuitState::Open,
            Self::Trial => CircuitState::HalfOpen,
        }
    }

    fn status(self) -> SourceStatus {
        match self {
            Self::Closed { failures: 0 } => SourceStatus::Active,
            Self::Closed { .. } => SourceStatus::Degraded,
            Self::Open { .. } => SourceStatus::Unavailable,
            Self::Trial => SourceStatus::Recovering,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Skip unavailable sources during fan-out. Health is tracked either way.
    pub enabled: bool,
    /// Failures in a row that bench a source.
    pub failure_threshold: u32,
    /// How long a benched source sits out.
    pub cooldown_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            failure_threshold: 3,
            cooldown_secs: 60,
        }
    }
}

/// Health ledger for every source an aggregator has dispatched to.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    circuits: HashMap<String, Circuit>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            circuits: HashMap::new(),
        }
    }

    pub fn record_success(&mut self, source: &str) {
        self.circuits
            .insert(source.to_owned(), Circuit::Closed { failures: 0 });
    }

    /// A failure during a trial benches the source straight away.
    pub fn record_failure(&mut self, source: &str) {
        let threshold = self.config.failure_threshold;
        let circuit = self
            .circuits
            .entry(source.to_owned())
            .or_insert(Circuit::Closed { failures: 0 });
        *circuit = match *circuit {
            Circuit::Closed { failures } if failures.saturating_add(1) < threshold => {
                Circuit::Closed {
                    failures: failures + 1,
                }
            }
            Circuit::Open { since } => Circuit::Open { since },
            Circuit::Closed { .. } | Circuit::Trial => Circuit::Open {
                since: Instant::now(),
            },
        };
    }

    /// Whether `source` may be queried now. Opens a trial once a benched
    /// source has sat out its cooldown.
    pub fn should_attempt(&mut self, source: &str) -> bool {
        if !self.config.enabled {
            return true;
        }
        let cooldown = Duration::from_secs(self.config.cooldown_secs);
        let Some(circuit) = self.circuits.get_mut(source) else {
            return true;
        };
        if let Circuit::Open { since } = *circuit {
            if since.elapsed() < cooldown {
                return false;
            }
            *circuit = Circuit::Trial;
        }
        true
    }

    pub fn source_state(&self, source: &str) -> CircuitState {
        self.circuits
            .get(source)
            .map_or(CircuitState::Closed, |c| c.state())
    }

    /// Upward status for `source`; sources never seen are active.
    pub fn source_status(&self, source: &str) -> SourceStatus {
        self.circuits
            .get(source)
            .map_or(SourceStatus::Active, |c| c.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_breaker(threshold: u32, cooldown_secs: u64) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            enabled: true,
            failure_threshold: threshold,
            cooldown_secs,
        })
    }

    #[test]
    fn initial_state_is_closed() {
        let breaker = make_breaker(3, 60);
        assert_eq!(breaker.source_state("spotify"), CircuitState::Closed);
        assert_eq!(breaker.source_status("spotify"), SourceStatus::Active);
    }

    #[test]
    fn failures_below_threshold_degrade() {
        let mut breaker = make_breaker(3, 60);
        breaker.record_failure("lastfm");
        breaker.record_failure("lastfm");
        assert_eq!(breaker.source_state("lastfm"), CircuitState::Closed);
        assert_eq!(breaker.source_status("lastfm"), SourceStatus::Degraded);
        assert!(breaker.should_attempt("lastfm"));
    }

    #[test]
    fn trips_to_open_at_threshold() {
        let mut breaker = make_breaker(3, 600);
        for _ in 0..3 {
            breaker.record_failure("ticketmaster");
        }
        assert_eq!(breaker.source_state("ticketmaster"), CircuitState::Open);
        assert_eq!(breaker.source_status("ticketmaster"), SourceStatus::Unavailable);
        assert!(!breaker.should_attempt("ticketmaster"));
    }

    #[test]
    fn disabled_breaker_always_attempts() {
        let mut breaker = CircuitBreaker::new(CircuitBreakerConfig {
            enabled: false,
            failure_threshold: 1,
            cooldown_secs: 600,
        });
        breaker.record_failure("deezer");
        assert_eq!(breaker.source_state("deezer"), CircuitState::Open);
        assert!(breaker.should_attempt("deezer"));
    }

    #[test]
    fn open_transitions_to_half_open_after_cooldown() {
        let mut breaker = make_breaker(2, 0);
        breaker.record_failure("songkick");
        breaker.record_failure("songkick");
        assert!(breaker.should_attempt("songkick"));
        assert_eq!(breaker.source_state("songkick"), CircuitState::HalfOpen);
        assert_eq!(breaker.source_status("songkick"), SourceStatus::Recovering);
    }

    #[test]
    fn half_open_success_restores_closed() {
        let mut breaker = make_breaker(1, 0);
        breaker.record_failure("eventbrite");
        let _ = breaker.should_attempt("eventbrite");
        breaker.record_success("eventbrite");
        assert_eq!(breaker.source_state("eventbrite"), CircuitState::Closed);
        assert_eq!(breaker.source_status("eventbrite"), SourceStatus::Active);
    }

    #[test]
    fn half_open_failure_retrips() {
        let mut breaker = make_breaker(1, 0);
        breaker.record_failure("setlistfm");
        let _ = breaker.should_attempt("setlistfm");
        breaker.record_failure("setlistfm");
        assert_eq!(breaker.source_state("setlistfm"), CircuitState::Open);
    }

    #[test]
    fn sources_are_independent() {
        let mut breaker = make_breaker(2, 60);
        breaker.record_failure("spotify");
        breaker.record_failure("spotify");
        assert_eq!(breaker.source_state("spotify"), CircuitState::Open);
        assert_eq!(breaker.source_state("lastfm"), CircuitState::Closed);
        assert!(breaker.should_attempt("lastfm"));
    }

    #[test]
    fn alternating_success_never_trips() {
        let mut breaker = make_breaker(3, 60);
        for _ in 0..10 {
            breaker.record_failure("musicbrainz");
            breaker.record_success("musicbrainz");
        }
        assert_eq!(breaker.source_state("musicbrainz"), CircuitState::Closed);
    }

    #[test]
    fn repeated_failures_keep_original_bench_time() {
        let mut breaker = make_breaker(1, 600);
        breaker.record_failure("bandcamp");
        breaker.record_failure("bandcamp");
        assert_eq!(breaker.source_state("bandcamp"), CircuitState::Open);
        assert!(!breaker.should_attempt("bandcamp"));
    }

    #[test]
    fn huge_cooldown_does_not_overflow() {
        let mut breaker = make_breaker(1, u64::MAX);
        breaker.record_failure("residentadvisor");
        assert!(!breaker.should_attempt("residentadvisor"));
    }

    #[test]
    fn default_config_values() {
        let config = CircuitBreakerConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.cooldown_secs, 60);
    }
}

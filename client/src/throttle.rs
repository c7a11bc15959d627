use std::time::{Duration, Instant};

/// Rate limiter for outgoing pose traffic.
///
/// At most one acquisition per interval, measured against a monotonic clock.
/// Calls inside the window are rejected, not queued; the caller is expected
/// to offer its freshest pose on every frame, so dropped calls cost nothing.
#[derive(Debug)]
pub struct SendThrottle {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl SendThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    /// Returns `true` when a send is allowed right now, and records it.
    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&mut self, now: Instant) -> bool {
        match self.last_sent {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_sent = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(50);

    #[test]
    fn first_call_is_allowed() {
        let mut throttle = SendThrottle::new(INTERVAL);
        assert!(throttle.try_acquire_at(Instant::now()));
    }

    #[test]
    fn second_call_inside_the_window_is_dropped() {
        let mut throttle = SendThrottle::new(INTERVAL);
        let t0 = Instant::now();
        assert!(throttle.try_acquire_at(t0));
        assert!(!throttle.try_acquire_at(t0 + Duration::from_millis(10)));
        assert!(!throttle.try_acquire_at(t0 + Duration::from_millis(49)));
    }

    #[test]
    fn call_at_exactly_the_interval_is_allowed() {
        let mut throttle = SendThrottle::new(INTERVAL);
        let t0 = Instant::now();
        assert!(throttle.try_acquire_at(t0));
        assert!(throttle.try_acquire_at(t0 + INTERVAL));
    }

    #[test]
    fn sixty_ms_cadence_for_one_second_yields_about_17_sends() {
        let mut throttle = SendThrottle::new(INTERVAL);
        let t0 = Instant::now();
        let mut sent = 0;
        let mut t = t0;
        while t < t0 + Duration::from_secs(1) {
            if throttle.try_acquire_at(t) {
                sent += 1;
            }
            t += Duration::from_millis(60);
        }
        assert!(
            (16..=17).contains(&sent),
            "expected ~16-17 sends, got {sent}"
        );
    }

    #[test]
    fn render_rate_callers_are_capped_at_20_hz() {
        let mut throttle = SendThrottle::new(INTERVAL);
        let t0 = Instant::now();
        let mut sent = 0;
        // 100 calls at 10 ms spacing, one simulated second.
        for i in 0..100u64 {
            if throttle.try_acquire_at(t0 + Duration::from_millis(i * 10)) {
                sent += 1;
            }
        }
        assert_eq!(sent, 20);
    }
}

//! Randomized pauses and eased scrolling so the session never moves at a
//! fixed cadence or jumps straight to a position.

use crate::scrapers::traits::{PageSession, StageResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Where a humanized pause actually goes
pub trait Pause {
    fn pause(&mut self, duration: Duration);
}

/// Blocks the current thread; the crawl runs on a blocking worker
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleep;

impl Pause for ThreadSleep {
    fn pause(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Source of human-looking timing decisions for one session
pub struct Humanizer<P: Pause = ThreadSleep> {
    rng: StdRng,
    pause: P,
}

impl Humanizer<ThreadSleep> {
    pub fn new() -> Self {
        Self::with_parts(StdRng::from_entropy(), ThreadSleep)
    }
}

impl Default for Humanizer<ThreadSleep> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Pause> Humanizer<P> {
    pub fn with_parts(rng: StdRng, pause: P) -> Self {
        Self { rng, pause }
    }

    #[cfg(test)]
    pub fn pauses(&self) -> &P {
        &self.pause
    }

    /// Suspend for a uniformly random duration within `[min_secs, max_secs]`
    pub fn delay(&mut self, min_secs: f64, max_secs: f64) -> Duration {
        let secs = if max_secs > min_secs {
            self.rng.gen_range(min_secs..=max_secs)
        } else {
            min_secs
        };
        let duration = Duration::from_secs_f64(secs.max(0.0));
        self.pause.pause(duration);
        duration
    }

    /// True with probability `p`
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }

    pub fn between(&mut self, low: usize, high: usize) -> usize {
        self.rng.gen_range(low..=high)
    }

    pub fn jitter(&mut self, magnitude: f64) -> f64 {
        self.rng.gen_range(-magnitude..=magnitude)
    }

    /// Throwaway identity for a card without a booking link.
    /// Never stable across runs, so such cards always count as new.
    pub fn placeholder_identity(&mut self) -> String {
        format!("not_found_link_{}", self.rng.gen::<f64>())
    }

    /// Scroll from `current_y` to `target_y` in 8-15 eased steps,
    /// pausing briefly between them. The last step lands exactly on `target_y`.
    pub fn smooth_scroll<S>(&mut self, page: &S, current_y: f64, target_y: f64) -> StageResult<()>
    where
        S: PageSession + ?Sized,
    {
        let steps = self.between(8, 15);
        debug!("Scrolling {} -> {} in {} steps", current_y, target_y, steps);
        for y in scroll_path(current_y, target_y, steps) {
            page.execute_script(&scroll_to_script(y))?;
            self.delay(0.05, 0.15);
        }
        Ok(())
    }
}

/// Ease-out cubic: fast start, slow finish
pub fn ease_out_cubic(progress: f64) -> f64 {
    1.0 - (1.0 - progress).powi(3)
}

/// Intermediate offsets of an eased scroll; the final entry equals `target_y`
pub fn scroll_path(current_y: f64, target_y: f64, steps: usize) -> Vec<f64> {
    let distance = target_y - current_y;
    (1..=steps)
        .map(|step| {
            if step == steps {
                target_y
            } else {
                current_y + distance * ease_out_cubic(step as f64 / steps as f64)
            }
        })
        .collect()
}

pub fn scroll_to_script(y: f64) -> String {
    format!("window.scrollTo(0, {})", y.round() as i64)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Records pauses instead of sleeping
    #[derive(Debug, Default)]
    pub(crate) struct Recorded(pub Vec<Duration>);

    impl Pause for Recorded {
        fn pause(&mut self, duration: Duration) {
            self.0.push(duration);
        }
    }

    pub(crate) fn seeded(seed: u64) -> Humanizer<Recorded> {
        Humanizer::with_parts(StdRng::seed_from_u64(seed), Recorded::default())
    }

    #[test]
    fn delay_stays_within_closed_interval() {
        let mut human = seeded(7);
        for _ in 0..200 {
            let waited = human.delay(0.5, 1.5);
            assert!(waited >= Duration::from_secs_f64(0.5));
            assert!(waited <= Duration::from_secs_f64(1.5));
        }
        assert_eq!(human.pauses().0.len(), 200);
    }

    #[test]
    fn degenerate_interval_waits_exactly_min() {
        let mut human = seeded(1);
        assert_eq!(human.delay(2.0, 2.0), Duration::from_secs(2));
    }

    #[test]
    fn ease_out_cubic_hits_endpoints() {
        assert_eq!(ease_out_cubic(0.0), 0.0);
        assert_eq!(ease_out_cubic(1.0), 1.0);
        assert!(ease_out_cubic(0.5) > 0.5);
    }

    #[test]
    fn scroll_path_is_monotonic_and_ends_on_target() {
        let path = scroll_path(100.0, 1300.0, 10);
        assert_eq!(path.len(), 10);
        assert_eq!(*path.last().unwrap(), 1300.0);
        assert!(path.windows(2).all(|w| w[0] <= w[1]));

        let upward = scroll_path(900.0, 0.0, 8);
        assert_eq!(*upward.last().unwrap(), 0.0);
        assert!(upward.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn placeholder_identities_differ() {
        let mut human = seeded(3);
        let first = human.placeholder_identity();
        let second = human.placeholder_identity();
        assert!(first.starts_with("not_found_link_"));
        assert_ne!(first, second);
    }
}

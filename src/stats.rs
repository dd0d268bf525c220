//! Timing and memory statistics of a simulation run.

use std::{
    fmt,
    time::{Duration, Instant},
};

/// Statistics collected while loading, simulating and saving a grid.
#[derive(Clone, Default, Debug)]
pub struct Stats {
    pub load: Duration,
    /// Time spent creating the neighbor counter, including compilation.
    pub setup: Duration,
    pub simulate: Duration,
    pub save: Duration,
    pub generations: usize,
    pub live_cells: usize,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `phase` and return its result together with the time it took.
    pub fn time<T, F: FnOnce() -> T>(phase: F) -> (T, Duration) {
        let start = Instant::now();
        let result = phase();
        (result, start.elapsed())
    }

    pub fn total(&self) -> Duration {
        self.load + self.setup + self.simulate + self.save
    }

    /// Average simulation time of a single generation.
    pub fn per_generation(&self) -> Option<Duration> {
        let generations = u128::try_from(self.generations).ok().filter(|&g| g > 0)?;
        let nanos = self.simulate.as_nanos() / generations;
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }
}

/// Peak resident set size of the current process in KiB, if the platform
/// provides it.
#[cfg(unix)]
pub fn peak_rss_kib() -> Option<u64> {
    let mut usage = std::mem::MaybeUninit::<libc::rusage>::zeroed();
    // SAFETY: `usage` is valid for writes, getrusage initializes it on success.
    let usage = unsafe {
        if libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) != 0 {
            return None;
        }
        usage.assume_init()
    };
    let max_rss = u64::try_from(usage.ru_maxrss).ok()?;
    // macOS reports bytes, everybody else KiB.
    if cfg!(target_os = "macos") {
        Some(max_rss / 1024)
    } else {
        Some(max_rss)
    }
}

#[cfg(not(unix))]
pub fn peak_rss_kib() -> Option<u64> {
    None
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "load:        {:?}", self.load)?;
        writeln!(f, "setup:       {:?}", self.setup)?;
        writeln!(f, "simulate:    {:?}", self.simulate)?;
        if let Some(per_gen) = self.per_generation() {
            writeln!(f, "per gen:     {per_gen:?}")?;
        }
        writeln!(f, "save:        {:?}", self.save)?;
        writeln!(f, "total:       {:?}", self.total())?;
        writeln!(f, "generations: {}", self.generations)?;
        writeln!(f, "live cells:  {}", self.live_cells)?;
        match peak_rss_kib() {
            Some(kib) => write!(f, "peak rss:    {kib} KiB"),
            None => write!(f, "peak rss:    unavailable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{peak_rss_kib, Stats};

    #[test]
    fn total_sums_phases() {
        let stats = Stats {
            load: Duration::from_millis(3),
            setup: Duration::from_millis(1),
            simulate: Duration::from_millis(20),
            save: Duration::from_millis(2),
            generations: 4,
            live_cells: 7,
        };
        assert_eq!(stats.total(), Duration::from_millis(26));
        let text = stats.to_string();
        assert!(text.contains("per gen:     5ms"), "{text}");
        assert!(text.contains("live cells:  7"), "{text}");
    }

    #[test]
    fn per_generation_handles_many_generations() {
        let mut stats = Stats {
            simulate: Duration::from_secs(8),
            generations: 0,
            ..Stats::default()
        };
        assert_eq!(stats.per_generation(), None);
        assert!(!stats.to_string().contains("per gen"));
        stats.generations = usize::MAX;
        assert_eq!(stats.per_generation(), Some(Duration::ZERO));
        stats.generations = 1 << 20;
        assert_eq!(stats.per_generation(), Some(Duration::from_nanos(7629)));
        assert!(stats.to_string().contains("per gen:     7.629µs"));
    }

    #[test]
    fn time_returns_result() {
        let (value, _) = Stats::time(|| 6 * 7);
        assert_eq!(value, 42);
    }

    #[test]
    #[cfg(unix)]
    fn peak_rss_is_reported() {
        assert!(peak_rss_kib().is_some_and(|kib| kib > 0));
    }
}

//! Memory-pressure sampling and the [`Pressure`] signal other layers react to.

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Coarse classification of resource scarcity.
///
/// Ordering is significant: `None < Low < Medium < High < Critical`. Callers
/// compare levels (e.g. "has pressure increased") rather than matching on
/// exact variants where possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Pressure {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Pressure {
    /// Desired runner parallelism for a given configured maximum, per the
    /// adaptive-parallelism table.
    pub fn desired_parallelism(self, max: usize) -> usize {
        match self {
            Self::None => max,
            Self::Low => max.saturating_sub(1).max(1),
            Self::Medium => (max / 2).max(1),
            Self::High => (max / 3).max(1),
            Self::Critical => 1,
        }
    }
}

/// Resource bytes and the pressure level derived from them.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot {
    pub resident_bytes: u64,
    pub pressure: Pressure,
}

/// Rising byte thresholds, with a hysteresis margin that a level must drop
/// below before the monitor reports the lower level again. This prevents
/// the signal from flapping across a threshold under normal jitter.
#[derive(Debug, Clone, Copy)]
pub struct MemoryThresholds {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
    pub hysteresis: u64,
}

impl Default for MemoryThresholds {
    /// Defaults assume a process budget on the order of a few GB; tuned for
    /// a test-runner host, not a constrained container.
    fn default() -> Self {
        const GB: u64 = 1024 * 1024 * 1024;
        Self {
            low: 2 * GB,
            medium: 3 * GB,
            high: 4 * GB,
            critical: 5 * GB,
            hysteresis: GB / 4,
        }
    }
}

impl MemoryThresholds {
    /// Classifies `resident_bytes`, only dropping to a lower level once
    /// usage falls at least `hysteresis` bytes below that level's threshold.
    fn classify(&self, resident_bytes: u64, previous: Pressure) -> Pressure {
        let level = if resident_bytes >= self.critical {
            Pressure::Critical
        } else if resident_bytes >= self.high {
            Pressure::High
        } else if resident_bytes >= self.medium {
            Pressure::Medium
        } else if resident_bytes >= self.low {
            Pressure::Low
        } else {
            Pressure::None
        };

        if level >= previous {
            return level;
        }

        // Downgrading: require the drop to clear the previous level's floor
        // by the hysteresis margin before accepting it.
        let floor = match previous {
            Pressure::Critical => self.critical,
            Pressure::High => self.high,
            Pressure::Medium => self.medium,
            Pressure::Low => self.low,
            Pressure::None => 0,
        };
        if resident_bytes + self.hysteresis >= floor {
            previous
        } else {
            level
        }
    }
}

/// Backend abstraction for taking a resource snapshot and subscribing to
/// pressure transitions, consumed by the pool and the runner.
pub trait ResourceMonitor: Send + Sync {
    /// Takes an immediate snapshot without waiting for the next sampling tick.
    fn snapshot(&self) -> Snapshot;

    /// Returns a receiver observing the latest pressure level.
    fn subscribe(&self) -> watch::Receiver<Pressure>;
}

/// Samples this process's resident memory on an interval and classifies it
/// into a [`Pressure`] level with hysteresis.
pub struct ProcessMemoryMonitor {
    thresholds: MemoryThresholds,
    interval: Duration,
    resident_bytes: Arc<AtomicU64>,
    tx: watch::Sender<Pressure>,
    rx: watch::Receiver<Pressure>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ProcessMemoryMonitor {
    pub fn new(thresholds: MemoryThresholds, interval: Duration) -> Arc<Self> {
        let (tx, rx) = watch::channel(Pressure::None);
        Arc::new(Self {
            thresholds,
            interval,
            resident_bytes: Arc::new(AtomicU64::new(0)),
            tx,
            rx,
            task: std::sync::Mutex::new(None),
        })
    }

    /// Spawns the background sampling loop. Idempotent: a second call while
    /// already running is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut guard = self.task.lock().expect("monitor task lock poisoned");
        if guard.is_some() {
            return;
        }
        let this = Arc::clone(self);
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.interval);
            loop {
                ticker.tick().await;
                this.sample_once();
            }
        }));
    }

    /// Stops the background sampling loop.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().expect("monitor task lock poisoned").take() {
            handle.abort();
        }
    }

    fn sample_once(&self) {
        let resident = read_resident_bytes();
        self.resident_bytes.store(resident, Ordering::Relaxed);
        let previous = *self.tx.borrow();
        let level = self.thresholds.classify(resident, previous);
        if level != previous {
            #[cfg(feature = "tracing")]
            tracing::info!(target: "qa_core::pressure", ?previous, ?level, resident, "pressure transition");
            let _ = self.tx.send(level);
        }
    }
}

impl ResourceMonitor for ProcessMemoryMonitor {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            resident_bytes: self.resident_bytes.load(Ordering::Relaxed),
            pressure: *self.rx.borrow(),
        }
    }

    fn subscribe(&self) -> watch::Receiver<Pressure> {
        self.rx.clone()
    }
}

/// Reads this process's resident set size. Returns `0` where unsupported,
/// which classifies as [`Pressure::None`].
#[cfg(target_os = "linux")]
fn read_resident_bytes() -> u64 {
    let Ok(status) = fs::read_to_string("/proc/self/status") else {
        return 0;
    };
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kb: u64 = rest.trim().trim_end_matches(" kB").trim().parse().unwrap_or(0);
            return kb * 1024;
        }
    }
    0
}

#[cfg(not(target_os = "linux"))]
fn read_resident_bytes() -> u64 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desired_parallelism_matches_table() {
        assert_eq!(Pressure::None.desired_parallelism(10), 10);
        assert_eq!(Pressure::Low.desired_parallelism(10), 9);
        assert_eq!(Pressure::Medium.desired_parallelism(10), 5);
        assert_eq!(Pressure::High.desired_parallelism(10), 3);
        assert_eq!(Pressure::Critical.desired_parallelism(10), 1);
        // never below 1
        assert_eq!(Pressure::Low.desired_parallelism(1), 1);
        assert_eq!(Pressure::High.desired_parallelism(2), 1);
    }

    #[test]
    fn pressure_orders_monotonically() {
        assert!(Pressure::None < Pressure::Low);
        assert!(Pressure::Low < Pressure::Medium);
        assert!(Pressure::Medium < Pressure::High);
        assert!(Pressure::High < Pressure::Critical);
    }

    #[test]
    fn classification_rises_immediately() {
        let thresholds = MemoryThresholds {
            low: 100,
            medium: 200,
            high: 300,
            critical: 400,
            hysteresis: 20,
        };
        assert_eq!(thresholds.classify(50, Pressure::None), Pressure::None);
        assert_eq!(thresholds.classify(150, Pressure::None), Pressure::Low);
        assert_eq!(thresholds.classify(450, Pressure::None), Pressure::Critical);
    }

    #[test]
    fn classification_does_not_flap_at_the_boundary() {
        let thresholds = MemoryThresholds {
            low: 100,
            medium: 200,
            high: 300,
            critical: 400,
            hysteresis: 20,
        };
        // At Medium (>=200), dip just below the threshold but within hysteresis.
        let level = thresholds.classify(190, Pressure::Medium);
        assert_eq!(level, Pressure::Medium, "small dip should not downgrade");

        // A real drop clears the hysteresis margin.
        let level = thresholds.classify(170, Pressure::Medium);
        assert_eq!(level, Pressure::Low);
    }

    #[tokio::test]
    async fn subscriber_observes_transition() {
        let monitor = ProcessMemoryMonitor::new(
            MemoryThresholds {
                low: 0,
                medium: u64::MAX,
                high: u64::MAX,
                critical: u64::MAX,
                hysteresis: 0,
            },
            Duration::from_millis(5),
        );
        let mut rx = monitor.subscribe();
        monitor.start();
        // Any resident size classifies at least Low given low=0.
        let _ = tokio::time::timeout(Duration::from_secs(1), rx.changed()).await;
        monitor.stop();
        assert!(*rx.borrow() >= Pressure::None);
    }
}

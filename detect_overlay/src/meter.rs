use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use tokio::{task::JoinHandle, time::interval};

pub static METER: Meter = Meter::new();

/// Frame loop counters, reset every time they are read.
#[derive(Default)]
pub struct Meter {
    cycles: AtomicU64,
    drawn: AtomicU64,
    failures: AtomicU64,
}

impl Meter {
    pub const fn new() -> Meter {
        Meter {
            cycles: AtomicU64::new(0),
            drawn: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn tick_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_drawn(&self, n: usize) {
        self.drawn.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn tick_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_reset_cycles(&self) -> u64 {
        self.cycles.swap(0, Ordering::Relaxed)
    }

    pub fn get_reset_drawn(&self) -> u64 {
        self.drawn.swap(0, Ordering::Relaxed)
    }

    pub fn get_reset_failures(&self) -> u64 {
        self.failures.swap(0, Ordering::Relaxed)
    }
}

pub fn spawn_meter_logger(period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut log_interval = interval(period);
        log_interval.tick().await;

        loop {
            let start = Instant::now();
            log_interval.tick().await;

            let cycles = METER.get_reset_cycles();
            let drawn = METER.get_reset_drawn();
            let failures = METER.get_reset_failures();
            let elapsed = start.elapsed().as_secs_f32();

            if cycles > 0 {
                log::info!(
                    "Annotated frames per second: {:.2}, boxes per frame: {:.2}",
                    cycles as f32 / elapsed,
                    drawn as f32 / cycles as f32
                );
            }
            if failures > 0 {
                log::warn!("{failures} failed inferences in the last {elapsed:.1}s");
            }
        }
    })
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_counters_reset_on_read() {
        let meter = Meter::new();
        meter.tick_cycle();
        meter.tick_cycle();
        meter.add_drawn(3);
        meter.tick_failure();

        assert_eq!(meter.get_reset_cycles(), 2);
        assert_eq!(meter.get_reset_drawn(), 3);
        assert_eq!(meter.get_reset_failures(), 1);
        assert_eq!(meter.get_reset_cycles(), 0);
    }
}

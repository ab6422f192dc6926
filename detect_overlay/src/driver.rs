//! Frame loop driver.
//!
//! Runs capture -> detect -> render once per display refresh. A cycle waits for its inference to
//! finish before the next one is scheduled, so at most one request is in flight. A failed
//! inference only skips the annotations of that frame.
//!
//! Tearing the loop down cancels the in-flight inference and discards its result; nothing is
//! drawn after teardown.
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::{
    task::JoinHandle,
    time::{interval, Interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    color::ColorTable,
    detector::Detector,
    meter::METER,
    render::{draw_detections, DrawSurface},
    sensors::CaptureSource,
    threshold::ConfidenceThreshold,
};

pub const DEFAULT_REFRESH_HZ: f64 = 60.0;

/// Display refresh signal.
#[derive(Clone, Copy, Debug)]
pub struct DisplayClock {
    period: Duration,
}

impl DisplayClock {
    pub fn new(refresh_hz: f64) -> Result<Self> {
        if !refresh_hz.is_finite() || refresh_hz <= 0.0 {
            bail!("refresh rate must be positive, got {refresh_hz}");
        }
        Ok(Self {
            period: Duration::from_secs_f64(1.0 / refresh_hz),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ticks once per display frame. Frames missed during a slow cycle are skipped, never
    /// caught up in a burst.
    fn ticker(&self) -> Interval {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }
}

impl Default for DisplayClock {
    fn default() -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / DEFAULT_REFRESH_HZ),
        }
    }
}

/// Everything one camera view needs: the frame source, the detector, the overlay and the session
/// state of the renderer.
pub struct FrameLoop<C, D, S> {
    capture: C,
    detector: D,
    surface: S,
    colors: ColorTable,
    threshold: ConfidenceThreshold,
    clock: DisplayClock,
    /// Consecutive failed captures.
    capture_failures: u64,
}

impl<C, D, S> FrameLoop<C, D, S>
where
    C: CaptureSource + 'static,
    D: Detector + 'static,
    S: DrawSurface + Send + 'static,
{
    pub fn new(
        capture: C,
        detector: D,
        surface: S,
        colors: ColorTable,
        threshold: ConfidenceThreshold,
        clock: DisplayClock,
    ) -> Self {
        Self {
            capture,
            detector,
            surface,
            colors,
            threshold,
            clock,
            capture_failures: 0,
        }
    }

    /// Wait for the detector to become ready, then spawn the loop.
    pub async fn start(self) -> Result<FrameLoopHandle> {
        log::info!("Waiting for detector {}", self.detector.name());
        self.detector
            .warm_up()
            .await
            .with_context(|| format!("detector {} is not ready", self.detector.name()))?;
        log::info!(
            "Detector {} ready, starting frame loop at {:.1} Hz",
            self.detector.name(),
            1.0 / self.clock.period().as_secs_f64()
        );

        let alive = CancellationToken::new();
        let join = tokio::spawn(self.run(alive.clone()));

        Ok(FrameLoopHandle {
            alive,
            join: Some(join),
        })
    }

    async fn run(mut self, alive: CancellationToken) {
        let mut ticker = self.clock.ticker();

        loop {
            tokio::select! {
                biased;
                _ = alive.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.cycle(&alive).await;
        }

        log::info!("Frame loop stopped");
    }

    async fn cycle(&mut self, alive: &CancellationToken) {
        METER.tick_cycle();

        let frame = match self.capture.capture() {
            Ok(frame) => {
                if self.capture_failures > 0 {
                    log::info!("Capture recovered after {} failures", self.capture_failures);
                    self.capture_failures = 0;
                }
                frame
            }
            Err(err) => {
                // A lost camera fails on every tick
                match self.capture_failures {
                    0 => log::warn!("Unable to capture frame, trying again: {err:#}"),
                    _ => log::debug!("Unable to capture frame: {err:#}"),
                }
                self.capture_failures += 1;
                return;
            }
        };

        let (width, height) = frame.dimensions();
        self.surface.resize(width, height);

        let result = tokio::select! {
            biased;
            _ = alive.cancelled() => {
                log::debug!("Discarding in-flight inference");
                return;
            }
            result = self.detector.detect(&frame) => result,
        };

        if alive.is_cancelled() {
            return;
        }

        match result {
            Ok(detections) => {
                let drawn = draw_detections(
                    &mut self.surface,
                    &mut self.colors,
                    self.threshold.get(),
                    &detections,
                );
                METER.add_drawn(drawn);
            }
            Err(err) => {
                METER.tick_failure();
                log::warn!("Inference failed, skipping frame: {err:#}");
            }
        }

        self.surface.present(&frame);
    }
}

/// Handle to a running frame loop. Dropping it stops the loop.
pub struct FrameLoopHandle {
    alive: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl FrameLoopHandle {
    pub fn is_alive(&self) -> bool {
        !self.alive.is_cancelled()
    }

    /// Stop the loop and wait until it has exited.
    pub async fn teardown(mut self) -> Result<()> {
        self.alive.cancel();
        if let Some(join) = self.join.take() {
            join.await.context("frame loop task failed")?;
        }
        Ok(())
    }
}

impl Drop for FrameLoopHandle {
    fn drop(&mut self) {
        self.alive.cancel();
    }
}

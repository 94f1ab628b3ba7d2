//! Sampling scheduler: decides when the sampler feeds the publisher.

use std::mem;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

use super::publisher::EnergyPublisher;
use super::sampler::SpectralSampler;

/// When to run a sample+publish tick.
#[derive(Debug, Clone, Copy)]
pub enum SchedulerPolicy {
    /// Background timer ticking every `period` (~30 ms in the app).
    FixedInterval { period: Duration },

    /// Host render loop calls [`SamplingScheduler::on_frame`] once per
    /// drawn frame; ticks happen at most once per `min_interval`.
    FrameThrottled { min_interval: Duration },

    /// The sound source calls [`SamplingScheduler::trigger`] once per
    /// musical step; no background loop.
    Manual,
}

enum RunState {
    Idle,
    Timer {
        stop_tx: Sender<()>,
        handle: JoinHandle<()>,
    },
    Frame {
        last_tick: Option<Instant>,
    },
    Manual,
}

/// Drives the sampler and publisher under one of three interchangeable
/// policies, selected at construction.
///
/// Two states: Idle and Running. `start` while Running and `stop` while
/// Idle are no-ops. After `stop` returns, no further publish can occur;
/// for the fixed-interval policy the timer thread is joined before
/// `stop` returns.
pub struct SamplingScheduler {
    policy: SchedulerPolicy,
    sampler: Arc<Mutex<SpectralSampler>>,
    publisher: Arc<EnergyPublisher>,
    state: Mutex<RunState>,
}

impl SamplingScheduler {
    pub fn new(
        policy: SchedulerPolicy,
        sampler: Arc<Mutex<SpectralSampler>>,
        publisher: Arc<EnergyPublisher>,
    ) -> Self {
        Self {
            policy,
            sampler,
            publisher,
            state: Mutex::new(RunState::Idle),
        }
    }

    pub fn is_running(&self) -> bool {
        !matches!(*self.state.lock().unwrap(), RunState::Idle)
    }

    pub fn start(&self) {
        let mut state = self.state.lock().unwrap();
        if !matches!(*state, RunState::Idle) {
            return;
        }
        debug!(policy = ?self.policy, "scheduler: starting");

        *state = match self.policy {
            SchedulerPolicy::FixedInterval { period } => {
                let (stop_tx, stop_rx) = mpsc::channel();
                let sampler = Arc::clone(&self.sampler);
                let publisher = Arc::clone(&self.publisher);
                let handle = thread::spawn(move || loop {
                    match stop_rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => tick(&sampler, &publisher),
                        // Stop requested, or the scheduler was dropped.
                        _ => break,
                    }
                });
                RunState::Timer { stop_tx, handle }
            }
            SchedulerPolicy::FrameThrottled { .. } => RunState::Frame { last_tick: None },
            SchedulerPolicy::Manual => RunState::Manual,
        };
    }

    /// Stop sampling. Blocks until any in-flight tick has finished, so
    /// no publish happens after this returns.
    pub fn stop(&self) {
        let previous = {
            let mut state = self.state.lock().unwrap();
            mem::replace(&mut *state, RunState::Idle)
        };
        if let RunState::Timer { stop_tx, handle } = previous {
            let _ = stop_tx.send(());
            let _ = handle.join();
            debug!("scheduler: timer stopped");
        }
    }

    /// Frame-throttled policy: called by the render loop once per frame.
    /// Ticks only when Running and the minimum interval has elapsed.
    pub fn on_frame(&self) {
        let SchedulerPolicy::FrameThrottled { min_interval } = self.policy else {
            return;
        };
        let mut state = self.state.lock().unwrap();
        if let RunState::Frame { last_tick } = &mut *state {
            let now = Instant::now();
            let due = last_tick.is_none_or(|t| now.duration_since(t) >= min_interval);
            if due {
                *last_tick = Some(now);
                // State lock is held through the tick so stop() cannot
                // return while a frame tick is in flight.
                tick(&self.sampler, &self.publisher);
            }
        }
    }

    /// Manual policy: called by the sound source after each scheduled
    /// step. Samples and publishes synchronously; no-op unless Running.
    pub fn trigger(&self) {
        let state = self.state.lock().unwrap();
        if matches!(*state, RunState::Manual) {
            tick(&self.sampler, &self.publisher);
        }
    }
}

impl Drop for SamplingScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One sampling tick. Skipped while the sampler has no analysis tap;
/// consumers keep seeing the inert zero snapshot until audio is up.
fn tick(sampler: &Mutex<SpectralSampler>, publisher: &EnergyPublisher) {
    let mut sampler = sampler.lock().unwrap();
    if !sampler.is_initialized() {
        return;
    }
    let bins = sampler.sample();
    publisher.publish(bins);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::bus::MixBus;
    use crate::params::AnalyzerConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pipeline() -> (Arc<Mutex<SpectralSampler>>, Arc<EnergyPublisher>) {
        let bus = MixBus::new();
        bus.set_online(true);
        let mut sampler = SpectralSampler::new(AnalyzerConfig::default()).unwrap();
        assert!(sampler.initialize(&bus));
        let publisher = Arc::new(EnergyPublisher::new(sampler.bin_count()));
        (Arc::new(Mutex::new(sampler)), publisher)
    }

    fn count_publishes(publisher: &EnergyPublisher) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let count_cb = Arc::clone(&count);
        publisher.subscribe(move |_| {
            count_cb.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    #[test]
    fn test_manual_trigger_publishes_synchronously() {
        let (sampler, publisher) = pipeline();
        let scheduler = SamplingScheduler::new(SchedulerPolicy::Manual, sampler, publisher.clone());
        let count = count_publishes(&publisher);

        // Not running yet: trigger is a no-op.
        scheduler.trigger();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        scheduler.start();
        scheduler.trigger();
        scheduler.trigger();
        assert_eq!(count.load(Ordering::SeqCst), 2);

        scheduler.stop();
        scheduler.trigger();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let (sampler, publisher) = pipeline();
        let scheduler = SamplingScheduler::new(SchedulerPolicy::Manual, sampler, publisher);
        assert!(!scheduler.is_running());
        scheduler.stop();
        scheduler.start();
        scheduler.start();
        assert!(scheduler.is_running());
        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_fixed_interval_stop_before_first_tick() {
        let (sampler, publisher) = pipeline();
        let scheduler = SamplingScheduler::new(
            SchedulerPolicy::FixedInterval {
                period: Duration::from_millis(200),
            },
            sampler,
            publisher.clone(),
        );
        let count = count_publishes(&publisher);

        scheduler.start();
        scheduler.stop();
        thread::sleep(Duration::from_millis(300));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fixed_interval_single_tick() {
        let (sampler, publisher) = pipeline();
        let scheduler = SamplingScheduler::new(
            SchedulerPolicy::FixedInterval {
                period: Duration::from_millis(50),
            },
            sampler,
            publisher.clone(),
        );
        let count = count_publishes(&publisher);

        scheduler.start();
        thread::sleep(Duration::from_millis(75));
        scheduler.stop();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Nothing fires after stop() has returned.
        thread::sleep(Duration::from_millis(150));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_frame_throttling() {
        let (sampler, publisher) = pipeline();
        let scheduler = SamplingScheduler::new(
            SchedulerPolicy::FrameThrottled {
                min_interval: Duration::from_millis(50),
            },
            sampler,
            publisher.clone(),
        );
        let count = count_publishes(&publisher);

        // Frames before start are ignored.
        scheduler.on_frame();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        scheduler.start();
        scheduler.on_frame();
        scheduler.on_frame();
        scheduler.on_frame();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        thread::sleep(Duration::from_millis(60));
        scheduler.on_frame();
        assert_eq!(count.load(Ordering::SeqCst), 2);

        scheduler.stop();
        thread::sleep(Duration::from_millis(60));
        scheduler.on_frame();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drop_while_running_stops_timer() {
        let (sampler, publisher) = pipeline();
        let count = count_publishes(&publisher);
        {
            let scheduler = SamplingScheduler::new(
                SchedulerPolicy::FixedInterval {
                    period: Duration::from_millis(20),
                },
                sampler,
                publisher.clone(),
            );
            scheduler.start();
            thread::sleep(Duration::from_millis(50));
        }
        let after_drop = count.load(Ordering::SeqCst);
        assert!(after_drop >= 1);
        thread::sleep(Duration::from_millis(60));
        assert_eq!(count.load(Ordering::SeqCst), after_drop);
    }
}

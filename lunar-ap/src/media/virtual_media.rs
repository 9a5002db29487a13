//! Clock-driven virtual transport
//!
//! Headless [`MediaResource`] backed by tokio time instead of an audio device.
//! It behaves like a browser media element: `play()` settles after a start
//! latency, a later `pause()`/`load()` interrupts it, the track ends after its
//! duration (or loops), and failures can be injected through
//! [`VirtualMediaControl`]. Transport statistics let tests observe how the
//! resource was driven.

use super::{MediaError, MediaEvent, MediaFactory, MediaResource, PendingPlay};
use crate::config::MediaConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, trace};

type PlaySender = oneshot::Sender<Result<(), MediaError>>;

/// Counters describing how a resource has been driven
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaStats {
    pub play_calls: u64,
    pub loads: u64,
    pub pauses: u64,
    /// Play calls currently awaiting settlement
    pub outstanding: usize,
    /// Highest `outstanding` ever observed
    pub max_outstanding: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TransportState {
    Paused,
    Starting,
    Playing { since: Instant },
}

#[derive(Debug)]
struct Transport {
    label: String,
    source: Option<String>,
    duration: Option<Duration>,
    generation: u64,
    /// Bumped on every transport change; clock tasks from older epochs exit
    epoch: u64,
    state: TransportState,
    /// Position at the last state change
    position: Duration,
    volume: f32,
    looping: bool,
    pending: Vec<PlaySender>,
    refuse_next: u32,
    fail_next: u32,
    stats: MediaStats,
}

impl Transport {
    fn position_now(&self) -> Duration {
        let position = match self.state {
            TransportState::Playing { since } => self.position + since.elapsed(),
            _ => self.position,
        };
        match self.duration {
            Some(d) => position.min(d),
            None => position,
        }
    }

    fn settle_pending(&mut self, result: Result<(), MediaError>) {
        for tx in self.pending.drain(..) {
            let _ = tx.send(result.clone());
        }
        self.stats.outstanding = 0;
    }

    /// Stop the clock, failing any play that has not started yet
    fn halt(&mut self) {
        if self.state == TransportState::Starting {
            self.settle_pending(Err(MediaError::Interrupted));
        }
        self.position = self.position_now();
        self.state = TransportState::Paused;
        self.epoch += 1;
    }

    fn at_end(&self) -> bool {
        matches!(self.duration, Some(d) if self.position >= d)
    }
}

/// Tuning for virtual transports
#[derive(Debug, Clone, Copy, Default)]
pub struct VirtualMediaOptions {
    /// Delay between `play()` and its settlement
    pub start_latency: Duration,
    /// Duration assumed when a load carries none
    pub fallback_duration: Option<Duration>,
}

impl From<&MediaConfig> for VirtualMediaOptions {
    fn from(config: &MediaConfig) -> Self {
        Self {
            start_latency: Duration::from_millis(config.start_latency_ms),
            fallback_duration: config.fallback_duration_ms.map(Duration::from_millis),
        }
    }
}

fn lock(shared: &Mutex<Transport>) -> MutexGuard<'_, Transport> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulated media element
pub struct VirtualMedia {
    shared: Arc<Mutex<Transport>>,
    events: mpsc::UnboundedSender<MediaEvent>,
    options: VirtualMediaOptions,
}

impl VirtualMedia {
    pub fn new(
        label: &str,
        options: VirtualMediaOptions,
        events: mpsc::UnboundedSender<MediaEvent>,
    ) -> Self {
        let transport = Transport {
            label: label.to_string(),
            source: None,
            duration: None,
            generation: 0,
            epoch: 0,
            state: TransportState::Paused,
            position: Duration::ZERO,
            volume: 1.0,
            looping: false,
            pending: Vec::new(),
            refuse_next: 0,
            fail_next: 0,
            stats: MediaStats::default(),
        };
        Self {
            shared: Arc::new(Mutex::new(transport)),
            events,
            options,
        }
    }

    /// Test/inspection handle sharing this transport
    pub fn control(&self) -> VirtualMediaControl {
        VirtualMediaControl {
            shared: Arc::clone(&self.shared),
            events: self.events.clone(),
        }
    }

    fn spawn_clock(&self, epoch: u64, start_delay: Duration) {
        let shared = Arc::clone(&self.shared);
        let events = self.events.clone();
        tokio::spawn(run_clock(shared, events, epoch, start_delay));
    }
}

/// Drives one play run: start settlement, then end-of-track (or loop)
async fn run_clock(
    shared: Arc<Mutex<Transport>>,
    events: mpsc::UnboundedSender<MediaEvent>,
    epoch: u64,
    start_delay: Duration,
) {
    tokio::time::sleep(start_delay).await;

    {
        let mut t = lock(&shared);
        if t.epoch != epoch {
            return;
        }
        if t.state == TransportState::Starting {
            t.state = TransportState::Playing {
                since: Instant::now(),
            };
            t.settle_pending(Ok(()));
            trace!("[{}] playback started at {:?}", t.label, t.position);
        }
    }

    loop {
        let remaining = {
            let t = lock(&shared);
            if t.epoch != epoch {
                return;
            }
            match t.duration {
                Some(d) => d.saturating_sub(t.position_now()),
                None => return,
            }
        };

        tokio::time::sleep(remaining).await;

        let generation = {
            let mut t = lock(&shared);
            if t.epoch != epoch {
                return;
            }
            if t.looping {
                t.position = Duration::ZERO;
                t.state = TransportState::Playing {
                    since: Instant::now(),
                };
                continue;
            }
            t.position = t.duration.unwrap_or(t.position);
            t.state = TransportState::Paused;
            t.epoch += 1;
            debug!("[{}] reached end of source", t.label);
            t.generation
        };

        let _ = events.send(MediaEvent::Ended { generation });
        return;
    }
}

impl MediaResource for VirtualMedia {
    fn load(&mut self, source: &str, duration: Option<Duration>) -> u64 {
        let generation = {
            let mut t = lock(&self.shared);
            t.halt();
            t.source = Some(source.to_string());
            t.duration = duration.or(self.options.fallback_duration);
            t.position = Duration::ZERO;
            t.generation += 1;
            t.stats.loads += 1;
            debug!("[{}] loaded {} (generation {})", t.label, source, t.generation);
            t.generation
        };
        let _ = self.events.send(MediaEvent::CanPlay { generation });
        generation
    }

    fn unload(&mut self) {
        let mut t = lock(&self.shared);
        t.halt();
        t.source = None;
        t.duration = None;
        t.position = Duration::ZERO;
        t.generation += 1;
    }

    fn play(&mut self) -> PendingPlay {
        let mut t = lock(&self.shared);
        t.stats.play_calls += 1;

        if t.source.is_none() {
            return PendingPlay::settled(Err(MediaError::NoSource));
        }
        if t.refuse_next > 0 {
            t.refuse_next -= 1;
            return PendingPlay::settled(Err(MediaError::Blocked(
                "play() requires a user gesture".to_string(),
            )));
        }
        if t.fail_next > 0 {
            t.fail_next -= 1;
            let source = t.source.clone().unwrap_or_default();
            return PendingPlay::settled(Err(MediaError::Decode(format!(
                "unable to decode {}",
                source
            ))));
        }

        match t.state {
            TransportState::Playing { .. } => PendingPlay::settled(Ok(())),
            TransportState::Starting => {
                let (tx, rx) = oneshot::channel();
                t.pending.push(tx);
                t.stats.outstanding = t.pending.len();
                t.stats.max_outstanding = t.stats.max_outstanding.max(t.stats.outstanding);
                PendingPlay::new(rx)
            }
            TransportState::Paused => {
                if t.at_end() {
                    t.position = Duration::ZERO;
                }
                let (tx, rx) = oneshot::channel();
                t.pending.push(tx);
                t.stats.outstanding = t.pending.len();
                t.stats.max_outstanding = t.stats.max_outstanding.max(t.stats.outstanding);
                t.state = TransportState::Starting;
                t.epoch += 1;
                let epoch = t.epoch;
                drop(t);
                self.spawn_clock(epoch, self.options.start_latency);
                PendingPlay::new(rx)
            }
        }
    }

    fn pause(&mut self) {
        let mut t = lock(&self.shared);
        if t.state != TransportState::Paused {
            t.stats.pauses += 1;
            t.halt();
        }
    }

    fn is_paused(&self) -> bool {
        lock(&self.shared).state == TransportState::Paused
    }

    fn seek(&mut self, position: Duration) {
        let mut t = lock(&self.shared);
        let position = match t.duration {
            Some(d) => position.min(d),
            None => position,
        };
        match t.state {
            TransportState::Playing { .. } => {
                t.position = position;
                t.state = TransportState::Playing {
                    since: Instant::now(),
                };
                t.epoch += 1;
                let epoch = t.epoch;
                drop(t);
                self.spawn_clock(epoch, Duration::ZERO);
            }
            _ => t.position = position,
        }
    }

    fn position(&self) -> Duration {
        lock(&self.shared).position_now()
    }

    fn set_volume(&mut self, volume: f32) {
        lock(&self.shared).volume = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f32 {
        lock(&self.shared).volume
    }

    fn set_looping(&mut self, looping: bool) {
        lock(&self.shared).looping = looping;
    }
}

/// Inspection and failure-injection handle for a [`VirtualMedia`]
#[derive(Clone)]
pub struct VirtualMediaControl {
    shared: Arc<Mutex<Transport>>,
    events: mpsc::UnboundedSender<MediaEvent>,
}

impl VirtualMediaControl {
    /// Refuse the next `count` play calls as autoplay-blocked
    pub fn refuse_next_plays(&self, count: u32) {
        lock(&self.shared).refuse_next = count;
    }

    /// Fail the next `count` play calls with a decode error
    pub fn fail_next_plays(&self, count: u32) {
        lock(&self.shared).fail_next = count;
    }

    /// Raise a resource-level error for the loaded source
    pub fn emit_error(&self, message: &str) {
        let generation = lock(&self.shared).generation;
        let _ = self.events.send(MediaEvent::Error {
            generation,
            message: message.to_string(),
        });
    }

    pub fn stats(&self) -> MediaStats {
        lock(&self.shared).stats
    }

    pub fn is_playing(&self) -> bool {
        matches!(lock(&self.shared).state, TransportState::Playing { .. })
    }

    pub fn is_paused(&self) -> bool {
        lock(&self.shared).state == TransportState::Paused
    }

    pub fn position(&self) -> Duration {
        lock(&self.shared).position_now()
    }

    pub fn volume(&self) -> f32 {
        lock(&self.shared).volume
    }

    pub fn is_looping(&self) -> bool {
        lock(&self.shared).looping
    }

    pub fn source(&self) -> Option<String> {
        lock(&self.shared).source.clone()
    }

    pub fn generation(&self) -> u64 {
        lock(&self.shared).generation
    }
}

/// Builds virtual transports and remembers their control handles by label
#[derive(Default)]
pub struct VirtualMediaFactory {
    options: VirtualMediaOptions,
    controls: Mutex<HashMap<String, VirtualMediaControl>>,
}

impl VirtualMediaFactory {
    pub fn new(options: VirtualMediaOptions) -> Self {
        Self {
            options,
            controls: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(VirtualMediaOptions::from(config))
    }

    /// Control handle for the resource created under `label`
    pub fn control(&self, label: &str) -> Option<VirtualMediaControl> {
        self.controls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(label)
            .cloned()
    }
}

impl MediaFactory for VirtualMediaFactory {
    fn create(
        &self,
        label: &str,
        events: mpsc::UnboundedSender<MediaEvent>,
    ) -> Box<dyn MediaResource> {
        let media = VirtualMedia::new(label, self.options, events);
        self.controls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(label.to_string(), media.control());
        Box::new(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(latency_ms: u64) -> (VirtualMedia, mpsc::UnboundedReceiver<MediaEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let options = VirtualMediaOptions {
            start_latency: Duration::from_millis(latency_ms),
            fallback_duration: None,
        };
        (VirtualMedia::new("test", options, tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_settles_after_latency() {
        let (mut media, mut rx) = media(50);
        let generation = media.load("mem://a", Some(Duration::from_secs(10)));
        assert_eq!(rx.recv().await, Some(MediaEvent::CanPlay { generation }));

        let pending = media.play();
        assert!(!media.is_paused());
        assert_eq!(pending.await, Ok(()));
        assert!(media.control().is_playing());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(media.position(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_interrupts_pending_play() {
        let (mut media, _rx) = media(50);
        media.load("mem://a", None);
        let pending = media.play();
        media.pause();
        assert_eq!(pending.await, Err(MediaError::Interrupted));
        assert!(media.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_interrupts_pending_play() {
        let (mut media, _rx) = media(50);
        media.load("mem://a", None);
        let pending = media.play();
        media.load("mem://b", None);
        assert_eq!(pending.await, Err(MediaError::Interrupted));
        assert_eq!(media.position(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_plays_are_counted() {
        let (mut media, _rx) = media(50);
        media.load("mem://a", None);
        let first = media.play();
        let second = media.play();
        assert_eq!(media.control().stats().max_outstanding, 2);
        assert_eq!(first.await, Ok(()));
        assert_eq!(second.await, Ok(()));
        assert_eq!(media.control().stats().outstanding, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_of_source_emits_ended() {
        let (mut media, mut rx) = media(0);
        let generation = media.load("mem://a", Some(Duration::from_secs(3)));
        let _ = rx.recv().await;
        media.play().await.unwrap();

        assert_eq!(rx.recv().await, Some(MediaEvent::Ended { generation }));
        assert!(media.is_paused());
        assert_eq!(media.position(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_looping_never_ends() {
        let (mut media, mut rx) = media(0);
        media.set_looping(true);
        media.load("mem://loop", Some(Duration::from_secs(1)));
        let _ = rx.recv().await;
        media.play().await.unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!media.is_paused());
        assert_eq!(media.position(), Duration::from_millis(500));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_restarts_end_timer() {
        let (mut media, mut rx) = media(0);
        let generation = media.load("mem://a", Some(Duration::from_secs(5)));
        let _ = rx.recv().await;
        media.play().await.unwrap();

        tokio::time::sleep(Duration::from_secs(4)).await;
        media.seek(Duration::ZERO);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!media.is_paused());
        assert!(rx.try_recv().is_err());

        assert_eq!(rx.recv().await, Some(MediaEvent::Ended { generation }));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let (mut media, _rx) = media(0);
        assert_eq!(media.play().await, Err(MediaError::NoSource));

        media.load("mem://a", None);
        let control = media.control();
        control.refuse_next_plays(1);
        assert!(matches!(media.play().await, Err(MediaError::Blocked(_))));
        control.fail_next_plays(1);
        assert!(matches!(media.play().await, Err(MediaError::Decode(_))));
        assert_eq!(media.play().await, Ok(()));
        assert_eq!(control.stats().play_calls, 4);
    }

    #[test]
    fn test_factory_registers_controls() {
        let factory = VirtualMediaFactory::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut resource = factory.create("layer:rain", tx);
        resource.set_volume(1.5);
        let control = factory.control("layer:rain").unwrap();
        assert_eq!(control.volume(), 1.0);
        assert!(factory.control("primary").is_none());
    }
}

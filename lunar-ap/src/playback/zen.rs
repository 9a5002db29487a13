//! Zen fade-out
//!
//! A timed ramp that lowers the desired volume step by step, then stops
//! playback and restores the pre-ramp volume. At most one ramp runs at a time;
//! the ramp state lives in the session lock so a re-trigger, a pause or a
//! user volume change all see it consistently.

use super::session::{PlaybackSession, SessionInner};
use crate::config::ZenConfig;
use chrono::Utc;
use lunar_common::events::ZenOutcome;
use lunar_common::LunarEvent;
use std::sync::Weak;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Ramp shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZenSettings {
    /// Volume removed per tick
    pub step: f32,
    pub interval: Duration,
    /// Stop once the volume is at or below this
    pub floor: f32,
}

impl From<&ZenConfig> for ZenSettings {
    fn from(config: &ZenConfig) -> Self {
        Self {
            step: config.step,
            interval: Duration::from_millis(config.interval_ms),
            floor: config.floor,
        }
    }
}

/// An active ramp
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ZenRamp {
    pub(crate) id: u64,
    pub(crate) restore_volume: f32,
}

impl PlaybackSession {
    /// Start a fade-out ramp
    ///
    /// Returns `false` (and does nothing) while a ramp is already running or
    /// when nothing is playing.
    pub fn zen_fade_out(&self) -> bool {
        let (id, from_volume) = {
            let mut guard = self.inner.lock();
            let state = &mut *guard;
            if state.zen.is_some() {
                debug!("Zen fade-out already active");
                return false;
            }
            if !state.intent.is_playing || state.intent.detached || state.playlist.is_empty() {
                debug!("Zen fade-out ignored: not playing");
                return false;
            }

            state.zen_seq += 1;
            let ramp = ZenRamp {
                id: state.zen_seq,
                restore_volume: state.intent.volume,
            };
            state.zen = Some(ramp);
            self.inner.emit(LunarEvent::ZenStarted {
                from_volume: ramp.restore_volume,
                timestamp: Utc::now(),
            });
            (ramp.id, ramp.restore_volume)
        };

        info!("Zen fade-out started from volume {:.2}", from_volume);
        tokio::spawn(run_ramp(
            std::sync::Arc::downgrade(&self.inner),
            id,
            self.inner.settings.zen,
        ));
        true
    }
}

async fn run_ramp(session: Weak<SessionInner>, id: u64, settings: ZenSettings) {
    let mut ticker = tokio::time::interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(inner) = session.upgrade() else {
            return;
        };
        if !inner.zen_tick(id, &settings) {
            return;
        }
    }
}

impl SessionInner {
    /// One ramp step; returns whether the ramp continues
    fn zen_tick(&self, id: u64, settings: &ZenSettings) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        match state.zen {
            Some(ramp) if ramp.id == id => {}
            _ => return false,
        }

        if state.intent.volume > settings.floor {
            state.intent.volume = (state.intent.volume - settings.step).max(0.0);
            self.emit(LunarEvent::VolumeChanged {
                volume: state.intent.volume,
                timestamp: Utc::now(),
            });
        }

        if state.intent.volume > settings.floor {
            self.publish(state);
            return true;
        }

        // Floor reached: stop, then put the preference back
        let Some(ramp) = state.zen.take() else {
            return false;
        };
        self.set_playing(state, false);
        state.intent.volume = ramp.restore_volume;
        self.emit(LunarEvent::VolumeChanged {
            volume: ramp.restore_volume,
            timestamp: Utc::now(),
        });
        self.emit(LunarEvent::ZenFinished {
            outcome: ZenOutcome::Completed,
            volume: ramp.restore_volume,
            timestamp: Utc::now(),
        });
        self.publish(state);
        info!(
            "Zen fade-out complete; playback stopped, volume restored to {:.2}",
            ramp.restore_volume
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::track;
    use crate::media::VirtualMediaFactory;
    use crate::playback::SessionSettings;
    use lunar_common::EventBus;
    use std::sync::Arc;

    fn playing_session() -> PlaybackSession {
        let factory = VirtualMediaFactory::default();
        let session = PlaybackSession::start(
            SessionSettings::default(),
            &factory,
            Arc::new(EventBus::default()),
        );
        session.add_tracks(vec![track("a")]);
        session.set_volume(0.5);
        session
    }

    #[tokio::test(start_paused = true)]
    async fn test_ramp_stops_and_restores() {
        let session = playing_session();
        assert!(session.zen_fade_out());

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(session.volume() < 0.5);
        assert!(session.is_playing());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!session.is_playing());
        assert!(!session.zen_active());
        assert_eq!(session.volume(), 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_started_when_paused() {
        let session = playing_session();
        session.pause();
        assert!(!session.zen_fade_out());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_mid_ramp_restores() {
        let session = playing_session();
        session.zen_fade_out();
        tokio::time::sleep(Duration::from_millis(450)).await;
        session.pause();
        assert_eq!(session.volume(), 0.5);
        assert!(!session.zen_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_change_cancels_ramp() {
        let session = playing_session();
        session.zen_fade_out();
        tokio::time::sleep(Duration::from_millis(250)).await;
        session.set_volume(0.8);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(session.volume(), 0.8);
        assert!(session.is_playing());
    }
}

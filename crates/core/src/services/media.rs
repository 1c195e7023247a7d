use serde::Serialize;

use super::{Lifecycle, Service, ServiceContext, ServiceState};
use crate::{ensure_invariant, Configuration, Notification, Result};

/// Playback phase of the media service while it is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MediaPhase {
    Empty,
    Loading,
    Playing,
    Finished,
}

/// Owns the playlist: loads the first queued item on start and the next one
/// whenever the ticker flags the end of the current item.
#[derive(Debug)]
pub struct MediaService {
    lifecycle: Lifecycle,
    phase: MediaPhase,
    played: usize,
}

impl Default for MediaService {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaService {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new("media"),
            phase: MediaPhase::Empty,
            played: 0,
        }
    }

    pub fn phase(&self) -> MediaPhase {
        self.phase
    }

    /// Items loaded since the last initialisation.
    pub fn played(&self) -> usize {
        self.played
    }

    fn advance(&mut self, ctx: &mut ServiceContext<'_>) {
        self.phase = MediaPhase::Loading;

        while let Some(media) = ctx.session.next_queued_media() {
            if !media.duration_ms.is_finite() || media.duration_ms < 0.0 {
                tracing::warn!(
                    media = %media.id,
                    duration = media.duration_ms,
                    "skipping media with invalid duration"
                );
                ctx.notifier.notify(Notification::warning(format!(
                    "Skipped unplayable media {}",
                    media.id
                )));
                continue;
            }

            tracing::info!(media = %media.id, duration_ms = media.duration_ms, "media loaded");
            ctx.session.load_media(Some(media));
            self.played += 1;
            self.phase = MediaPhase::Playing;
            return;
        }

        if self.played == 0 {
            self.phase = MediaPhase::Empty;
            ctx.notifier
                .notify(Notification::warning("No media queued for this game"));
        } else {
            self.phase = MediaPhase::Finished;
            tracing::info!(played = self.played, "playlist complete");
            ctx.notifier.notify(Notification::info("Playlist complete"));
        }
    }
}

impl Service for MediaService {
    fn name(&self) -> &'static str {
        "media"
    }

    fn state(&self) -> ServiceState {
        self.lifecycle.state()
    }

    fn initialize(&mut self, _config: &Configuration, ctx: &mut ServiceContext<'_>) -> Result<()> {
        if !self.lifecycle.begin_initialize()? {
            return Ok(());
        }
        self.played = 0;
        self.advance(ctx);
        self.lifecycle.finish_initialize(Ok(()))
    }

    fn stop(&mut self, ctx: &mut ServiceContext<'_>) {
        if !self.lifecycle.begin_stop() {
            return;
        }
        ctx.session.load_media(None);
        self.phase = MediaPhase::Empty;
        self.lifecycle.finish_stop();
    }

    fn sync(&mut self, ctx: &mut ServiceContext<'_>) -> Result<()> {
        if !self.lifecycle.is_running() || self.phase != MediaPhase::Playing {
            return Ok(());
        }
        ensure_invariant(
            ctx.session.current_media().is_some(),
            "media service is playing without current media",
        )?;

        if ctx.session.media_ended() {
            self.advance(ctx);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::harness::ServiceHarness;
    use crate::{MediaDescriptor, SessionState};

    fn harness_with(playlist: Vec<MediaDescriptor>) -> ServiceHarness {
        let mut harness = ServiceHarness::new(Configuration::default());
        harness.session = SessionState::with_playlist(Configuration::default(), playlist);
        harness
    }

    #[test]
    fn loads_first_item_on_initialise() {
        let mut harness = harness_with(vec![
            MediaDescriptor::new("a", 1_000.0),
            MediaDescriptor::new("b", 1_000.0),
        ]);
        let mut service = MediaService::new();

        service
            .initialize(&Configuration::default(), &mut harness.ctx())
            .unwrap();

        assert_eq!(service.state(), ServiceState::Running);
        assert_eq!(service.phase(), MediaPhase::Playing);
        assert_eq!(harness.session.current_media().unwrap().id, "a");
        assert_eq!(harness.session.queued_media(), 1);
    }

    #[test]
    fn reinitialising_does_not_skip_ahead() {
        let mut harness = harness_with(vec![
            MediaDescriptor::new("a", 1_000.0),
            MediaDescriptor::new("b", 1_000.0),
        ]);
        let mut service = MediaService::new();
        let config = Configuration::default();

        service.initialize(&config, &mut harness.ctx()).unwrap();
        service.initialize(&config, &mut harness.ctx()).unwrap();

        assert_eq!(harness.session.current_media().unwrap().id, "a");
        assert_eq!(service.played(), 1);
    }

    #[test]
    fn advances_after_end_of_media_and_finishes_once() {
        let mut harness = harness_with(vec![
            MediaDescriptor::new("a", 1_000.0),
            MediaDescriptor::new("b", 1_000.0),
        ]);
        let mut service = MediaService::new();
        service
            .initialize(&Configuration::default(), &mut harness.ctx())
            .unwrap();

        harness.session.mark_media_ended();
        service.sync(&mut harness.ctx()).unwrap();
        assert_eq!(harness.session.current_media().unwrap().id, "b");
        assert!(!harness.session.media_ended());

        harness.session.mark_media_ended();
        service.sync(&mut harness.ctx()).unwrap();
        service.sync(&mut harness.ctx()).unwrap();

        assert_eq!(service.phase(), MediaPhase::Finished);
        assert_eq!(harness.notifications.count_matching("Playlist complete"), 1);
    }

    #[test]
    fn skips_items_with_invalid_duration() {
        let mut broken = MediaDescriptor::new("broken", 1.0);
        broken.duration_ms = f64::NAN;
        let mut harness = harness_with(vec![broken, MediaDescriptor::new("ok", 1_000.0)]);
        let mut service = MediaService::new();

        service
            .initialize(&Configuration::default(), &mut harness.ctx())
            .unwrap();

        assert_eq!(harness.session.current_media().unwrap().id, "ok");
        assert_eq!(harness.notifications.count_matching("broken"), 1);
    }

    #[test]
    fn empty_playlist_is_reported() {
        let mut harness = harness_with(Vec::new());
        let mut service = MediaService::new();

        service
            .initialize(&Configuration::default(), &mut harness.ctx())
            .unwrap();

        assert_eq!(service.phase(), MediaPhase::Empty);
        assert_eq!(harness.notifications.count_matching("No media"), 1);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut harness = harness_with(vec![MediaDescriptor::new("a", 1_000.0)]);
        let mut service = MediaService::new();
        service
            .initialize(&Configuration::default(), &mut harness.ctx())
            .unwrap();

        service.stop(&mut harness.ctx());
        let generation = harness.session.media_generation();
        service.stop(&mut harness.ctx());

        assert_eq!(service.state(), ServiceState::Idle);
        assert!(harness.session.current_media().is_none());
        assert_eq!(harness.session.media_generation(), generation);
    }
}

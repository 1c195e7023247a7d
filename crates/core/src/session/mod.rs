use std::collections::VecDeque;

use serde::Serialize;

use crate::{Configuration, GameAction, MediaDescriptor, StrokePattern};

/// Mutable state of one running game, passed explicitly to every processor
/// and service.
///
/// Each field has exactly one writer, noted on its setter; everyone else only
/// reads. A new game always starts from a fresh `SessionState`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    config: Configuration,
    playlist: VecDeque<MediaDescriptor>,
    current_media: Option<MediaDescriptor>,
    media_generation: u64,
    media_ended: bool,
    playback_position_ms: f64,
    stroke_target: f64,
    stroke_speed: f64,
    stroke_speed_baseline: f64,
    stroke_pattern: StrokePattern,
    grip: f64,
    grip_active: bool,
    triggered_actions: Vec<GameAction>,
}

impl SessionState {
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Fresh session state with media queued for the media service.
    pub fn with_playlist(config: Configuration, playlist: Vec<MediaDescriptor>) -> Self {
        Self {
            config,
            playlist: playlist.into(),
            ..Default::default()
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Items still waiting to be played.
    pub fn queued_media(&self) -> usize {
        self.playlist.len()
    }

    pub fn current_media(&self) -> Option<&MediaDescriptor> {
        self.current_media.as_ref()
    }

    /// Incremented every time a media item is loaded. Processors compare it
    /// with the value they saw last to detect a new item.
    pub fn media_generation(&self) -> u64 {
        self.media_generation
    }

    pub fn media_ended(&self) -> bool {
        self.media_ended
    }

    pub fn playback_position_ms(&self) -> f64 {
        self.playback_position_ms
    }

    pub fn stroke_target(&self) -> f64 {
        self.stroke_target
    }

    pub fn stroke_speed(&self) -> f64 {
        self.stroke_speed
    }

    pub fn stroke_speed_baseline(&self) -> f64 {
        self.stroke_speed_baseline
    }

    pub fn stroke_pattern(&self) -> StrokePattern {
        self.stroke_pattern
    }

    pub fn grip(&self) -> f64 {
        self.grip
    }

    pub fn grip_active(&self) -> bool {
        self.grip_active
    }

    pub fn triggered_actions(&self) -> &[GameAction] {
        &self.triggered_actions
    }

    /// Writer: media service.
    pub(crate) fn next_queued_media(&mut self) -> Option<MediaDescriptor> {
        self.playlist.pop_front()
    }

    /// Writer: media service. Rewinds playback for the new item.
    pub(crate) fn load_media(&mut self, media: Option<MediaDescriptor>) {
        self.current_media = media;
        self.media_generation += 1;
        self.media_ended = false;
        self.playback_position_ms = 0.0;
    }

    /// Writer: ticker.
    pub(crate) fn set_playback_position(&mut self, position_ms: f64) {
        self.playback_position_ms = position_ms;
    }

    /// Writer: ticker.
    pub(crate) fn mark_media_ended(&mut self) {
        self.media_ended = true;
    }

    /// Writer: stroke emitter.
    pub(crate) fn set_stroke_target(&mut self, target: f64) {
        self.stroke_target = target;
    }

    /// Writer: stroke-speed adjustment.
    pub(crate) fn set_stroke_speed(&mut self, speed: f64) {
        self.stroke_speed = speed;
    }

    /// Writer: baseline adjustment.
    pub(crate) fn set_stroke_speed_baseline(&mut self, baseline: f64) {
        self.stroke_speed_baseline = baseline;
    }

    /// Writer: stroke service.
    pub(crate) fn set_stroke_pattern(&mut self, pattern: StrokePattern) {
        self.stroke_pattern = pattern;
    }

    /// Writer: grip adjustment while running, grip service on stop.
    pub(crate) fn set_grip(&mut self, grip: f64) {
        self.grip = grip;
    }

    /// Writer: grip service.
    pub(crate) fn set_grip_active(&mut self, active: bool) {
        self.grip_active = active;
    }

    /// Writer: action loop appends.
    pub(crate) fn push_action(&mut self, action: GameAction) {
        self.triggered_actions.push(action);
    }

    /// Writer: action service drains.
    pub(crate) fn take_actions(&mut self) -> Vec<GameAction> {
        std::mem::take(&mut self.triggered_actions)
    }
}

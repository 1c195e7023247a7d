use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::{Result, SyncError};

/// Audio cue played by the moan loop, one per configured speed threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MoanCue {
    Soft,
    Moderate,
    Intense,
}

impl MoanCue {
    /// Maps a crossed threshold index to a cue. Indices past the last cue
    /// reuse the most intense one.
    pub fn for_level(level: usize) -> Self {
        match level {
            0 => Self::Soft,
            1 => Self::Moderate,
            _ => Self::Intense,
        }
    }
}

/// Platform audio output used by the bridge.
pub trait AudioBackend {
    fn open(&mut self) -> Result<()>;
    fn play(&mut self, cue: MoanCue) -> Result<()>;
    fn close(&mut self);
}

#[derive(Debug, Default)]
struct SilentState {
    open: bool,
    opened: usize,
    closed: usize,
    played: Vec<MoanCue>,
    fail_open: Option<String>,
    fail_play: bool,
}

/// Backend that produces no sound and records what would have been played.
/// Clones share state.
#[derive(Debug, Default, Clone)]
pub struct SilentAudio {
    state: Arc<Mutex<SilentState>>,
}

impl SilentAudio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `open` fail with the given reason.
    pub fn failing(reason: impl Into<String>) -> Self {
        let audio = Self::new();
        if let Ok(mut state) = audio.lock() {
            state.fail_open = Some(reason.into());
        }
        audio
    }

    /// Makes every subsequent `play` fail while the context stays open.
    pub fn fail_playback(&self) {
        if let Ok(mut state) = self.lock() {
            state.fail_play = true;
        }
    }

    pub fn played(&self) -> Vec<MoanCue> {
        self.lock()
            .map(|state| state.played.clone())
            .unwrap_or_default()
    }

    pub fn is_open(&self) -> bool {
        self.lock().map(|state| state.open).unwrap_or(false)
    }

    /// Number of `(open, close)` calls that reached the backend.
    pub fn lifecycle_counts(&self) -> (usize, usize) {
        self.lock()
            .map(|state| (state.opened, state.closed))
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, SilentState>> {
        self.state
            .lock()
            .map_err(|_| SyncError::msg("audio backend has been poisoned"))
    }
}

impl AudioBackend for SilentAudio {
    fn open(&mut self) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(reason) = &state.fail_open {
            return Err(SyncError::resource_init("audio context", reason.clone()));
        }
        state.open = true;
        state.opened += 1;
        Ok(())
    }

    fn play(&mut self, cue: MoanCue) -> Result<()> {
        let mut state = self.lock()?;
        if !state.open {
            return Err(SyncError::msg("audio backend is closed"));
        }
        if state.fail_play {
            return Err(SyncError::msg("audio output rejected the cue"));
        }
        state.played.push(cue);
        Ok(())
    }

    fn close(&mut self) {
        if let Ok(mut state) = self.lock() {
            state.open = false;
            state.closed += 1;
        }
    }
}

/// Handle to a live audio context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioContext {
    pub id: u64,
}

/// Owns the audio backend and pairs its creation and teardown with the game
/// lifecycle.
pub struct AudioBridge {
    backend: Box<dyn AudioBackend>,
    context: Option<AudioContext>,
    next_id: u64,
}

impl AudioBridge {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self {
            backend,
            context: None,
            next_id: 1,
        }
    }

    /// Opens the audio context. Calling it again while a context is live
    /// returns the existing handle.
    pub fn create(&mut self) -> Result<AudioContext> {
        if let Some(context) = self.context {
            return Ok(context);
        }

        self.backend.open().map_err(|err| match err {
            SyncError::ResourceInit { .. } => err,
            other => SyncError::resource_init("audio context", other.to_string()),
        })?;

        let context = AudioContext { id: self.next_id };
        self.next_id += 1;
        self.context = Some(context);
        tracing::debug!(context = context.id, "audio context created");
        Ok(context)
    }

    pub fn destroy(&mut self) {
        if let Some(context) = self.context.take() {
            self.backend.close();
            tracing::debug!(context = context.id, "audio context destroyed");
        }
    }

    pub fn context(&self) -> Option<AudioContext> {
        self.context
    }

    pub fn is_active(&self) -> bool {
        self.context.is_some()
    }

    /// Plays a cue. Returns `Ok(false)` without a live context.
    pub fn play(&mut self, cue: MoanCue) -> Result<bool> {
        if self.context.is_none() {
            return Ok(false);
        }
        self.backend.play(cue)?;
        Ok(true)
    }
}

impl std::fmt::Debug for AudioBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioBridge")
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_is_idempotent() {
        let audio = SilentAudio::new();
        let mut bridge = AudioBridge::new(Box::new(audio.clone()));

        let first = bridge.create().unwrap();
        let second = bridge.create().unwrap();

        assert_eq!(first, second);
        assert_eq!(audio.lifecycle_counts(), (1, 0));
    }

    #[test]
    fn destroy_is_idempotent() {
        let audio = SilentAudio::new();
        let mut bridge = AudioBridge::new(Box::new(audio.clone()));
        bridge.create().unwrap();

        bridge.destroy();
        bridge.destroy();

        assert!(!audio.is_open());
        assert_eq!(audio.lifecycle_counts(), (1, 1));
    }

    #[test]
    fn failed_open_surfaces_resource_error() {
        let mut bridge = AudioBridge::new(Box::new(SilentAudio::failing("no output device")));

        let err = bridge.create().unwrap_err();

        assert!(matches!(err, SyncError::ResourceInit { .. }));
        assert!(!bridge.is_active());
    }

    #[test]
    fn play_without_context_is_skipped() {
        let audio = SilentAudio::new();
        let mut bridge = AudioBridge::new(Box::new(audio.clone()));

        assert!(!bridge.play(MoanCue::Soft).unwrap());
        bridge.create().unwrap();
        assert!(bridge.play(MoanCue::Intense).unwrap());
        assert_eq!(audio.played(), vec![MoanCue::Intense]);
    }

    #[test]
    fn levels_saturate_at_intense() {
        assert_eq!(MoanCue::for_level(0), MoanCue::Soft);
        assert_eq!(MoanCue::for_level(7), MoanCue::Intense);
    }
}

use crate::db::Track;

/// The "now playing" slot of a room.
///
/// Idle (no track), Playing, or Paused. The position is a logical value
/// driven by seek and time-sync reports, it is never advanced by a clock
/// here. Clients are responsible for signaling completion.
#[derive(Debug, Default)]
pub struct PlaybackState {
    pub current: Option<Track>,
    pub is_playing: bool,
    pub current_time: f64,
}

impl PlaybackState {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    /// Makes the given track current, starting from the beginning.
    pub fn start(&mut self, track: Track) {
        self.current = Some(track);
        self.is_playing = true;
        self.current_time = 0.0;
    }

    /// Clears the slot entirely.
    pub fn stop(&mut self) {
        self.current = None;
        self.is_playing = false;
        self.current_time = 0.0;
    }

    /// Flips between Playing and Paused, leaving the position untouched.
    /// Returns the new state, or [None] when nothing is playing.
    pub fn toggle(&mut self) -> Option<bool> {
        if self.current.is_none() {
            return None;
        }

        self.is_playing = !self.is_playing;
        Some(self.is_playing)
    }

    /// Sets the logical position. Values beyond the track duration are
    /// accepted unclamped. Returns false when nothing is playing.
    pub fn seek(&mut self, time: f64) -> bool {
        if self.current.is_none() {
            return false;
        }

        self.current_time = time.max(0.0);
        true
    }
}

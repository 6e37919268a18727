pub mod player;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::sources::PlaylistEntry;

pub use player::{ClipPlayer, ClipRequest, MpvPlayer};

/// Fuente de aleatoriedad inyectable
pub trait RandomSource: Send {
    /// Entero uniforme en `[0, bound)`. `bound` debe ser > 0.
    fn next_below(&mut self, bound: u64) -> u64;
}

/// Aleatoriedad real, sembrada desde el sistema
pub struct EntropyRandom(StdRng);

impl EntropyRandom {
    pub fn new() -> Self {
        Self(StdRng::from_entropy())
    }
}

impl Default for EntropyRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for EntropyRandom {
    fn next_below(&mut self, bound: u64) -> u64 {
        self.0.gen_range(0..bound)
    }
}

/// Secuencia fija para tests; cada valor se reduce módulo `bound`
#[cfg(test)]
pub struct ScriptedRandom(std::collections::VecDeque<u64>);

#[cfg(test)]
impl ScriptedRandom {
    pub fn new(values: impl IntoIterator<Item = u64>) -> Self {
        Self(values.into_iter().collect())
    }
}

#[cfg(test)]
impl RandomSource for ScriptedRandom {
    fn next_below(&mut self, bound: u64) -> u64 {
        self.0.pop_front().unwrap_or(0) % bound
    }
}

/// Elige un track al azar; `None` si la playlist está vacía
pub fn pick_random_track<'a>(
    entries: &'a [PlaylistEntry],
    rng: &mut dyn RandomSource,
) -> Option<&'a PlaylistEntry> {
    if entries.is_empty() {
        return None;
    }
    entries.get(rng.next_below(entries.len() as u64) as usize)
}

/// Returns a start offset so the clip fits inside the track.
///
/// Unknown (`<= 0`) or too-short tracks start at 0; the clip then simply
/// ends early.
pub fn select_clip_window(track_duration: i64, clip_duration: u64, rng: &mut dyn RandomSource) -> u64 {
    if track_duration <= 0 || track_duration as u64 <= clip_duration {
        return 0;
    }

    let max_start = track_duration as u64 - clip_duration;
    rng.next_below(max_start + 1)
}

/// Duración uniforme en `[min, max]`
pub fn select_clip_duration(min: u64, max: u64, rng: &mut dyn RandomSource) -> u64 {
    if min >= max {
        return min;
    }
    min + rng.next_below(max - min + 1)
}

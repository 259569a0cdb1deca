use crate::SamplePosition;

/// What the host reports about its transport for one block.
#[derive(Clone)]
#[derive(Copy)]
#[derive(Debug)]
#[derive(PartialEq)]
pub struct TransportInfo {
    pub is_playing: bool,
    pub bpm: Option<f64>,
    pub sample_position: Option<i64>,
}

impl TransportInfo {
    pub fn playing(bpm: f64, sample_position: i64) -> Self {
        TransportInfo {
            is_playing: true,
            bpm: Some(bpm),
            sample_position: Some(sample_position),
        }
    }

    pub fn stopped() -> Self {
        TransportInfo {
            is_playing: false,
            bpm: None,
            sample_position: None,
        }
    }

    /// Playhead position, or `None` if the transport should be treated as
    /// stopped. Positions before zero (host pre-roll) count as stopped.
    pub fn playhead(self: &Self) -> Option<SamplePosition> {
        if !self.is_playing {
            return None;
        }
        match self.sample_position.unwrap_or(0) {
            position if position >= 0 => Some(position as SamplePosition),
            _ => None,
        }
    }

    /// Reported tempo, or `default_bpm` if the host has none or it is nonsense.
    pub fn bpm_or(self: &Self, default_bpm: f64) -> f64 {
        match self.bpm {
            Some(bpm) if bpm.is_finite() && bpm > 0.0 => bpm,
            _ => default_bpm,
        }
    }
}

/// A free-running transport for hosts without one of their own, such as the
/// command line renderer.
pub struct TransportClock {
    bpm: f64,
    position: i64,
    playing: bool,
}

impl TransportClock {
    pub fn new(bpm: f64) -> Self {
        TransportClock { bpm, position: 0, playing: true }
    }

    pub fn bpm(self: &Self) -> f64 {
        self.bpm
    }

    pub fn position(self: &Self) -> i64 {
        self.position
    }

    pub fn is_playing(self: &Self) -> bool {
        self.playing
    }

    pub fn set_bpm(self: &mut Self, bpm: f64) {
        self.bpm = bpm;
    }

    pub fn play(self: &mut Self) {
        self.playing = true;
    }

    /// Stop and rewind to the start, like a host's stop button.
    pub fn stop(self: &mut Self) {
        self.playing = false;
        self.position = 0;
    }

    pub fn info(self: &Self) -> TransportInfo {
        if self.playing {
            TransportInfo::playing(self.bpm, self.position)
        } else {
            TransportInfo::stopped()
        }
    }

    /// Move the playhead on by one block, if playing.
    pub fn advance(self: &mut Self, frames: usize) {
        if self.playing {
            self.position += frames as i64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_or_preroll_has_no_playhead() {
        assert_eq!(TransportInfo::stopped().playhead(), None);
        assert_eq!(TransportInfo::playing(120.0, -512).playhead(), None);
        assert_eq!(TransportInfo::playing(120.0, 512).playhead(), Some(512));

        let no_position = TransportInfo { is_playing: true, bpm: None, sample_position: None };
        assert_eq!(no_position.playhead(), Some(0));
        assert_eq!(no_position.bpm_or(120.0), 120.0);
        assert_eq!(TransportInfo::playing(0.0, 0).bpm_or(90.0), 90.0);
    }

    #[test]
    fn clock_advances_only_while_playing() {
        let mut clock = TransportClock::new(100.0);
        clock.advance(64);
        assert_eq!(clock.info(), TransportInfo::playing(100.0, 64));

        clock.stop();
        clock.advance(64);
        assert_eq!(clock.position(), 0);
        assert_eq!(clock.info().playhead(), None);

        clock.play();
        clock.set_bpm(60.0);
        clock.advance(10);
        assert_eq!(clock.info(), TransportInfo::playing(60.0, 10));
    }
}

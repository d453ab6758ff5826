//! Clip time normalization.

/// How a layer's unnormalized time maps into `[0, duration]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlaybackMode {
    /// Clamp to `[0, duration]`.
    #[default]
    Clamp,
    /// Wrap modulo `duration` (negative times wrap backwards).
    Wrap,
}

/// Maps `time_seconds` into `[0, duration]`.
///
/// A non-positive duration always yields `0`.
#[inline]
#[must_use]
pub fn normalize(time_seconds: f32, duration: f32, mode: PlaybackMode) -> f32 {
    if duration <= 0.0 {
        return 0.0;
    }
    match mode {
        // The second modulo folds the `-tiny + duration == duration` rounding
        // case back onto 0.
        PlaybackMode::Wrap => ((time_seconds % duration) + duration) % duration,
        PlaybackMode::Clamp => time_seconds.clamp(0.0, duration),
    }
}

/// Converts an unnormalized time into the `[0, 1]` ratio the sampler expects.
#[inline]
#[must_use]
pub fn ratio(time_seconds: f32, duration: f32, mode: PlaybackMode) -> f32 {
    if duration <= 0.0 {
        return 0.0;
    }
    normalize(time_seconds, duration, mode) / duration
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_periodicity() {
        let duration = 2.0;
        for x in [0.0_f32, 0.25, 0.5, 1.0, 1.75] {
            assert_eq!(
                normalize(duration + x, duration, PlaybackMode::Wrap),
                normalize(x, duration, PlaybackMode::Wrap)
            );
        }
    }

    #[test]
    fn test_wrap_negative() {
        assert_eq!(normalize(-0.5, 2.0, PlaybackMode::Wrap), 1.5);
        assert_eq!(normalize(-4.0, 2.0, PlaybackMode::Wrap), 0.0);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(normalize(-0.001, 2.0, PlaybackMode::Clamp), 0.0);
        assert_eq!(normalize(3.0, 2.0, PlaybackMode::Clamp), 2.0);
        assert_eq!(normalize(1.2, 2.0, PlaybackMode::Clamp), 1.2);
    }

    #[test]
    fn test_zero_duration() {
        assert_eq!(normalize(5.0, 0.0, PlaybackMode::Wrap), 0.0);
        assert_eq!(normalize(5.0, -1.0, PlaybackMode::Clamp), 0.0);
        assert_eq!(ratio(5.0, 0.0, PlaybackMode::Wrap), 0.0);
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio(1.0, 4.0, PlaybackMode::Clamp), 0.25);
        assert_eq!(ratio(9.0, 4.0, PlaybackMode::Wrap), 0.25);
    }
}

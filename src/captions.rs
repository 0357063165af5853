use serde::{Deserialize, Serialize};

/// One timed subtitle line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    pub start: f32,
    pub end: f32,
    pub text: String,
}

impl Caption {
    pub fn new(start: f32, end: f32, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Both ends are inclusive.
    pub fn contains(&self, elapsed: f32) -> bool {
        elapsed >= self.start && elapsed <= self.end
    }
}

/// Ordered caption list. When ranges overlap the earliest entry wins.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CaptionTrack {
    entries: Vec<Caption>,
}

impl CaptionTrack {
    pub fn new(entries: Vec<Caption>) -> Self {
        Self { entries }
    }

    /// The dialogue of the chase.
    pub fn scripted() -> Self {
        Self::new(vec![
            Caption::new(0.9, 3.0, "JAX: \"Come on, Nino! If you're slow, we won't make it!\""),
            Caption::new(3.2, 5.4, "NINO: \"Wait! This bag is too heavy!\""),
        ])
    }

    pub fn entries(&self) -> &[Caption] {
        &self.entries
    }

    pub fn active_index(&self, elapsed: f32) -> Option<usize> {
        self.entries.iter().position(|entry| entry.contains(elapsed))
    }

    pub fn active(&self, elapsed: f32) -> Option<&Caption> {
        self.active_index(elapsed).map(|index| &self.entries[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CaptionTrack {
        CaptionTrack::new(vec![Caption::new(0.9, 3.0, "A"), Caption::new(3.2, 5.4, "B")])
    }

    fn text_at(track: &CaptionTrack, elapsed: f32) -> Option<&str> {
        track.active(elapsed).map(|caption| caption.text.as_str())
    }

    #[test]
    fn selects_by_time() {
        let track = sample();
        assert_eq!(text_at(&track, 0.5), None);
        assert_eq!(text_at(&track, 1.0), Some("A"));
        assert_eq!(text_at(&track, 3.1), None);
        assert_eq!(text_at(&track, 4.0), Some("B"));
        assert_eq!(text_at(&track, 8.0), None);
    }

    #[test]
    fn bounds_are_inclusive() {
        let track = sample();
        assert_eq!(text_at(&track, 0.9), Some("A"));
        assert_eq!(text_at(&track, 3.0), Some("A"));
        assert_eq!(text_at(&track, 5.4), Some("B"));
    }

    #[test]
    fn overlap_prefers_first_entry() {
        let track =
            CaptionTrack::new(vec![Caption::new(1.0, 4.0, "first"), Caption::new(2.0, 5.0, "second")]);
        assert_eq!(text_at(&track, 3.0), Some("first"));
        assert_eq!(text_at(&track, 4.5), Some("second"));
    }

    #[test]
    fn empty_track_selects_nothing() {
        assert_eq!(CaptionTrack::default().active(1.0), None);
    }

    #[test]
    fn scripted_lines_do_not_overlap() {
        let track = CaptionTrack::scripted();
        for pair in track.entries().windows(2) {
            assert!(pair[0].end < pair[1].start);
        }
    }
}

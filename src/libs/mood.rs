//! Mood palette shared by the heatmap and the mood distribution.

/// Color for days without a diary and for moods outside the palette.
pub const NEUTRAL_COLOR: &str = "#EBEDF0";

/// Known mood keys and their colors.
pub const MOOD_PALETTE: [(&str, &str); 8] = [
    ("joy", "#FFD93D"),
    ("calm", "#6BCB77"),
    ("sad", "#4D96FF"),
    ("angry", "#FF6B6B"),
    ("anxious", "#9B72AA"),
    ("tired", "#A7A9AC"),
    ("excited", "#FF9F45"),
    ("grateful", "#F7A8B8"),
];

/// Color for `mood_key`, neutral when absent or unknown.
pub fn mood_color(mood_key: Option<&str>) -> &'static str {
    mood_key
        .and_then(|key| MOOD_PALETTE.iter().find(|(known, _)| *known == key))
        .map(|(_, color)| *color)
        .unwrap_or(NEUTRAL_COLOR)
}

pub fn is_known_mood(mood_key: &str) -> bool {
    MOOD_PALETTE.iter().any(|(known, _)| *known == mood_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_unknown_and_missing_moods() {
        assert_eq!(mood_color(Some("joy")), "#FFD93D");
        assert_eq!(mood_color(Some("grateful")), "#F7A8B8");
        assert_eq!(mood_color(Some("melancholy")), NEUTRAL_COLOR);
        assert_eq!(mood_color(None), NEUTRAL_COLOR);
        assert!(!is_known_mood("JOY"));
    }
}

use serde::Serialize;

/// Narrative intent for one panel position.
///
/// Beats are never stored on their own; a [`crate::models::Panel`] carries the
/// beat that produced it so captions and exported metadata stay in sync with
/// regenerations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryBeat {
    Introduction,
    IncitingIncident,
    RisingAction,
    Climax,
    FallingAction,
    Resolution,
    Continuation,
}

/// The full six-stage arc, in narrative order.
pub const STORY_ARC: [StoryBeat; 6] = [
    StoryBeat::Introduction,
    StoryBeat::IncitingIncident,
    StoryBeat::RisingAction,
    StoryBeat::Climax,
    StoryBeat::FallingAction,
    StoryBeat::Resolution,
];

/// Structurally essential beats used for short strips.
pub const KEY_BEATS: [StoryBeat; 4] = [
    StoryBeat::Introduction,
    StoryBeat::IncitingIncident,
    StoryBeat::Climax,
    StoryBeat::Resolution,
];

const SHORT_STRIP_MAX: usize = 4;

impl StoryBeat {
    /// Upper-case label, `None` for the open-ended continuation beat.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            StoryBeat::Introduction => Some("INTRODUCTION"),
            StoryBeat::IncitingIncident => Some("INCITING INCIDENT"),
            StoryBeat::RisingAction => Some("RISING ACTION"),
            StoryBeat::Climax => Some("CLIMAX"),
            StoryBeat::FallingAction => Some("FALLING ACTION"),
            StoryBeat::Resolution => Some("RESOLUTION"),
            StoryBeat::Continuation => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StoryBeat::Introduction => {
                "Establish the setting and introduce the main character in their normal environment"
            }
            StoryBeat::IncitingIncident => {
                "Something disrupts the character's normal world - a discovery, threat, or opportunity"
            }
            StoryBeat::RisingAction => "Character reacts to the incident and begins to take action",
            StoryBeat::Climax => "The key confrontation or moment of highest tension in the story",
            StoryBeat::FallingAction => "The immediate aftermath of the climax",
            StoryBeat::Resolution => {
                "How the story concludes and what it means for the character"
            }
            StoryBeat::Continuation => "Continue the story with appropriate narrative progression",
        }
    }

    /// Full beat text as embedded in prompts and exported metadata.
    pub fn text(&self) -> String {
        match self.label() {
            Some(label) => format!("{}: {}", label, self.description()),
            None => self.description().to_string(),
        }
    }

    /// One-line caption: the beat text cut at its first `:`.
    pub fn caption(&self) -> String {
        let text = self.text();
        text.split(':').next().unwrap_or_default().trim().to_string()
    }
}

/// Picks the beat for a zero-based panel `index` in a strip of `count` panels.
///
/// Strips of four panels or fewer walk [`KEY_BEATS`] so they hit only the
/// essential moments; longer strips walk the whole [`STORY_ARC`]. Anything past
/// the sixth panel continues the story generically.
pub fn beat_for(index: usize, count: usize) -> StoryBeat {
    if count <= SHORT_STRIP_MAX {
        if let Some(beat) = KEY_BEATS.get(index) {
            return *beat;
        }
    }
    STORY_ARC
        .get(index)
        .copied()
        .unwrap_or(StoryBeat::Continuation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_strips_only_use_key_beats() {
        for count in [1, 2, 3, 4] {
            for index in 0..count {
                let beat = beat_for(index, count);
                assert!(KEY_BEATS.contains(&beat), "{beat:?} at {index}/{count}");
            }
        }
        assert_eq!(beat_for(2, 3), StoryBeat::Climax);
        assert_eq!(beat_for(3, 4), StoryBeat::Resolution);
    }

    #[test]
    fn long_strips_walk_the_full_arc_then_continue() {
        let beats: Vec<_> = (0..8).map(|i| beat_for(i, 8)).collect();
        assert_eq!(&beats[..6], &STORY_ARC[..]);
        assert_eq!(beats[6], StoryBeat::Continuation);
        assert_eq!(beats[7], StoryBeat::Continuation);
    }

    #[test]
    fn beats_are_deterministic() {
        for count in [3, 4, 6, 8] {
            for index in 0..count {
                assert_eq!(beat_for(index, count), beat_for(index, count));
            }
        }
    }

    #[test]
    fn caption_is_label_before_delimiter() {
        assert_eq!(StoryBeat::IncitingIncident.caption(), "INCITING INCIDENT");
        assert_eq!(
            StoryBeat::Continuation.caption(),
            "Continue the story with appropriate narrative progression"
        );
        assert!(StoryBeat::Climax.text().starts_with("CLIMAX: The key confrontation"));
    }
}

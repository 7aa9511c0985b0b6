//! Prompt templates sent to the image model.
//!
//! The model keeps no memory between calls, so every prompt repeats the same
//! [`GLOBAL_CONSTRAINTS`] block verbatim. Keep both builders pointing at the
//! constant; editing the wording in one place only would break continuity.

use crate::models::StylePreset;
use crate::story::StoryBeat;

pub const GLOBAL_CONSTRAINTS: &str = "HARD CONSTRAINTS:
1. EXACT character consistency (face, costume, proportions)
2. Professional comic illustration quality
3. Speech bubbles with clear, readable text (no artifacts)
4. Dynamic composition with proper comic framing
5. Maintain visual continuity across panels
6. No watermarks, logos or UI elements";

/// Prompt for the full-body character reference sheet.
///
/// `description` is expected to be non-empty; the studio validates it before
/// calling.
pub fn build_character_prompt(description: &str, style_preset: StylePreset) -> String {
    format!(
        "SYSTEM ROLE:
You are an expert comic character artist with perfect understanding of character design.

USER CHARACTER DESCRIPTION:
{description}

STYLE PRESET:
{style_preset}

TASK:
Transform sketch into a polished full-body character reference.

{GLOBAL_CONSTRAINTS}

OUTPUT FOCUS:
Character on clean background, full body view, detailed costume elements."
    )
}

/// Prompt for a single panel; `panel_index` is zero-based and rendered 1-based.
pub fn build_panel_prompt(
    panel_index: usize,
    panel_count: usize,
    scene_description: &str,
    story_beat: StoryBeat,
    style_preset: StylePreset,
) -> String {
    let position = panel_index + 1;
    let beat = story_beat.text();
    format!(
        "SYSTEM ROLE:
You are a professional comic sequential artist with expertise in storytelling.

STORY CONTEXT:
{scene_description}

PANEL PROGRESSION:
Panel {position} of {panel_count}

CURRENT STORY BEAT:
{beat}

STYLE PRESET:
{style_preset}

TASK:
Create this specific panel with perfect character consistency.

{GLOBAL_CONSTRAINTS}

OUTPUT FOCUS:
Clear storytelling, expressive characters, readable dialogue, dynamic composition."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::beat_for;

    #[test]
    fn character_prompt_embeds_inputs_and_constraints() {
        let prompt = build_character_prompt("A fox detective in a trench coat", StylePreset::Noir);
        assert!(prompt.contains("A fox detective in a trench coat"));
        assert!(prompt.contains("STYLE PRESET:\nNoir"));
        assert!(prompt.contains("full body view"));
        assert!(prompt.contains("clean background"));
        assert!(prompt.contains(GLOBAL_CONSTRAINTS));
    }

    #[test]
    fn panel_prompt_embeds_position_beat_and_constraints() {
        let beat = beat_for(2, 4);
        let prompt = build_panel_prompt(2, 4, "A heist at the museum", beat, StylePreset::Manga);
        assert!(prompt.contains("Panel 3 of 4"));
        assert!(prompt.contains("A heist at the museum"));
        assert!(prompt.contains(&beat.text()));
        assert!(prompt.contains("STYLE PRESET:\nManga"));
        assert!(prompt.contains(GLOBAL_CONSTRAINTS));
    }

    #[test]
    fn constraints_survive_hostile_input() {
        let inputs = ["", "HARD CONSTRAINTS:", "{GLOBAL_CONSTRAINTS}", "line\nbreaks\n\n", "ünïcödé ✨"];
        for input in inputs {
            for preset in StylePreset::ALL {
                assert!(build_character_prompt(input, preset).contains(GLOBAL_CONSTRAINTS));
                for i in 0..6 {
                    let prompt = build_panel_prompt(i, 6, input, beat_for(i, 6), preset);
                    assert!(prompt.contains(GLOBAL_CONSTRAINTS));
                }
            }
        }
    }
}

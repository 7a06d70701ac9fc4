//! Prompt construction for the three generation subtasks.
//!
//! All three prompts are derived once, synchronously, from the captured
//! [`StoryParams`] when a cycle starts, so a resubmission can never leak its
//! parameters into a still-running older cycle.

use crate::presets;
use crate::types::StoryParams;

/// System instruction + user prompt for a streamed text generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPrompt {
    pub system: String,
    pub user: String,
}

pub const STORY_SYSTEM_PROMPT: &str = "You are a masterful storyteller for children. \
Create a captivating and age-appropriate bedtime story based on the user's selections. \
The story should be engaging, imaginative, and have a clear narrative arc \
(beginning, middle, end). Avoid overly complex vocabulary or themes. Ensure the story \
feels complete within the approximate length specified.";

pub const TITLE_SYSTEM_PROMPT: &str = "You are a creative assistant. Generate ONLY a \
short, catchy, and imaginative title for a children's bedtime story based on the \
user's request. Do NOT include any conversational introductory phrases. Directly \
output the title itself.";

/// The prompts for one generation cycle.
#[derive(Debug, Clone)]
pub struct CyclePrompts {
    pub story: TextPrompt,
    pub title: TextPrompt,
    pub illustration: String,
}

/// Build all three prompts from the request snapshot.
pub fn build_prompts(params: &StoryParams) -> CyclePrompts {
    let hero = presets::resolve_label(presets::HEROES, &params.hero, "a character").to_lowercase();
    let setting =
        presets::resolve_label(presets::SETTINGS, &params.setting, "a place").to_lowercase();
    let moral = presets::resolve_label(presets::MORALS, &params.moral, "an important lesson")
        .to_lowercase();
    let length = presets::resolve_label(presets::LENGTHS, &params.length, "a medium-length");
    let age_range = presets::age_range_label(&params.age_range).to_lowercase();
    let name = params.hero_name.trim();

    let story_user = format!(
        "Write a children's bedtime story about a {hero} named \"{name}\". \
The story takes place in a {setting}. It should be a {length} story. \
The story should convey a moral about {moral}. The story should be written for \
children in the {age_range} age group. Please adjust vocabulary, sentence structure, \
and complexity accordingly. Make it engaging, imaginative, and suitable for bedtime. \
Directly start with the story content.",
    );

    let title_user = format!(
        "Generate a short, catchy, and imaginative title for a children's bedtime story. \
The story is about a {hero} named \"{name}\", takes place in {setting}, teaches a \
lesson about {moral}, and is for the {age_range} age group. Title only.",
    );

    let illustration = format!(
        "Children's storybook illustration style. A whimsical and colorful scene \
featuring a {hero} named \"{name}\" in a {setting}. The illustration should evoke \
the feeling of a story about {moral}. Simple, friendly, vibrant, high quality. \
AVOID TEXT IN THE IMAGE.",
    );

    CyclePrompts {
        story: TextPrompt { system: STORY_SYSTEM_PROMPT.to_string(), user: story_user },
        title: TextPrompt { system: TITLE_SYSTEM_PROMPT.to_string(), user: title_user },
        illustration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PresetChoice;

    #[test]
    fn prompts_include_resolved_labels() {
        let params = StoryParams {
            hero: PresetChoice::preset("dragon"),
            hero_name: "Ember".to_string(),
            setting: PresetChoice::preset("forest"),
            length: PresetChoice::preset("3min"),
            moral: PresetChoice::preset("bravery"),
            age_range: "4-7".to_string(),
        };
        let prompts = build_prompts(&params);

        assert!(prompts.story.user.contains("dragon named \"Ember\""));
        assert!(prompts.story.user.contains("Short (~3 Min)"));
        assert!(prompts.title.user.ends_with("Title only."));
        assert!(prompts.illustration.contains("AVOID TEXT IN THE IMAGE"));
        assert_eq!(prompts.story.system, STORY_SYSTEM_PROMPT);
    }

    #[test]
    fn custom_text_flows_into_prompts() {
        let params = StoryParams {
            hero: PresetChoice::custom("A Brave Squirrel"),
            hero_name: "Pip".to_string(),
            setting: PresetChoice::custom("a city on clouds"),
            length: PresetChoice::preset("5min"),
            moral: PresetChoice::preset("kindness"),
            age_range: "8-10".to_string(),
        };
        let prompts = build_prompts(&params);

        assert!(prompts.story.user.contains("a brave squirrel named \"Pip\""));
        assert!(prompts.illustration.contains("a city on clouds"));
        assert!(prompts.story.user.contains("older kids (8-10)"));
    }
}

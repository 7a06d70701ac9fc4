//! The preset catalog the submission form offers: heroes, settings, lengths,
//! morals, and age ranges. Every catalog except age ranges carries a
//! "custom" escape hatch whose free text replaces the label in prompts and
//! in the persisted record.

use crate::types::PresetChoice;

/// One selectable option in a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetOption {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

pub const HEROES: &[PresetOption] = &[
    PresetOption { id: "dragon", label: "Dragon", description: "A friendly, colorful dragon." },
    PresetOption { id: "princess", label: "Princess", description: "A brave and clever princess." },
    PresetOption { id: "wizard", label: "Wizard", description: "A wise, sometimes silly, wizard." },
    PresetOption { id: "knight", label: "Knight", description: "A noble knight who helps others." },
    PresetOption { id: "custom", label: "Custom Hero", description: "Invent your own unique hero." },
];

pub const SETTINGS: &[PresetOption] = &[
    PresetOption { id: "castle", label: "Castle", description: "An ancient magical castle." },
    PresetOption { id: "forest", label: "Forest", description: "An enchanted forest." },
    PresetOption { id: "space", label: "Space", description: "The vast reaches of space." },
    PresetOption { id: "ocean", label: "Ocean", description: "The deep blue ocean mysteries." },
    PresetOption { id: "custom", label: "Custom Setting", description: "Imagine your own unique place." },
];

pub const LENGTHS: &[PresetOption] = &[
    PresetOption { id: "3min", label: "Short (~3 Min)", description: "A quick, engaging tale." },
    PresetOption { id: "5min", label: "Medium (~5 Min)", description: "A bit more detail and plot." },
    PresetOption { id: "10min", label: "Long (~10 Min)", description: "A richer story adventure." },
    PresetOption { id: "custom", label: "Custom Length", description: "Specify your desired length." },
];

pub const MORALS: &[PresetOption] = &[
    PresetOption { id: "bravery", label: "Bravery", description: "Facing fears and being courageous." },
    PresetOption { id: "friendship", label: "Friendship", description: "Working together and building bonds." },
    PresetOption { id: "honesty", label: "Honesty", description: "Telling the truth even when hard." },
    PresetOption { id: "kindness", label: "Kindness", description: "Caring for others, big and small." },
    PresetOption { id: "custom", label: "Custom Moral", description: "Describe your own lesson." },
];

pub const AGE_RANGES: &[PresetOption] = &[
    PresetOption { id: "1-3", label: "Toddlers (1-3)", description: "Very simple words and rhythm." },
    PresetOption { id: "4-7", label: "Young Kids (4-7)", description: "Playful plots, easy vocabulary." },
    PresetOption { id: "8-10", label: "Older Kids (8-10)", description: "Richer plots and vocabulary." },
    PresetOption { id: "11+", label: "Preteens (11+)", description: "More nuance and longer arcs." },
];

/// Look an option up by id.
pub fn find(catalog: &'static [PresetOption], id: &str) -> Option<&'static PresetOption> {
    catalog.iter().find(|option| option.id == id)
}

/// Resolve the human-readable label a choice contributes to prompts and to
/// the persisted record: the custom text for custom choices, the catalog
/// label for known ids, and `fallback` for ids the catalog does not know.
pub fn resolve_label(
    catalog: &'static [PresetOption],
    choice: &PresetChoice,
    fallback: &str,
) -> String {
    match choice {
        PresetChoice::Custom(text) => text.trim().to_string(),
        PresetChoice::Preset(id) => find(catalog, id)
            .map(|option| option.label.to_string())
            .unwrap_or_else(|| fallback.to_string()),
    }
}

/// Label for an age-range id, falling back to a generic audience.
pub fn age_range_label(id: &str) -> String {
    find(AGE_RANGES, id)
        .map(|option| option.label.to_string())
        .unwrap_or_else(|| "general audience".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_catalog_has_a_custom_option_except_age_ranges() {
        for catalog in [HEROES, SETTINGS, LENGTHS, MORALS] {
            assert!(find(catalog, "custom").is_some());
        }
        assert!(find(AGE_RANGES, "custom").is_none());
    }

    #[test]
    fn resolve_label_prefers_custom_text() {
        let choice = PresetChoice::custom("  a brave little fox ");
        assert_eq!(resolve_label(HEROES, &choice, "a character"), "a brave little fox");
    }

    #[test]
    fn resolve_label_falls_back_for_unknown_ids() {
        let choice = PresetChoice::preset("gryphon");
        assert_eq!(resolve_label(HEROES, &choice, "a character"), "a character");
    }

    #[test]
    fn age_range_labels() {
        assert_eq!(age_range_label("4-7"), "Young Kids (4-7)");
        assert_eq!(age_range_label("99"), "general audience");
    }
}

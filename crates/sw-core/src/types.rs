use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::presets;

// ---------------------------------------------------------------------------
// PresetChoice
// ---------------------------------------------------------------------------

/// A user selection for one story parameter: either a preset id from the
/// catalog ("dragon", "forest", ...) or free text entered behind the
/// "custom" escape hatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum PresetChoice {
    Preset(String),
    Custom(String),
}

impl PresetChoice {
    pub fn preset(id: impl Into<String>) -> Self {
        PresetChoice::Preset(id.into())
    }

    pub fn custom(text: impl Into<String>) -> Self {
        PresetChoice::Custom(text.into())
    }

    /// The custom description, if this choice is a custom one.
    pub fn custom_text(&self) -> Option<&str> {
        match self {
            PresetChoice::Custom(text) => Some(text),
            PresetChoice::Preset(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// StoryParams
// ---------------------------------------------------------------------------

/// Immutable snapshot of all user-chosen generation parameters, captured at
/// submission time. A resubmission creates a new `StoryParams`, never edits
/// the old one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryParams {
    pub hero: PresetChoice,
    pub hero_name: String,
    pub setting: PresetChoice,
    pub length: PresetChoice,
    pub moral: PresetChoice,
    /// Target age range id, e.g. "4-7".
    pub age_range: String,
}

/// Rejected submissions: raised synchronously, before any cycle is started.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required field is empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A "custom" option was selected but its free-text description is empty.
    #[error("custom {0} selected but no description was given")]
    EmptyCustomText(&'static str),
}

impl StoryParams {
    /// Check that every required field is present and that every custom
    /// choice carries non-empty text.
    pub fn validate(&self) -> Result<(), ValidationError> {
        fn check(
            field: &'static str,
            choice: &PresetChoice,
        ) -> Result<(), ValidationError> {
            match choice {
                PresetChoice::Preset(id) if id.trim().is_empty() => {
                    Err(ValidationError::MissingField(field))
                }
                PresetChoice::Custom(text) if text.trim().is_empty() => {
                    Err(ValidationError::EmptyCustomText(field))
                }
                _ => Ok(()),
            }
        }

        if self.hero_name.trim().is_empty() {
            return Err(ValidationError::MissingField("hero_name"));
        }
        check("hero", &self.hero)?;
        check("setting", &self.setting)?;
        check("length", &self.length)?;
        check("moral", &self.moral)?;
        if self.age_range.trim().is_empty() {
            return Err(ValidationError::MissingField("age_range"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CycleId
// ---------------------------------------------------------------------------

/// Strictly increasing identifier minted once per submission. Every piece of
/// asynchronous work is tagged with the `CycleId` active when it was started;
/// callbacks tagged with a superseded id are discarded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CycleId(pub u64);

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SubtaskKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskKind {
    Story,
    Title,
    Illustration,
}

impl fmt::Display for SubtaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SubtaskKind::Story => "story",
            SubtaskKind::Title => "title",
            SubtaskKind::Illustration => "illustration",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// SubtaskState
// ---------------------------------------------------------------------------

/// State of one generation subtask within one cycle.
///
/// For the streamed subtasks (story, title) `InProgress.partial` is the text
/// accumulated so far; for the illustration it stays empty. `Succeeded`
/// carries the final text, or the asset URL for the illustration. Terminal
/// states are never left again within the same cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SubtaskState {
    Idle,
    InProgress { partial: String },
    Succeeded { output: String },
    Failed { reason: String },
}

impl SubtaskState {
    pub fn succeeded(output: impl Into<String>) -> Self {
        SubtaskState::Succeeded { output: output.into() }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        SubtaskState::Failed { reason: reason.into() }
    }

    /// `Succeeded` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubtaskState::Succeeded { .. } | SubtaskState::Failed { .. }
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SubtaskState::Failed { .. })
    }

    /// The final output, when this subtask has succeeded.
    pub fn output(&self) -> Option<&str> {
        match self {
            SubtaskState::Succeeded { output } => Some(output),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// SaveState / PatchState
// ---------------------------------------------------------------------------

/// Identifier of a persisted story record, as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoryId(pub String);

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of the single persistence attempt of one cycle. A cycle leaves
/// `NotStarted` at most once over its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SaveState {
    NotStarted,
    InFlight,
    Completed { story_id: StoryId },
    Failed { reason: String },
}

impl SaveState {
    pub fn story_id(&self) -> Option<&StoryId> {
        match self {
            SaveState::Completed { story_id } => Some(story_id),
            _ => None,
        }
    }
}

/// State of the at-most-once late-illustration patch used by the
/// save-then-patch policy. Stays `NotStarted` forever under the default
/// await-illustration policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PatchState {
    NotStarted,
    InFlight,
    Completed,
    Failed { reason: String },
}

// ---------------------------------------------------------------------------
// SavePolicy
// ---------------------------------------------------------------------------

/// When the combined record is first persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavePolicy {
    /// Wait until the illustration reached a terminal state; a failed
    /// illustration degrades the record to `image_url = None`.
    AwaitIllustration,
    /// Persist as soon as story and title succeeded; patch the record with
    /// the illustration URL if it arrives later.
    SaveThenPatch,
}

impl Default for SavePolicy {
    fn default() -> Self {
        SavePolicy::AwaitIllustration
    }
}

// ---------------------------------------------------------------------------
// GenerationCycle
// ---------------------------------------------------------------------------

/// Aggregate state of one end-to-end generation attempt. Exactly one cycle
/// is current at any time; a superseded cycle is discarded, never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationCycle {
    pub id: CycleId,
    pub params: StoryParams,
    pub story: SubtaskState,
    pub title: SubtaskState,
    pub illustration: SubtaskState,
    pub save: SaveState,
    pub patch: PatchState,
    pub started_at: DateTime<Utc>,
}

impl GenerationCycle {
    pub fn new(id: CycleId, params: StoryParams) -> Self {
        Self {
            id,
            params,
            story: SubtaskState::Idle,
            title: SubtaskState::Idle,
            illustration: SubtaskState::Idle,
            save: SaveState::NotStarted,
            patch: PatchState::NotStarted,
            started_at: Utc::now(),
        }
    }

    pub fn subtask(&self, kind: SubtaskKind) -> &SubtaskState {
        match kind {
            SubtaskKind::Story => &self.story,
            SubtaskKind::Title => &self.title,
            SubtaskKind::Illustration => &self.illustration,
        }
    }

    pub fn subtask_mut(&mut self, kind: SubtaskKind) -> &mut SubtaskState {
        match kind {
            SubtaskKind::Story => &mut self.story,
            SubtaskKind::Title => &mut self.title,
            SubtaskKind::Illustration => &mut self.illustration,
        }
    }

    /// `true` once a save outcome (or a fatal generation failure) makes any
    /// further persistence work for this cycle impossible.
    pub fn is_settled(&self) -> bool {
        matches!(
            self.save,
            SaveState::Completed { .. } | SaveState::Failed { .. }
        ) || self.story.is_failed()
            || self.title.is_failed()
    }
}

// ---------------------------------------------------------------------------
// StoryRecord
// ---------------------------------------------------------------------------

/// The assembled record handed to the persistence client: the request
/// snapshot (ids, custom descriptions, and the resolved labels that were fed
/// into the prompts) plus the generated outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRecord {
    pub title: String,
    pub content: String,
    /// `None` when the illustration failed or has not been attached yet.
    pub image_url: Option<String>,
    pub hero: String,
    pub hero_name: String,
    pub setting: String,
    pub story_length: String,
    pub moral: String,
    pub age_range: String,
    pub custom_hero_description: Option<String>,
    pub custom_setting_description: Option<String>,
    pub custom_moral_description: Option<String>,
    pub hero_label: String,
    pub setting_label: String,
    pub moral_label: String,
}

impl StoryRecord {
    /// Assemble the record from the captured request and the subtask outputs.
    pub fn assemble(
        params: &StoryParams,
        title: &str,
        content: &str,
        image_url: Option<String>,
    ) -> Self {
        fn id_of(choice: &PresetChoice) -> String {
            match choice {
                PresetChoice::Preset(id) => id.clone(),
                PresetChoice::Custom(_) => "custom".to_string(),
            }
        }

        Self {
            title: title.to_string(),
            content: content.to_string(),
            image_url,
            hero: id_of(&params.hero),
            hero_name: params.hero_name.clone(),
            setting: id_of(&params.setting),
            story_length: id_of(&params.length),
            moral: id_of(&params.moral),
            age_range: params.age_range.clone(),
            custom_hero_description: params.hero.custom_text().map(str::to_string),
            custom_setting_description: params.setting.custom_text().map(str::to_string),
            custom_moral_description: params.moral.custom_text().map(str::to_string),
            hero_label: presets::resolve_label(presets::HEROES, &params.hero, "a character"),
            setting_label: presets::resolve_label(presets::SETTINGS, &params.setting, "a place"),
            moral_label: presets::resolve_label(
                presets::MORALS,
                &params.moral,
                "an important lesson",
            ),
        }
    }
}

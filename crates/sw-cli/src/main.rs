mod logging;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::warn;

use sw_core::config::Config;
use sw_core::presets;
use sw_core::types::{PresetChoice, SavePolicy, StoryParams, SubtaskKind, SubtaskState};
use sw_orchestrator::{CycleEvent, Orchestrator};
use sw_providers::{OpenAiImageProvider, OpenAiTextProvider};
use sw_store::HttpStoryStore;

/// storyweave CLI -- generate and persist illustrated bedtime stories.
#[derive(Parser)]
#[command(name = "storyweave", version, about)]
struct Cli {
    /// Path to the config file (default: ~/.storyweave/config.toml).
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a story and save it.
    Generate {
        /// Name of the story's hero.
        #[arg(long)]
        hero_name: String,

        /// Hero preset id (see `storyweave presets`).
        #[arg(long, default_value = "dragon", conflicts_with = "custom_hero")]
        hero: String,
        /// Free-text hero description instead of a preset.
        #[arg(long)]
        custom_hero: Option<String>,

        /// Setting preset id.
        #[arg(long, default_value = "forest", conflicts_with = "custom_setting")]
        setting: String,
        /// Free-text setting description instead of a preset.
        #[arg(long)]
        custom_setting: Option<String>,

        /// Story length preset id.
        #[arg(long, default_value = "5min", conflicts_with = "custom_length")]
        length: String,
        /// Free-text length description instead of a preset.
        #[arg(long)]
        custom_length: Option<String>,

        /// Moral preset id.
        #[arg(long, default_value = "kindness", conflicts_with = "custom_moral")]
        moral: String,
        /// Free-text moral instead of a preset.
        #[arg(long)]
        custom_moral: Option<String>,

        /// Target age range id, e.g. "4-7".
        #[arg(long, default_value = "4-7")]
        age_range: String,
    },

    /// List the preset catalogs.
    Presets,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging("info", cli.log_json);

    let config = match &cli.config {
        Some(path) => Config::load_from(path.clone())?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Generate {
            hero_name,
            hero,
            custom_hero,
            setting,
            custom_setting,
            length,
            custom_length,
            moral,
            custom_moral,
            age_range,
        } => {
            let params = StoryParams {
                hero: choice(hero, custom_hero),
                hero_name,
                setting: choice(setting, custom_setting),
                length: choice(length, custom_length),
                moral: choice(moral, custom_moral),
                age_range,
            };
            generate(&config, params).await?;
        }
        Commands::Presets => print_presets(),
    }

    Ok(())
}

fn choice(preset: String, custom: Option<String>) -> PresetChoice {
    match custom {
        Some(text) => PresetChoice::custom(text),
        None => PresetChoice::preset(preset),
    }
}

async fn generate(config: &Config, params: StoryParams) -> anyhow::Result<()> {
    let story = OpenAiTextProvider::from_config(&config.providers, &config.providers.story_model)
        .context("story provider")?;
    let title = OpenAiTextProvider::from_config(&config.providers, &config.providers.title_model)
        .context("title provider")?;
    let image = OpenAiImageProvider::from_config(&config.providers).context("image provider")?;
    let store = HttpStoryStore::from_config(&config.store).context("story store")?;

    let mut orchestrator = Orchestrator::new(
        Arc::new(story),
        Arc::new(title),
        Arc::new(image),
        Arc::new(store),
        config.generation.save_policy,
    );
    if let Some(secs) = config.generation.subtask_timeout_secs {
        orchestrator = orchestrator.with_subtask_timeout(Duration::from_secs(secs));
    }

    let events = orchestrator.subscribe();
    let id = orchestrator.submit(params)?;

    // Stream story text as it arrives; everything else is reported when it
    // settles.
    let mut printed = 0usize;
    let mut saved = false;
    while let Ok(event) = events.recv_async().await {
        match event {
            CycleEvent::Subtask { cycle, kind: SubtaskKind::Story, state } if cycle == id => {
                match state {
                    SubtaskState::InProgress { partial } => {
                        if partial.len() > printed {
                            print!("{}", &partial[printed..]);
                            std::io::stdout().flush().ok();
                            printed = partial.len();
                        }
                    }
                    SubtaskState::Failed { reason } => {
                        bail!("story generation failed: {reason}");
                    }
                    SubtaskState::Succeeded { .. } | SubtaskState::Idle => {}
                }
            }
            CycleEvent::Subtask { cycle, kind: SubtaskKind::Title, state } if cycle == id => {
                match state {
                    SubtaskState::Succeeded { output } => println!("\n\n# {output}"),
                    SubtaskState::Failed { reason } => bail!("title generation failed: {reason}"),
                    _ => {}
                }
            }
            CycleEvent::Subtask { cycle, kind: SubtaskKind::Illustration, state } if cycle == id => {
                match state {
                    SubtaskState::Succeeded { output } => println!("illustration: {output}"),
                    SubtaskState::Failed { reason } => {
                        warn!(reason = %reason, "illustration failed, story will have no image");
                        if saved {
                            break;
                        }
                    }
                    _ => {}
                }
            }
            CycleEvent::SaveCompleted { cycle, story_id } if cycle == id => {
                println!("saved story {story_id}");
                saved = true;
                // Under save-then-patch a late illustration may still be
                // outstanding.
                if !patch_pending(&orchestrator, config.generation.save_policy) {
                    break;
                }
            }
            CycleEvent::SaveFailed { cycle, reason } if cycle == id => {
                bail!("saving the story failed: {reason}");
            }
            CycleEvent::IllustrationAttached { cycle, story_id } if cycle == id => {
                println!("illustration attached to story {story_id}");
                break;
            }
            CycleEvent::IllustrationAttachFailed { cycle, reason, .. } if cycle == id => {
                warn!(reason = %reason, "attaching the illustration failed");
                break;
            }
            _ => {}
        }
    }

    Ok(())
}

/// Whether the current cycle still owes a late-illustration result.
fn patch_pending(orchestrator: &Orchestrator, policy: SavePolicy) -> bool {
    if policy != SavePolicy::SaveThenPatch {
        return false;
    }
    match orchestrator.snapshot() {
        Some(cycle) => {
            !cycle.illustration.is_terminal()
                || cycle.patch == sw_core::types::PatchState::InFlight
        }
        None => false,
    }
}

fn print_presets() {
    let catalogs: [(&str, &[presets::PresetOption]); 5] = [
        ("heroes", presets::HEROES),
        ("settings", presets::SETTINGS),
        ("lengths", presets::LENGTHS),
        ("morals", presets::MORALS),
        ("age ranges", presets::AGE_RANGES),
    ];
    for (name, options) in catalogs {
        println!("{name}:");
        for option in options {
            println!("  {:<10} {} -- {}", option.id, option.label, option.description);
        }
        println!();
    }
}

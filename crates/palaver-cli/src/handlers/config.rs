//! Config command handler.

use std::io::{self, BufRead, Write};

use anyhow::Result;
use palaver_core::Settings;

use crate::bootstrap::CliContext;
use crate::commands::ConfigCommand;
use crate::presentation::render_settings;

/// Execute a config subcommand.
pub fn execute(ctx: &mut CliContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            println!("# {}", ctx.config.settings_path().display());
            println!("{}", render_settings(&ctx.settings));
        }
        ConfigCommand::Set {
            model,
            temperature,
            top_k,
            top_p,
            max_output_tokens,
            voice,
            language,
            speak_deferred_replies,
            system_instruction,
        } => {
            let update = SettingsUpdate {
                model,
                temperature,
                top_k,
                top_p,
                max_output_tokens,
                voice,
                language,
                speak_deferred_replies,
                system_instruction,
            };
            if update.is_empty() {
                println!("Nothing to change.");
                return Ok(());
            }
            let settings = update.apply(ctx.settings.clone());
            ctx.save_settings(settings)?;
            println!("✓ Settings updated.");
        }
        ConfigCommand::Reset { force } => {
            if !force && !confirm("Reset all settings to defaults?")? {
                println!("Cancelled.");
                return Ok(());
            }
            ctx.save_settings(Settings::default())?;
            println!("✓ Settings reset to defaults.");
        }
    }
    Ok(())
}

/// Partial settings change; `None` keeps the current value.
#[derive(Debug, Default)]
struct SettingsUpdate {
    model: Option<String>,
    temperature: Option<f32>,
    top_k: Option<u32>,
    top_p: Option<f32>,
    max_output_tokens: Option<u32>,
    voice: Option<String>,
    language: Option<String>,
    speak_deferred_replies: Option<bool>,
    system_instruction: Option<String>,
}

impl SettingsUpdate {
    fn is_empty(&self) -> bool {
        self.model.is_none()
            && self.temperature.is_none()
            && self.top_k.is_none()
            && self.top_p.is_none()
            && self.max_output_tokens.is_none()
            && self.voice.is_none()
            && self.language.is_none()
            && self.speak_deferred_replies.is_none()
            && self.system_instruction.is_none()
    }

    fn apply(self, mut settings: Settings) -> Settings {
        if let Some(model) = self.model {
            settings.model_name = model;
        }
        if let Some(temperature) = self.temperature {
            settings.generation.temperature = temperature;
        }
        if let Some(top_k) = self.top_k {
            settings.generation.top_k = top_k;
        }
        if let Some(top_p) = self.top_p {
            settings.generation.top_p = top_p;
        }
        if let Some(max) = self.max_output_tokens {
            settings.generation.max_output_tokens = max;
        }
        if let Some(voice) = self.voice {
            settings.voice_id = voice;
        }
        if let Some(language) = self.language {
            settings.language = language;
        }
        if let Some(speak) = self.speak_deferred_replies {
            settings.speak_deferred_replies = speak;
        }
        if let Some(instruction) = self.system_instruction {
            settings.system_instruction = Some(instruction).filter(|s| !s.trim().is_empty());
        }
        settings
    }
}

fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_changes_only_given_fields() {
        let update = SettingsUpdate {
            voice: Some("en-gb".into()),
            top_k: Some(32),
            ..SettingsUpdate::default()
        };
        let settings = update.apply(Settings::default());

        assert_eq!(settings.voice_id, "en-gb");
        assert_eq!(settings.generation.top_k, 32);
        assert_eq!(settings.model_name, Settings::default().model_name);
    }

    #[test]
    fn test_blank_system_instruction_clears_it() {
        let update = SettingsUpdate {
            system_instruction: Some("  ".into()),
            ..SettingsUpdate::default()
        };
        assert_eq!(update.apply(Settings::default()).system_instruction, None);
    }

    #[test]
    fn test_empty_update() {
        assert!(SettingsUpdate::default().is_empty());
    }

    #[test]
    fn test_invalid_value_is_rejected_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            crate::bootstrap::CliConfig::resolve(Some(dir.path().to_path_buf()), None).unwrap();
        let mut ctx = crate::bootstrap::bootstrap(config).unwrap();

        let result = execute(
            &mut ctx,
            ConfigCommand::Set {
                model: None,
                temperature: Some(9.0),
                top_k: None,
                top_p: None,
                max_output_tokens: None,
                voice: None,
                language: None,
                speak_deferred_replies: None,
                system_instruction: None,
            },
        );

        assert!(result.is_err());
        assert_eq!(ctx.settings, Settings::default());
    }
}

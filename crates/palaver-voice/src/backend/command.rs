//! [`Synthesizer`] that shells out to a speech engine such as `espeak-ng`.
//!
//! The command is a template: `{voice}`, `{output}` and `{text}` are
//! substituted per argument. The default template from settings is
//! `espeak-ng -v {voice} -w {output} {text}`.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;

use super::Synthesizer;
use crate::error::VoiceError;

/// External-command speech synthesizer.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: String,
    args: Vec<String>,
}

impl CommandSynthesizer {
    /// Build from a command template (program first).
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::SynthesisError`] for an empty template.
    pub fn from_template(template: &[String]) -> Result<Self, VoiceError> {
        let (program, args) = template
            .split_first()
            .ok_or_else(|| VoiceError::SynthesisError("synthesizer command is empty".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Whether the program can be found on `PATH`.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    fn render_args(&self, text: &str, voice_id: &str, output: &Path) -> Vec<String> {
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{voice}", voice_id)
                    .replace("{output}", &output)
                    .replace("{text}", text)
            })
            .collect()
    }
}

#[async_trait]
impl Synthesizer for CommandSynthesizer {
    fn has_voice(&self, voice_id: &str) -> bool {
        // The engine reports unknown voices itself when run.
        !voice_id.trim().is_empty()
    }

    async fn synthesize_to_file(
        &self,
        text: &str,
        voice_id: &str,
        output: &Path,
    ) -> Result<(), VoiceError> {
        let args = self.render_args(text, voice_id, output);
        tracing::debug!(program = %self.program, voice = voice_id, "Running synthesizer");

        let result = tokio::process::Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| VoiceError::SynthesisError(format!("{}: {e}", self.program)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(VoiceError::SynthesisError(format!(
                "{} exited with {}: {}",
                self.program,
                result.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

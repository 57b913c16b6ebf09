//! Text-to-speech through a local speech engine.

use std::io;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;

/// Errors raised by [`Speaker::speak`].
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    /// No speech engine is configured.
    #[error("no speech command configured")]
    EmptyCommand,
    /// The engine could not be started.
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        /// The engine program.
        program: String,
        /// The spawn failure.
        #[source]
        source: io::Error,
    },
    /// The engine ran but reported a failure.
    #[error("`{program}` exited with {status}{}", format_stderr(.stderr))]
    Exit {
        /// The engine program.
        program: String,
        /// The exit status.
        status: ExitStatus,
        /// Whatever the engine wrote to stderr.
        stderr: String,
    },
}

fn format_stderr(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Speaks text by running a speech engine command to completion.
#[derive(Clone, Debug)]
pub struct Speaker {
    program: String,
    args: Vec<String>,
}

impl Speaker {
    /// Creates a speaker from a command line such as `espeak -s 150`. The
    /// text will be passed as the last argument, after a `--` separator.
    pub fn new(command: &str) -> Self {
        let mut parts = command.split_whitespace().map(str::to_owned);
        let program = parts.next().unwrap_or_default();
        Self {
            program,
            args: parts.collect(),
        }
    }

    /// Speaks `text` and waits until the engine exits.
    pub async fn speak(&self, text: &str) -> Result<String, SpeechError> {
        if self.program.is_empty() {
            return Err(SpeechError::EmptyCommand);
        }

        trace!("running {} {:?} with {text:?}", self.program, self.args);
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("--")
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|err| SpeechError::Spawn {
                program: self.program.clone(),
                source: err,
            })?;

        if !output.status.success() {
            return Err(SpeechError::Exit {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(format!("Successfully spoke: '{text}'"))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_speak() {
        let speaker = Speaker::new("true");
        assert_eq!(
            speaker.speak("hello").await.unwrap(),
            "Successfully spoke: 'hello'"
        );
    }

    #[tokio::test]
    async fn test_engine_failure() {
        let speaker = Speaker::new("false");
        assert!(matches!(
            speaker.speak("hello").await,
            Err(SpeechError::Exit { .. })
        ));

        let speaker = Speaker::new("ls");
        let err = speaker
            .speak("/definitely/not/a/real/path")
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("`ls` exited with"), "{err}");
    }

    #[tokio::test]
    async fn test_speak_dash_leading_text() {
        // `basename` rejects unknown options but accepts operands after `--`.
        let speaker = Speaker::new("basename");
        assert_eq!(
            speaker.speak("-5 degrees outside").await.unwrap(),
            "Successfully spoke: '-5 degrees outside'"
        );
    }

    #[tokio::test]
    async fn test_missing_engine() {
        let speaker = Speaker::new("definitely-not-a-speech-engine");
        let err = speaker.speak("hello").await.unwrap_err();
        assert!(matches!(err, SpeechError::Spawn { .. }));
        assert!(err.to_string().starts_with(
            "failed to start `definitely-not-a-speech-engine`"
        ));

        let speaker = Speaker::new("  ");
        assert!(matches!(
            speaker.speak("hello").await,
            Err(SpeechError::EmptyCommand)
        ));
    }
}

//! Arbitrary code execution through an external toolchain.
//!
//! The user's snippet is spliced into a configured source template,
//! compiled, and run with a hard timeout. The child process is killed
//! when the timeout elapses and build artifacts are removed afterwards;
//! failures come back as truncated text, never as a crash.

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::{Context, Handler, HandlerError};
use crate::config::ExecConfig;

/// Hard wall-clock limit on the run step.
const EXEC_TIMEOUT: Duration = Duration::from_secs(5);

/// Lines of output relayed to the channel.
const MAX_OUTPUT_LINES: usize = 3;

/// Maximum length of each relayed line.
const MAX_LINE_LEN: usize = 128;

pub struct ExecCommands {
    config: ExecConfig,
}

impl ExecCommands {
    pub fn new(config: ExecConfig) -> Self {
        Self { config }
    }

    /// Write the generated source file: prelude, the user's code spliced
    /// into the mode template, postlude.
    fn write_source(&self, code: &str, sysout: bool) -> std::io::Result<()> {
        let mut code = code.trim().to_string();
        if sysout {
            // The template wraps the expression; a trailing semicolon
            // would break inside it.
            if code.ends_with(';') {
                code.pop();
            }
            code = self.config.sysout_template.replace("{code}", &code);
        } else {
            if !code.ends_with(';') && !code.ends_with('}') {
                code.push(';');
            }
            code = self.config.exec_template.replace("{code}", &code);
        }

        let mut source = String::new();
        for line in &self.config.prelude {
            source.push_str(line);
            source.push('\n');
        }
        source.push_str(&code);
        source.push('\n');
        for line in &self.config.postlude {
            source.push_str(line);
            source.push('\n');
        }

        std::fs::create_dir_all(&self.config.dir)?;
        std::fs::write(self.config.dir.join(&self.config.source_file), source)
    }

    /// Run the compile step, collecting its diagnostics on failure.
    async fn compile(&self, output: &mut Vec<String>) -> Result<bool, HandlerError> {
        let (program, args) = self
            .config
            .compile
            .split_first()
            .ok_or_else(|| HandlerError::Internal("empty compile command".into()))?;

        let result = Command::new(program)
            .args(args)
            .current_dir(&self.config.dir)
            .output()
            .await?;

        if result.status.success() {
            return Ok(true);
        }

        for stream in [&result.stdout, &result.stderr] {
            for line in String::from_utf8_lossy(stream).lines() {
                if !line.trim().is_empty() {
                    output.push(line.to_string());
                }
            }
        }
        Ok(false)
    }

    /// Run the compiled program under the timeout. The child is spawned
    /// with `kill_on_drop`, so abandoning it on timeout also kills it.
    async fn run(&self, output: &mut Vec<String>) -> Result<(), HandlerError> {
        let (program, args) = self
            .config
            .run
            .split_first()
            .ok_or_else(|| HandlerError::Internal("empty run command".into()))?;

        let child = Command::new(program)
            .args(args)
            .current_dir(&self.config.dir)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        match timeout(EXEC_TIMEOUT, child.wait_with_output()).await {
            Ok(Ok(result)) => {
                for stream in [&result.stdout, &result.stderr] {
                    for line in String::from_utf8_lossy(stream).lines() {
                        output.push(line.to_string());
                    }
                }
            }
            Ok(Err(e)) => {
                output.push(format!("Error executing: {e}"));
            }
            Err(_) => {
                debug!("run step exceeded timeout, child killed");
                output.push("Execution timed out".to_string());
            }
        }
        Ok(())
    }

    /// Remove configured build artifacts from the work dir.
    fn cleanup(&self) {
        let Ok(entries) = std::fs::read_dir(&self.config.dir) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if self
                .config
                .artifacts
                .iter()
                .any(|suffix| name.ends_with(suffix.as_str()))
            {
                if let Err(e) = std::fs::remove_file(entry.path()) {
                    warn!(file = %name, error = %e, "could not remove artifact");
                }
            }
        }
    }

    async fn exec(&self, code: &str, sysout: bool) -> Result<String, HandlerError> {
        self.write_source(code, sysout)?;

        let mut output = Vec::new();
        if self.compile(&mut output).await? {
            self.run(&mut output).await?;
        }
        self.cleanup();

        if output.is_empty() {
            return Ok("Execution successful. No output.".to_string());
        }

        let lines: Vec<String> = output
            .iter()
            .take(MAX_OUTPUT_LINES)
            .map(|line| line.chars().take(MAX_LINE_LEN).collect())
            .collect();
        Ok(lines.join("\n"))
    }
}

#[async_trait]
impl Handler for ExecCommands {
    fn public_commands(&self) -> Vec<String> {
        vec!["exec".to_string(), "sysout".to_string()]
    }

    async fn reply(
        &self,
        _ctx: &Context<'_>,
        command: &str,
        argument: &str,
    ) -> Result<Option<String>, HandlerError> {
        if argument.trim().is_empty() {
            return Ok(None);
        }
        let text = self.exec(argument, command == "sysout").await?;
        Ok(Some(text))
    }
}

//! Production converter shelling out to the configured programs.

use super::backend::{Converter, ConverterError};
use crate::config::ConvertersConfig;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Runs the notation editor, the PDF splitter and the vector export helper
/// as child processes.
#[derive(Debug, Clone, Default)]
pub struct CommandConverter {
    programs: ConvertersConfig,
}

impl CommandConverter {
    pub fn new(programs: ConvertersConfig) -> Self {
        Self { programs }
    }

    fn run(&self, program: &str, args: &[&OsStr], cwd: Option<&Path>) -> Result<(), ConverterError> {
        debug!(program, ?args, "running converter");
        let mut command = Command::new(program);
        command.args(args);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let output = command.output().map_err(|source| ConverterError::Spawn {
            program: program.to_string(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() {
                debug!(program, stderr = %stderr.trim(), "converter stderr");
            }
            return Err(ConverterError::CommandFailed {
                program: program.to_string(),
                status: output.status.to_string(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            });
        }
        Ok(())
    }
}

impl Converter for CommandConverter {
    fn score_to_pdf(&self, score: &Path, pdf: &Path) -> Result<(), ConverterError> {
        self.run(
            &self.programs.score_to_pdf,
            &[
                OsStr::new("--export-to"),
                pdf.as_os_str(),
                score.as_os_str(),
            ],
            None,
        )
    }

    fn pdf_to_images(&self, pdf: &Path, output_dir: &Path) -> Result<(), ConverterError> {
        let pattern = output_dir.join("%02d.svg");
        self.run(
            &self.programs.pdf_to_images,
            &[pdf.as_os_str(), pattern.as_os_str(), OsStr::new("all")],
            None,
        )
    }

    fn score_to_images(&self, score: &Path) -> Result<(), ConverterError> {
        self.run(
            &self.programs.score_to_images,
            &[OsStr::new("-e"), score.as_os_str()],
            score.parent(),
        )
    }
}

//! Running the external predictor through a shell.

use crate::error::{PredictError, Result};
use log::info;
use std::path::Path;
use std::process::Command;

/// Run `command` under `bash` with `pipefail`, failing on nonzero exit.
///
/// The error carries the command and exit code only; the tool's own output
/// goes to the inherited stdout/stderr. A process killed by a signal is
/// reported with code `-1`.
pub fn run_checked(command: &str) -> Result<()> {
    info!("Running command `{}`", command);

    let status = Command::new("bash")
        .arg("-c")
        .arg(format!("set -o pipefail && {}", command))
        .status()?;

    if status.success() {
        Ok(())
    } else {
        Err(PredictError::ExternalTool {
            command: command.to_string(),
            code: status.code().unwrap_or(-1),
        })
    }
}

/// Quote `arg` for a POSIX shell if it contains anything unusual.
pub fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:,+@%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Input and output locations for one prediction run.
#[derive(Debug, Clone, Copy)]
pub struct PredictionRequest<'a> {
    /// FASTA of amplicon sequences
    pub seqs: &'a Path,
    /// Amplicon × sample abundance TSV
    pub abundance: &'a Path,
    /// Directory the predictor writes its tables into
    pub out_dir: &'a Path,
    /// File to copy the tool's stdout into
    pub log: Option<&'a Path>,
}

/// A functional predictor invoked once per run.
pub trait Predictor {
    /// Command line shown in the report for `request`.
    fn command_line(&self, request: &PredictionRequest) -> String;

    /// Produce the output tables for `request` under `request.out_dir`.
    fn predict(&self, request: &PredictionRequest) -> Result<()>;
}

/// Flag making the predictor write per-amplicon pathway abundances.
///
/// Without it the `amplicon_metacyc` table is never produced.
pub const PER_SEQUENCE_FLAG: &str = "--per_sequence_contrib";

/// Predictor backed by an executable on the local machine.
///
/// The command line always carries [`PER_SEQUENCE_FLAG`]; `extra_flags`
/// follow the thread count.
#[derive(Debug, Clone)]
pub struct ShellPredictor {
    executable: String,
    threads: usize,
    extra_flags: Vec<String>,
}

impl ShellPredictor {
    pub fn new(executable: &str) -> Self {
        Self {
            executable: executable.to_string(),
            threads: 1,
            extra_flags: Vec::new(),
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_extra_flags(mut self, flags: Vec<String>) -> Self {
        self.extra_flags = flags;
        self
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }
}

impl Predictor for ShellPredictor {
    fn command_line(&self, request: &PredictionRequest) -> String {
        let mut parts = vec![
            self.executable.clone(),
            "-s".to_string(),
            shell_quote(&request.seqs.to_string_lossy()),
            "-i".to_string(),
            shell_quote(&request.abundance.to_string_lossy()),
            "-o".to_string(),
            shell_quote(&request.out_dir.to_string_lossy()),
            PER_SEQUENCE_FLAG.to_string(),
            "-p".to_string(),
            self.threads.to_string(),
        ];
        parts.extend(self.extra_flags.iter().cloned());

        if let Some(log) = request.log {
            parts.push("| tee".to_string());
            parts.push(shell_quote(&log.to_string_lossy()));
        }

        parts.join(" ")
    }

    fn predict(&self, request: &PredictionRequest) -> Result<()> {
        run_checked(&self.command_line(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success() {
        assert!(run_checked("true").is_ok());
        assert!(run_checked("echo hello | cat > /dev/null").is_ok());
    }

    #[test]
    fn test_exit_code_reported() {
        match run_checked("exit 2") {
            Err(PredictError::ExternalTool { command, code }) => {
                assert_eq!(command, "exit 2");
                assert_eq!(code, 2);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_command_not_found() {
        match run_checked("definitely_not_a_command_7f3a") {
            Err(PredictError::ExternalTool { code, .. }) => assert_eq!(code, 127),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_pipefail() {
        // Without pipefail the pipeline would exit with the status of `cat`
        match run_checked("false | cat") {
            Err(PredictError::ExternalTool { code, .. }) => assert_eq!(code, 1),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/tmp/run_1/seqs.fna"), "/tmp/run_1/seqs.fna");
        assert_eq!(shell_quote("my dir"), "'my dir'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_command_line() {
        let predictor = ShellPredictor::new("picrust2_pipeline.py")
            .with_threads(8)
            .with_extra_flags(vec!["--verbose".to_string()]);
        let request = PredictionRequest {
            seqs: Path::new("/tmp/run/study_seqs.fna"),
            abundance: Path::new("/tmp/run/study_seqs.tsv"),
            out_dir: Path::new("/tmp/run/out"),
            log: Some(Path::new("/tmp/run/log.txt")),
        };
        assert_eq!(
            predictor.command_line(&request),
            "picrust2_pipeline.py -s /tmp/run/study_seqs.fna -i /tmp/run/study_seqs.tsv \
             -o /tmp/run/out --per_sequence_contrib -p 8 --verbose | tee /tmp/run/log.txt"
        );
    }

    #[test]
    fn test_per_sequence_flag_without_extra_flags() {
        let predictor = ShellPredictor::new("picrust2_pipeline.py");
        let request = PredictionRequest {
            seqs: Path::new("seqs.fna"),
            abundance: Path::new("abund.tsv"),
            out_dir: Path::new("my out"),
            log: None,
        };
        assert_eq!(
            predictor.command_line(&request),
            "picrust2_pipeline.py -s seqs.fna -i abund.tsv -o 'my out' --per_sequence_contrib -p 1"
        );
    }

    #[test]
    fn test_predict_runs_command() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let predictor = ShellPredictor::new("mkdir").with_extra_flags(vec!["-p".to_string()]);
        // `mkdir -s` is rejected, so the tool failure surfaces as an error
        let request = PredictionRequest {
            seqs: dir.path(),
            abundance: dir.path(),
            out_dir: &out,
            log: None,
        };
        assert!(matches!(
            predictor.predict(&request),
            Err(PredictError::ExternalTool { .. })
        ));
    }
}

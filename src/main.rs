// Entrypoint for the CLI application.
// - Runs a program behind a spinner: `cws-term <title> <program> [args...]`.
// - The child's output is captured so it cannot disturb the spinner line;
//   stdout is replayed on success, the error (with stderr) is shown on failure.
// - The exit code mirrors the child's. A child that never started or was
//   killed by a signal exits with 1.

use std::fmt;
use std::io::{self, Write};
use std::process::{Command, ExitCode, ExitStatus, Output};

use anyhow::{Context, Result};
use cws_term::ui;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: cws-term <title> <program> [args...]";
const FAILURE: u8 = 1;

/// A program that ran to completion with a non-zero status.
#[derive(Debug)]
struct Exited {
    program: String,
    status: ExitStatus,
    stderr: String,
}

impl fmt::Display for Exited {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} exited with {}", self.program, self.status)?;
        if !self.stderr.is_empty() {
            write!(f, "\n{}", self.stderr)?;
        }
        Ok(())
    }
}

impl std::error::Error for Exited {}

fn main() -> Result<ExitCode> {
    // Logs share stderr with the spinner, so stay quiet unless asked.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(title), Some(program)) = (args.next(), args.next()) else {
        eprintln!("{USAGE}");
        return Ok(ExitCode::from(2));
    };
    let rest: Vec<String> = args.collect();

    match ui::spinner(&title, || run(&program, &rest)) {
        Ok(output) => {
            io::stdout()
                .write_all(&output.stdout)
                .context("failed to write program output")?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            ui::println("{{. | bold}}", &format!("{err:#}"))?;
            Ok(ExitCode::from(exit_code(&err)))
        }
    }
}

/// Run the program to completion, failing on a non-zero exit status.
fn run(program: &str, args: &[String]) -> Result<Output> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to start {program}"))?;
    if !output.status.success() {
        return Err(Exited {
            program: program.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
        }
        .into());
    }
    Ok(output)
}

/// The child's own exit code when it has one that fits a process exit code.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<Exited>()
        .and_then(|exited| exited.status.code())
        .and_then(|code| u8::try_from(code).ok())
        .filter(|&code| code != 0)
        .unwrap_or(FAILURE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[cfg(unix)]
    #[test]
    fn child_exit_code_is_kept() {
        let err = run("sh", &shell("echo nope >&2; exit 3")).unwrap_err();
        assert_eq!(exit_code(&err), 3);
        assert!(format!("{err:#}").ends_with("nope"), "{err:#}");
    }

    #[cfg(unix)]
    #[test]
    fn signalled_child_exits_with_failure() {
        let err = run("sh", &shell("kill -9 $$")).unwrap_err();
        assert_eq!(exit_code(&err), FAILURE);
    }

    #[test]
    fn missing_program_exits_with_failure() {
        let err = run("cws-term-no-such-program", &[]).unwrap_err();
        assert!(format!("{err:#}").starts_with("failed to start"), "{err:#}");
        assert_eq!(exit_code(&err), FAILURE);
    }
}

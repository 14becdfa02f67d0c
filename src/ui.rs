// UI layer: one-shot helpers for command output. Each helper builds its own
// short-lived screen buffer over stderr, so command code only deals with a
// template and the data to show.

use std::io::{self, Write};

use crossterm::tty::IsTty;
use serde::Serialize;
use tracing::warn;

use crate::config::Config;
use crate::error::Result;
use crate::screenbuf::ScreenBuf;
use crate::spinner::{Outcome, Spinner};

/// Render a template once to stderr. Wrapping is off so multi-line reports
/// keep their layout.
///
/// ```no_run
/// cws_term::ui::println("See package status at: {{. | blue}}", "https://example.com")?;
/// # Ok::<(), cws_term::Error>(())
/// ```
pub fn println<T: Serialize + ?Sized>(source: &str, data: &T) -> Result<()> {
    ScreenBuf::new(io::stderr()).with_wrap(false).render(source, data)
}

/// Render a template to a string, including the trailing line break.
pub fn string<T: Serialize + ?Sized>(source: &str, data: &T) -> Result<String> {
    let buf = ScreenBuf::new(Vec::new()).with_wrap(false);
    buf.render(source, data)?;
    Ok(String::from_utf8_lossy(&buf.into_inner()).into_owned())
}

/// Run `op` behind a spinner on stderr. When stderr is not a terminal the
/// animation is replaced by plain start and outcome lines.
pub fn spinner<T, E, F>(title: &str, op: F) -> std::result::Result<T, E>
where
    F: FnOnce() -> std::result::Result<T, E>,
{
    let config = Config::from_env();
    let stderr = io::stderr();
    if stderr.is_tty() {
        let buf = ScreenBuf::from_config(stderr, &config);
        return Spinner::new(&buf, title)
            .interval(config.tick_interval)
            .spin(op);
    }
    plain_spinner(&mut io::stderr(), title, op)
}

fn plain_spinner<W, T, E, F>(out: &mut W, title: &str, op: F) -> std::result::Result<T, E>
where
    W: Write,
    F: FnOnce() -> std::result::Result<T, E>,
{
    if let Err(err) = writeln!(out, "🔄: {title}") {
        warn!(%err, "failed to write progress line");
    }
    let result = op();
    let outcome = if result.is_ok() {
        Outcome::Succeeded
    } else {
        Outcome::Failed
    };
    if let Err(err) = writeln!(out, "{}: {title}", outcome.glyph()) {
        warn!(%err, "failed to write outcome line");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Style;
    use crate::Error;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct Deployed<'a> {
        version: &'a str,
        state: &'a str,
        status: &'a str,
    }

    #[test]
    fn string_renders_multi_line_report_unwrapped() {
        let report = Deployed {
            version: "24.1.2.3",
            state: "SUCCESS",
            status: "OK",
        };
        let out = string(
            "{{.Version | bold}}\n  Upload State      : {{.State}}\n  Publication Status: {{.Status}}",
            &report,
        )
        .unwrap();
        let expected = format!(
            "{}\n  Upload State      : SUCCESS\n  Publication Status: OK\n",
            Style::Bold.apply("24.1.2.3")
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn string_does_not_wrap_long_lines() {
        let long = "x".repeat(200);
        assert_eq!(string("{{.}}", &long).unwrap(), format!("{long}\n"));
    }

    #[test]
    fn string_reports_template_errors() {
        let err = string("{{.Code}}", &()).unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }

    #[test]
    fn plain_spinner_prints_start_and_outcome() {
        let mut out = Vec::new();
        let result: std::result::Result<u8, &str> = plain_spinner(&mut out, "Creating", || Ok(1));
        assert_eq!(result, Ok(1));
        assert_eq!(String::from_utf8(out).unwrap(), "🔄: Creating\n✅: Creating\n");

        let mut out = Vec::new();
        let result: std::result::Result<u8, &str> = plain_spinner(&mut out, "Creating", || Err("no"));
        assert_eq!(result, Err("no"));
        assert_eq!(String::from_utf8(out).unwrap(), "🔄: Creating\n🔥: Creating\n");
    }

    #[test]
    fn plain_spinner_result_survives_write_errors() {
        let mut ran = false;
        let result: std::result::Result<&str, u8> = plain_spinner(&mut ClosedPipe, "Deleting", || {
            ran = true;
            Ok("gone")
        });
        assert!(ran);
        assert_eq!(result, Ok("gone"));

        let result: std::result::Result<(), u8> = plain_spinner(&mut ClosedPipe, "Deleting", || Err(4));
        assert_eq!(result, Err(4));
    }
}

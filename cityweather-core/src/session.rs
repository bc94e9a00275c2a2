//! Line-oriented stdin session: one city per line.

use std::{borrow::Cow, io::Write};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    config::QueryMode,
    error::WeatherError,
    lookup::lookup,
    model::CityQuery,
    provider::{Geocoder, WeatherFetcher},
    render::{OutputFormat, render},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    pub mode: QueryMode,
    pub format: OutputFormat,
}

/// Tally of processed cities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl SessionReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }
}

/// Read cities from `input`, write summaries to `out` and one-line diagnostics to `err`.
///
/// Blank lines are skipped. In `Single` mode the session ends after the first
/// city, whether it succeeded or not. Only I/O failures on the streams
/// themselves are returned as errors; lookup failures are counted.
pub async fn run_session<R, W, E>(
    geocoder: &dyn Geocoder,
    fetcher: &dyn WeatherFetcher,
    mut input: R,
    out: &mut W,
    err: &mut E,
    options: SessionOptions,
    cancel: &CancellationToken,
) -> Result<SessionReport>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    E: Write,
{
    let mut report = SessionReport::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                report.cancelled = true;
                break;
            }
            read = input.read_until(b'\n', &mut buf) => {
                read.context("Failed to read city name from input")?
            }
        };

        if read == 0 {
            debug!("end of input");
            break;
        }

        let line = decode_line(&buf);
        let query = CityQuery::new(line);
        if query.is_blank() {
            warn!("skipping blank input line");
            continue;
        }

        match lookup(geocoder, fetcher, &query, cancel).await {
            Ok(weather) => {
                let rendered =
                    render(&weather, options.format).context("Failed to serialize weather report")?;
                out.write_all(rendered.as_bytes())
                    .and_then(|_| out.flush())
                    .context("Failed to write weather summary")?;
                report.succeeded += 1;
            }
            Err(WeatherError::Cancelled) => {
                report.cancelled = true;
                break;
            }
            Err(e) => {
                warn!(city = query.trimmed(), error = %e, "lookup failed");
                writeln!(err, "{}", e.user_message()).context("Failed to write diagnostic")?;
                report.failed += 1;
            }
        }

        if options.mode == QueryMode::Single {
            break;
        }
    }

    Ok(report)
}

/// Input is raw bytes; invalid UTF-8 becomes U+FFFD instead of ending the session.
fn decode_line(buf: &[u8]) -> String {
    let text = String::from_utf8_lossy(buf);
    if matches!(text, Cow::Owned(_)) {
        warn!("input line is not valid UTF-8, replacing invalid bytes");
    }
    text.trim_end_matches(['\n', '\r']).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::fakes::{FakeFetcher, FakeGeocoder};

    fn cities() -> FakeGeocoder {
        FakeGeocoder::with(&[("london", 51.5074, -0.1278), ("oslo", 59.91, 10.75)])
    }

    async fn run(
        geocoder: &FakeGeocoder,
        input: &str,
        mode: QueryMode,
    ) -> (SessionReport, String, String) {
        let fetcher = FakeFetcher::default();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let options = SessionOptions {
            mode,
            format: OutputFormat::Text,
        };

        let report = run_session(
            geocoder,
            &fetcher,
            input.as_bytes(),
            &mut out,
            &mut err,
            options,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        (
            report,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[tokio::test]
    async fn single_mode_stops_after_first_city() {
        let geocoder = cities();
        let (report, out, err) = run(&geocoder, "lonDon\noslo\n", QueryMode::Single).await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 0);
        assert!(out.starts_with("Current weather for London - Clear, 15.00°C\n"));
        assert!(!out.contains("Oslo"));
        assert!(err.is_empty());
        assert_eq!(geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn single_mode_stops_after_first_failure_too() {
        let geocoder = cities();
        let (report, out, err) = run(&geocoder, "Atlantis\nOslo\n", QueryMode::Single).await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded, 0);
        assert!(!report.all_succeeded());
        assert!(out.is_empty());
        assert_eq!(err, "No location found for 'Atlantis'\n");
    }

    #[tokio::test]
    async fn until_eof_processes_every_line() {
        let geocoder = cities();
        let (report, out, err) =
            run(&geocoder, "london\nAtlantis\nOSLO", QueryMode::UntilEof).await;

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert!(out.contains("Current weather for London"));
        assert!(out.contains("Current weather for Oslo"));
        assert_eq!(err.lines().count(), 1);
    }

    #[tokio::test]
    async fn invalid_utf8_line_fails_alone() {
        let geocoder = cities();
        let fetcher = FakeFetcher::default();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let options = SessionOptions {
            mode: QueryMode::UntilEof,
            format: OutputFormat::Text,
        };

        let report = run_session(
            &geocoder,
            &fetcher,
            &b"london\nM\xe1laga\noslo\n"[..],
            &mut out,
            &mut err,
            options,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(geocoder.calls(), 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Current weather for London"));
        assert!(out.contains("Current weather for Oslo"));
        assert_eq!(String::from_utf8(err).unwrap(), "No location found for 'M\u{fffd}laga'\n");
    }

    #[test]
    fn decode_line_strips_line_endings() {
        assert_eq!(decode_line(b"Oslo\r\n"), "Oslo");
        assert_eq!(decode_line(b"Oslo"), "Oslo");
        assert_eq!(decode_line(b"M\xe1laga\n"), "M\u{fffd}laga");
    }

    #[tokio::test]
    async fn blank_lines_are_skipped() {
        let geocoder = cities();
        let (report, out, _) = run(&geocoder, "\n   \nOslo\n", QueryMode::Single).await;

        assert_eq!(report.succeeded, 1);
        assert!(out.contains("Oslo"));
    }

    #[tokio::test]
    async fn empty_input_is_a_clean_exit() {
        let geocoder = cities();
        let (report, out, err) = run(&geocoder, "", QueryMode::UntilEof).await;

        assert_eq!(report, SessionReport::default());
        assert!(report.all_succeeded());
        assert!(out.is_empty() && err.is_empty());
    }

    #[tokio::test]
    async fn json_format_writes_one_line_per_city() {
        let geocoder = cities();
        let fetcher = FakeFetcher::default();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let options = SessionOptions {
            mode: QueryMode::UntilEof,
            format: OutputFormat::Json,
        };

        run_session(
            &geocoder,
            &fetcher,
            "london\noslo\n".as_bytes(),
            &mut out,
            &mut err,
            options,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let out = String::from_utf8(out).unwrap();
        let cities: Vec<String> = out
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["city"].to_string())
            .collect();
        assert_eq!(cities, vec!["\"London\"", "\"Oslo\""]);
    }

    #[tokio::test]
    async fn cancelled_session_reads_nothing() {
        let geocoder = cities();
        let fetcher = FakeFetcher::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut out = Vec::new();
        let mut err = Vec::new();

        let report = run_session(
            &geocoder,
            &fetcher,
            "london\n".as_bytes(),
            &mut out,
            &mut err,
            SessionOptions::default(),
            &cancel,
        )
        .await
        .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.succeeded + report.failed, 0);
        assert_eq!(geocoder.calls(), 0);
    }
}

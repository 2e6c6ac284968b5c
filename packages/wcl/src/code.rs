use std::fmt;

use reqwest::Url;
use thiserror::Error;

const MIN_CODE_LEN: usize = 8;
const MAX_CODE_LEN: usize = 32;

/// A syntactically valid report code.
///
/// Only the shape is checked here; whether the report exists is the provider's answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportCode(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidReportCode {
    #[error("Report identifier is empty")]
    Empty,
    #[error("Not a report URL: {0}")]
    NotAReportUrl(String),
    #[error("Report code must be {MIN_CODE_LEN}-{MAX_CODE_LEN} alphanumeric characters, got '{0}'")]
    BadCode(String),
}

impl ReportCode {
    /// Accepts either a raw code or a report URL such as
    /// `https://www.warcraftlogs.com/reports/AbC123xYz789QwEr#fight=3`.
    pub fn parse(input: &str) -> Result<Self, InvalidReportCode> {
        let input = input.trim();
        if input.is_empty() {
            return Err(InvalidReportCode::Empty);
        }

        let candidate = if input.contains('/') {
            extract_from_url(input)?
        } else {
            input.to_string()
        };

        validate(&candidate)?;
        Ok(Self(candidate))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ReportCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn extract_from_url(input: &str) -> Result<String, InvalidReportCode> {
    let with_scheme = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{}", input.trim_start_matches('/'))
    };
    let url =
        Url::parse(&with_scheme).map_err(|_| InvalidReportCode::NotAReportUrl(input.into()))?;

    let mut segments = url
        .path_segments()
        .ok_or_else(|| InvalidReportCode::NotAReportUrl(input.into()))?
        .filter(|s| !s.is_empty());

    while let Some(segment) = segments.next() {
        if segment == "reports" {
            return segments
                .next()
                .map(str::to_string)
                .ok_or_else(|| InvalidReportCode::NotAReportUrl(input.into()));
        }
    }
    Err(InvalidReportCode::NotAReportUrl(input.into()))
}

fn validate(code: &str) -> Result<(), InvalidReportCode> {
    let ok = (MIN_CODE_LEN..=MAX_CODE_LEN).contains(&code.len())
        && code.chars().all(|c| c.is_ascii_alphanumeric());
    if ok {
        Ok(())
    } else {
        Err(InvalidReportCode::BadCode(code.into()))
    }
}

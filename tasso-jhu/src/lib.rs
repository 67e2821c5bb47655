//! tasso-jhu
//!
//! `DailySource` implementation backed by the Johns Hopkins CSSE US daily
//! reports: one CSV file per day at `<base>/<MM-dd-yyyy>.csv`.
//!
//! HTTP 404 is reported as `TassoError::NotFound` so latest-date probing can
//! walk backwards; every other failure becomes `TassoError::Fetch` tagged with
//! this connector's name.
#![warn(missing_docs)]

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use tasso_core::{DailySource, DayRecord, TassoError, format_date, parse_daily_csv};
use url::Url;

/// Directory holding the published US daily reports.
pub const DEFAULT_BASE_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_daily_reports_us/";

/// Daily report connector.
#[derive(Debug, Clone)]
pub struct JhuSource {
    http: reqwest::Client,
    base_url: Url,
}

impl JhuSource {
    /// Connector name used in error tags and logs.
    pub const NAME: &'static str = "tasso-jhu";

    /// Build against the public daily report directory with a fresh `reqwest::Client`.
    ///
    /// # Panics
    /// Panics if `DEFAULT_BASE_URL` fails to parse, which would be a build defect.
    #[must_use]
    pub fn new_default() -> Self {
        Self::with_client(reqwest::Client::new(), DEFAULT_BASE_URL)
            .expect("DEFAULT_BASE_URL is a valid base URL")
    }

    /// Build against a custom base URL (mirrors, test servers).
    ///
    /// # Errors
    /// Returns `InvalidArg` if `base_url` is not an absolute URL that can act as a base.
    pub fn with_base_url(base_url: &str) -> Result<Self, TassoError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Build from a provided `reqwest::Client` and base URL.
    ///
    /// A missing trailing slash on the base path is added, so
    /// `https://host/reports` and `https://host/reports/` are equivalent.
    ///
    /// # Errors
    /// Returns `InvalidArg` if `base_url` is not an absolute URL that can act as a base.
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, TassoError> {
        let mut url = Url::parse(base_url)
            .map_err(|e| TassoError::InvalidArg(format!("invalid base URL '{base_url}': {e}")))?;
        if url.cannot_be_a_base() {
            return Err(TassoError::InvalidArg(format!(
                "base URL '{base_url}' cannot be used as a base"
            )));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self {
            http,
            base_url: url,
        })
    }

    /// Base URL the daily file names are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of the daily file for `date`.
    ///
    /// # Errors
    /// Returns `InvalidArg` if the joined URL cannot be built.
    pub fn url_for(&self, date: NaiveDate) -> Result<Url, TassoError> {
        let file = format!("{}.csv", format_date(date));
        self.base_url
            .join(&file)
            .map_err(|e| TassoError::InvalidArg(format!("cannot build URL for {file}: {e}")))
    }

    async fn get(&self, date: NaiveDate) -> Result<reqwest::Response, TassoError> {
        let what = describe(date);
        let url = self.url_for(date)?;
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| map_reqwest_err(&e, &what))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Err(TassoError::not_found(what)),
            s if s.is_success() => Ok(resp),
            s => Err(TassoError::fetch(Self::NAME, format!("status {s}: {what}"))),
        }
    }
}

fn describe(date: NaiveDate) -> String {
    format!("daily report {}", format_date(date))
}

fn map_reqwest_err(e: &reqwest::Error, context: &str) -> TassoError {
    if e.is_timeout() {
        TassoError::timeout(context.to_string())
    } else if e.is_decode() || e.is_body() {
        TassoError::fetch(JhuSource::NAME, format!("decode failed for {context}: {e}"))
    } else {
        TassoError::fetch(JhuSource::NAME, format!("{context}: {e}"))
    }
}

#[async_trait]
impl DailySource for JhuSource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "tasso_jhu::fetch_day", skip(self), fields(date = %date))
    )]
    async fn fetch_day(&self, date: NaiveDate) -> Result<Vec<DayRecord>, TassoError> {
        let resp = self.get(date).await?;
        let body = resp
            .bytes()
            .await
            .map_err(|e| map_reqwest_err(&e, &describe(date)))?;
        let parsed = parse_daily_csv(date, &body);

        #[cfg(feature = "tracing")]
        {
            if parsed.rows_skipped > 0 || !parsed.row_errors.is_empty() {
                tracing::debug!(
                    rows = parsed.rows_read,
                    kept = parsed.records.len(),
                    skipped = parsed.rows_skipped,
                    row_errors = parsed.row_errors.len(),
                    "dropped rows while parsing daily report"
                );
            }
            for e in &parsed.row_errors {
                tracing::trace!(error = %e, "row issue");
            }
        }

        Ok(parsed.records)
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "tasso_jhu::exists", skip(self), fields(date = %date))
    )]
    async fn exists(&self, date: NaiveDate) -> Result<bool, TassoError> {
        // Status only; the body is dropped unread.
        match self.get(date).await {
            Ok(_) => Ok(true),
            Err(TassoError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

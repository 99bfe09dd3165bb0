use chrono::{DateTime, NaiveDate, Utc};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use nijobs_offers::error::AppError;
use nijobs_offers::offers::{Company, InMemoryStore, Offer};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Companies and offers exported from the marketplace's document store.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    #[serde(default)]
    pub(crate) companies: Vec<Company>,
    #[serde(default)]
    pub(crate) offers: Vec<Offer>,
}

impl Snapshot {
    pub(crate) fn load(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub(crate) fn from_store(store: &InMemoryStore) -> Result<Self, AppError> {
        Ok(Self {
            companies: store.companies().map_err(offers_error)?,
            offers: store.offers().map_err(offers_error)?,
        })
    }

    pub(crate) fn write(&self, path: &Path) -> Result<(), AppError> {
        let rendered = serde_json::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    pub(crate) fn into_store(self) -> InMemoryStore {
        InMemoryStore::with_records(self.companies, self.offers)
    }
}

fn offers_error(err: nijobs_offers::offers::RepositoryError) -> AppError {
    AppError::Offers(err.into())
}

/// Accepts an RFC 3339 instant or a `YYYY-MM-DD` date at midnight UTC.
pub(crate) fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| format!("failed to parse '{raw}' as an RFC 3339 instant or YYYY-MM-DD"))
}

pub(crate) fn install_metrics() -> Result<PrometheusHandle, AppError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|err| AppError::Metrics(err.to_string()))
}

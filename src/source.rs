//! Ordered connection sources feeding the registry.
//!
//! A source is any origin of connection definitions: a manually curated
//! list, an environment variable, or an external discovery provider. The
//! caller hands [`ConnectionRegistry::reload`] its sources in priority order,
//! highest first; everything beyond "produce records" (pagination, HTTP,
//! on-disk formats) stays behind the trait.

use std::env;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::record::{ConnectionRecord, RecordSource};
use crate::registry::ConnectionRegistry;

/// One origin of connection definitions.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    /// Short label for diagnostics.
    fn name(&self) -> &str;

    /// Produce this source's records, in source order.
    ///
    /// A source that cannot currently produce anything (unset variable,
    /// unreachable provider) returns an empty list; reload must never fail
    /// because one source did.
    async fn records(&self) -> Vec<ConnectionRecord>;
}

/// A fixed, manually curated list of records.
pub struct StaticSource {
    label: String,
    records: Vec<ConnectionRecord>,
}

impl StaticSource {
    pub fn new(label: impl Into<String>, records: Vec<ConnectionRecord>) -> Self {
        Self {
            label: label.into(),
            records,
        }
    }
}

#[async_trait]
impl ConnectionSource for StaticSource {
    fn name(&self) -> &str {
        &self.label
    }

    async fn records(&self) -> Vec<ConnectionRecord> {
        self.records.clone()
    }
}

/// Connection definitions from a JSON array in an environment variable.
///
/// Each element must deserialize into a [`ConnectionRecord`]; malformed
/// elements are skipped with a diagnostic rather than failing the source.
/// All records produced here are tagged [`RecordSource::Environment`].
pub struct EnvSource {
    var: String,
}

impl EnvSource {
    /// Default environment variable consulted by [`EnvSource::default`].
    pub const DEFAULT_VAR: &'static str = "SSH_FLEET_CONNECTIONS";

    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    fn parse(&self, raw: &str) -> Vec<ConnectionRecord> {
        let values: Vec<serde_json::Value> = match serde_json::from_str(raw) {
            Ok(values) => values,
            Err(error) => {
                warn!(var = %self.var, %error, "environment source is not a JSON array");
                return Vec::new();
            }
        };

        let mut records = Vec::with_capacity(values.len());
        for value in values {
            match serde_json::from_value::<ConnectionRecord>(value) {
                Ok(mut record) => {
                    record.source = RecordSource::Environment;
                    records.push(record);
                }
                Err(error) => {
                    warn!(var = %self.var, %error, "skipping malformed connection entry");
                }
            }
        }
        records
    }
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VAR)
    }
}

#[async_trait]
impl ConnectionSource for EnvSource {
    fn name(&self) -> &str {
        &self.var
    }

    async fn records(&self) -> Vec<ConnectionRecord> {
        match env::var(&self.var) {
            Ok(raw) if !raw.trim().is_empty() => self.parse(&raw),
            _ => Vec::new(),
        }
    }
}

impl ConnectionRegistry {
    /// Gather every source in the given priority order and rebuild the
    /// resolved map in one atomic merge.
    pub async fn reload(&self, sources: &[&dyn ConnectionSource]) {
        let mut gathered = Vec::with_capacity(sources.len());
        for source in sources {
            let records = source.records().await;
            debug!(source = source.name(), count = records.len(), "gathered connection source");
            gathered.push(records);
        }
        self.merge(&gathered);
    }
}

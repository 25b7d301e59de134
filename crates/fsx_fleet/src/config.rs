use fleet_selector::Weights;
use serde::Deserialize;
use std::io::Error;
use std::path::Path;

use crate::fsx::MetricQuery;
use crate::inventory::TagFilter;

pub const DEFAULT_SVM_NAME: &str = "SVM1";
pub const DEFAULT_OUTPUT_FILE: &str = "fsx_ontap_ips.txt";
pub const DEFAULT_METRIC_NAME: &str = "TotalIops";
const DEFAULT_PERIOD_SECS: u64 = 3600;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub aws: AwsConfig,
    pub selection: SelectionConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub region: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub tag_key: Option<String>,
    pub tag_value: Option<String>,
    pub svm_name: String,
    pub metric_name: String,
    pub period_secs: u64,
    pub window_secs: u64,
    pub iops_weight: f64,
    pub capacity_weight: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            tag_key: None,
            tag_value: None,
            svm_name: DEFAULT_SVM_NAME.to_string(),
            metric_name: DEFAULT_METRIC_NAME.to_string(),
            period_secs: DEFAULT_PERIOD_SECS,
            window_secs: DEFAULT_PERIOD_SECS,
            iops_weight: 0.5,
            capacity_weight: 0.5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: DEFAULT_OUTPUT_FILE.to_string(),
        }
    }
}

impl FleetConfig {
    /// Built-in defaults when no file is given.
    pub fn load(path: Option<&str>) -> Result<Self, Error> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(Path::new(path))
            .map_err(|e| Error::other(format!("Failed to read config {path}: {e}")))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, Error> {
        toml::from_str(content).map_err(|e| Error::other(format!("TOML parse error: {e}")))
    }
}

impl SelectionConfig {
    pub fn tag_filter(&self) -> Result<TagFilter, Error> {
        match (&self.tag_key, &self.tag_value) {
            (Some(key), Some(value)) => Ok(TagFilter::new(key, value)),
            _ => Err(Error::other(
                "Tag filter not configured (selection.tag_key/tag_value or --tag)",
            )),
        }
    }

    pub fn weights(&self) -> Result<Weights, Error> {
        Weights::new(self.iops_weight, self.capacity_weight).map_err(Error::other)
    }

    /// CloudWatch periods are whole minutes, and the window must hold at
    /// least one period.
    pub fn metric_query(&self) -> Result<MetricQuery, Error> {
        if self.period_secs == 0 || self.period_secs % 60 != 0 {
            return Err(Error::other(format!(
                "selection.period_secs must be a positive multiple of 60, got {}",
                self.period_secs
            )));
        }
        if self.window_secs < self.period_secs {
            return Err(Error::other(format!(
                "selection.window_secs ({}) is shorter than period_secs ({})",
                self.window_secs, self.period_secs
            )));
        }
        let query = MetricQuery {
            metric_name: self.metric_name.clone(),
            period_secs: self.period_secs,
            window_secs: self.window_secs,
        };
        query.window()?;
        Ok(query)
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_filters: Option<u32>,
}

/// Success body of `POST /process`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub filename: String,
    pub filter: String,
    /// Server-side processing time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

impl ProcessResponse {
    pub fn new(filename: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            filter: filter.into(),
            processing_time: None,
            parameters: None,
            original_size: None,
            output_format: None,
            file_size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub default: f64,
    pub range: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterInfo {
    pub description: String,
    #[serde(default)]
    pub parameters: Option<BTreeMap<String, ParameterInfo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_usage: Option<String>,
}

/// Body of `GET /filters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiltersResponse {
    pub filters: BTreeMap<String, FilterInfo>,
    pub count: usize,
    #[serde(default)]
    pub categories: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCounts {
    pub uploaded: u64,
    pub processed: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StorageUsage {
    pub uploads_size_mb: f64,
    pub processed_size_mb: f64,
    pub total_size_mb: f64,
}

/// Body of `GET /stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsResponse {
    pub timestamp: String,
    pub files: FileCounts,
    pub storage: StorageUsage,
}

use std::path::Path;

use serde::Deserialize;

use rinse_api::mapping::FieldMapping;
use rinse_api::record::is_marker_field;

use crate::error::EngineError;

/// Built-in article table layout: `(column, is_large_object)`.
/// Used when the configuration declares no fields.
const DEFAULT_FIELDS: &[(&str, bool)] = &[
    ("ID", false),
    ("TITLE", false),
    ("SLUG", false),
    ("SUMMARY", false),
    ("CONTENT", true),
    ("SOURCES", true),
    ("AUTHOR", false),
    ("STATUS", false),
    ("CREATED_AT", false),
    ("UPDATED_AT", false),
];

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RinseConfig {
    /// Batch orchestration defaults.
    #[serde(default)]
    pub batch: BatchConfig,

    /// Value extraction limits.
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Ordered field mapping. Order is also the default positional layout.
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub parallel: bool,

    /// Collections larger than this get an auto-scaled batch size.
    #[serde(default = "default_auto_scale_threshold")]
    pub auto_scale_threshold: usize,

    #[serde(default = "default_min_batch_size")]
    pub min_batch_size: usize,

    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            parallel: false,
            auto_scale_threshold: default_auto_scale_threshold(),
            min_batch_size: default_min_batch_size(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

fn default_batch_size() -> usize {
    100
}

fn default_auto_scale_threshold() -> usize {
    1000
}

fn default_min_batch_size() -> usize {
    50
}

fn default_max_batch_size() -> usize {
    200
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractConfig {
    /// Members whose name starts with this prefix are internal bookkeeping
    /// and never extracted.
    #[serde(default = "default_private_prefix")]
    pub private_prefix: String,

    /// Deeper nesting is cut off (branch becomes `null`).
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            private_prefix: default_private_prefix(),
            max_depth: default_max_depth(),
        }
    }
}

fn default_private_prefix() -> String {
    "_".to_string()
}

fn default_max_depth() -> usize {
    128
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldConfig {
    /// Column name as produced by the driver.
    pub source: String,
    /// Output name. Defaults to the lowercased source.
    #[serde(default)]
    pub target: Option<String>,
    /// Content lives out of line and must be fetched.
    #[serde(default)]
    pub large_object: bool,
}

/// Config format loader, selected by file extension.
pub trait ConfigParser: Send + Sync {
    fn extensions(&self) -> &[&str];
    fn parse(&self, content: &str) -> Result<RinseConfig, EngineError>;
}

pub struct TomlParser;

impl ConfigParser for TomlParser {
    fn extensions(&self) -> &[&str] {
        &["toml"]
    }

    fn parse(&self, content: &str) -> Result<RinseConfig, EngineError> {
        RinseConfig::parse(content)
    }
}

impl RinseConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, EngineError> {
        Self::load_with(path, &[&TomlParser])
    }

    /// Load configuration, picking the parser by file extension.
    pub fn load_with(path: &str, parsers: &[&dyn ConfigParser]) -> Result<Self, EngineError> {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let parser = parsers
            .iter()
            .find(|p| p.extensions().contains(&ext))
            .ok_or_else(|| EngineError::Config(format!("{path}: unsupported config format '{ext}'")))?;

        let content =
            std::fs::read_to_string(path).map_err(|e| EngineError::Config(format!("{path}: {e}")))?;
        let config = parser.parse(&content).map_err(|e| e.with_context(path))?;
        config.validate().map_err(|e| e.with_context(path))?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, EngineError> {
        toml::from_str(toml_str).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.batch.batch_size == 0 {
            return Err(EngineError::Config("batch.batch_size must be greater than 0".into()));
        }
        if self.batch.min_batch_size == 0 || self.batch.min_batch_size > self.batch.max_batch_size {
            return Err(EngineError::Config(format!(
                "batch.min_batch_size ({}) must be in 1..=batch.max_batch_size ({})",
                self.batch.min_batch_size, self.batch.max_batch_size
            )));
        }
        if self.extract.max_depth == 0 {
            return Err(EngineError::Config("extract.max_depth must be greater than 0".into()));
        }
        for (i, field) in self.fields.iter().enumerate() {
            if field.source.is_empty() {
                return Err(EngineError::Config(format!("fields[{i}]: empty source name")));
            }
            let target = field.target.clone().unwrap_or_else(|| field.source.to_lowercase());
            if is_marker_field(&target) {
                return Err(EngineError::Config(format!(
                    "fields[{i}]: target '{target}' is reserved for degraded records"
                )));
            }
            if self.fields[..i].iter().any(|f| f.source == field.source) {
                return Err(EngineError::Config(format!(
                    "fields[{i}]: duplicate source '{}'",
                    field.source
                )));
            }
        }
        Ok(())
    }

    /// The process-wide default mapping.
    pub fn mapping(&self) -> FieldMapping {
        if self.fields.is_empty() {
            return FieldMapping::from_names(DEFAULT_FIELDS.iter().map(|(name, _)| *name));
        }
        FieldMapping::new(self.fields.iter().map(|f| {
            let target = f.target.clone().unwrap_or_else(|| f.source.to_lowercase());
            (f.source.clone(), target)
        }))
    }

    /// Source names of large-object fields.
    pub fn large_fields(&self) -> Vec<String> {
        if self.fields.is_empty() {
            return DEFAULT_FIELDS
                .iter()
                .filter(|(_, large)| *large)
                .map(|(name, _)| name.to_string())
                .collect();
        }
        self.fields
            .iter()
            .filter(|f| f.large_object)
            .map(|f| f.source.clone())
            .collect()
    }

    /// Default column order for positional rows.
    pub fn positional_fields(&self) -> Vec<String> {
        if self.fields.is_empty() {
            return DEFAULT_FIELDS.iter().map(|(name, _)| name.to_string()).collect();
        }
        self.fields.iter().map(|f| f.source.clone()).collect()
    }
}

//! Pipe configuration
//!
//! Pipes can be configured in code through the builder methods on
//! [`PipeConfig`] or loaded from TOML:
//!
//! ```toml
//! capacity = 1
//! read_timeout = "250ms"
//! chunk_size = 8192
//!
//! [[transforms]]
//! kind = "column_trim"
//! from = 0
//! to = 5
//!
//! [[transforms]]
//! kind = "dump"
//! label = "[TRIMMED]"
//!
//! [[transforms]]
//! kind = "escape"
//! ```

use crate::error::PipeError;
use crate::pipe::DEFAULT_CAPACITY;
use crate::source::DEFAULT_CHUNK_SIZE;
use crate::transform::dump::DEFAULT_DUMP_LABEL;
use crate::transform::{
    ColumnTrim, DumpTap, Escape, SharedTransform, StdoutSink, TracingSink, TransformChain,
    Unescape,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Where a `dump` transform sends its lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DumpTarget {
    #[default]
    Tracing,
    Stdout,
}

/// One configured transform stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformConfig {
    Escape,
    Unescape,
    ColumnTrim {
        from: usize,
        to: usize,
    },
    Dump {
        #[serde(default = "default_dump_label")]
        label: String,
        #[serde(default)]
        target: DumpTarget,
    },
}

impl TransformConfig {
    pub fn build(&self) -> SharedTransform {
        match self {
            TransformConfig::Escape => SharedTransform::new(Escape),
            TransformConfig::Unescape => SharedTransform::new(Unescape),
            TransformConfig::ColumnTrim { from, to } => {
                SharedTransform::new(ColumnTrim::new(*from, *to))
            }
            TransformConfig::Dump { label, target } => {
                let tap = match target {
                    DumpTarget::Tracing => DumpTap::new(TracingSink),
                    DumpTarget::Stdout => DumpTap::new(StdoutSink),
                };
                SharedTransform::new(tap.with_label(label.clone()))
            }
        }
    }
}

fn default_dump_label() -> String {
    DEFAULT_DUMP_LABEL.to_string()
}

/// Settings for a [`StreamingPipe`](crate::StreamingPipe).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    /// Lines the producer may publish ahead of the consumer.
    pub capacity: usize,
    /// Bound on how long a single read waits; `None` waits forever.
    #[serde(with = "humantime_serde")]
    pub read_timeout: Option<Duration>,
    /// Bytes per read for byte-backed sources.
    pub chunk_size: usize,
    /// Transform stages, applied in order.
    pub transforms: Vec<TransformConfig>,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            read_timeout: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            transforms: Vec::new(),
        }
    }
}

impl PipeConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_transform(mut self, transform: TransformConfig) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse pipe config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipe config: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid pipe config: {}", path.display()))
    }

    pub fn validate(&self) -> std::result::Result<(), PipeError> {
        if self.capacity == 0 {
            return Err(PipeError::Config("capacity must be at least 1".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(PipeError::Config("chunk_size must be at least 1".to_string()));
        }
        if self.read_timeout == Some(Duration::ZERO) {
            return Err(PipeError::Config("read_timeout must be positive".to_string()));
        }
        Ok(())
    }

    /// Build the configured transforms into one chain.
    pub fn build_chain(&self) -> TransformChain {
        self.transforms.iter().map(TransformConfig::build).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::LineTransform;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PipeConfig::default();
        assert_eq!(config.capacity, 1);
        assert_eq!(config.read_timeout, None);
        assert_eq!(config.chunk_size, 8192);
        assert!(config.transforms.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_document() {
        let config = PipeConfig::from_toml_str(
            r#"
            capacity = 4
            read_timeout = "250ms"

            [[transforms]]
            kind = "column_trim"
            from = 0
            to = 5

            [[transforms]]
            kind = "dump"

            [[transforms]]
            kind = "escape"
            "#,
        )
        .unwrap();

        assert_eq!(config.capacity, 4);
        assert_eq!(config.read_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.chunk_size, 8192);
        assert_eq!(
            config.transforms,
            vec![
                TransformConfig::ColumnTrim { from: 0, to: 5 },
                TransformConfig::Dump {
                    label: "[DUMP]".to_string(),
                    target: DumpTarget::Tracing
                },
                TransformConfig::Escape,
            ]
        );
    }

    #[test]
    fn test_build_chain_applies_in_order() {
        let config = PipeConfig::default()
            .with_transform(TransformConfig::ColumnTrim { from: 0, to: 5 })
            .with_transform(TransformConfig::Escape);
        let chain = config.build_chain();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.apply(1, "\"hi\"there").unwrap(), "\\\"hi\\\"t");
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let chain = PipeConfig::default().build_chain();
        assert_eq!(chain.apply(1, "same").unwrap(), "same");
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = PipeConfig::from_toml_str(
            r#"
            [[transforms]]
            kind = "rot13"
            "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("rot13"));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = PipeConfig::from_toml_str("capacity = 0").unwrap_err();
        assert!(err.to_string().contains("capacity"));
        assert!(PipeConfig::default().with_chunk_size(0).validate().is_err());
        assert!(PipeConfig::default()
            .with_read_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "chunk_size = 16\n[[transforms]]\nkind = \"unescape\"").unwrap();

        let config = PipeConfig::load(file.path()).unwrap();
        assert_eq!(config.chunk_size, 16);
        assert_eq!(config.transforms, vec![TransformConfig::Unescape]);
    }

    #[test]
    fn test_load_missing_file_has_context() {
        let err = PipeConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read pipe config"));
    }

    #[test]
    fn test_dump_stdout_target_parses() {
        let config = PipeConfig::from_toml_str(
            r#"
            [[transforms]]
            kind = "dump"
            label = ">> "
            target = "stdout"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.transforms[0],
            TransformConfig::Dump {
                label: ">> ".to_string(),
                target: DumpTarget::Stdout
            }
        );
    }
}

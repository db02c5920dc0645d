//! Configuration types for document conversion and serialization.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`] or loaded from a JSON file. There is no
//! module-wide default instance: every [`crate::MarkItUp`] and every
//! [`crate::ConversionResult`] owns the configuration it was created with, so
//! concurrent conversions never observe each other's settings.
//!
//! Batch and network concerns (concurrency, download timeout, progress
//! reporting) live in the separate [`BatchConfig`] because they do not
//! influence what a single document serialises to.

use crate::error::MarkItUpError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// Default chunk size, in words.
pub const DEFAULT_CHUNK_SIZE: usize = 300;

/// Non-text modality that converters may embed and the serializer may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Image,
    Audio,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Image => f.write_str("image"),
            Modality::Audio => f.write_str("audio"),
        }
    }
}

/// Configuration for a single conversion call.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use markitup::{ConversionConfig, Modality};
///
/// let config = ConversionConfig::builder()
///     .modalities([Modality::Image])
///     .chunk(true)
///     .chunk_size(200)
///     .image_max_dimension(768)
///     .build()
///     .unwrap();
/// assert!(!config.audio_enabled());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Media modalities to embed and emit. Default: image and audio.
    ///
    /// Excluding `image` makes converters write an omission placeholder
    /// instead of data URIs and keeps the serializer from emitting image
    /// blocks. Excluding `audio` keeps audio attachments out of the output.
    pub modalities: BTreeSet<Modality>,

    /// Ask converters for a pre-segmented chunk list and serialise from it.
    /// Default: false.
    pub chunk: bool,

    /// Target chunk size in whitespace-separated words. Default: 300.
    pub chunk_size: usize,

    /// Re-encode non-WebP images as WebP before emitting them. Default: true.
    pub image_use_webp: bool,

    /// Longest allowed image edge in pixels; larger images are scaled down
    /// preserving aspect ratio. `0` disables resizing. Default: 0.
    pub image_max_dimension: u32,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            modalities: [Modality::Image, Modality::Audio].into_iter().collect(),
            chunk: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            image_use_webp: true,
            image_max_dimension: 0,
        }
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, MarkItUpError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MarkItUpError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            MarkItUpError::InvalidConfig(format!("cannot parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn image_enabled(&self) -> bool {
        self.modalities.contains(&Modality::Image)
    }

    pub fn audio_enabled(&self) -> bool {
        self.modalities.contains(&Modality::Audio)
    }

    fn validate(&self) -> Result<(), MarkItUpError> {
        if self.chunk_size == 0 {
            return Err(MarkItUpError::InvalidConfig(
                "chunk_size must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn modalities(mut self, modalities: impl IntoIterator<Item = Modality>) -> Self {
        self.config.modalities = modalities.into_iter().collect();
        self
    }

    pub fn chunk(mut self, v: bool) -> Self {
        self.config.chunk = v;
        self
    }

    pub fn chunk_size(mut self, words: usize) -> Self {
        self.config.chunk_size = words;
        self
    }

    pub fn image_use_webp(mut self, v: bool) -> Self {
        self.config.image_use_webp = v;
        self
    }

    pub fn image_max_dimension(mut self, px: u32) -> Self {
        self.config.image_max_dimension = px;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, MarkItUpError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Settings for the async, URL-aware and batch entry points.
#[derive(Clone)]
pub struct BatchConfig {
    /// Number of documents converted at once. Default: 4.
    pub concurrency: usize,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-document progress events.
    pub progress: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            download_timeout_secs: 120,
            progress: None,
        }
    }
}

impl BatchConfig {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.download_timeout_secs = secs;
        self
    }

    pub fn progress(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("concurrency", &self.concurrency)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress",
                &self.progress.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_all_modalities() {
        let c = ConversionConfig::default();
        assert!(c.image_enabled());
        assert!(c.audio_enabled());
        assert!(!c.chunk);
        assert_eq!(c.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(c.image_use_webp);
        assert_eq!(c.image_max_dimension, 0);
    }

    #[test]
    fn builder_rejects_zero_chunk_size() {
        let err = ConversionConfig::builder().chunk_size(0).build().unwrap_err();
        assert!(err.to_string().contains("chunk_size"));
    }

    #[test]
    fn empty_modalities() {
        let c = ConversionConfig::builder().modalities([]).build().unwrap();
        assert!(!c.image_enabled());
        assert!(!c.audio_enabled());
    }

    #[test]
    fn json_partial_config_uses_defaults() {
        let c: ConversionConfig =
            serde_json::from_str(r#"{"modalities":["image"],"chunk":true}"#).unwrap();
        assert!(c.image_enabled());
        assert!(!c.audio_enabled());
        assert!(c.chunk);
        assert_eq!(c.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markitup.json");
        std::fs::write(&path, r#"{"image_max_dimension":512,"image_use_webp":false}"#).unwrap();
        let c = ConversionConfig::from_json_file(&path).unwrap();
        assert_eq!(c.image_max_dimension, 512);
        assert!(!c.image_use_webp);
    }

    #[test]
    fn batch_concurrency_floor() {
        assert_eq!(BatchConfig::default().concurrency(0).concurrency, 1);
    }
}

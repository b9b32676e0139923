//! The version-tagged config blob broadcast to every server-side iterator.
//!
//! The tablet engine only accepts string-keyed options, and the config path
//! is hot under fan-out, so the schema and view ride as one compact CBOR
//! value under a single option key rather than as a text format. Decoding
//! is bounded and verifies both the version byte and a schema fingerprint,
//! so drift between client and servers fails loudly at build time.

use crate::{
    codec::layout::RowLayout,
    ops::options::Inclusion,
    schema::{Schema, SchemaError},
    view::View,
};
use icygraph_tablet::{IteratorSpec, iterator::IteratorOptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error as ThisError;

pub const CONFIG_VERSION: u8 = 1;
pub const CONFIG_OPTION_KEY: &str = "cfg";

/// Max accepted config payload. Size limits are decode-side policy.
pub const MAX_CONFIG_BYTES: usize = 4 * 1024 * 1024;

///
/// IteratorConfigError
/// Surfaced as operation failure before any cell is pulled.
///

#[derive(Debug, ThisError)]
pub enum IteratorConfigError {
    #[error("iterator config encode failed: {0}")]
    Encode(String),

    #[error("iterator config decode failed: {0}")]
    Decode(String),

    #[error("iterator config size {len} exceeds limit {max}")]
    SizeLimitExceeded { len: usize, max: usize },

    #[error("iterator config version {found} is not {CONFIG_VERSION}")]
    VersionMismatch { found: u8 },

    #[error("iterator config schema fingerprint does not match its schema")]
    FingerprintMismatch,

    #[error("iterator options carry no config")]
    MissingConfig,

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

///
/// IteratorConfig
///

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IteratorConfig {
    pub version: u8,
    #[serde(with = "serde_bytes")]
    pub schema_fingerprint: Vec<u8>,
    pub layout: RowLayout,
    pub schema: Schema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<View>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusion: Option<Inclusion>,
    /// True when the cells this stage sees were re-encoded under the
    /// view's narrowed group-by by an aggregation stage below it.
    #[serde(default)]
    pub narrowed: bool,
}

impl IteratorConfig {
    pub fn new(layout: RowLayout, schema: &Arc<Schema>) -> Result<Self, IteratorConfigError> {
        Ok(Self {
            version: CONFIG_VERSION,
            schema_fingerprint: schema.fingerprint()?.to_vec(),
            layout,
            schema: (**schema).clone(),
            view: None,
            inclusion: None,
            narrowed: false,
        })
    }

    #[must_use]
    pub fn with_view(mut self, view: View) -> Self {
        self.view = Some(view);
        self
    }

    #[must_use]
    pub fn with_inclusion(mut self, inclusion: Inclusion) -> Self {
        self.inclusion = Some(inclusion);
        self
    }

    #[must_use]
    pub const fn with_narrowed(mut self, narrowed: bool) -> Self {
        self.narrowed = narrowed;
        self
    }

    pub fn encode(&self) -> Result<Vec<u8>, IteratorConfigError> {
        serde_cbor::to_vec(self).map_err(|err| IteratorConfigError::Encode(err.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, IteratorConfigError> {
        if bytes.len() > MAX_CONFIG_BYTES {
            return Err(IteratorConfigError::SizeLimitExceeded {
                len: bytes.len(),
                max: MAX_CONFIG_BYTES,
            });
        }

        let config: Self = serde_cbor::from_slice(bytes)
            .map_err(|err| IteratorConfigError::Decode(err.to_string()))?;

        if config.version != CONFIG_VERSION {
            return Err(IteratorConfigError::VersionMismatch {
                found: config.version,
            });
        }
        if config.schema_fingerprint != config.schema.fingerprint()? {
            return Err(IteratorConfigError::FingerprintMismatch);
        }

        Ok(config)
    }

    pub fn from_options(options: &IteratorOptions) -> Result<Self, IteratorConfigError> {
        let bytes = options
            .get(CONFIG_OPTION_KEY)
            .ok_or(IteratorConfigError::MissingConfig)?;
        Self::decode(bytes)
    }

    pub fn into_spec(
        self,
        priority: u8,
        name: &'static str,
    ) -> Result<IteratorSpec, IteratorConfigError> {
        let bytes = self.encode()?;
        Ok(IteratorSpec::new(priority, name).with_option(CONFIG_OPTION_KEY, bytes))
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::social_schema;

    #[test]
    fn config_roundtrips() {
        let schema = social_schema();
        let config = IteratorConfig::new(RowLayout::ByteEntity, &schema)
            .unwrap()
            .with_view(View::new())
            .with_narrowed(true);

        let decoded = IteratorConfig::decode(&config.encode().unwrap()).unwrap();
        assert_eq!(decoded.layout, RowLayout::ByteEntity);
        assert!(decoded.narrowed);
        assert_eq!(decoded.schema, *schema);
    }

    #[test]
    fn version_drift_is_rejected() {
        let schema = social_schema();
        let mut config = IteratorConfig::new(RowLayout::Classic, &schema).unwrap();
        config.version = 9;
        let bytes = config.encode().unwrap();
        assert!(matches!(
            IteratorConfig::decode(&bytes),
            Err(IteratorConfigError::VersionMismatch { found: 9 })
        ));
    }

    #[test]
    fn fingerprint_drift_is_rejected() {
        let schema = social_schema();
        let mut config = IteratorConfig::new(RowLayout::Classic, &schema).unwrap();
        config.schema_fingerprint[0] ^= 0xFF;
        let bytes = config.encode().unwrap();
        assert!(matches!(
            IteratorConfig::decode(&bytes),
            Err(IteratorConfigError::FingerprintMismatch)
        ));
    }

    #[test]
    fn missing_config_option_is_rejected() {
        assert!(matches!(
            IteratorConfig::from_options(&IteratorOptions::new()),
            Err(IteratorConfigError::MissingConfig)
        ));
    }
}

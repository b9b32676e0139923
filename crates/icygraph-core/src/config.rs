//! Store configuration, parsed up front from a string-keyed property map.
//! Missing credentials or an unknown key package are fatal at
//! initialisation; nothing here is re-read after `Store::open`.

use icygraph_tablet::{Authorizations, Credentials};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

pub const INSTANCE_KEY: &str = "tablet.instance";
pub const ENDPOINTS_KEY: &str = "tablet.endpoints";
pub const USER_KEY: &str = "tablet.user";
pub const PASSWORD_KEY: &str = "tablet.password";
pub const TABLE_KEY: &str = "tablet.table";
pub const KEY_PACKAGE_KEY: &str = "store.key.package";
pub const AUTHORIZATIONS_KEY: &str = "tablet.authorizations";

///
/// ConfigError
/// Fatal at initialisation.
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("missing store property {key}")]
    MissingProperty { key: &'static str },

    #[error("unknown key package: {id}")]
    UnknownKeyPackage { id: String },
}

///
/// StoreConfig
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoreConfig {
    pub instance: String,
    pub endpoints: Vec<String>,
    pub credentials: Credentials,
    pub authorizations: Authorizations,
    pub table: String,
    pub key_package: String,
}

impl StoreConfig {
    /// Parse the recognised keys. `store.key.package` defaults to the
    /// byte-entity layout; everything else is required except
    /// authorizations, which default to none.
    pub fn from_properties(properties: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            properties
                .get(key)
                .cloned()
                .ok_or(ConfigError::MissingProperty { key })
        };

        Ok(Self {
            instance: required(INSTANCE_KEY)?,
            endpoints: required(ENDPOINTS_KEY)?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            credentials: Credentials {
                user: required(USER_KEY)?,
                password: required(PASSWORD_KEY)?,
            },
            authorizations: Authorizations::new(
                properties
                    .get(AUTHORIZATIONS_KEY)
                    .map(|s| {
                        s.split(',')
                            .map(|l| l.trim().to_string())
                            .filter(|l| !l.is_empty())
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default(),
            ),
            table: required(TABLE_KEY)?,
            key_package: properties
                .get(KEY_PACKAGE_KEY)
                .cloned()
                .unwrap_or_else(|| crate::codec::layout::RowLayout::BYTE_ENTITY_ID.to_string()),
        })
    }
}

///
/// TESTS
///

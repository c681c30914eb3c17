use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{MappingError, PermissionsMapping, PermissionsMappingBuilder};

const NONE_KEYWORD: &str = "none";

/// A requirement as written in the config file: either a list of values, of
/// which any one must be held, or the keyword `"none"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RequirementSpec {
    AnyOf(Vec<String>),
    Keyword(String),
}

impl RequirementSpec {
    fn check_keyword(&self) -> Result<(), MappingError> {
        match self {
            RequirementSpec::Keyword(keyword) if keyword != NONE_KEYWORD => {
                Err(MappingError::UnknownRequirement(keyword.clone()))
            }
            _ => Ok(()),
        }
    }
}

/// Permissions mapping configuration.
///
/// ```toml
/// default = ["read"]
///
/// [methods]
/// POST = ["create", "read"]
/// OPTIONS = "none"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct MappingConfig {
    /// Requirement for every method without an entry in `methods`. Required.
    pub default: Option<RequirementSpec>,

    #[serde(default)]
    pub methods: BTreeMap<String, RequirementSpec>,
}

impl MappingConfig {
    pub fn build(&self) -> Result<PermissionsMapping, MappingError> {
        let default = self.default.as_ref().ok_or(MappingError::NullRequirement)?;
        default.check_keyword()?;

        let builder = PermissionsMapping::builder();
        let mut builder: PermissionsMappingBuilder = match default {
            RequirementSpec::AnyOf(values) => builder.default_require_any_of(values.clone()),
            RequirementSpec::Keyword(_) => builder.default_require_none(),
        };

        for (method, spec) in self.methods.iter() {
            spec.check_keyword()?;
            builder = match spec {
                RequirementSpec::AnyOf(values) => builder.require_any_of(method, values.clone()),
                RequirementSpec::Keyword(_) => builder.require_none(method),
            };
        }

        builder.build()
    }
}

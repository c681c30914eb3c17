mod config;
mod crud;

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

pub use config::{MappingConfig, RequirementSpec};
pub use crud::crud_mapping;

/// Returned for discriminators that require no permission at all.
static NO_VALUES: BTreeSet<String> = BTreeSet::new();

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("permission requirement values must be provided")]
    NullRequirement,
    #[error("permission requirement values must not be empty, use 'none' instead")]
    EmptyRequirement,
    #[error("permission requirement values must not contain an empty value")]
    NullMember,
    #[error("unknown permission requirement '{0}', expect a list of values or 'none'")]
    UnknownRequirement(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement {
    None,
    AnyOf(BTreeSet<String>),
}

impl Requirement {
    fn any_of(values: Vec<String>) -> Result<Self, MappingError> {
        if values.is_empty() {
            return Err(MappingError::EmptyRequirement);
        }
        if values.iter().any(|value| value.trim().is_empty()) {
            return Err(MappingError::NullMember);
        }
        Ok(Requirement::AnyOf(values.into_iter().collect()))
    }

    /// Adds the values of `other` to this requirement. `None` absorbs
    /// everything merged into it.
    fn merge(&mut self, other: Requirement) {
        match (self, other) {
            (Requirement::None, _) => {}
            (this, Requirement::None) => *this = Requirement::None,
            (Requirement::AnyOf(values), Requirement::AnyOf(more)) => values.extend(more),
        }
    }

    fn values(&self) -> &BTreeSet<String> {
        match self {
            Requirement::None => &NO_VALUES,
            Requirement::AnyOf(values) => values,
        }
    }
}

/// Maps a discriminator, usually the HTTP method, to the set of permission
/// values of which the caller must hold at least one.
///
/// A mapping always has a default requirement, used for every discriminator
/// without an explicit entry. An empty set means no permission is required.
///
/// ```
/// use permguard::mapping::PermissionsMapping;
///
/// let mapping = PermissionsMapping::builder()
///     .default_require_any_of(["read"])
///     .require_any_of("POST", ["readprotected", "create"])
///     .require_none("OPTIONS")
///     .build()
///     .unwrap();
///
/// assert!(mapping.apply("GET").contains("read"));
/// assert_eq!(mapping.apply("POST").len(), 2);
/// assert!(mapping.apply("OPTIONS").is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionsMapping {
    default: Requirement,
    overrides: HashMap<String, Requirement>,
}

impl PermissionsMapping {
    pub fn builder() -> DefaultBuilder {
        DefaultBuilder { _private: () }
    }

    /// Returns the required values for `discriminator`, falling back to the
    /// default requirement when it has no entry of its own.
    pub fn apply(&self, discriminator: &str) -> &BTreeSet<String> {
        self.overrides
            .get(discriminator)
            .unwrap_or(&self.default)
            .values()
    }
}

type BuildStep = Box<dyn FnOnce(&mut PermissionsMapping) -> Result<(), MappingError> + Send>;

/// First phase of the builder: the default requirement must be given before
/// any discriminator specific entry.
pub struct DefaultBuilder {
    _private: (),
}

impl DefaultBuilder {
    pub fn default_require_any_of<I, S>(self, values: I) -> PermissionsMappingBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        PermissionsMappingBuilder::start(Box::new(move |mapping| {
            mapping.default = Requirement::any_of(values)?;
            Ok(())
        }))
    }

    pub fn default_require_none(self) -> PermissionsMappingBuilder {
        PermissionsMappingBuilder::start(Box::new(|mapping| {
            mapping.default = Requirement::None;
            Ok(())
        }))
    }
}

/// Second phase of the builder. Steps are recorded and only validated by
/// [`PermissionsMappingBuilder::build`]. Entries for the same discriminator
/// are merged, and a `none` entry wins over any values.
pub struct PermissionsMappingBuilder {
    steps: Vec<BuildStep>,
}

impl PermissionsMappingBuilder {
    fn start(default_step: BuildStep) -> Self {
        Self {
            steps: vec![default_step],
        }
    }

    pub fn require_any_of<I, S>(mut self, discriminator: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let discriminator = discriminator.into();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        self.steps.push(Box::new(move |mapping| {
            let requirement = Requirement::any_of(values)?;
            match mapping.overrides.get_mut(&discriminator) {
                Some(existing) => existing.merge(requirement),
                None => {
                    mapping.overrides.insert(discriminator, requirement);
                }
            }
            Ok(())
        }));
        self
    }

    pub fn require_none(mut self, discriminator: impl Into<String>) -> Self {
        let discriminator = discriminator.into();
        self.steps.push(Box::new(move |mapping| {
            mapping.overrides.insert(discriminator, Requirement::None);
            Ok(())
        }));
        self
    }

    pub fn build(self) -> Result<PermissionsMapping, MappingError> {
        let mut mapping = PermissionsMapping {
            default: Requirement::None,
            overrides: HashMap::new(),
        };
        for step in self.steps {
            step(&mut mapping)?;
        }
        Ok(mapping)
    }
}

use super::{PermissionIndex, PermissionKey, Permissions};

/// Permissions used while token permission auth is switched off: every key is
/// granted except the company number, which is still read from the header.
#[derive(Debug, Clone)]
pub struct CompanyNumberOnly {
    index: PermissionIndex,
}

impl CompanyNumberOnly {
    pub fn new(index: PermissionIndex) -> Self {
        Self { index }
    }
}

impl Permissions for CompanyNumberOnly {
    fn has_permission(&self, key: PermissionKey, value: &str) -> bool {
        if key == PermissionKey::CompanyNumber {
            return self.index.has_permission(key, value);
        }
        true
    }
}

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::permission::value;

use super::PermissionsMapping;

static CRUD_MAPPING: Lazy<Arc<PermissionsMapping>> = Lazy::new(|| {
    let mapping = PermissionsMapping::builder()
        .default_require_any_of([value::READ])
        .require_any_of("PUT", [value::UPDATE])
        .require_any_of("PATCH", [value::UPDATE])
        .require_any_of("POST", [value::CREATE])
        .require_any_of("DELETE", [value::DELETE])
        .build()
        .unwrap();
    Arc::new(mapping)
});

/// The mapping for resources with a plain CRUD permission model: `POST`
/// creates, `PUT` and `PATCH` update, `DELETE` deletes and every other method
/// reads.
pub fn crud_mapping() -> Arc<PermissionsMapping> {
    CRUD_MAPPING.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crud_mapping() {
        let mapping = crud_mapping();

        let expect = [
            ("GET", value::READ),
            ("HEAD", value::READ),
            ("OPTIONS", value::READ),
            ("TRACE", value::READ),
            ("CONNECT", value::READ),
            ("POST", value::CREATE),
            ("PUT", value::UPDATE),
            ("PATCH", value::UPDATE),
            ("DELETE", value::DELETE),
        ];
        for (method, value) in expect {
            let required = mapping.apply(method);
            assert_eq!(required.len(), 1, "method {method}");
            assert!(required.contains(value), "method {method}");
        }
    }
}

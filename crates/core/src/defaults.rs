//! Cascaded defaults.
//!
//! Realm, tenant, and org nodes each carry a free-form defaults map. The
//! effective defaults for a resolved context are the deep merge of the three,
//! later levels overriding earlier ones at the leaf level: nested objects
//! merge recursively, arrays and scalars overwrite wholesale.

use serde_json::Value;

use crate::config::DefaultsMap;

/// Deep-merges `overlay` into `base`.
///
/// Object values merge key by key, recursing into nested objects. Any
/// non-object overlay value (scalar, array, null) replaces the base value
/// wholesale.
pub fn deep_merge(base: &mut DefaultsMap, overlay: &DefaultsMap) {
    for (key, overlay_value) in overlay {
        match (base.get_mut(key), overlay_value) {
            (Some(Value::Object(base_obj)), Value::Object(overlay_obj)) => {
                deep_merge(base_obj, overlay_obj);
            }
            _ => {
                base.insert(key.clone(), overlay_value.clone());
            }
        }
    }
}

/// Computes the effective defaults for a realm/tenant/org cascade.
///
/// `tenant` and `org` are optional; absent levels contribute nothing.
pub fn effective_defaults(
    realm: &DefaultsMap,
    tenant: Option<&DefaultsMap>,
    org: Option<&DefaultsMap>,
) -> DefaultsMap {
    let mut merged = realm.clone();
    if let Some(tenant) = tenant {
        deep_merge(&mut merged, tenant);
    }
    if let Some(org) = org {
        deep_merge(&mut merged, org);
    }
    merged
}

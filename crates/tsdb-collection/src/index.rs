//! Secondary-index signature computation. The in-memory reactive
//! collection registers an index spec; the wrapper computes a stable
//! signature and mirrors it into the adapter via the coordinator, so the
//! same spec always maps to the same physical index across restarts.

use tsdb_persist::IndexSpec;

/// Stable hash of an index spec, reusing `tsdb_keys::safe_identifier`'s
/// digest (the same seam `tsdb-persist` uses to turn a signature into a
/// physical SQL index name).
pub fn signature_of(spec: &IndexSpec) -> String {
    let canonical = spec.fields.join(",");
    tsdb_keys::safe_identifier(&canonical, 'x')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_same_spec_always_produces_the_same_signature() {
        let spec = IndexSpec { fields: vec!["status".to_string(), "score".to_string()] };
        assert_eq!(signature_of(&spec), signature_of(&spec));
    }

    #[test]
    fn different_field_lists_produce_different_signatures() {
        let a = IndexSpec { fields: vec!["status".to_string()] };
        let b = IndexSpec { fields: vec!["score".to_string()] };
        assert_ne!(signature_of(&a), signature_of(&b));
    }
}

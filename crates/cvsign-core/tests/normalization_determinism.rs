//! # Normalization Determinism Tests
//!
//! Descriptors that are structurally equal must normalize to byte-identical
//! output no matter in which order their fields were written, and excluded
//! parts must never leak into the normalized form.

use proptest::prelude::*;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use cvsign_core::{
    descriptor_exclude_rules, normalize, prepare_normalization, ComponentDescriptor,
    DynamicArrayExcludes, ExcludeRules, JSON_NORMALISATION_V1, JSON_NORMALISATION_V2,
};

fn descriptor_json() -> Value {
    json!({
        "meta": {"schemaVersion": "v2"},
        "component": {
            "name": "acme.org/a",
            "version": "v1",
            "provider": {"name": "acme"},
            "labels": [{"name": "owner", "value": "team-a", "signing": true}],
            "resources": [{
                "name": "data",
                "version": "v1",
                "type": "blob",
                "relation": "local",
                "access": {"type": "localBlob", "localReference": "sha256:1"},
                "digest": {
                    "hashAlgorithm": "SHA-256",
                    "normalisationAlgorithm": "genericBlobDigest/v1",
                    "value": "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
                }
            }],
            "sources": [],
            "componentReferences": []
        }
    })
}

/// Render a JSON value as text with object fields written in reverse order.
fn reversed_text(value: &Value) -> String {
    match value {
        Value::Object(m) => {
            let fields: Vec<String> = m
                .iter()
                .rev()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), reversed_text(v)))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(a) => {
            let items: Vec<String> = a.iter().map(reversed_text).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}

#[test]
fn field_order_does_not_change_descriptor_digest_input() {
    let forward = descriptor_json();
    let a: ComponentDescriptor = serde_json::from_value(forward.clone()).unwrap();
    let b: ComponentDescriptor = serde_json::from_str(&reversed_text(&forward)).unwrap();
    for algo in [JSON_NORMALISATION_V1, JSON_NORMALISATION_V2] {
        assert_eq!(a.normalize(algo).unwrap(), b.normalize(algo).unwrap());
    }
}

#[test]
fn descriptor_digest_is_stable() {
    let cd: ComponentDescriptor = serde_json::from_value(descriptor_json()).unwrap();
    let bytes = cd.normalize(JSON_NORMALISATION_V1).unwrap();
    let first = hex::encode(Sha256::digest(bytes.as_bytes()));
    let again = hex::encode(Sha256::digest(cd.normalize(JSON_NORMALISATION_V1).unwrap().as_bytes()));
    assert_eq!(first, again);
    assert_eq!(first.len(), 64);
}

#[test]
fn v1_descriptor_encoding_is_entry_list() {
    let cd = ComponentDescriptor::new("acme.org/x", "v1");
    let bytes = cd.normalize(JSON_NORMALISATION_V1).unwrap();
    assert_eq!(
        std::str::from_utf8(bytes.as_bytes()).unwrap(),
        concat!(
            r#"[{"component":[{"componentReferences":[]},{"name":"acme.org/x"},"#,
            r#"{"provider":[{"name":""}]},{"resources":[]},{"sources":[]},{"version":"v1"}]},"#,
            r#"{"meta":[{"schemaVersion":"v2"}]}]"#
        )
    );
}

#[test]
fn none_access_resources_are_absent() {
    let mut doc = descriptor_json();
    doc["component"]["resources"]
        .as_array_mut()
        .unwrap()
        .push(json!({"name": "ext", "version": "v1", "type": "blob", "access": {"type": "none"}}));
    let n = prepare_normalization(&doc, &descriptor_exclude_rules()).unwrap();
    let text = n.to_text();
    assert!(text.contains("name: data"));
    assert!(!text.contains("name: ext"));
    assert!(!text.contains("localReference"));
}

#[test]
fn array_order_is_signed() {
    let a = json!({"list": [1, 2]});
    let b = json!({"list": [2, 1]});
    let rules = ExcludeRules::NoExcludes;
    assert_ne!(
        normalize(&a, &rules, JSON_NORMALISATION_V1).unwrap(),
        normalize(&b, &rules, JSON_NORMALISATION_V1).unwrap()
    );
}

fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        (-1.0e6f64..1.0e6).prop_map(|f| json!(f)),
        "[a-zA-Z0-9_ ]{0,20}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,8}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>())),
        ]
    })
}

proptest! {
    /// Parsing the same document with reversed field order yields identical bytes.
    #[test]
    fn normalization_ignores_field_order(value in json_value()) {
        let reparsed: Value = serde_json::from_str(&reversed_text(&value)).unwrap();
        for algo in [JSON_NORMALISATION_V1, JSON_NORMALISATION_V2] {
            let a = normalize(&value, &ExcludeRules::NoExcludes, algo).unwrap();
            let b = normalize(&reparsed, &ExcludeRules::NoExcludes, algo).unwrap();
            prop_assert_eq!(a, b);
        }
    }

    /// An excluded field never appears, whatever it contains.
    #[test]
    fn excluded_signatures_never_appear(
        signatures in json_value(),
        body in json_value(),
    ) {
        let doc = json!({"signatures": signatures, "body": body});
        let rules = ExcludeRules::map_excludes([("signatures", None)]);
        let n = prepare_normalization(&doc, &rules).unwrap();
        prop_assert!(n.to_value().get("signatures").is_none());
    }

    /// Elements rejected by a dynamic array rule are entirely absent.
    #[test]
    fn none_access_elements_are_filtered(kinds in prop::collection::vec(prop::bool::ANY, 0..10)) {
        let items: Vec<Value> = kinds
            .iter()
            .enumerate()
            .map(|(i, none)| {
                let t = if *none { "none" } else { "localBlob" };
                json!({"name": format!("r{i}"), "access": {"type": t}})
            })
            .collect();
        let rules = ExcludeRules::map_includes([(
            "resources",
            Some(ExcludeRules::DynamicArrayExcludes(DynamicArrayExcludes::new(
                cvsign_core::rules::ignore_resources_with_none_access,
            ))),
        )]);
        let n = prepare_normalization(&json!({"resources": items}), &rules).unwrap();
        let kept = n.to_value()["resources"].as_array().map(Vec::len).unwrap_or(0);
        prop_assert_eq!(kept, kinds.iter().filter(|none| !**none).count());
    }
}

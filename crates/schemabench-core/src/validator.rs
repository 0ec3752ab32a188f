//! JSON Schema Draft 2020-12 validation with asserted `ipv4`, `ipv6` and
//! `uuid` formats.
//!
//! Both entry points are total: schema errors, compilation failures and
//! panics raised inside the validation library all come back as `false`.

use jsonschema::{Draft, Validator};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};
use uuid::Uuid;

/// A pluggable schema validation capability.
pub trait SchemaValidator: Send + Sync {
    /// Whether `schema` is itself a well-formed schema.
    fn is_schema_valid(&self, schema: &Value) -> bool;

    /// Whether `instance` conforms to `schema`. False for malformed schemas.
    fn validate_instance(&self, instance: &Value, schema: &Value) -> bool;
}

/// The default validator backed by the `jsonschema` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct Draft202012;

impl SchemaValidator for Draft202012 {
    fn is_schema_valid(&self, schema: &Value) -> bool {
        is_schema_valid(schema)
    }

    fn validate_instance(&self, instance: &Value, schema: &Value) -> bool {
        validate_instance(instance, schema)
    }
}

/// Meta-validate `schema` against the Draft 2020-12 meta-schema.
pub fn is_schema_valid(schema: &Value) -> bool {
    panic::catch_unwind(AssertUnwindSafe(|| {
        jsonschema::draft202012::meta::is_valid(schema)
    }))
    .unwrap_or_else(|_| {
        warn!("meta-schema validation panicked");
        false
    })
}

/// Validate `instance` against `schema` with format assertions enabled.
pub fn validate_instance(instance: &Value, schema: &Value) -> bool {
    if !is_schema_valid(schema) {
        return false;
    }
    // A reference loop that never descends into the instance recurses until
    // the stack overflows, which no panic handler can catch.
    if has_unguarded_cycle(schema) {
        debug!("schema references itself without consuming the instance");
        return false;
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        build_validator(schema).map(|validator| validator.is_valid(instance))
    }));

    match outcome {
        Ok(Some(valid)) => valid,
        Ok(None) => false,
        Err(_) => {
            warn!("schema validation panicked");
            false
        }
    }
}

fn build_validator(schema: &Value) -> Option<Validator> {
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .should_validate_formats(true)
        .with_format("ipv4", is_ipv4)
        .with_format("ipv6", is_ipv6)
        .with_format("uuid", is_uuid)
        .build(schema)
        .map_err(|err| debug!(error = %err, "schema failed to compile"))
        .ok()
}

fn is_ipv4(value: &str) -> bool {
    value.parse::<Ipv4Addr>().is_ok()
}

// A `%zone` suffix is allowed when the zone is non-empty.
fn is_ipv6(value: &str) -> bool {
    let address = match value.split_once('%') {
        Some((address, zone)) if !zone.is_empty() && !zone.contains('%') => address,
        Some(_) => return false,
        None => value,
    };
    address.parse::<Ipv6Addr>().is_ok()
}

// Any RFC 4122 version or variant, in hyphenated, simple, braced or URN form.
fn is_uuid(value: &str) -> bool {
    Uuid::parse_str(value).is_ok()
}

// ============================================================================
// REFERENCE CYCLES
// ============================================================================

#[derive(Clone, Copy)]
enum Visit {
    Active,
    Done,
}

/// Whether some reachable subschema leads back to itself through `$ref` and
/// the other applicators that evaluate the same instance (`allOf`, `not`,
/// `if`, ...). Only local references (`#`, `#/pointer`, `#anchor`) are
/// followed; anything else fails to compile later on.
fn has_unguarded_cycle(root: &Value) -> bool {
    let mut anchors = HashMap::new();
    collect_anchors(root, String::new(), &mut anchors);

    let mut reachable: HashSet<String> = HashSet::from([String::new()]);
    let mut queue = vec![String::new()];
    let mut same_instance: HashMap<String, Vec<String>> = HashMap::new();
    while let Some(node) = queue.pop() {
        let mut in_place = Vec::new();
        for (child, consumes) in applicators(root, &node, &anchors) {
            if !consumes {
                in_place.push(child.clone());
            }
            if reachable.insert(child.clone()) {
                queue.push(child);
            }
        }
        same_instance.insert(node, in_place);
    }

    let mut visits: HashMap<&str, Visit> = HashMap::new();
    for start in same_instance.keys() {
        if visits.contains_key(start.as_str()) {
            continue;
        }
        visits.insert(start.as_str(), Visit::Active);
        let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];
        while let Some(&(node, next)) = stack.last() {
            let children = same_instance.get(node).map_or(&[][..], Vec::as_slice);
            let Some(child) = children.get(next) else {
                visits.insert(node, Visit::Done);
                stack.pop();
                continue;
            };
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }
            match visits.get(child.as_str()) {
                Some(Visit::Active) => return true,
                Some(Visit::Done) => {}
                None => {
                    visits.insert(child.as_str(), Visit::Active);
                    stack.push((child.as_str(), 0));
                }
            }
        }
    }
    false
}

/// Subschemas applied by the schema at `pointer`, each flagged with whether
/// it applies to a part of the instance rather than the instance itself.
fn applicators(
    root: &Value,
    pointer: &str,
    anchors: &HashMap<String, String>,
) -> Vec<(String, bool)> {
    let Some(Value::Object(map)) = root.pointer(pointer) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for (key, child) in map {
        let at = format!("{pointer}/{}", escape_token(key));
        let consumes = match key.as_str() {
            "$ref" | "$dynamicRef" => {
                if let Some(target) = child.as_str().and_then(|r| resolve_local(root, r, anchors)) {
                    out.push((target, false));
                }
                continue;
            }
            "allOf" | "anyOf" | "oneOf" | "not" | "if" | "then" | "else" | "dependentSchemas" => {
                false
            }
            "properties" | "patternProperties" | "prefixItems" | "items" | "additionalItems"
            | "additionalProperties" | "contains" | "propertyNames" | "unevaluatedItems"
            | "unevaluatedProperties" => true,
            _ => continue,
        };
        let keyword_map = matches!(
            key.as_str(),
            "properties" | "patternProperties" | "dependentSchemas"
        );
        match child {
            Value::Array(items) => {
                out.extend((0..items.len()).map(|i| (format!("{at}/{i}"), consumes)));
            }
            Value::Object(named) if keyword_map => {
                out.extend(
                    named
                        .keys()
                        .map(|name| (format!("{at}/{}", escape_token(name)), consumes)),
                );
            }
            _ => out.push((at, consumes)),
        }
    }
    out
}

fn resolve_local(
    root: &Value,
    reference: &str,
    anchors: &HashMap<String, String>,
) -> Option<String> {
    let fragment = reference.strip_prefix('#')?;
    if fragment.is_empty() {
        Some(String::new())
    } else if fragment.starts_with('/') {
        root.pointer(fragment).map(|_| fragment.to_string())
    } else {
        anchors.get(fragment).cloned()
    }
}

fn collect_anchors(value: &Value, pointer: String, anchors: &mut HashMap<String, String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(name)) = map.get("$anchor") {
                anchors.entry(name.clone()).or_insert_with(|| pointer.clone());
            }
            for (key, child) in map {
                if !matches!(key.as_str(), "const" | "enum" | "default" | "examples") {
                    collect_anchors(child, format!("{pointer}/{}", escape_token(key)), anchors);
                }
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                collect_anchors(child, format!("{pointer}/{i}"), anchors);
            }
        }
        _ => {}
    }
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

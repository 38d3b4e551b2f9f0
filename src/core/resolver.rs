//! SN-003: Reference extraction and creation-order DAG for a template.
//!
//! Edges come from `Ref`, `Fn::GetAtt`, `${...}` placeholders in `Fn::Sub`
//! and explicit `DependsOn`. Pseudo parameters (`AWS::*`) are ignored.
//! Every edge must land on a declared resource; the order is computed with
//! Kahn's algorithm and alphabetical tie-breaking so it is deterministic.

use super::template::Template;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::OnceLock;

fn sub_placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z0-9:]+)(?:\.[A-Za-z0-9.]+)?\}").expect("static placeholder regex")
    })
}

/// Logical IDs referenced anywhere inside `value`.
pub fn references_in(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    walk(value, &mut out);
    out.sort();
    out.dedup();
    out
}

fn walk(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(target)) = map.get("Ref") {
                    push_target(target, out);
                    return;
                }
                if let Some(att) = map.get("Fn::GetAtt") {
                    match att {
                        Value::Array(parts) => {
                            if let Some(Value::String(target)) = parts.first() {
                                push_target(target, out);
                            }
                        }
                        Value::String(dotted) => {
                            if let Some(target) = dotted.split('.').next() {
                                push_target(target, out);
                            }
                        }
                        _ => {}
                    }
                    return;
                }
                if let Some(sub) = map.get("Fn::Sub") {
                    walk_sub(sub, out);
                    return;
                }
            }
            for v in map.values() {
                walk(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                walk(v, out);
            }
        }
        _ => {}
    }
}

fn walk_sub(sub: &Value, out: &mut Vec<String>) {
    let (text, locals) = match sub {
        Value::String(s) => (s.as_str(), None),
        Value::Array(parts) => match (parts.first(), parts.get(1)) {
            (Some(Value::String(s)), vars) => (s.as_str(), vars.and_then(Value::as_object)),
            _ => return,
        },
        _ => return,
    };
    for caps in sub_placeholder().captures_iter(text) {
        let name = &caps[1];
        if locals.is_some_and(|vars| vars.contains_key(name)) {
            continue;
        }
        push_target(name, out);
    }
    if let Some(vars) = locals {
        for v in vars.values() {
            walk(v, out);
        }
    }
}

fn push_target(target: &str, out: &mut Vec<String>) {
    if !target.starts_with("AWS::") {
        out.push(target.to_string());
    }
}

/// Dependency edges of every resource: (resource, depends-on).
pub fn collect_edges(template: &Template) -> Vec<(String, String)> {
    let mut edges = Vec::new();
    for (id, resource) in &template.resources {
        let mut targets = references_in(&Value::Object(resource.properties.clone()));
        targets.extend(resource.depends_on.iter().cloned());
        targets.sort();
        targets.dedup();
        for t in targets {
            edges.push((id.clone(), t));
        }
    }
    edges
}

/// Check that every reference (including those in outputs) resolves.
pub fn validate_references(template: &Template) -> Vec<String> {
    let mut errors = Vec::new();
    for (from, to) in collect_edges(template) {
        if from == to {
            errors.push(format!("resource '{}' references itself", from));
        } else if !template.resources.contains_key(&to) {
            errors.push(format!(
                "resource '{}' references unknown resource '{}'",
                from, to
            ));
        }
    }
    for (name, output) in &template.outputs {
        for to in references_in(&output.value) {
            if !template.resources.contains_key(&to) {
                errors.push(format!("output '{}' references unknown resource '{}'", name, to));
            }
        }
    }
    errors
}

/// Creation order implied by the reference graph.
pub fn build_creation_order(template: &Template) -> Result<Vec<String>, String> {
    let resource_ids: Vec<String> = template.resources.keys().cloned().collect();
    let mut in_degree: FxHashMap<String, usize> = FxHashMap::default();
    let mut adjacency: FxHashMap<String, Vec<String>> = FxHashMap::default();

    for id in &resource_ids {
        in_degree.insert(id.clone(), 0);
        adjacency.insert(id.clone(), Vec::new());
    }

    for (id, dep) in collect_edges(template) {
        if !template.resources.contains_key(&dep) {
            return Err(format!("resource '{}' depends on unknown '{}'", id, dep));
        }
        if let Some(dependents) = adjacency.get_mut(&dep) {
            dependents.push(id.clone());
        }
        if let Some(degree) = in_degree.get_mut(&id) {
            *degree += 1;
        }
    }

    let mut queue: VecDeque<String> = VecDeque::new();
    let mut zero_degree: Vec<String> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(id, _)| id.clone())
        .collect();
    zero_degree.sort();
    queue.extend(zero_degree);

    let mut order = Vec::new();
    while let Some(current) = queue.pop_front() {
        order.push(current.clone());

        let mut next_ready: Vec<String> = Vec::new();
        if let Some(neighbors) = adjacency.get(&current) {
            for neighbor in neighbors {
                if let Some(degree) = in_degree.get_mut(neighbor) {
                    *degree -= 1;
                    if *degree == 0 {
                        next_ready.push(neighbor.clone());
                    }
                }
            }
        }
        next_ready.sort();
        queue.extend(next_ready);
    }

    if order.len() != resource_ids.len() {
        let ordered: FxHashSet<&String> = order.iter().collect();
        let mut cycle_members: Vec<&str> = resource_ids
            .iter()
            .filter(|id| !ordered.contains(id))
            .map(String::as_str)
            .collect();
        cycle_members.sort_unstable();
        return Err(format!(
            "dependency cycle detected involving: {}",
            cycle_members.join(", ")
        ));
    }

    Ok(order)
}

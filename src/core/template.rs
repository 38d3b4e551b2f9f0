//! SN-004: CloudFormation template model and intrinsic functions.
//!
//! A [`Template`] is an insertion-ordered map of logical IDs to resource
//! declarations. Constructs add resources through [`Template::add`], which
//! refuses duplicate IDs, and reference each other through the intrinsic
//! helpers ([`ref_to`], [`get_att`], [`join`], [`sub`]).

use crate::core::types::RemovalPolicy;
use crate::provenance::hasher;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const FORMAT_VERSION: &str = "2010-09-09";

/// A synthesized CloudFormation template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,

    #[serde(
        rename = "Description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,

    #[serde(rename = "Resources")]
    pub resources: IndexMap<String, CfnResource>,

    #[serde(rename = "Outputs", default, skip_serializing_if = "IndexMap::is_empty")]
    pub outputs: IndexMap<String, Output>,
}

/// One resource declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CfnResource {
    #[serde(rename = "Type")]
    pub resource_type: String,

    #[serde(rename = "Properties", default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,

    #[serde(rename = "DependsOn", default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(
        rename = "DeletionPolicy",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub deletion_policy: Option<String>,

    #[serde(
        rename = "UpdateReplacePolicy",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub update_replace_policy: Option<String>,
}

impl CfnResource {
    /// New resource. Non-object `properties` are treated as empty.
    pub fn new(resource_type: &str, properties: Value) -> Self {
        let properties = match properties {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            resource_type: resource_type.to_string(),
            properties,
            depends_on: Vec::new(),
            deletion_policy: None,
            update_replace_policy: None,
        }
    }

    /// Apply a removal policy to both DeletionPolicy and UpdateReplacePolicy.
    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        let value = policy.as_deletion_policy().to_string();
        self.deletion_policy = Some(value.clone());
        self.update_replace_policy = Some(value);
        self
    }

    pub fn with_dependency(mut self, logical_id: &str) -> Self {
        if !self.depends_on.iter().any(|d| d == logical_id) {
            self.depends_on.push(logical_id.to_string());
        }
        self
    }

    /// Set a property, replacing any previous value.
    pub fn set(&mut self, key: &str, value: Value) {
        self.properties.insert(key.to_string(), value);
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// A stack output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    #[serde(
        rename = "Description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,

    #[serde(rename = "Value")]
    pub value: Value,
}

impl Template {
    pub fn new(description: Option<String>) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            description,
            resources: IndexMap::new(),
            outputs: IndexMap::new(),
        }
    }

    /// Add a resource under `logical_id`. Returns the ID for chaining into
    /// references.
    pub fn add(&mut self, logical_id: String, resource: CfnResource) -> Result<String, String> {
        if self.resources.contains_key(&logical_id) {
            return Err(format!(
                "duplicate logical ID '{}' ({})",
                logical_id, resource.resource_type
            ));
        }
        self.resources.insert(logical_id.clone(), resource);
        Ok(logical_id)
    }

    pub fn add_output(
        &mut self,
        name: &str,
        value: Value,
        description: Option<&str>,
    ) -> Result<(), String> {
        if self.outputs.contains_key(name) {
            return Err(format!("duplicate output '{}'", name));
        }
        self.outputs.insert(
            name.to_string(),
            Output {
                description: description.map(str::to_string),
                value,
            },
        );
        Ok(())
    }

    pub fn resource(&self, logical_id: &str) -> Option<&CfnResource> {
        self.resources.get(logical_id)
    }

    /// Resources of one CloudFormation type, in declaration order.
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a CfnResource)> + 'a {
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == resource_type)
    }

    /// Pretty JSON, as written to the cloud assembly.
    pub fn to_json_pretty(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("template serialize error: {}", e))
    }

    /// BLAKE3 of the pretty JSON rendering.
    pub fn content_hash(&self) -> Result<String, String> {
        Ok(hasher::hash_string(&self.to_json_pretty()?))
    }
}

/// Deterministic logical ID for a construct path: the alphanumeric
/// characters of every component followed by 8 hex characters of the
/// path's BLAKE3 hash.
pub fn logical_id(path: &[&str]) -> String {
    let human: String = path
        .iter()
        .flat_map(|component| component.chars())
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    format!("{}{}", human, hasher::short_hex(&path.join("/"), 8))
}

/// `{ "Ref": id }`
pub fn ref_to(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{ "Fn::GetAtt": [id, attribute] }`
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{ "Fn::Join": [delimiter, parts] }`
pub fn join(delimiter: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [delimiter, parts] })
}

/// `{ "Fn::Sub": template }`
pub fn sub(template: &str) -> Value {
    json!({ "Fn::Sub": template })
}

//! SN-010: VPC lookup against a cached context file.
//!
//! Synthesis never talks to AWS. VPC lookups read `snackstack.context.json`,
//! which stores lookup results under CDK's `vpc-provider:` key convention,
//! so the same file can be shared with other tooling.

use crate::core::env::EnvSettings;
use crate::core::types::{NetworkConfig, SubnetType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Raw context file: lookup key → cached value.
pub type LookupContext = IndexMap<String, Value>;

/// Cached result of a VPC lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcContext {
    pub vpc_id: String,
    #[serde(default)]
    pub vpc_cidr_block: Option<String>,
    #[serde(default)]
    pub availability_zones: Vec<String>,
    #[serde(default)]
    pub subnet_groups: Vec<SubnetGroupContext>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetGroupContext {
    pub name: String,
    #[serde(rename = "type")]
    pub group_type: SubnetType,
    #[serde(default)]
    pub subnets: Vec<SubnetContext>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetContext {
    pub subnet_id: String,
    #[serde(default)]
    pub cidr: Option<String>,
    pub availability_zone: String,
    #[serde(default)]
    pub route_table_id: Option<String>,
}

/// A resolved, read-only network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRef {
    pub vpc_id: String,
    pub availability_zones: Vec<String>,
    subnet_groups: Vec<SubnetGroupContext>,
}

/// One selected subnet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetRef {
    pub subnet_id: String,
    pub availability_zone: String,
}

/// Subnet selection rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetSelection {
    pub subnet_type: SubnetType,
    pub one_per_az: bool,
    pub min_azs: usize,
}

impl SubnetSelection {
    pub fn from_config(config: &NetworkConfig) -> Self {
        Self {
            subnet_type: config.subnet_type,
            one_per_az: config.one_per_az,
            min_azs: config.min_azs,
        }
    }
}

impl NetworkRef {
    pub fn from_context(ctx: VpcContext) -> Self {
        Self {
            vpc_id: ctx.vpc_id,
            availability_zones: ctx.availability_zones,
            subnet_groups: ctx.subnet_groups,
        }
    }

    /// Select subnets of one tier. With `one_per_az`, the first subnet of
    /// each zone (in context order) wins.
    pub fn select_subnets(&self, selection: SubnetSelection) -> Result<Vec<SubnetRef>, String> {
        let mut selected: Vec<SubnetRef> = Vec::new();
        for group in self
            .subnet_groups
            .iter()
            .filter(|g| g.group_type == selection.subnet_type)
        {
            for subnet in &group.subnets {
                if selection.one_per_az
                    && selected
                        .iter()
                        .any(|s| s.availability_zone == subnet.availability_zone)
                {
                    continue;
                }
                selected.push(SubnetRef {
                    subnet_id: subnet.subnet_id.clone(),
                    availability_zone: subnet.availability_zone.clone(),
                });
            }
        }

        let mut zones: Vec<&str> = selected
            .iter()
            .map(|s| s.availability_zone.as_str())
            .collect();
        zones.sort_unstable();
        zones.dedup();
        if zones.len() < selection.min_azs {
            return Err(format!(
                "VPC {} has {} subnets in {} availability zone(s); at least {} required",
                self.vpc_id,
                selection.subnet_type,
                zones.len(),
                selection.min_azs
            ));
        }
        Ok(selected)
    }

    /// Subnet IDs of a selection, as template values.
    pub fn subnet_ids(&self, selection: SubnetSelection) -> Result<Vec<Value>, String> {
        Ok(self
            .select_subnets(selection)?
            .into_iter()
            .map(|s| Value::String(s.subnet_id))
            .collect())
    }
}

/// Context key for a VPC lookup, with filters in sorted order.
pub fn vpc_lookup_key(account: &str, region: &str, config: &NetworkConfig) -> String {
    let filter = match &config.vpc_id {
        Some(id) => format!("filter.vpc-id={}", id),
        None => "filter.isDefault=true".to_string(),
    };
    format!(
        "vpc-provider:account={}:{}:region={}:returnAsymmetricSubnets=true",
        account, filter, region
    )
}

/// Load a context file. A missing file is an empty context.
pub fn load_context(path: &Path) -> Result<LookupContext, String> {
    if !path.exists() {
        return Ok(LookupContext::new());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("invalid context file {}: {}", path.display(), e))
}

/// Resolve the configured VPC from the context.
pub fn lookup(
    ctx: &LookupContext,
    env: &EnvSettings,
    config: &NetworkConfig,
) -> Result<NetworkRef, String> {
    let account = env.account.as_deref().ok_or_else(|| {
        "cannot retrieve value from context provider vpc-provider since account/region \
         are not specified at the stack level; set CDK_DEFAULT_ACCOUNT"
            .to_string()
    })?;
    if !config.is_default && config.vpc_id.is_none() {
        return Err("network.is_default is false but no network.vpc_id is set".to_string());
    }
    let key = vpc_lookup_key(account, &env.region, config);
    let raw = ctx.get(&key).ok_or_else(|| {
        let what = match &config.vpc_id {
            Some(id) => format!("VPC {}", id),
            None => "default VPC".to_string(),
        };
        format!(
            "no {} found for account {} in {}; add a '{}' entry to the context file",
            what, account, env.region, key
        )
    })?;
    let vpc: VpcContext = serde_json::from_value(raw.clone())
        .map_err(|e| format!("invalid context value for {}: {}", key, e))?;
    Ok(NetworkRef::from_context(vpc))
}

/// A context entry shaped like a typical two-zone VPC, used by `init`.
pub fn example_vpc(availability_zones: &[&str]) -> VpcContext {
    let mut public = Vec::new();
    let mut private = Vec::new();
    for (i, az) in availability_zones.iter().enumerate() {
        public.push(SubnetContext {
            subnet_id: format!("subnet-0public{:02}", i),
            cidr: Some(format!("172.31.{}.0/20", i * 16)),
            availability_zone: az.to_string(),
            route_table_id: Some("rtb-0public".to_string()),
        });
        private.push(SubnetContext {
            subnet_id: format!("subnet-0private{:02}", i),
            cidr: Some(format!("172.31.{}.0/20", 128 + i * 16)),
            availability_zone: az.to_string(),
            route_table_id: Some(format!("rtb-0private{:02}", i)),
        });
    }
    VpcContext {
        vpc_id: "vpc-0example".to_string(),
        vpc_cidr_block: Some("172.31.0.0/16".to_string()),
        availability_zones: availability_zones.iter().map(|s| s.to_string()).collect(),
        subnet_groups: vec![
            SubnetGroupContext {
                name: "Public".to_string(),
                group_type: SubnetType::Public,
                subnets: public,
            },
            SubnetGroupContext {
                name: "Private".to_string(),
                group_type: SubnetType::Private,
                subnets: private,
            },
        ],
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    pub(crate) const ACCOUNT: &str = "123456789012";

    pub(crate) fn test_env() -> EnvSettings {
        let mut vars = HashMap::new();
        vars.insert("CDK_DEFAULT_ACCOUNT".to_string(), ACCOUNT.to_string());
        EnvSettings::from_map(&vars)
    }

    pub(crate) fn test_context() -> LookupContext {
        let mut ctx = LookupContext::new();
        let key = vpc_lookup_key(ACCOUNT, "us-east-2", &NetworkConfig::default());
        let vpc = example_vpc(&["us-east-2a", "us-east-2b"]);
        ctx.insert(key, serde_json::to_value(vpc).unwrap());
        ctx
    }

    fn private() -> SubnetSelection {
        SubnetSelection::from_config(&NetworkConfig::default())
    }

    #[test]
    fn test_sn010_lookup_key_format() {
        let key = vpc_lookup_key("111", "us-east-2", &NetworkConfig::default());
        assert_eq!(
            key,
            "vpc-provider:account=111:filter.isDefault=true:region=us-east-2:returnAsymmetricSubnets=true"
        );
        let by_id = NetworkConfig {
            is_default: false,
            vpc_id: Some("vpc-9".to_string()),
            ..NetworkConfig::default()
        };
        assert!(vpc_lookup_key("111", "us-east-2", &by_id).contains("filter.vpc-id=vpc-9"));
    }

    #[test]
    fn test_sn010_lookup_default() {
        let net = lookup(&test_context(), &test_env(), &NetworkConfig::default()).unwrap();
        assert_eq!(net.vpc_id, "vpc-0example");
        assert_eq!(net.availability_zones.len(), 2);
    }

    #[test]
    fn test_sn010_lookup_without_account() {
        let err = lookup(
            &test_context(),
            &EnvSettings::default(),
            &NetworkConfig::default(),
        )
        .unwrap_err();
        assert!(err.contains("account/region are not specified"));
    }

    #[test]
    fn test_sn010_lookup_missing_entry() {
        let err = lookup(
            &LookupContext::new(),
            &test_env(),
            &NetworkConfig::default(),
        )
        .unwrap_err();
        assert!(err.contains("no default VPC found"));
        assert!(err.contains("vpc-provider:account=123456789012"));
    }

    #[test]
    fn test_sn010_select_private_one_per_az() {
        let net = lookup(&test_context(), &test_env(), &NetworkConfig::default()).unwrap();
        let subnets = net.select_subnets(private()).unwrap();
        assert_eq!(subnets.len(), 2);
        assert!(subnets.iter().all(|s| s.subnet_id.contains("private")));
        assert_ne!(subnets[0].availability_zone, subnets[1].availability_zone);
    }

    #[test]
    fn test_sn010_one_per_az_dedups_zone() {
        let mut vpc = example_vpc(&["az-a", "az-b"]);
        vpc.subnet_groups[1].subnets.push(SubnetContext {
            subnet_id: "subnet-extra".to_string(),
            cidr: None,
            availability_zone: "az-a".to_string(),
            route_table_id: None,
        });
        let net = NetworkRef::from_context(vpc);
        let one = net.select_subnets(private()).unwrap();
        assert_eq!(one.len(), 2);
        assert!(one.iter().all(|s| s.subnet_id != "subnet-extra"));

        let all = net
            .select_subnets(SubnetSelection {
                one_per_az: false,
                ..private()
            })
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_sn010_too_few_zones() {
        let net = NetworkRef::from_context(example_vpc(&["only-a"]));
        let err = net.select_subnets(private()).unwrap_err();
        assert!(err.contains("at least 2 required"));
    }

    #[test]
    fn test_sn010_no_private_subnets() {
        let mut vpc = example_vpc(&["az-a", "az-b"]);
        vpc.subnet_groups.retain(|g| g.group_type == SubnetType::Public);
        let net = NetworkRef::from_context(vpc);
        assert!(net.select_subnets(private()).is_err());
        let public = SubnetSelection {
            subnet_type: SubnetType::Public,
            ..private()
        };
        assert_eq!(net.select_subnets(public).unwrap().len(), 2);
    }

    #[test]
    fn test_sn010_context_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snackstack.context.json");
        assert!(load_context(&path).unwrap().is_empty());

        let json = serde_json::to_string_pretty(&test_context()).unwrap();
        assert!(json.contains("\"subnetGroups\""));
        assert!(json.contains("\"type\": \"private\""));
        std::fs::write(&path, json).unwrap();
        let ctx = load_context(&path).unwrap();
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_sn010_pascal_case_subnet_types_accepted() {
        let raw = serde_json::json!({
            "vpcId": "vpc-1",
            "availabilityZones": ["a", "b"],
            "subnetGroups": [
                { "name": "Private", "type": "Private", "subnets": [
                    { "subnetId": "s-1", "availabilityZone": "a" },
                    { "subnetId": "s-2", "availabilityZone": "b" }
                ]}
            ]
        });
        let vpc: VpcContext = serde_json::from_value(raw).unwrap();
        assert_eq!(vpc.subnet_groups[0].group_type, SubnetType::Private);
    }

    #[test]
    fn test_sn010_invalid_context_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctx.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_context(&path).unwrap_err().contains("invalid context file"));
    }
}

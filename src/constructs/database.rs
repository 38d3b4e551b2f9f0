//! SN-011: PostgreSQL database tier.
//!
//! Both variants share the same scaffolding (subnet group, security group,
//! generated credentials secret, secret attachment) and differ only in the
//! RDS resource itself. The variant is fixed by [`DatabaseConfig`]; there is
//! no way to ask for the endpoint of an unrecognised kind.

use super::network::{NetworkRef, SubnetSelection};
use crate::core::template::{get_att, join, logical_id, ref_to, CfnResource, Template};
use crate::core::types::{
    DatabaseConfig, DatabaseKind, InstanceDatabase, RemovalPolicy, ServerlessDatabase,
};
use serde_json::{json, Value};

const CONSTRUCT: &str = "DatabaseCluster";

/// Punctuation kept out of generated passwords (RDS rejects some of it and
/// the rest breaks connection URLs).
pub const PASSWORD_EXCLUDE_CHARACTERS: &str = " %+~`#$&*()|[]{}:;<>?!'/@\"\\";
pub const PASSWORD_LENGTH: u32 = 30;

/// Connection endpoint as template tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub address: Value,
    pub port: Value,
}

/// Handle to the generated credentials secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRef {
    /// Logical ID of the secret attachment; its `Ref` is the secret ARN.
    pub logical_id: String,
}

impl SecretRef {
    pub fn arn(&self) -> Value {
        ref_to(&self.logical_id)
    }

    /// ECS secret reference to one JSON key of the secret.
    pub fn field(&self, key: &str) -> Value {
        join("", vec![self.arn(), Value::String(format!(":{}::", key))])
    }
}

/// What the rest of the stack needs to know about the database.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseHandle {
    pub kind: DatabaseKind,
    /// Logical ID of the DBCluster or DBInstance
    pub logical_id: String,
    pub security_group: String,
    pub secret: SecretRef,
    endpoint: Endpoint,
}

impl DatabaseHandle {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn resource_type(&self) -> &'static str {
        resource_type(self.kind)
    }
}

pub fn resource_type(kind: DatabaseKind) -> &'static str {
    match kind {
        DatabaseKind::Serverless => "AWS::RDS::DBCluster",
        DatabaseKind::Instance => "AWS::RDS::DBInstance",
    }
}

/// Declare the database and its scaffolding.
pub fn declare(
    template: &mut Template,
    name: &str,
    identifier: &str,
    config: &DatabaseConfig,
    network: &NetworkRef,
    selection: SubnetSelection,
) -> Result<DatabaseHandle, String> {
    let kind = config.kind();
    let subnet_ids = network.subnet_ids(selection)?;

    let subnet_group = template.add(
        logical_id(&[CONSTRUCT, "SubnetGroup"]),
        CfnResource::new(
            "AWS::RDS::DBSubnetGroup",
            json!({
                "DBSubnetGroupDescription": format!("Subnet Group for {}", name),
                "SubnetIds": subnet_ids,
            }),
        ),
    )?;

    let security_group = template.add(
        logical_id(&[CONSTRUCT, "SecurityGroup"]),
        CfnResource::new(
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupDescription": format!("{}/{}/SecurityGroup", name, CONSTRUCT),
                "SecurityGroupEgress": [{
                    "CidrIp": "0.0.0.0/0",
                    "Description": "Allow all outbound traffic by default",
                    "IpProtocol": "-1",
                }],
                "VpcId": network.vpc_id,
            }),
        ),
    )?;

    let secret = template.add(
        logical_id(&[CONSTRUCT, "Secret"]),
        CfnResource::new(
            "AWS::SecretsManager::Secret",
            json!({
                "Description": format!("Generated by snackstack for {}", name),
                "GenerateSecretString": {
                    "ExcludeCharacters": PASSWORD_EXCLUDE_CHARACTERS,
                    "GenerateStringKey": "password",
                    "PasswordLength": PASSWORD_LENGTH,
                    "SecretStringTemplate": json!({ "username": config.username() }).to_string(),
                },
            }),
        )
        .with_removal_policy(RemovalPolicy::Destroy),
    )?;

    let db_id = logical_id(&[CONSTRUCT, kind_component(kind)]);
    let base = CfnResource::new(resource_type(kind), json!({}));
    let mut db = match config {
        DatabaseConfig::Serverless(s) => serverless(base, s, identifier),
        DatabaseConfig::Instance(i) => instance(base, i, identifier),
    };
    db.set("DBSubnetGroupName", ref_to(&subnet_group));
    db.set("MasterUsername", resolve_secret(&secret, "username"));
    db.set("MasterUserPassword", resolve_secret(&secret, "password"));
    // DBInstance types Port as a string, DBCluster as an integer
    let (port, sg_key) = match kind {
        DatabaseKind::Serverless => (json!(config.port()), "VpcSecurityGroupIds"),
        DatabaseKind::Instance => (json!(config.port().to_string()), "VPCSecurityGroups"),
    };
    db.set("Port", port);
    db.set(sg_key, json!([get_att(&security_group, "GroupId")]));
    let db = db.with_removal_policy(config.removal_policy());
    let db_id = template.add(db_id, db)?;

    let attachment = template.add(
        logical_id(&[CONSTRUCT, "SecretAttachment"]),
        CfnResource::new(
            "AWS::SecretsManager::SecretTargetAttachment",
            json!({
                "SecretId": ref_to(&secret),
                "TargetId": ref_to(&db_id),
                "TargetType": resource_type(kind),
            }),
        ),
    )?;

    Ok(DatabaseHandle {
        kind,
        endpoint: Endpoint {
            address: get_att(&db_id, "Endpoint.Address"),
            port: get_att(&db_id, "Endpoint.Port"),
        },
        logical_id: db_id,
        security_group,
        secret: SecretRef {
            logical_id: attachment,
        },
    })
}

/// Stack outputs for the database endpoint and its secret.
pub fn add_outputs(template: &mut Template, db: &DatabaseHandle) -> Result<(), String> {
    template.add_output(
        "DatabaseEndpointAddress",
        db.endpoint().address.clone(),
        Some("Database connection host"),
    )?;
    template.add_output(
        "DatabaseSecretArn",
        db.secret.arn(),
        Some("Secrets Manager secret holding the database credentials"),
    )
}

fn kind_component(kind: DatabaseKind) -> &'static str {
    match kind {
        DatabaseKind::Serverless => "Cluster",
        DatabaseKind::Instance => "Instance",
    }
}

fn resolve_secret(secret: &str, key: &str) -> Value {
    join(
        "",
        vec![
            json!("{{resolve:secretsmanager:"),
            ref_to(secret),
            Value::String(format!(":SecretString:{}::}}}}", key)),
        ],
    )
}

fn serverless(mut db: CfnResource, cfg: &ServerlessDatabase, identifier: &str) -> CfnResource {
    let mut scaling = json!({
        "MinCapacity": cfg.min_capacity,
        "MaxCapacity": cfg.max_capacity,
    });
    match cfg.auto_pause_minutes {
        Some(0) => scaling["AutoPause"] = json!(false),
        Some(minutes) => {
            scaling["AutoPause"] = json!(true);
            scaling["SecondsUntilAutoPause"] = json!(minutes.saturating_mul(60));
        }
        None => {}
    }
    db.set("Engine", json!("aurora-postgresql"));
    db.set("EngineMode", json!("serverless"));
    db.set("EngineVersion", json!(cfg.engine_version));
    db.set("DBClusterIdentifier", json!(identifier));
    db.set("BackupRetentionPeriod", json!(cfg.backup_retention_days));
    db.set("EnableHttpEndpoint", json!(cfg.enable_data_api));
    db.set("ScalingConfiguration", scaling);
    db.set("StorageEncrypted", json!(true));
    db.set("CopyTagsToSnapshot", json!(true));
    db
}

fn instance(mut db: CfnResource, cfg: &InstanceDatabase, identifier: &str) -> CfnResource {
    db.set("Engine", json!("postgres"));
    db.set("EngineVersion", json!(cfg.engine_version));
    db.set("DBInstanceClass", json!(cfg.instance_type()));
    db.set("DBInstanceIdentifier", json!(identifier));
    db.set("AllocatedStorage", json!(cfg.allocated_storage.to_string()));
    if let Some(max) = cfg.max_allocated_storage {
        db.set("MaxAllocatedStorage", json!(max));
    }
    if let Some(name) = &cfg.database_name {
        db.set("DBName", json!(name));
    }
    if let Some(days) = cfg.backup_retention_days {
        db.set("BackupRetentionPeriod", json!(days));
    }
    db.set("DeleteAutomatedBackups", json!(cfg.delete_automated_backups));
    db.set("StorageType", json!("gp2"));
    db.set("PubliclyAccessible", json!(false));
    db.set("CopyTagsToSnapshot", json!(true));
    db
}

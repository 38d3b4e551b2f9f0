//! SN-001: Configuration and provenance types.
//!
//! Defines the YAML schema for `snackstack.yaml` (one enumerated
//! configuration structure for every tier) plus the provenance events
//! written during synthesis. Every field has a default, so an empty file
//! describes the stock StartupSnack web service.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Top-level snackstack.yaml
// ============================================================================

/// Root configuration: the desired shape of the deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InfraConfig {
    /// Schema version (must be "1.0")
    #[serde(default = "default_version")]
    pub version: String,

    /// Base name; cluster, service, database and log names derive from it
    #[serde(default = "default_name")]
    pub name: String,

    /// Optional template description
    #[serde(default)]
    pub description: Option<String>,

    /// Network lookup
    #[serde(default)]
    pub network: NetworkConfig,

    /// Relational database (exactly one variant)
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Container cluster and load-balanced service
    #[serde(default)]
    pub service: ServiceConfig,

    /// Static-site deployable; `null` disables it
    #[serde(default = "default_site")]
    pub site: Option<SiteConfig>,

    /// Container asset publishing
    #[serde(default)]
    pub assets: AssetConfig,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            name: default_name(),
            description: None,
            network: NetworkConfig::default(),
            database: DatabaseConfig::default(),
            service: ServiceConfig::default(),
            site: default_site(),
            assets: AssetConfig::default(),
        }
    }
}

impl InfraConfig {
    /// ECS cluster name.
    pub fn cluster_name(&self) -> &str {
        self.service.cluster_name.as_deref().unwrap_or(&self.name)
    }

    /// ECS service name.
    pub fn service_name(&self) -> &str {
        self.service.service_name.as_deref().unwrap_or(&self.name)
    }

    /// Database cluster/instance identifier.
    pub fn database_identifier(&self) -> &str {
        self.database.identifier().unwrap_or(&self.name)
    }

    /// Log group name for the service's container logs.
    pub fn log_group_name(&self) -> Option<String> {
        self.service.log.as_ref().map(|log| {
            log.group_name
                .clone()
                .unwrap_or_else(|| format!("/aws/ecs/{}", self.name))
        })
    }

    /// awslogs stream prefix.
    pub fn log_stream_prefix(&self) -> Option<&str> {
        self.service
            .log
            .as_ref()
            .map(|log| log.stream_prefix.as_deref().unwrap_or(&self.name))
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_name() -> String {
    "StartupSnack-WebService".to_string()
}

fn default_site() -> Option<SiteConfig> {
    Some(SiteConfig::default())
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Network
// ============================================================================

/// How the VPC is found and which subnets are used for private placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NetworkConfig {
    /// Use the account's default VPC
    #[serde(default = "default_true")]
    pub is_default: bool,

    /// Look up a specific VPC instead of the default one
    #[serde(default)]
    pub vpc_id: Option<String>,

    /// Subnet tier used for the database and service tasks
    #[serde(default = "default_subnet_type")]
    pub subnet_type: SubnetType,

    /// Pick one subnet per availability zone
    #[serde(default = "default_true")]
    pub one_per_az: bool,

    /// Minimum availability zones the selection must cover
    #[serde(default = "default_min_azs")]
    pub min_azs: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            is_default: true,
            vpc_id: None,
            subnet_type: default_subnet_type(),
            one_per_az: true,
            min_azs: default_min_azs(),
        }
    }
}

fn default_subnet_type() -> SubnetType {
    SubnetType::Private
}

fn default_min_azs() -> usize {
    2
}

/// Subnet visibility tier. Context files spell these in PascalCase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubnetType {
    #[serde(alias = "Public")]
    Public,
    #[serde(alias = "Private")]
    Private,
    #[serde(alias = "Isolated")]
    Isolated,
}

impl fmt::Display for SubnetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "Public"),
            Self::Private => write!(f, "Private"),
            Self::Isolated => write!(f, "Isolated"),
        }
    }
}

// ============================================================================
// Database
// ============================================================================

/// The database variant. Exactly one is active; the choice is made here,
/// at configuration time, never by inspecting a declared resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatabaseConfig {
    /// Aurora Serverless (v1) PostgreSQL cluster
    Serverless(ServerlessDatabase),
    /// Single managed RDS for PostgreSQL instance
    Instance(InstanceDatabase),
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::Serverless(ServerlessDatabase::default())
    }
}

impl DatabaseConfig {
    pub fn kind(&self) -> DatabaseKind {
        match self {
            Self::Serverless(_) => DatabaseKind::Serverless,
            Self::Instance(_) => DatabaseKind::Instance,
        }
    }

    /// Explicit identifier, if one was configured.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::Serverless(s) => s.identifier.as_deref(),
            Self::Instance(i) => i.identifier.as_deref(),
        }
    }

    /// Listener port; PostgreSQL's 5432 unless overridden.
    pub fn port(&self) -> u16 {
        let port = match self {
            Self::Serverless(s) => s.port,
            Self::Instance(i) => i.port,
        };
        port.unwrap_or(POSTGRES_PORT)
    }

    pub fn username(&self) -> &str {
        match self {
            Self::Serverless(s) => &s.username,
            Self::Instance(i) => &i.username,
        }
    }

    pub fn removal_policy(&self) -> RemovalPolicy {
        match self {
            Self::Serverless(s) => s.removal_policy,
            Self::Instance(i) => i.removal_policy,
        }
    }

    /// Switch to another variant. The identifier carries over; every other
    /// field takes the new variant's defaults.
    pub fn with_kind(self, kind: DatabaseKind) -> Self {
        if self.kind() == kind {
            return self;
        }
        let identifier = self.identifier().map(str::to_string);
        match kind {
            DatabaseKind::Serverless => Self::Serverless(ServerlessDatabase {
                identifier,
                ..ServerlessDatabase::default()
            }),
            DatabaseKind::Instance => Self::Instance(InstanceDatabase {
                identifier,
                ..InstanceDatabase::default()
            }),
        }
    }
}

pub const POSTGRES_PORT: u16 = 5432;

/// Discriminant of [`DatabaseConfig`], used by CLI overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseKind {
    Serverless,
    Instance,
}

impl FromStr for DatabaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "serverless" => Ok(Self::Serverless),
            "instance" => Ok(Self::Instance),
            other => Err(format!(
                "unknown RDS type '{}' (expected 'serverless' or 'instance')",
                other
            )),
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serverless => write!(f, "serverless"),
            Self::Instance => write!(f, "instance"),
        }
    }
}

/// Aurora Serverless PostgreSQL cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ServerlessDatabase {
    /// DBClusterIdentifier (defaults to the stack name)
    #[serde(default)]
    pub identifier: Option<String>,

    /// aurora-postgresql engine version
    #[serde(default = "default_engine_version")]
    pub engine_version: String,

    /// Master username stored in the generated secret
    #[serde(default = "default_username")]
    pub username: String,

    /// Listener port override
    #[serde(default)]
    pub port: Option<u16>,

    /// Minimum Aurora capacity units
    #[serde(default = "default_acu")]
    pub min_capacity: u32,

    /// Maximum Aurora capacity units
    #[serde(default = "default_acu")]
    pub max_capacity: u32,

    /// Automated backup retention in days
    #[serde(default = "default_backup_retention")]
    pub backup_retention_days: u32,

    /// Enable the Data API (HTTP endpoint)
    #[serde(default = "default_true")]
    pub enable_data_api: bool,

    /// Minutes of inactivity before pausing; 0 disables auto-pause
    #[serde(default)]
    pub auto_pause_minutes: Option<u32>,

    #[serde(default = "default_db_removal")]
    pub removal_policy: RemovalPolicy,
}

impl Default for ServerlessDatabase {
    fn default() -> Self {
        Self {
            identifier: None,
            engine_version: default_engine_version(),
            username: default_username(),
            port: None,
            min_capacity: default_acu(),
            max_capacity: default_acu(),
            backup_retention_days: default_backup_retention(),
            enable_data_api: true,
            auto_pause_minutes: None,
            removal_policy: default_db_removal(),
        }
    }
}

/// Managed RDS for PostgreSQL instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InstanceDatabase {
    /// DBInstanceIdentifier (defaults to the stack name)
    #[serde(default)]
    pub identifier: Option<String>,

    /// postgres engine version
    #[serde(default = "default_engine_version")]
    pub engine_version: String,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default)]
    pub port: Option<u16>,

    /// Instance class, e.g. "t3"
    #[serde(default = "default_instance_class")]
    pub instance_class: String,

    /// Instance size, e.g. "small"
    #[serde(default = "default_instance_size")]
    pub instance_size: String,

    /// Allocated storage in GiB
    #[serde(default = "default_allocated_storage")]
    pub allocated_storage: u32,

    /// Storage autoscaling ceiling in GiB
    #[serde(default = "default_max_allocated_storage")]
    pub max_allocated_storage: Option<u32>,

    /// Initial database name
    #[serde(default = "default_database_name")]
    pub database_name: Option<String>,

    /// Remove automated backups when the instance is deleted
    #[serde(default = "default_true")]
    pub delete_automated_backups: bool,

    #[serde(default)]
    pub backup_retention_days: Option<u32>,

    #[serde(default = "default_db_removal")]
    pub removal_policy: RemovalPolicy,
}

impl Default for InstanceDatabase {
    fn default() -> Self {
        Self {
            identifier: None,
            engine_version: default_engine_version(),
            username: default_username(),
            port: None,
            instance_class: default_instance_class(),
            instance_size: default_instance_size(),
            allocated_storage: default_allocated_storage(),
            max_allocated_storage: default_max_allocated_storage(),
            database_name: default_database_name(),
            delete_automated_backups: true,
            backup_retention_days: None,
            removal_policy: default_db_removal(),
        }
    }
}

impl InstanceDatabase {
    /// RDS instance type, e.g. "db.t3.small".
    pub fn instance_type(&self) -> String {
        format!("db.{}.{}", self.instance_class, self.instance_size)
    }
}

fn default_engine_version() -> String {
    "10.12".to_string()
}

fn default_username() -> String {
    "postgres".to_string()
}

fn default_acu() -> u32 {
    2
}

fn default_backup_retention() -> u32 {
    1
}

fn default_db_removal() -> RemovalPolicy {
    RemovalPolicy::Snapshot
}

fn default_instance_class() -> String {
    "t3".to_string()
}

fn default_instance_size() -> String {
    "small".to_string()
}

fn default_allocated_storage() -> u32 {
    10
}

fn default_max_allocated_storage() -> Option<u32> {
    Some(20)
}

fn default_database_name() -> Option<String> {
    Some("app".to_string())
}

/// What happens to a resource when it leaves the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    Destroy,
    Retain,
    Snapshot,
}

impl RemovalPolicy {
    /// CloudFormation DeletionPolicy / UpdateReplacePolicy value.
    pub fn as_deletion_policy(self) -> &'static str {
        match self {
            Self::Destroy => "Delete",
            Self::Retain => "Retain",
            Self::Snapshot => "Snapshot",
        }
    }
}

// ============================================================================
// Service
// ============================================================================

/// ECS cluster plus one ALB-fronted Fargate service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ServiceConfig {
    /// ECS cluster name (defaults to the stack name)
    #[serde(default)]
    pub cluster_name: Option<String>,

    /// ECS service name (defaults to the stack name)
    #[serde(default)]
    pub service_name: Option<String>,

    /// Task CPU units
    #[serde(default = "default_cpu")]
    pub cpu: u32,

    /// Task memory in MiB
    #[serde(default = "default_memory")]
    pub memory_mib: u32,

    #[serde(default = "default_container_name")]
    pub container_name: String,

    /// Port the container listens on
    #[serde(default = "default_container_port")]
    pub container_port: u16,

    /// Public port on the load balancer
    #[serde(default = "default_listener_port")]
    pub listener_port: u16,

    /// Internet-facing load balancer
    #[serde(default = "default_true")]
    pub public_load_balancer: bool,

    /// Where the container image comes from
    #[serde(default)]
    pub image: ImageSource,

    /// Desired count and healthy-percent bounds; `null` leaves them to ECS
    #[serde(default = "default_deployment")]
    pub deployment: Option<DeploymentBounds>,

    /// Container log destination; `null` disables container logging
    #[serde(default = "default_log")]
    pub log: Option<LogDestination>,

    #[serde(default = "default_grace")]
    pub health_check_grace_seconds: Option<u32>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cluster_name: None,
            service_name: None,
            cpu: default_cpu(),
            memory_mib: default_memory(),
            container_name: default_container_name(),
            container_port: default_container_port(),
            listener_port: default_listener_port(),
            public_load_balancer: true,
            image: ImageSource::default(),
            deployment: default_deployment(),
            log: default_log(),
            health_check_grace_seconds: default_grace(),
        }
    }
}

fn default_cpu() -> u32 {
    512
}

fn default_memory() -> u32 {
    1024
}

fn default_container_name() -> String {
    "web".to_string()
}

fn default_container_port() -> u16 {
    3000
}

fn default_listener_port() -> u16 {
    80
}

fn default_deployment() -> Option<DeploymentBounds> {
    Some(DeploymentBounds::default())
}

fn default_log() -> Option<LogDestination> {
    Some(LogDestination::default())
}

fn default_grace() -> Option<u32> {
    Some(60)
}

/// Container image source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ImageSource {
    /// Build from a local directory (relative to the config file)
    Asset {
        #[serde(default = "default_asset_directory")]
        directory: String,
        #[serde(default = "default_dockerfile")]
        dockerfile: String,
        /// Glob patterns left out of the asset fingerprint
        #[serde(default = "default_asset_exclude")]
        exclude: Vec<String>,
    },
    /// Pre-built image reference
    Registry { image: String },
}

impl Default for ImageSource {
    fn default() -> Self {
        Self::Asset {
            directory: default_asset_directory(),
            dockerfile: default_dockerfile(),
            exclude: default_asset_exclude(),
        }
    }
}

fn default_asset_directory() -> String {
    "assets/ecs/rails".to_string()
}

fn default_dockerfile() -> String {
    "Dockerfile".to_string()
}

fn default_asset_exclude() -> Vec<String> {
    vec![
        ".git".to_string(),
        ".git/**".to_string(),
        "node_modules/**".to_string(),
        "tmp/**".to_string(),
        "log/**".to_string(),
    ]
}

/// Task count and rolling-deployment bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeploymentBounds {
    #[serde(default = "default_desired_count")]
    pub desired_count: u32,

    #[serde(default = "default_min_healthy")]
    pub min_healthy_percent: u32,

    #[serde(default = "default_max_healthy")]
    pub max_healthy_percent: u32,
}

impl Default for DeploymentBounds {
    fn default() -> Self {
        Self {
            desired_count: default_desired_count(),
            min_healthy_percent: default_min_healthy(),
            max_healthy_percent: default_max_healthy(),
        }
    }
}

fn default_desired_count() -> u32 {
    1
}

fn default_min_healthy() -> u32 {
    100
}

fn default_max_healthy() -> u32 {
    200
}

/// CloudWatch Logs destination for the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LogDestination {
    /// Log group name (defaults to `/aws/ecs/<name>`)
    #[serde(default)]
    pub group_name: Option<String>,

    /// awslogs stream prefix (defaults to the stack name)
    #[serde(default)]
    pub stream_prefix: Option<String>,

    /// Retention in days; `null` keeps logs forever
    #[serde(default = "default_log_retention")]
    pub retention_days: Option<u32>,

    #[serde(default = "default_log_removal")]
    pub removal_policy: RemovalPolicy,
}

impl Default for LogDestination {
    fn default() -> Self {
        Self {
            group_name: None,
            stream_prefix: None,
            retention_days: default_log_retention(),
            removal_policy: default_log_removal(),
        }
    }
}

fn default_log_retention() -> Option<u32> {
    Some(1)
}

fn default_log_removal() -> RemovalPolicy {
    RemovalPolicy::Destroy
}

/// CloudWatch Logs retention values accepted by `RetentionInDays`.
pub const LOG_RETENTION_DAYS: &[u32] = &[
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557,
    2922, 3288, 3653,
];

// ============================================================================
// Static site
// ============================================================================

/// Amplify-hosted single-page app built from a source-control branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SiteConfig {
    /// Stack name for the site deployable
    #[serde(default = "default_site_stack")]
    pub stack_name: String,

    /// Amplify app name
    #[serde(default = "default_site_app")]
    pub app_name: String,

    /// Repository host prefix
    #[serde(default = "default_repository_host")]
    pub repository_host: String,

    #[serde(default = "default_true")]
    pub auto_build: bool,

    #[serde(default)]
    pub build_spec: BuildSpec,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            stack_name: default_site_stack(),
            app_name: default_site_app(),
            repository_host: default_repository_host(),
            auto_build: true,
            build_spec: BuildSpec::default(),
        }
    }
}

fn default_site_stack() -> String {
    "StartupSnack-WebService-SinglePageApp".to_string()
}

fn default_site_app() -> String {
    "StartupSnack-WebService-SinglePageApp-App".to_string()
}

fn default_repository_host() -> String {
    "https://github.com".to_string()
}

/// Amplify build specification (the hosting service's own schema).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BuildSpec {
    pub version: String,
    pub frontend: FrontendSpec,
}

impl Default for BuildSpec {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            frontend: FrontendSpec {
                phases: BuildPhases {
                    pre_build: PhaseCommands {
                        commands: vec![
                            "cd assets/just-a-react-app".to_string(),
                            "yarn".to_string(),
                        ],
                    },
                    build: PhaseCommands {
                        commands: vec!["npm run build".to_string()],
                    },
                },
                artifacts: Artifacts {
                    base_directory: "build".to_string(),
                    files: vec!["**/*".to_string()],
                },
                cache: CacheSpec {
                    paths: vec!["build/**/*".to_string()],
                },
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FrontendSpec {
    pub phases: BuildPhases,
    pub artifacts: Artifacts,
    pub cache: CacheSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BuildPhases {
    pub pre_build: PhaseCommands,
    pub build: PhaseCommands,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PhaseCommands {
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Artifacts {
    pub base_directory: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CacheSpec {
    pub paths: Vec<String>,
}

// ============================================================================
// Assets
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AssetConfig {
    /// ECR repository container assets are published to
    #[serde(default = "default_repository")]
    pub repository: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            repository: default_repository(),
        }
    }
}

fn default_repository() -> String {
    "snackstack-container-assets".to_string()
}

// ============================================================================
// Provenance events
// ============================================================================

/// Provenance event for the JSONL event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvenanceEvent {
    SynthStarted {
        app: String,
        run_id: String,
        snackstack_version: String,
    },
    AssetFingerprinted {
        asset: String,
        directory: String,
        hash: String,
    },
    StackSynthesized {
        stack: String,
        resources: u32,
        hash: String,
        changed: bool,
    },
    SynthFailed {
        stack: String,
        error: String,
    },
    SynthCompleted {
        run_id: String,
        stacks: u32,
        total_seconds: f64,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: ProvenanceEvent,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sn001_empty_config_is_stock_deployment() {
        let config: InfraConfig = serde_yaml_ng::from_str("{}").unwrap();
        assert_eq!(config, InfraConfig::default());
        assert_eq!(config.name, "StartupSnack-WebService");
        assert_eq!(config.database.kind(), DatabaseKind::Serverless);
        assert_eq!(config.service.cpu, 512);
        assert_eq!(config.service.memory_mib, 1024);
        assert_eq!(config.service.container_port, 3000);
        assert!(config.site.is_some());
    }

    #[test]
    fn test_sn001_derived_names() {
        let config = InfraConfig::default();
        assert_eq!(config.cluster_name(), "StartupSnack-WebService");
        assert_eq!(config.service_name(), "StartupSnack-WebService");
        assert_eq!(config.database_identifier(), "StartupSnack-WebService");
        assert_eq!(
            config.log_group_name().as_deref(),
            Some("/aws/ecs/StartupSnack-WebService")
        );
        assert_eq!(config.log_stream_prefix(), Some("StartupSnack-WebService"));
    }

    #[test]
    fn test_sn001_renaming_propagates() {
        let config: InfraConfig = serde_yaml_ng::from_str("name: Staging-Web").unwrap();
        assert_eq!(config.cluster_name(), "Staging-Web");
        assert_eq!(config.database_identifier(), "Staging-Web");
        assert_eq!(config.log_group_name().as_deref(), Some("/aws/ecs/Staging-Web"));
    }

    #[test]
    fn test_sn001_instance_variant_parse() {
        let yaml = r#"
database:
  kind: instance
  instance_size: medium
  allocated_storage: 50
"#;
        let config: InfraConfig = serde_yaml_ng::from_str(yaml).unwrap();
        match &config.database {
            DatabaseConfig::Instance(i) => {
                assert_eq!(i.instance_type(), "db.t3.medium");
                assert_eq!(i.allocated_storage, 50);
                assert_eq!(i.max_allocated_storage, Some(20));
                assert_eq!(i.database_name.as_deref(), Some("app"));
                assert!(i.delete_automated_backups);
            }
            other => panic!("expected instance, got {:?}", other),
        }
    }

    #[test]
    fn test_sn001_unknown_database_kind_rejected() {
        let yaml = r#"
database:
  kind: dynamo
"#;
        let err = serde_yaml_ng::from_str::<InfraConfig>(yaml).unwrap_err();
        assert!(err.to_string().contains("unknown variant"));
    }

    #[test]
    fn test_sn001_database_kind_from_str() {
        assert_eq!(
            "serverless".parse::<DatabaseKind>().unwrap(),
            DatabaseKind::Serverless
        );
        assert_eq!(
            "instance".parse::<DatabaseKind>().unwrap(),
            DatabaseKind::Instance
        );
        let err = "mysql".parse::<DatabaseKind>().unwrap_err();
        assert!(err.contains("unknown RDS type 'mysql'"));
    }

    #[test]
    fn test_sn001_with_kind_keeps_identifier() {
        let db = DatabaseConfig::Serverless(ServerlessDatabase {
            identifier: Some("custom-db".to_string()),
            min_capacity: 4,
            max_capacity: 8,
            ..ServerlessDatabase::default()
        });
        let switched = db.clone().with_kind(DatabaseKind::Instance);
        assert_eq!(switched.kind(), DatabaseKind::Instance);
        assert_eq!(switched.identifier(), Some("custom-db"));

        let same = db.clone().with_kind(DatabaseKind::Serverless);
        assert_eq!(same, db);
    }

    #[test]
    fn test_sn001_database_port_default() {
        assert_eq!(DatabaseConfig::default().port(), 5432);
        let db = DatabaseConfig::Instance(InstanceDatabase {
            port: Some(6543),
            ..InstanceDatabase::default()
        });
        assert_eq!(db.port(), 6543);
    }

    #[test]
    fn test_sn001_registry_image_parse() {
        let yaml = r#"
image:
  source: registry
  image: public.ecr.aws/nginx/nginx:latest
"#;
        let svc: ServiceConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(
            svc.image,
            ImageSource::Registry {
                image: "public.ecr.aws/nginx/nginx:latest".to_string()
            }
        );
    }

    #[test]
    fn test_sn001_null_disables_optional_sections() {
        let yaml = r#"
site: ~
service:
  deployment: ~
  log: ~
"#;
        let config: InfraConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert!(config.site.is_none());
        assert!(config.service.deployment.is_none());
        assert!(config.service.log.is_none());
        assert!(config.log_group_name().is_none());
    }

    #[test]
    fn test_sn001_removal_policy_mapping() {
        assert_eq!(RemovalPolicy::Destroy.as_deletion_policy(), "Delete");
        assert_eq!(RemovalPolicy::Retain.as_deletion_policy(), "Retain");
        assert_eq!(RemovalPolicy::Snapshot.as_deletion_policy(), "Snapshot");
    }

    #[test]
    fn test_sn001_build_spec_yaml_shape() {
        let yaml = serde_yaml_ng::to_string(&BuildSpec::default()).unwrap();
        assert!(yaml.contains("preBuild:"));
        assert!(yaml.contains("baseDirectory: build"));
        assert!(yaml.contains("cd assets/just-a-react-app"));
        assert!(yaml.contains("build/**/*"));
    }

    #[test]
    fn test_sn001_provenance_event_serde() {
        let event = ProvenanceEvent::SynthStarted {
            app: "web".to_string(),
            run_id: "r-abc".to_string(),
            snackstack_version: "0.3.0".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"synth_started\""));
        assert!(json.contains("\"run_id\":\"r-abc\""));
    }

    #[test]
    fn test_sn001_subnet_type_display() {
        assert_eq!(SubnetType::Private.to_string(), "Private");
        assert_eq!(SubnetType::Public.to_string(), "Public");
    }
}

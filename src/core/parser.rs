//! SN-005: YAML parsing and validation.
//!
//! Parses snackstack.yaml and validates the constraints CloudFormation would
//! otherwise reject at deploy time:
//! - Version must be "1.0"
//! - Names and identifiers follow the AWS naming rules
//! - Database capacity, storage and retention are within service limits
//! - The Fargate task size is a supported CPU/memory pair

use super::types::*;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Aurora Serverless v1 capacity units.
pub const AURORA_CAPACITY_UNITS: &[u32] = &[2, 4, 8, 16, 32, 64, 128, 256, 384];

fn identifier_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,62}$").expect("static identifier regex"))
}

fn ecs_name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,255}$").expect("static ecs name regex"))
}

fn repository_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[a-z0-9]+(?:[._-][a-z0-9]+)*/)*[a-z0-9]+(?:[._-][a-z0-9]+)*$")
            .expect("static repository regex")
    })
}

/// Stack names and RDS identifiers: a letter, then letters, digits or
/// hyphens, at most 63 characters, no trailing or doubled hyphen.
pub fn is_valid_identifier(s: &str) -> bool {
    identifier_pattern().is_match(s) && !s.ends_with('-') && !s.contains("--")
}

/// Whether `cpu`/`memory` is a task size Fargate accepts.
pub fn is_valid_fargate_size(cpu: u32, memory: u32) -> bool {
    let (low, high, step) = match cpu {
        256 => return matches!(memory, 512 | 1024 | 2048),
        512 => (1024, 4096, 1024),
        1024 => (2048, 8192, 1024),
        2048 => (4096, 16384, 1024),
        4096 => (8192, 30720, 1024),
        8192 => (16384, 61440, 4096),
        16384 => (32768, 122880, 8192),
        _ => return false,
    };
    (low..=high).contains(&memory) && (memory - low) % step == 0
}

/// Parse a snackstack.yaml file from disk.
pub fn parse_config_file(path: &Path) -> Result<InfraConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_config(&content)
}

/// Parse a snackstack.yaml from a string.
pub fn parse_config(yaml: &str) -> Result<InfraConfig, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &InfraConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut err = |message: String| errors.push(ValidationError { message });

    if config.version != "1.0" {
        err(format!(
            "version must be \"1.0\", got \"{}\"",
            config.version
        ));
    }

    if config.name.is_empty() {
        err("name must not be empty".to_string());
    } else if !is_valid_identifier(&config.name) {
        err(format!("name '{}' is not a valid stack name", config.name));
    }

    // Network
    if !config.network.is_default && config.network.vpc_id.is_none() {
        err("network.vpc_id is required when network.is_default is false".to_string());
    }
    if config.network.min_azs == 0 {
        err("network.min_azs must be at least 1".to_string());
    }

    validate_database(config, &mut err);
    validate_service(config, &mut err);

    // Site
    if let Some(site) = &config.site {
        if !is_valid_identifier(&site.stack_name) {
            err(format!(
                "site.stack_name '{}' is not a valid stack name",
                site.stack_name
            ));
        }
        if site.stack_name == config.name {
            err(format!(
                "site.stack_name '{}' collides with the service stack",
                site.stack_name
            ));
        }
        if site.app_name.is_empty() {
            err("site.app_name must not be empty".to_string());
        }
    }

    if !repository_pattern().is_match(&config.assets.repository) {
        err(format!(
            "assets.repository '{}' is not a valid ECR repository name",
            config.assets.repository
        ));
    }

    errors
}

fn validate_database(config: &InfraConfig, err: &mut impl FnMut(String)) {
    let identifier = config.database_identifier();
    if !is_valid_identifier(identifier) {
        err(format!(
            "database identifier '{}' must start with a letter and contain only letters, digits and single hyphens (max 63)",
            identifier
        ));
    }
    if config.database.port() == 0 {
        err("database.port must be non-zero".to_string());
    }

    match &config.database {
        DatabaseConfig::Serverless(s) => {
            for (field, acu) in [("min_capacity", s.min_capacity), ("max_capacity", s.max_capacity)] {
                if !AURORA_CAPACITY_UNITS.contains(&acu) {
                    err(format!(
                        "database.{} {} is not a valid Aurora capacity (expected one of {:?})",
                        field, acu, AURORA_CAPACITY_UNITS
                    ));
                }
            }
            if s.min_capacity > s.max_capacity {
                err(format!(
                    "database.min_capacity {} exceeds max_capacity {}",
                    s.min_capacity, s.max_capacity
                ));
            }
            if !(1..=35).contains(&s.backup_retention_days) {
                err(format!(
                    "database.backup_retention_days {} must be between 1 and 35",
                    s.backup_retention_days
                ));
            }
            if let Some(minutes) = s.auto_pause_minutes {
                if minutes != 0 && !(5..=1440).contains(&minutes) {
                    err(format!(
                        "database.auto_pause_minutes {} must be 0 (disabled) or between 5 and 1440",
                        minutes
                    ));
                }
            }
        }
        DatabaseConfig::Instance(i) => {
            if i.allocated_storage < 5 {
                err(format!(
                    "database.allocated_storage {} GiB is below the 5 GiB minimum",
                    i.allocated_storage
                ));
            }
            if let Some(max) = i.max_allocated_storage {
                if max < i.allocated_storage {
                    err(format!(
                        "database.max_allocated_storage {} is less than allocated_storage {}",
                        max, i.allocated_storage
                    ));
                }
            }
            if let Some(days) = i.backup_retention_days {
                if days > 35 {
                    err(format!(
                        "database.backup_retention_days {} must be between 0 and 35",
                        days
                    ));
                }
            }
            if i.instance_class.is_empty() || i.instance_size.is_empty() {
                err("database.instance_class and instance_size must not be empty".to_string());
            }
        }
    }
}

fn validate_service(config: &InfraConfig, err: &mut impl FnMut(String)) {
    let svc = &config.service;
    for (field, name) in [
        ("cluster_name", config.cluster_name()),
        ("service_name", config.service_name()),
    ] {
        if !ecs_name_pattern().is_match(name) {
            err(format!("service.{} '{}' is not a valid ECS name", field, name));
        }
    }
    if !is_valid_fargate_size(svc.cpu, svc.memory_mib) {
        err(format!(
            "service cpu {} / memory {} MiB is not a supported Fargate task size",
            svc.cpu, svc.memory_mib
        ));
    }
    if svc.container_port == 0 {
        err("service.container_port must be non-zero".to_string());
    }
    if svc.listener_port == 0 {
        err("service.listener_port must be non-zero".to_string());
    }
    if svc.container_name.is_empty() {
        err("service.container_name must not be empty".to_string());
    }

    if let Some(bounds) = &svc.deployment {
        if bounds.min_healthy_percent > bounds.max_healthy_percent {
            err(format!(
                "service.deployment min_healthy_percent {} exceeds max_healthy_percent {}",
                bounds.min_healthy_percent, bounds.max_healthy_percent
            ));
        }
        if bounds.max_healthy_percent < 100 {
            err(format!(
                "service.deployment max_healthy_percent {} must be at least 100",
                bounds.max_healthy_percent
            ));
        }
    }

    if let Some(log) = &svc.log {
        if let Some(days) = log.retention_days {
            if !LOG_RETENTION_DAYS.contains(&days) {
                err(format!(
                    "service.log.retention_days {} is not a CloudWatch Logs retention value",
                    days
                ));
            }
        }
        if log.group_name.as_deref() == Some("") {
            err("service.log.group_name must not be empty".to_string());
        }
    }

    match &svc.image {
        ImageSource::Asset {
            directory,
            dockerfile,
            exclude,
        } => {
            if directory.is_empty() || dockerfile.is_empty() {
                err("service.image directory and dockerfile must not be empty".to_string());
            }
            for pattern in exclude {
                if let Err(e) = glob::Pattern::new(pattern) {
                    err(format!(
                        "service.image exclude pattern '{}' is invalid: {}",
                        pattern, e
                    ));
                }
            }
        }
        ImageSource::Registry { image } => {
            if image.is_empty() {
                err("service.image.image must not be empty".to_string());
            }
        }
    }
}

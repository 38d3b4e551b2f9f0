//! SN-012: Container cluster and load-balanced Fargate web service.

use super::database::DatabaseHandle;
use super::network::{NetworkRef, SubnetSelection};
use crate::core::template::{get_att, join, logical_id, ref_to, sub, CfnResource, Template};
use crate::core::types::{AssetConfig, ImageSource, InfraConfig, SubnetType};
use crate::provenance::hasher;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;

const CONSTRUCT: &str = "Service";

/// A container image built from a local directory and published by the
/// deploy tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerImageAsset {
    /// Content hash of the build context (hex)
    pub id: String,
    pub directory: String,
    pub dockerfile: String,
    pub repository: String,
    pub tag: String,
}

/// The image a task definition runs.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImage {
    pub uri: Value,
    pub asset: Option<DockerImageAsset>,
}

/// Resolve an image source. Asset directories are relative to `base_dir`.
pub fn resolve_image(
    source: &ImageSource,
    base_dir: &Path,
    assets: &AssetConfig,
) -> Result<ResolvedImage, String> {
    match source {
        ImageSource::Registry { image } => Ok(ResolvedImage {
            uri: Value::String(image.clone()),
            asset: None,
        }),
        ImageSource::Asset {
            directory,
            dockerfile,
            exclude,
        } => {
            let dir = base_dir.join(directory);
            if !dir.is_dir() {
                return Err(format!(
                    "container asset directory {} does not exist",
                    dir.display()
                ));
            }
            if !dir.join(dockerfile).is_file() {
                return Err(format!(
                    "cannot find {} in container asset directory {}",
                    dockerfile,
                    dir.display()
                ));
            }
            let patterns = hasher::compile_excludes(exclude)?;
            let hash = hasher::hash_directory(&dir, &patterns)?;
            let tag = hasher::hex_digest(&hash).to_string();
            let uri = sub(&format!(
                "${{AWS::AccountId}}.dkr.ecr.${{AWS::Region}}.${{AWS::URLSuffix}}/{}:{}",
                assets.repository, tag
            ));
            Ok(ResolvedImage {
                uri,
                asset: Some(DockerImageAsset {
                    id: tag.clone(),
                    directory: directory.clone(),
                    dockerfile: dockerfile.clone(),
                    repository: assets.repository.clone(),
                    tag,
                }),
            })
        }
    }
}

/// What the access wiring needs to know about the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle {
    pub service: String,
    pub security_group: String,
    pub load_balancer: String,
    pub task_definition: String,
}

/// Declare the cluster, load balancer and Fargate service.
pub fn declare(
    template: &mut Template,
    config: &InfraConfig,
    image: &ResolvedImage,
    network: &NetworkRef,
    db: &DatabaseHandle,
) -> Result<ServiceHandle, String> {
    let svc = &config.service;
    let task_selection = SubnetSelection::from_config(&config.network);
    let lb_selection = if svc.public_load_balancer {
        SubnetSelection {
            subnet_type: SubnetType::Public,
            ..task_selection
        }
    } else {
        task_selection
    };
    let task_subnets = network.subnet_ids(task_selection)?;
    let lb_subnets = network.subnet_ids(lb_selection)?;

    let cluster = template.add(
        logical_id(&["Cluster"]),
        CfnResource::new(
            "AWS::ECS::Cluster",
            json!({ "ClusterName": config.cluster_name() }),
        ),
    )?;

    let log_group = match (&svc.log, config.log_group_name()) {
        (Some(log), Some(group_name)) => {
            let mut res =
                CfnResource::new("AWS::Logs::LogGroup", json!({ "LogGroupName": group_name }));
            if let Some(days) = log.retention_days {
                res.set("RetentionInDays", json!(days));
            }
            let res = res.with_removal_policy(log.removal_policy);
            Some(template.add(logical_id(&["LogGroup"]), res)?)
        }
        _ => None,
    };

    // Roles
    let task_role = template.add(
        logical_id(&[CONSTRUCT, "TaskDef", "TaskRole"]),
        CfnResource::new("AWS::IAM::Role", ecs_tasks_trust()),
    )?;
    let execution_role = template.add(
        logical_id(&[CONSTRUCT, "TaskDef", "ExecutionRole"]),
        CfnResource::new("AWS::IAM::Role", ecs_tasks_trust()),
    )?;

    let mut statements = Vec::new();
    if let Some(asset) = &image.asset {
        statements.push(json!({
            "Action": [
                "ecr:BatchCheckLayerAvailability",
                "ecr:GetDownloadUrlForLayer",
                "ecr:BatchGetImage",
            ],
            "Effect": "Allow",
            "Resource": sub(&format!(
                "arn:${{AWS::Partition}}:ecr:${{AWS::Region}}:${{AWS::AccountId}}:repository/{}",
                asset.repository
            )),
        }));
        statements.push(json!({
            "Action": "ecr:GetAuthorizationToken",
            "Effect": "Allow",
            "Resource": "*",
        }));
    }
    if let Some(group) = &log_group {
        statements.push(json!({
            "Action": ["logs:CreateLogStream", "logs:PutLogEvents"],
            "Effect": "Allow",
            "Resource": get_att(group, "Arn"),
        }));
    }
    statements.push(json!({
        "Action": ["secretsmanager:GetSecretValue", "secretsmanager:DescribeSecret"],
        "Effect": "Allow",
        "Resource": db.secret.arn(),
    }));
    let policy_id = logical_id(&[CONSTRUCT, "TaskDef", "ExecutionRole", "DefaultPolicy"]);
    template.add(
        policy_id.clone(),
        CfnResource::new(
            "AWS::IAM::Policy",
            json!({
                "PolicyDocument": { "Statement": statements, "Version": "2012-10-17" },
                "PolicyName": policy_id,
                "Roles": [ref_to(&execution_role)],
            }),
        ),
    )?;

    // Task definition
    let mut container = json!({
        "Essential": true,
        "Image": image.uri,
        "Name": svc.container_name,
        "PortMappings": [{ "ContainerPort": svc.container_port, "Protocol": "tcp" }],
        "Secrets": [
            { "Name": "DATABASE_HOST", "ValueFrom": db.secret.field("host") },
            { "Name": "DATABASE_PASSWORD", "ValueFrom": db.secret.field("password") },
        ],
    });
    if let (Some(group), Some(prefix)) = (&log_group, config.log_stream_prefix()) {
        container["LogConfiguration"] = json!({
            "LogDriver": "awslogs",
            "Options": {
                "awslogs-group": ref_to(group),
                "awslogs-stream-prefix": prefix,
                "awslogs-region": ref_to("AWS::Region"),
            },
        });
    }
    let task_definition = template.add(
        logical_id(&[CONSTRUCT, "TaskDef"]),
        CfnResource::new(
            "AWS::ECS::TaskDefinition",
            json!({
                "ContainerDefinitions": [container],
                "Cpu": svc.cpu.to_string(),
                "ExecutionRoleArn": get_att(&execution_role, "Arn"),
                "Family": config.service_name(),
                "Memory": svc.memory_mib.to_string(),
                "NetworkMode": "awsvpc",
                "RequiresCompatibilities": ["FARGATE"],
                "TaskRoleArn": get_att(&task_role, "Arn"),
            }),
        ),
    )?;

    // Load balancer
    let scheme = if svc.public_load_balancer {
        "internet-facing"
    } else {
        "internal"
    };
    let lb_security_group = template.add(
        logical_id(&[CONSTRUCT, "LB", "SecurityGroup"]),
        CfnResource::new(
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupDescription": format!("{}/{}/LB/SecurityGroup", config.name, CONSTRUCT),
                "SecurityGroupIngress": [{
                    "CidrIp": "0.0.0.0/0",
                    "Description": format!("Allow from anyone on port {}", svc.listener_port),
                    "FromPort": svc.listener_port,
                    "IpProtocol": "tcp",
                    "ToPort": svc.listener_port,
                }],
                "VpcId": network.vpc_id,
            }),
        ),
    )?;
    let load_balancer = template.add(
        logical_id(&[CONSTRUCT, "LB"]),
        CfnResource::new(
            "AWS::ElasticLoadBalancingV2::LoadBalancer",
            json!({
                "LoadBalancerAttributes": [
                    { "Key": "deletion_protection.enabled", "Value": "false" },
                ],
                "Scheme": scheme,
                "SecurityGroups": [get_att(&lb_security_group, "GroupId")],
                "Subnets": lb_subnets,
                "Type": "application",
            }),
        ),
    )?;
    let target_group = template.add(
        logical_id(&[CONSTRUCT, "LB", "PublicListener", "ECSGroup"]),
        CfnResource::new(
            "AWS::ElasticLoadBalancingV2::TargetGroup",
            json!({
                "Port": 80,
                "Protocol": "HTTP",
                "TargetType": "ip",
                "VpcId": network.vpc_id,
            }),
        ),
    )?;
    let listener = template.add(
        logical_id(&[CONSTRUCT, "LB", "PublicListener"]),
        CfnResource::new(
            "AWS::ElasticLoadBalancingV2::Listener",
            json!({
                "DefaultActions": [{ "TargetGroupArn": ref_to(&target_group), "Type": "forward" }],
                "LoadBalancerArn": ref_to(&load_balancer),
                "Port": svc.listener_port,
                "Protocol": "HTTP",
            }),
        ),
    )?;

    // Service security group and the LB -> task path
    let security_group = template.add(
        logical_id(&[CONSTRUCT, "Service", "SecurityGroup"]),
        CfnResource::new(
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupDescription": format!("{}/{}/Service/SecurityGroup", config.name, CONSTRUCT),
                "SecurityGroupEgress": [{
                    "CidrIp": "0.0.0.0/0",
                    "Description": "Allow all outbound traffic by default",
                    "IpProtocol": "-1",
                }],
                "VpcId": network.vpc_id,
            }),
        ),
    )?;
    template.add(
        logical_id(&[CONSTRUCT, "LB", "SecurityGroup", "to", "Service"]),
        CfnResource::new(
            "AWS::EC2::SecurityGroupEgress",
            json!({
                "Description": "Load balancer to target",
                "DestinationSecurityGroupId": get_att(&security_group, "GroupId"),
                "FromPort": svc.container_port,
                "GroupId": get_att(&lb_security_group, "GroupId"),
                "IpProtocol": "tcp",
                "ToPort": svc.container_port,
            }),
        ),
    )?;
    template.add(
        logical_id(&[CONSTRUCT, "Service", "SecurityGroup", "from", "LB"]),
        CfnResource::new(
            "AWS::EC2::SecurityGroupIngress",
            json!({
                "Description": "Load balancer to target",
                "FromPort": svc.container_port,
                "GroupId": get_att(&security_group, "GroupId"),
                "IpProtocol": "tcp",
                "SourceSecurityGroupId": get_att(&lb_security_group, "GroupId"),
                "ToPort": svc.container_port,
            }),
        ),
    )?;

    // The service itself
    let assign_public_ip = if task_selection.subnet_type == SubnetType::Public {
        "ENABLED"
    } else {
        "DISABLED"
    };
    let mut service = CfnResource::new(
        "AWS::ECS::Service",
        json!({
            "Cluster": ref_to(&cluster),
            "LaunchType": "FARGATE",
            "LoadBalancers": [{
                "ContainerName": svc.container_name,
                "ContainerPort": svc.container_port,
                "TargetGroupArn": ref_to(&target_group),
            }],
            "NetworkConfiguration": {
                "AwsvpcConfiguration": {
                    "AssignPublicIp": assign_public_ip,
                    "SecurityGroups": [get_att(&security_group, "GroupId")],
                    "Subnets": task_subnets,
                },
            },
            "ServiceName": config.service_name(),
            "TaskDefinition": ref_to(&task_definition),
        }),
    )
    .with_dependency(&listener);
    if let Some(bounds) = &svc.deployment {
        service.set("DesiredCount", json!(bounds.desired_count));
        service.set(
            "DeploymentConfiguration",
            json!({
                "MaximumPercent": bounds.max_healthy_percent,
                "MinimumHealthyPercent": bounds.min_healthy_percent,
            }),
        );
    }
    if let Some(grace) = svc.health_check_grace_seconds {
        service.set("HealthCheckGracePeriodSeconds", json!(grace));
    }
    let service = template.add(logical_id(&[CONSTRUCT, "Service"]), service)?;

    let dns = get_att(&load_balancer, "DNSName");
    template.add_output("ServiceLoadBalancerDNS", dns.clone(), None)?;
    template.add_output(
        "ServiceServiceURL",
        join("", vec![json!("http://"), dns]),
        None,
    )?;

    Ok(ServiceHandle {
        service,
        security_group,
        load_balancer,
        task_definition,
    })
}

fn ecs_tasks_trust() -> Value {
    json!({
        "AssumeRolePolicyDocument": {
            "Statement": [{
                "Action": "sts:AssumeRole",
                "Effect": "Allow",
                "Principal": { "Service": "ecs-tasks.amazonaws.com" },
            }],
            "Version": "2012-10-17",
        },
    })
}

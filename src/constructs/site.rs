//! SN-016: Amplify-hosted single-page app.
//!
//! Lives in its own stack and shares nothing with the web service, so only
//! this stack depends on the source-control settings (`O_AUTH_TOKEN`,
//! `SOURCE_CODE_OWNER`, `REPOSITORY`, `BRANCH`).

use crate::core::env::EnvSettings;
use crate::core::template::{get_att, logical_id, CfnResource, Template};
use crate::core::types::SiteConfig;
use serde_json::json;

/// Logical IDs of the declared app and branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteHandle {
    pub app: String,
    pub branch: String,
}

/// `<host>/<owner>/<repository>`
pub fn repository_url(config: &SiteConfig, env: &EnvSettings) -> String {
    format!(
        "{}/{}/{}",
        config.repository_host.trim_end_matches('/'),
        env.source_owner,
        env.repository
    )
}

pub fn declare(
    template: &mut Template,
    config: &SiteConfig,
    env: &EnvSettings,
) -> Result<SiteHandle, String> {
    let token = env.oauth_token.as_deref().ok_or_else(|| {
        format!(
            "O_AUTH_TOKEN is not set; stack {} needs a source-control token to connect {}",
            config.stack_name,
            repository_url(config, env)
        )
    })?;
    let build_spec = serde_yaml_ng::to_string(&config.build_spec)
        .map_err(|e| format!("build spec serialize error: {}", e))?;

    let role = template.add(
        logical_id(&["App", "Role"]),
        CfnResource::new(
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": {
                    "Statement": [{
                        "Action": "sts:AssumeRole",
                        "Effect": "Allow",
                        "Principal": { "Service": "amplify.amazonaws.com" },
                    }],
                    "Version": "2012-10-17",
                },
            }),
        ),
    )?;

    let app = template.add(
        logical_id(&["App"]),
        CfnResource::new(
            "AWS::Amplify::App",
            json!({
                "BuildSpec": build_spec,
                "EnvironmentVariables": [
                    { "Name": "NODE_ENV", "Value": env.environment },
                    { "Name": "VUE_APP_COLOR", "Value": env.color },
                ],
                "IAMServiceRole": get_att(&role, "Arn"),
                "Name": config.app_name,
                "OauthToken": token,
                "Repository": repository_url(config, env),
            }),
        ),
    )?;

    let branch = template.add(
        logical_id(&["App", "Branch"]),
        CfnResource::new(
            "AWS::Amplify::Branch",
            json!({
                "AppId": get_att(&app, "AppId"),
                "BranchName": env.branch,
                "EnableAutoBuild": config.auto_build,
            }),
        ),
    )?;

    template.add_output("AppId", get_att(&app, "AppId"), Some("Amplify app ID"))?;
    template.add_output(
        "DefaultDomain",
        get_att(&app, "DefaultDomain"),
        Some("Amplify default domain"),
    )?;

    Ok(SiteHandle { app, branch })
}

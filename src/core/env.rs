//! SN-002: Environment variable resolution.
//!
//! Every setting read from the process environment goes through
//! [`EnvSettings::from_lookup`], so tests can feed a plain map instead of
//! mutating the real environment. A variable that is present, even empty,
//! wins over later fallbacks.

use std::collections::HashMap;

pub const DEFAULT_REGION: &str = "us-east-2";
pub const DEFAULT_SOURCE_OWNER: &str = "shankben";
pub const DEFAULT_REPOSITORY: &str = "startup-snack-web-service";
pub const DEFAULT_BRANCH: &str = "single-page-app";

/// Region variables, highest precedence first.
pub const REGION_CHAIN: &[&str] = &["AWS_REGION", "CDK_DEPLOY_REGION", "CDK_DEFAULT_REGION"];

/// Settings sourced from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSettings {
    /// Target account (`CDK_DEFAULT_ACCOUNT`)
    pub account: Option<String>,
    /// Target region (see [`REGION_CHAIN`])
    pub region: String,
    /// Source-control OAuth token (`O_AUTH_TOKEN`)
    pub oauth_token: Option<String>,
    pub source_owner: String,
    pub repository: String,
    /// Site deployment branch (`BRANCH`)
    pub branch: String,
    /// Generic environment name (`ENV`), forwarded to the site build
    pub environment: String,
    /// Site theme color (`COLOR`)
    pub color: String,
}

impl EnvSettings {
    /// Resolve settings through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let region = REGION_CHAIN
            .iter()
            .find_map(|key| lookup(*key))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        Self {
            account: lookup("CDK_DEFAULT_ACCOUNT"),
            region,
            oauth_token: lookup("O_AUTH_TOKEN"),
            source_owner: lookup("SOURCE_CODE_OWNER")
                .unwrap_or_else(|| DEFAULT_SOURCE_OWNER.to_string()),
            repository: lookup("REPOSITORY").unwrap_or_else(|| DEFAULT_REPOSITORY.to_string()),
            branch: lookup("BRANCH").unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            environment: lookup("ENV").unwrap_or_default(),
            color: lookup("COLOR").unwrap_or_default(),
        }
    }

    /// Resolve settings from the process environment.
    pub fn from_process() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings from a fixed map.
    pub fn from_map(vars: &HashMap<String, String>) -> Self {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// `aws://<account>/<region>`, with `unknown-account` for env-agnostic stacks.
    pub fn environment_uri(&self) -> String {
        format!(
            "aws://{}/{}",
            self.account.as_deref().unwrap_or("unknown-account"),
            self.region
        )
    }
}

impl Default for EnvSettings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_sn002_empty_env_defaults() {
        let env = EnvSettings::from_map(&HashMap::new());
        assert_eq!(env.region, "us-east-2");
        assert_eq!(env.source_owner, "shankben");
        assert_eq!(env.repository, "startup-snack-web-service");
        assert_eq!(env.branch, "single-page-app");
        assert!(env.account.is_none());
        assert!(env.oauth_token.is_none());
        assert_eq!(env.environment, "");
        assert_eq!(env.color, "");
        assert_eq!(env, EnvSettings::default());
    }

    #[test]
    fn test_sn002_region_chain_precedence() {
        let all = vars(&[
            ("AWS_REGION", "eu-west-1"),
            ("CDK_DEPLOY_REGION", "eu-west-2"),
            ("CDK_DEFAULT_REGION", "eu-west-3"),
        ]);
        assert_eq!(EnvSettings::from_map(&all).region, "eu-west-1");

        let deploy = vars(&[
            ("CDK_DEPLOY_REGION", "eu-west-2"),
            ("CDK_DEFAULT_REGION", "eu-west-3"),
        ]);
        assert_eq!(EnvSettings::from_map(&deploy).region, "eu-west-2");

        let default = vars(&[("CDK_DEFAULT_REGION", "eu-west-3")]);
        assert_eq!(EnvSettings::from_map(&default).region, "eu-west-3");
    }

    #[test]
    fn test_sn002_present_but_empty_wins() {
        let env = EnvSettings::from_map(&vars(&[("REPOSITORY", "")]));
        assert_eq!(env.repository, "");
    }

    #[test]
    fn test_sn002_overrides() {
        let env = EnvSettings::from_map(&vars(&[
            ("CDK_DEFAULT_ACCOUNT", "123456789012"),
            ("O_AUTH_TOKEN", "ghp_x"),
            ("SOURCE_CODE_OWNER", "acme"),
            ("REPOSITORY", "shop"),
            ("BRANCH", "main"),
            ("ENV", "production"),
            ("COLOR", "teal"),
        ]));
        assert_eq!(env.account.as_deref(), Some("123456789012"));
        assert_eq!(env.oauth_token.as_deref(), Some("ghp_x"));
        assert_eq!(env.source_owner, "acme");
        assert_eq!(env.repository, "shop");
        assert_eq!(env.branch, "main");
        assert_eq!(env.environment, "production");
        assert_eq!(env.color, "teal");
    }

    #[test]
    fn test_sn002_environment_uri() {
        let env = EnvSettings::from_map(&vars(&[("CDK_DEFAULT_ACCOUNT", "111122223333")]));
        assert_eq!(env.environment_uri(), "aws://111122223333/us-east-2");
        assert_eq!(
            EnvSettings::default().environment_uri(),
            "aws://unknown-account/us-east-2"
        );
    }
}

//! SN-006: Synthesis of tiers into stacks.
//!
//! The web-service stack is built from two tiers with one owner each: the
//! data tier (network lookup + database) and the service tier (cluster +
//! load-balanced service), joined by the access rule. The static site is a
//! separate stack. Every template is checked by the resolver before it is
//! handed back: no dangling references, no cycles.

use super::env::EnvSettings;
use super::resolver;
use super::template::Template;
use super::types::{DatabaseKind, InfraConfig};
use crate::constructs::compute::{self, DockerImageAsset, ServiceHandle};
use crate::constructs::database::{self, DatabaseHandle};
use crate::constructs::network::{self, LookupContext, NetworkRef, SubnetSelection};
use crate::constructs::{access, site};
use indexmap::IndexMap;
use std::path::Path;

/// Everything synthesis reads.
#[derive(Debug, Clone, Copy)]
pub struct SynthInput<'a> {
    pub config: &'a InfraConfig,
    pub env: &'a EnvSettings,
    pub context: &'a LookupContext,
    /// Directory container asset paths are relative to
    pub base_dir: &'a Path,
}

/// One synthesized stack.
#[derive(Debug, Clone, PartialEq)]
pub struct StackArtifact {
    pub name: String,
    pub template: Template,
    /// `aws://<account>/<region>`
    pub environment: String,
    pub creation_order: Vec<String>,
}

/// All synthesized stacks plus the container assets they reference.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CloudAssembly {
    pub stacks: IndexMap<String, StackArtifact>,
    pub assets: Vec<DockerImageAsset>,
}

/// Data tier: the network and the database placed in it.
#[derive(Debug, Clone)]
pub struct DataTier {
    pub network: NetworkRef,
    pub database: DatabaseHandle,
}

/// Names of the stacks a config produces, in synthesis order.
pub fn stack_names(config: &InfraConfig) -> Vec<String> {
    let mut names = vec![config.name.clone()];
    if let Some(site) = &config.site {
        names.push(site.stack_name.clone());
    }
    names
}

/// Switch the configured database variant by name. Unknown names fail.
pub fn override_database(config: InfraConfig, kind: &str) -> Result<InfraConfig, String> {
    let kind: DatabaseKind = kind.parse()?;
    Ok(InfraConfig {
        database: config.database.with_kind(kind),
        ..config
    })
}

/// Synthesize every stack, or only `only` when given.
pub fn synth_app(input: SynthInput<'_>, only: Option<&str>) -> Result<CloudAssembly, String> {
    let names = stack_names(input.config);
    if let Some(wanted) = only {
        if !names.iter().any(|n| n == wanted) {
            return Err(format!(
                "unknown stack '{}' (available: {})",
                wanted,
                names.join(", ")
            ));
        }
    }

    let mut assembly = CloudAssembly::default();
    let selected = |name: &str| only.is_none_or(|wanted| wanted == name);

    if selected(&input.config.name) {
        let (template, assets) = synth_web_service(input)?;
        let artifact = finalize(&input.config.name, template, input.env)?;
        assembly.stacks.insert(artifact.name.clone(), artifact);
        assembly.assets.extend(assets);
    }

    if let Some(site_config) = &input.config.site {
        if selected(&site_config.stack_name) {
            let mut template = Template::new(Some(format!(
                "Single-page app for {}",
                input.config.name
            )));
            site::declare(&mut template, site_config, input.env)?;
            let artifact = finalize(&site_config.stack_name, template, input.env)?;
            assembly.stacks.insert(artifact.name.clone(), artifact);
        }
    }

    Ok(assembly)
}

/// Network lookup plus the database.
pub fn data_tier(template: &mut Template, input: SynthInput<'_>) -> Result<DataTier, String> {
    let config = input.config;
    let network = network::lookup(input.context, input.env, &config.network)?;
    let database = database::declare(
        template,
        &config.name,
        config.database_identifier(),
        &config.database,
        &network,
        SubnetSelection::from_config(&config.network),
    )?;
    database::add_outputs(template, &database)?;
    Ok(DataTier { network, database })
}

/// Cluster and load-balanced service, wired to the data tier's secret.
pub fn service_tier(
    template: &mut Template,
    input: SynthInput<'_>,
    data: &DataTier,
) -> Result<(ServiceHandle, Option<DockerImageAsset>), String> {
    let config = input.config;
    let image = compute::resolve_image(&config.service.image, input.base_dir, &config.assets)?;
    let service = compute::declare(template, config, &image, &data.network, &data.database)?;
    Ok((service, image.asset))
}

fn synth_web_service(input: SynthInput<'_>) -> Result<(Template, Vec<DockerImageAsset>), String> {
    let mut template = Template::new(input.config.description.clone());
    let data = data_tier(&mut template, input)?;
    let (service, asset) = service_tier(&mut template, input, &data)?;
    access::allow_from(&mut template, &data.database, &service)?;
    Ok((template, asset.into_iter().collect()))
}

fn finalize(name: &str, template: Template, env: &EnvSettings) -> Result<StackArtifact, String> {
    let errors = resolver::validate_references(&template);
    if !errors.is_empty() {
        return Err(format!("stack {}: {}", name, errors.join("; ")));
    }
    let creation_order =
        resolver::build_creation_order(&template).map_err(|e| format!("stack {}: {}", name, e))?;
    Ok(StackArtifact {
        name: name.to_string(),
        template,
        environment: env.environment_uri(),
        creation_order,
    })
}

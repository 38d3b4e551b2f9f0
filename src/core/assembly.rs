//! SN-007: Cloud assembly output.
//!
//! Every file is written atomically (temp file + rename). A template whose
//! hash matches the previous manifest and whose file is still on disk is
//! left untouched and reported as unchanged.
//!
//! A full run replaces the manifest and asset list outright. A run filtered
//! to one stack carries the other stacks' entries forward.

use super::synth::CloudAssembly;
use crate::constructs::compute::DockerImageAsset;
use crate::provenance::eventlog::now_iso8601;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const ASSETS_FILE: &str = "assets.json";
pub const ASSEMBLY_VERSION: &str = "1.0";
pub const STACK_ARTIFACT_TYPE: &str = "aws:cloudformation:stack";

/// `manifest.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: String,
    pub generator: String,
    pub generated_at: String,
    #[serde(default)]
    pub artifacts: IndexMap<String, ArtifactEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactEntry {
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub environment: String,
    pub template_file: String,
    pub template_hash: String,
    pub resource_count: u32,
    /// Logical IDs in dependency order.
    #[serde(default)]
    pub creation_order: Vec<String>,
}

/// `assets.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetManifest {
    pub version: String,
    #[serde(default)]
    pub docker_images: IndexMap<String, DockerImageAsset>,
}

/// Outcome for one stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackWrite {
    pub stack: String,
    pub path: PathBuf,
    pub hash: String,
    pub resources: u32,
    pub changed: bool,
}

pub fn template_file_name(stack: &str) -> String {
    format!("{}.template.json", stack)
}

/// Load a previous manifest. Returns None if the file doesn't exist.
pub fn load_manifest(out_dir: &Path) -> Result<Option<Manifest>, String> {
    let path = out_dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let manifest = serde_json::from_str(&content)
        .map_err(|e| format!("invalid manifest {}: {}", path.display(), e))?;
    Ok(Some(manifest))
}

/// Load a previous asset manifest. Returns None if the file doesn't exist.
pub fn load_asset_manifest(out_dir: &Path) -> Result<Option<AssetManifest>, String> {
    let path = out_dir.join(ASSETS_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let manifest = serde_json::from_str(&content)
        .map_err(|e| format!("invalid asset manifest {}: {}", path.display(), e))?;
    Ok(Some(manifest))
}

/// Write an assembly into `out_dir`. When `only` names a stack, entries for
/// the other stacks from an earlier run stay in the manifest; otherwise the
/// manifest lists exactly the synthesized stacks and stale templates are
/// removed.
pub fn write_assembly(
    out_dir: &Path,
    assembly: &CloudAssembly,
    only: Option<&str>,
) -> Result<Vec<StackWrite>, String> {
    std::fs::create_dir_all(out_dir)
        .map_err(|e| format!("cannot create dir {}: {}", out_dir.display(), e))?;

    let previous = load_manifest(out_dir)?
        .map(|m| m.artifacts)
        .unwrap_or_default();
    let mut artifacts = if only.is_some() {
        previous.clone()
    } else {
        IndexMap::new()
    };

    let mut writes = Vec::new();
    for (name, stack) in &assembly.stacks {
        let file = template_file_name(name);
        let path = out_dir.join(&file);
        let json = stack.template.to_json_pretty()?;
        let hash = crate::provenance::hasher::hash_string(&json);
        let resources = u32::try_from(stack.template.resources.len()).unwrap_or(u32::MAX);

        let unchanged = path.exists()
            && previous
                .get(name)
                .is_some_and(|prev| prev.template_hash == hash);
        if !unchanged {
            write_atomic(&path, &json)?;
        }

        artifacts.insert(
            name.clone(),
            ArtifactEntry {
                artifact_type: STACK_ARTIFACT_TYPE.to_string(),
                environment: stack.environment.clone(),
                template_file: file,
                template_hash: hash.clone(),
                resource_count: resources,
                creation_order: stack.creation_order.clone(),
            },
        );
        writes.push(StackWrite {
            stack: name.clone(),
            path,
            hash,
            resources,
            changed: !unchanged,
        });
    }

    if only.is_none() {
        for (name, stale) in previous.iter().filter(|(n, _)| !artifacts.contains_key(*n)) {
            let path = out_dir.join(&stale.template_file);
            if path.exists() {
                std::fs::remove_file(&path).map_err(|e| {
                    format!("cannot remove stale template for {} {}: {}", name, path.display(), e)
                })?;
            }
        }
    }

    let manifest = Manifest {
        version: ASSEMBLY_VERSION.to_string(),
        generator: format!("snackstack {}", env!("CARGO_PKG_VERSION")),
        generated_at: now_iso8601(),
        artifacts,
    };
    let json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| format!("serialize error: {}", e))?;
    write_atomic(&out_dir.join(MANIFEST_FILE), &json)?;

    // A filtered run that declares no assets leaves the earlier list alone.
    let mut images = if only.is_some() && assembly.assets.is_empty() {
        load_asset_manifest(out_dir)?
            .map(|m| m.docker_images)
            .unwrap_or_default()
    } else {
        IndexMap::new()
    };
    for asset in &assembly.assets {
        images.insert(asset.id.clone(), asset.clone());
    }
    let asset_manifest = AssetManifest {
        version: ASSEMBLY_VERSION.to_string(),
        docker_images: images,
    };
    let json = serde_json::to_string_pretty(&asset_manifest)
        .map_err(|e| format!("serialize error: {}", e))?;
    write_atomic(&out_dir.join(ASSETS_FILE), &json)?;

    Ok(writes)
}

/// Atomic write: temp file + rename.
fn write_atomic(path: &Path, content: &str) -> Result<(), String> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp_path = PathBuf::from(tmp);
    std::fs::write(&tmp_path, content)
        .map_err(|e| format!("cannot write {}: {}", tmp_path.display(), e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        format!(
            "cannot rename {} → {}: {}",
            tmp_path.display(),
            path.display(),
            e
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::synth::StackArtifact;
    use crate::core::template::{CfnResource, Template};
    use serde_json::json;

    fn assembly(topic_name: &str) -> CloudAssembly {
        assembly_with_asset(topic_name, "abc")
    }

    fn assembly_with_asset(topic_name: &str, tag: &str) -> CloudAssembly {
        let mut template = Template::new(None);
        template
            .add(
                "Topic".into(),
                CfnResource::new("AWS::SNS::Topic", json!({ "TopicName": topic_name })),
            )
            .unwrap();
        let mut stacks = IndexMap::new();
        stacks.insert(
            "Web".to_string(),
            StackArtifact {
                name: "Web".to_string(),
                template,
                environment: "aws://111/us-east-2".to_string(),
                creation_order: vec!["Topic".to_string()],
            },
        );
        CloudAssembly {
            stacks,
            assets: vec![DockerImageAsset {
                id: tag.to_string(),
                directory: "assets/ecs/rails".to_string(),
                dockerfile: "Dockerfile".to_string(),
                repository: "repo".to_string(),
                tag: tag.to_string(),
            }],
        }
    }

    #[test]
    fn test_sn007_write_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let writes = write_assembly(dir.path(), &assembly("a"), None).unwrap();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].changed);
        assert!(dir.path().join("Web.template.json").exists());
        assert!(!dir.path().join("Web.template.json.tmp").exists());

        let manifest = load_manifest(dir.path()).unwrap().unwrap();
        let entry = &manifest.artifacts["Web"];
        assert_eq!(entry.artifact_type, "aws:cloudformation:stack");
        assert_eq!(entry.template_file, "Web.template.json");
        assert_eq!(entry.template_hash, writes[0].hash);
        assert_eq!(entry.resource_count, 1);

        let raw = std::fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap();
        assert!(raw.contains("\"templateFile\""));
        assert!(raw.contains("\"type\": \"aws:cloudformation:stack\""));
    }

    #[test]
    fn test_sn007_unchanged_on_resynth() {
        let dir = tempfile::tempdir().unwrap();
        write_assembly(dir.path(), &assembly("a"), None).unwrap();
        let again = write_assembly(dir.path(), &assembly("a"), None).unwrap();
        assert!(!again[0].changed);

        let changed = write_assembly(dir.path(), &assembly("b"), None).unwrap();
        assert!(changed[0].changed);
        assert_ne!(again[0].hash, changed[0].hash);
    }

    #[test]
    fn test_sn007_deleted_template_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        write_assembly(dir.path(), &assembly("a"), None).unwrap();
        std::fs::remove_file(dir.path().join("Web.template.json")).unwrap();
        let again = write_assembly(dir.path(), &assembly("a"), None).unwrap();
        assert!(again[0].changed);
        assert!(dir.path().join("Web.template.json").exists());
    }

    #[test]
    fn test_sn007_template_file_matches_hash() {
        let dir = tempfile::tempdir().unwrap();
        let writes = write_assembly(dir.path(), &assembly("a"), None).unwrap();
        let content = std::fs::read_to_string(&writes[0].path).unwrap();
        assert_eq!(
            crate::provenance::hasher::hash_string(&content),
            writes[0].hash
        );
        let parsed: Template = serde_json::from_str(&content).unwrap();
        assert!(parsed.resources.contains_key("Topic"));
    }

    #[test]
    fn test_sn007_previous_stacks_kept() {
        let dir = tempfile::tempdir().unwrap();
        write_assembly(dir.path(), &assembly("a"), None).unwrap();
        let mut other = assembly("a");
        let web = other.stacks.shift_remove("Web").unwrap();
        other.stacks.insert(
            "Site".to_string(),
            StackArtifact {
                name: "Site".to_string(),
                ..web
            },
        );
        write_assembly(dir.path(), &other, Some("Site")).unwrap();
        let manifest = load_manifest(dir.path()).unwrap().unwrap();
        assert!(manifest.artifacts.contains_key("Web"));
        assert!(manifest.artifacts.contains_key("Site"));
    }

    #[test]
    fn test_sn007_full_run_drops_removed_stack() {
        let dir = tempfile::tempdir().unwrap();
        let mut both = assembly("a");
        let web = both.stacks["Web"].clone();
        both.stacks.insert(
            "Site".to_string(),
            StackArtifact {
                name: "Site".to_string(),
                ..web
            },
        );
        write_assembly(dir.path(), &both, None).unwrap();
        assert!(dir.path().join("Site.template.json").exists());

        write_assembly(dir.path(), &assembly("a"), None).unwrap();
        let manifest = load_manifest(dir.path()).unwrap().unwrap();
        let names: Vec<&String> = manifest.artifacts.keys().collect();
        assert_eq!(names, vec!["Web"]);
        assert!(!dir.path().join("Site.template.json").exists());
        assert!(dir.path().join("Web.template.json").exists());
    }

    #[test]
    fn test_sn007_full_run_replaces_assets() {
        let dir = tempfile::tempdir().unwrap();
        write_assembly(dir.path(), &assembly_with_asset("a", "old"), None).unwrap();
        write_assembly(dir.path(), &assembly_with_asset("a", "new"), None).unwrap();
        let assets = load_asset_manifest(dir.path()).unwrap().unwrap();
        let ids: Vec<&String> = assets.docker_images.keys().collect();
        assert_eq!(ids, vec!["new"]);
    }

    #[test]
    fn test_sn007_filtered_run_without_assets_keeps_them() {
        let dir = tempfile::tempdir().unwrap();
        write_assembly(dir.path(), &assembly("a"), None).unwrap();
        let mut no_assets = assembly("a");
        no_assets.assets.clear();
        write_assembly(dir.path(), &no_assets, Some("Web")).unwrap();
        let assets = load_asset_manifest(dir.path()).unwrap().unwrap();
        assert!(assets.docker_images.contains_key("abc"));
    }

    #[test]
    fn test_sn007_creation_order_in_manifest() {
        let dir = tempfile::tempdir().unwrap();
        write_assembly(dir.path(), &assembly("a"), None).unwrap();
        let manifest = load_manifest(dir.path()).unwrap().unwrap();
        assert_eq!(manifest.artifacts["Web"].creation_order, vec!["Topic"]);
        let raw = std::fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap();
        assert!(raw.contains("\"creationOrder\""));
    }

    #[test]
    fn test_sn007_asset_manifest() {
        let dir = tempfile::tempdir().unwrap();
        write_assembly(dir.path(), &assembly("a"), None).unwrap();
        let assets = load_asset_manifest(dir.path()).unwrap().unwrap();
        assert_eq!(assets.docker_images.len(), 1);
        assert_eq!(assets.docker_images["abc"].repository, "repo");
        let raw = std::fs::read_to_string(dir.path().join(ASSETS_FILE)).unwrap();
        assert!(raw.contains("\"dockerImages\""));
    }

    #[test]
    fn test_sn007_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_manifest(dir.path()).unwrap().is_none());
        assert!(load_asset_manifest(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_sn007_corrupt_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "{ nope").unwrap();
        let err = write_assembly(dir.path(), &assembly("a"), None).unwrap_err();
        assert!(err.contains("invalid manifest"));
    }
}

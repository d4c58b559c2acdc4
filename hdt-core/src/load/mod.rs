use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::de::DeserializeOwned;

use crate::error::{LoadError, LoadErrors};
use crate::types::{
    ApiDescriptor, Catalog, HookDecls, RequestTemplate, ResponseDescriptor, VirtualHost,
};

const MANIFEST_STEMS: [&str; 3] = ["manifest.yaml", "manifest.yml", "manifest.json"];
const VHOST_STEMS: [&str; 3] = ["vhost.yaml", "vhost.yml", "vhost.json"];
const IGNORE_FILE: &str = ".hdtignore";

#[derive(Debug, Default)]
pub struct LoadedProject {
    pub catalog: Catalog,
    pub vhosts: Vec<VirtualHost>,
    pub descriptors: Vec<ApiDescriptor>,
}

#[derive(serde::Deserialize)]
struct ManifestFile {
    #[serde(default)]
    vars: Catalog,
}

#[derive(serde::Deserialize)]
struct DescriptorFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    descr: Option<String>,
    #[serde(default)]
    private: bool,
    #[serde(flatten)]
    request: RequestTemplate,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default)]
    consumes: Vec<String>,
    #[serde(default)]
    produces: Vec<String>,
    #[serde(flatten)]
    hooks: HookDecls,
    #[serde(default)]
    responses: BTreeMap<String, ResponseDescriptor>,
}

/// Load a descriptor root: the global manifest, one virtual host per
/// subdirectory, one API descriptor per remaining file. Errors accumulate
/// across the whole walk and are reported together.
pub fn load_dir(root: &Path) -> Result<LoadedProject, LoadErrors> {
    let mut errors = Vec::new();
    let mut project = LoadedProject::default();

    let ignore = match load_ignore(root) {
        Ok(ignore) => ignore,
        Err(e) => {
            errors.push(e);
            Vec::new()
        }
    };

    match find_file(root, &MANIFEST_STEMS) {
        Some(path) => match read_parse::<ManifestFile>(&path) {
            Ok(manifest) => project.catalog = manifest.vars,
            Err(e) => errors.push(e),
        },
        None => errors.push(LoadError::BadManifest {
            path: root.display().to_string(),
            message: "missing manifest.{yaml,yml,json}".to_string(),
        }),
    }

    let mut seen_names = BTreeSet::new();
    for dir in sorted_subdirs(root, &mut errors) {
        load_vhost_dir(root, &dir, &ignore, &mut project, &mut seen_names, &mut errors);
    }

    if errors.is_empty() {
        tracing::info!(
            vhosts = project.vhosts.len(),
            descriptors = project.descriptors.len(),
            vars = project.catalog.len(),
            "descriptor root loaded"
        );
        Ok(project)
    } else {
        Err(LoadErrors::new(errors))
    }
}

fn load_vhost_dir(
    root: &Path,
    dir: &Path,
    ignore: &[Pattern],
    project: &mut LoadedProject,
    seen_names: &mut BTreeSet<String>,
    errors: &mut Vec<LoadError>,
) {
    let vhost_name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let Some(vhost_path) = find_file(dir, &VHOST_STEMS) else {
        errors.push(LoadError::BadManifest {
            path: dir.display().to_string(),
            message: "missing vhost.{yaml,yml,json}".to_string(),
        });
        return;
    };
    match read_parse::<VirtualHost>(&vhost_path) {
        Ok(mut vhost) => {
            vhost.name = vhost_name.clone();
            project.vhosts.push(vhost);
        }
        Err(e) => errors.push(e),
    }

    let mut files = Vec::new();
    match fs::read_dir(dir) {
        Ok(entries) => {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_file() && is_descriptor_file(&path) {
                    files.push(path);
                }
            }
        }
        Err(e) => {
            errors.push(LoadError::Io {
                path: dir.display().to_string(),
                source: e,
            });
            return;
        }
    }
    files.sort();

    for path in files {
        let rel = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();
        if is_ignored(&rel, &path, ignore) {
            continue;
        }
        match read_parse::<DescriptorFile>(&path) {
            Ok(file) => match into_descriptor(file, &vhost_name, &path) {
                Ok(desc) => {
                    if !seen_names.insert(desc.name.clone()) {
                        errors.push(LoadError::DuplicateName(desc.name.clone()));
                    } else {
                        tracing::debug!(descriptor = %desc.name, file = %path.display(), "loaded");
                        project.descriptors.push(desc);
                    }
                }
                Err(e) => errors.push(e),
            },
            Err(e) => errors.push(e),
        }
    }
}

fn into_descriptor(
    file: DescriptorFile,
    vhost: &str,
    path: &Path,
) -> Result<ApiDescriptor, LoadError> {
    let base = file.name.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    let mut responses = BTreeMap::new();
    for (key, resp) in file.responses {
        let status: u16 = key.parse().map_err(|_| LoadError::BadManifest {
            path: path.display().to_string(),
            message: format!("response key {key:?} is not a status code"),
        })?;
        responses.insert(status, resp);
    }

    Ok(ApiDescriptor {
        name: format!("{vhost}/{base}"),
        vhost: vhost.to_string(),
        descr: file.descr,
        private: file.private,
        request: file.request,
        tags: file.tags,
        groups: file.groups,
        consumes: file.consumes,
        produces: file.produces,
        hooks: file.hooks,
        responses,
    })
}

fn load_ignore(root: &Path) -> Result<Vec<Pattern>, LoadError> {
    let path = root.join(IGNORE_FILE);
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(&path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut patterns = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let pattern = Pattern::new(line).map_err(|e| LoadError::BadIgnorePattern {
            path: path.display().to_string(),
            pattern: line.to_string(),
            message: e.to_string(),
        })?;
        patterns.push(pattern);
    }
    Ok(patterns)
}

fn is_ignored(rel: &str, path: &Path, ignore: &[Pattern]) -> bool {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    // Generated documents are never re-read as descriptors.
    if file_name.starts_with("swagger-") {
        return true;
    }
    ignore
        .iter()
        .any(|p| p.matches(rel) || p.matches(&file_name))
}

fn is_descriptor_file(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    if !matches!(ext, "yaml" | "yml" | "json") {
        return false;
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    !VHOST_STEMS.contains(&name.as_str()) && !MANIFEST_STEMS.contains(&name.as_str())
}

fn find_file(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    names.iter().map(|n| dir.join(n)).find(|p| p.is_file())
}

fn sorted_subdirs(root: &Path, errors: &mut Vec<LoadError>) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    match fs::read_dir(root) {
        Ok(entries) => {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    dirs.push(path);
                }
            }
        }
        Err(e) => errors.push(LoadError::Io {
            path: root.display().to_string(),
            source: e,
        }),
    }
    dirs.sort();
    dirs
}

fn read_parse<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let text = fs::read_to_string(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    if is_json {
        serde_json::from_str(&text).map_err(|e| LoadError::Json {
            path: path.display().to_string(),
            source: e,
        })
    } else {
        serde_yaml::from_str(&text).map_err(|e| LoadError::Yaml {
            path: path.display().to_string(),
            source: e,
        })
    }
}

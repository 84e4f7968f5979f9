use std::path::{Path, PathBuf};

use {
    anyhow::Context,
    tracing::{debug, info},
};

use crate::{env_overlay::apply_env_overlay, env_subst::substitute_env, schema::BeaconConfig};

/// Standard config file names, checked in order.
pub const CONFIG_FILENAMES: &[&str] = &["beacon.toml", "beacon.yaml", "beacon.yml", "beacon.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<BeaconConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path).with_context(|| format!("failed to parse {}", path.display()))
}

/// Load the effective configuration.
///
/// An explicit path must exist. Without one, the standard locations are
/// searched:
/// 1. `./beacon.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/beacon/beacon.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to defaults when nothing is found. Environment overrides are
/// applied last in every case.
pub fn discover_and_load(explicit: Option<&Path>) -> anyhow::Result<BeaconConfig> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => find_config_file(&search_dirs()),
    };

    let mut config = match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)?
        },
        None => {
            info!("no config file found, using defaults and environment");
            BeaconConfig::default()
        },
    };

    apply_env_overlay(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Find the first config file in `dirs`, in order.
pub fn find_config_file(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)))
        .find(|p| p.exists())
}

/// Returns the user-global config directory, `~/.config/beacon/`.
pub fn config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().join(".config").join("beacon"))
}

fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from(".")];
    dirs.extend(config_dir());
    dirs
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<BeaconConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_prefers_earlier_dir_and_name_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join("beacon.toml"), "").unwrap();
        std::fs::write(first.path().join("beacon.json"), "{}").unwrap();
        std::fs::write(first.path().join("beacon.yaml"), "{}").unwrap();

        let found = find_config_file(&[first.path().into(), second.path().into()]).unwrap();
        assert_eq!(found, first.path().join("beacon.yaml"));
    }

    #[test]
    fn test_find_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_config_file(&[dir.path().into()]).is_none());
    }

    #[test]
    fn test_load_each_format() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("beacon.toml");
        std::fs::write(&toml_path, "credentials = [\"t1\"]\n[server]\nport = 9000\n").unwrap();
        let cfg = load_config(&toml_path).unwrap();
        assert_eq!(cfg.credentials, vec!["t1"]);
        assert_eq!(cfg.server.port, 9000);

        let yaml_path = dir.path().join("beacon.yml");
        std::fs::write(&yaml_path, "presence:\n  status: idle\n").unwrap();
        assert_eq!(load_config(&yaml_path).unwrap().presence.status, "idle");

        let json_path = dir.path().join("beacon.json");
        std::fs::write(&json_path, r#"{"console":{"prefix":"!"}}"#).unwrap();
        assert_eq!(load_config(&json_path).unwrap().console.prefix, "!");
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon.ini");
        std::fs::write(&path, "x=1").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("unsupported config format"));
    }

    #[test]
    fn test_explicit_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_and_load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}

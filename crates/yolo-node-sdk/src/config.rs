use std::path::Path;

/// Load and deserialize a YAML config file.
pub fn load_config<C: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<C> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config '{}': {}", path.display(), e))?;
    let config: C = serde_yaml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse config '{}': {}", path.display(), e))?;
    Ok(config)
}

/// Load the config if the file exists, otherwise fall back to `C::default()`.
pub fn load_config_or_default<C>(path: &Path) -> anyhow::Result<C>
where
    C: serde::de::DeserializeOwned + Default,
{
    if path.exists() {
        load_config(path)
    } else {
        log::info!(
            "No config file at '{}', using defaults",
            path.display()
        );
        Ok(C::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    struct TestConfig {
        name: String,
        fps: u32,
    }

    #[test]
    fn test_load_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "name: front\nfps: 15\n").unwrap();
        let config: TestConfig = load_config(&path).unwrap();
        assert_eq!(config.name, "front");
        assert_eq!(config.fps, 15);
    }

    #[test]
    fn test_load_missing_file() {
        let result: anyhow::Result<TestConfig> = load_config(Path::new("/nonexistent.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "not: [valid: yaml: {{").unwrap();
        let result: anyhow::Result<TestConfig> = load_config(&path);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let config: TestConfig = load_config_or_default(&dir.path().join("absent.yaml")).unwrap();
        assert!(config.name.is_empty());
        assert_eq!(config.fps, 0);
    }
}

// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Read and deserialize a TOML config. No semantic validation; use
/// [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    load_from_str(&contents)
}

pub fn load_from_str(contents: &str) -> Result<RawConfigFile> {
    let config: RawConfigFile = toml::from_str(contents)?;
    Ok(config)
}

/// Load a config file and validate it:
///
/// - `[orchestrator]` knobs are in range,
/// - every `after` names another known goal,
/// - the goals form a DAG.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// `Goalweaver.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Goalweaver.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GoalweaverError;
    use std::io::Write;

    #[test]
    fn loads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [orchestrator]
            batch_size = 2

            [goal.a]
            title = "A"
            "#
        )
        .unwrap();

        let cfg = load_and_validate(file.path()).unwrap();
        assert_eq!(cfg.orchestrator.batch_size, 2);
        assert_eq!(cfg.orchestrator.max_idle_loops, 200);
        assert_eq!(cfg.goal["a"].title, "A");
    }

    #[test]
    fn missing_file_and_bad_toml_are_errors() {
        let err = load_and_validate("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, GoalweaverError::IoError(_)));

        let err = load_from_str("[orchestrator\nbatch_size = 1").unwrap_err();
        assert!(matches!(err, GoalweaverError::TomlError(_)));

        let err = load_from_str("[orchestrator]\nbogus = 1").unwrap_err();
        assert!(matches!(err, GoalweaverError::TomlError(_)));
    }
}

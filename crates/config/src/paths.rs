//! Filesystem locations used by tabletalk

use std::path::PathBuf;

/// Data directory (~/.tabletalk), falling back to ./.tabletalk without a home dir
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tabletalk")
}

/// Configuration file location
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Expand a leading `~/` against the home directory
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_is_inside_data_dir() {
        assert!(config_path().starts_with(data_dir()));
        assert!(config_path().ends_with("config.json"));
    }

    #[test]
    fn test_expand_home_leaves_relative_paths() {
        assert_eq!(expand_home("data/x.csv"), PathBuf::from("data/x.csv"));
        assert_eq!(expand_home("/abs/x.csv"), PathBuf::from("/abs/x.csv"));
    }

    #[test]
    fn test_expand_home_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/data.csv"), home.join("data.csv"));
            assert_eq!(expand_home("~"), home);
        }
    }
}

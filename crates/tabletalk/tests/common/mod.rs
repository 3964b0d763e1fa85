//! Common test utilities for tabletalk integration tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

pub const SAMPLE_CSV: &str = "\
date,description,category,amount
2024-01-03,Coffee shop,food,-4.5
2024-01-05,Paycheck,salary,3000
";

/// Isolated home directory with its own config and data
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub config_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let config_dir = temp_dir.path().join(".tabletalk");
        std::fs::create_dir_all(&config_dir)?;

        Ok(Self {
            temp_dir,
            config_dir,
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    pub fn csv_file(&self) -> PathBuf {
        self.temp_dir.path().join("transactions.csv")
    }

    /// Command with HOME pointed at the test environment and no TABLETALK_* leakage
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_tabletalk"));
        cmd.env("HOME", self.temp_dir.path());
        for key in [
            "TABLETALK_API_KEY",
            "TABLETALK_API_BASE",
            "TABLETALK_MODEL",
            "TABLETALK_CSV_PATH",
            "TABLETALK_PORT",
        ] {
            cmd.env_remove(key);
        }
        cmd
    }

    /// Write the sample CSV and a config pointing at it
    pub fn create_config(&self, api_key: &str) -> anyhow::Result<()> {
        std::fs::write(self.csv_file(), SAMPLE_CSV)?;

        let config = serde_json::json!({
            "provider": { "api_key": api_key },
            "database": {
                "csv_path": self.csv_file(),
                "table_name": "transactions"
            }
        });
        std::fs::write(self.config_file(), serde_json::to_string_pretty(&config)?)?;
        Ok(())
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}

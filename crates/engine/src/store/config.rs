use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(rename = "type")]
    pub db_type: DatabaseType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    Sqlite,
    Memory,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: DatabaseType::Sqlite,
            sqlite_path: Some(PathBuf::from("data/nodeflow.db")),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    pub fn memory() -> Self {
        Self {
            db_type: DatabaseType::Memory,
            sqlite_path: None,
            max_connections: 1,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.db_type == DatabaseType::Sqlite && self.sqlite_path.is_none() {
            return Err("SQLite path is required for SQLite database type".to_string());
        }
        if self.max_connections == 0 {
            return Err("max_connections must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(DatabaseConfig::default().validate().is_ok());
        assert!(DatabaseConfig::memory().validate().is_ok());

        let missing_path = DatabaseConfig {
            sqlite_path: None,
            ..DatabaseConfig::default()
        };
        assert!(missing_path.validate().is_err());
    }
}

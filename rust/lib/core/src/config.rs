use std::path::PathBuf;

/// Storage locations shared by every larder entry point.
///
/// Binaries read these from a config file, overlay command-line flags, then
/// pass them to storage initialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceConfig {
    /// Directory holding the database file.
    pub data_dir: Option<PathBuf>,

    /// Path to the SQLite database file.
    /// Defaults to `{data_dir}/larder.sqlite` if not specified.
    pub sqlite_path: Option<PathBuf>,
}

impl ServiceConfig {
    /// Overlay explicitly-set fields of `other` on top of `self`.
    pub fn merge(mut self, other: ServiceConfig) -> Self {
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir;
        }
        if other.sqlite_path.is_some() {
            self.sqlite_path = other.sqlite_path;
        }
        self
    }

    /// Resolve the SQLite database path, falling back to `{data_dir}/larder.sqlite`.
    pub fn resolve_sqlite_path(&self) -> PathBuf {
        self.sqlite_path
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("larder.sqlite"))
    }

    fn resolve_data_subpath(&self, name: &str) -> PathBuf {
        self.data_dir
            .as_ref()
            .map(|d| d.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_defaults() {
        let config = ServiceConfig {
            data_dir: Some(PathBuf::from("/data")),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_sqlite_path(),
            PathBuf::from("/data/larder.sqlite")
        );
        assert_eq!(
            ServiceConfig::default().resolve_sqlite_path(),
            PathBuf::from("larder.sqlite")
        );
    }

    #[test]
    fn test_merge_prefers_explicit_values() {
        let base = ServiceConfig {
            data_dir: Some(PathBuf::from("/data")),
            sqlite_path: Some(PathBuf::from("/data/old.sqlite")),
        };
        let merged = base.merge(ServiceConfig {
            data_dir: None,
            sqlite_path: Some(PathBuf::from("/tmp/new.sqlite")),
        });
        assert_eq!(merged.data_dir, Some(PathBuf::from("/data")));
        assert_eq!(merged.resolve_sqlite_path(), PathBuf::from("/tmp/new.sqlite"));
    }
}

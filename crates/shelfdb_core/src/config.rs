//! Connection configuration.

/// Configuration for a [`crate::ShelfDb`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Database name.
    pub name: String,

    /// Schema version to open at. `None` lets `initialize` pick the stored
    /// version and bump it when the declarations add something new.
    pub version: Option<u32>,

    /// Records returned by a condition query when no limit is given.
    pub query_limit: usize,

    /// Cursor steps a write scan takes before yielding to the runtime.
    pub batch_size: usize,

    /// Whether to sync the log on every commit (safer but slower).
    pub sync_on_commit: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "shelfdb".to_string(),
            version: None,
            query_limit: 30,
            batch_size: 100,
            sync_on_commit: true,
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the database name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Pins the schema version.
    #[must_use]
    pub const fn version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the default query limit.
    #[must_use]
    pub const fn query_limit(mut self, limit: usize) -> Self {
        self.query_limit = limit;
        self
    }

    /// Sets the write-scan chunk size.
    #[must_use]
    pub const fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets whether to sync the log on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.query_limit, 30);
        assert_eq!(config.batch_size, 100);
        assert!(config.version.is_none());
        assert!(config.sync_on_commit);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .name("telemetry")
            .version(3)
            .query_limit(10)
            .batch_size(7)
            .sync_on_commit(false);

        assert_eq!(config.name, "telemetry");
        assert_eq!(config.version, Some(3));
        assert_eq!(config.query_limit, 10);
        assert_eq!(config.batch_size, 7);
        assert!(!config.sync_on_commit);
    }
}

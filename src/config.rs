use std::path::{Path, PathBuf};

/// Progress update interval (tick every N top-level elements)
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Buffer size for each CSV sink
pub const CSV_BUFFER_SIZE: usize = 128 * 1024;

/// Leading digits of a postal code inside the dataset's area
pub const DEFAULT_LOCALITY_PREFIX: &str = "947";

pub const NODES_FILE: &str = "nodes.csv";
pub const NODE_TAGS_FILE: &str = "nodes_tags.csv";
pub const WAYS_FILE: &str = "ways.csv";
pub const WAY_NODES_FILE: &str = "ways_nodes.csv";
pub const WAY_TAGS_FILE: &str = "ways_tags.csv";

/// What the driver does when a shaped element fails schema validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FailurePolicy {
    /// Stop the whole run on the first invalid element
    #[default]
    Abort,
    /// Log the offending element and continue with the next one
    SkipAndLog,
}

/// One destination file per record kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub nodes: PathBuf,
    pub node_tags: PathBuf,
    pub ways: PathBuf,
    pub way_nodes: PathBuf,
    pub way_tags: PathBuf,
}

impl OutputPaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            nodes: dir.join(NODES_FILE),
            node_tags: dir.join(NODE_TAGS_FILE),
            ways: dir.join(WAYS_FILE),
            way_nodes: dir.join(WAY_NODES_FILE),
            way_tags: dir.join(WAY_TAGS_FILE),
        }
    }

    pub fn all(&self) -> [&Path; 5] {
        [
            &self.nodes,
            &self.node_tags,
            &self.ways,
            &self.way_nodes,
            &self.way_tags,
        ]
    }
}

/// Everything a single pipeline run needs to know.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub outputs: OutputPaths,
    pub validate: bool,
    /// Replaces the embedded schema when set
    pub schema_path: Option<PathBuf>,
    pub on_validation_failure: FailurePolicy,
    pub clean_postcodes: bool,
    pub strip_street_periods: bool,
    pub limit: Option<u64>,
    pub dry_run: bool,
}

impl PipelineConfig {
    pub fn new(input: impl Into<PathBuf>, output_dir: impl AsRef<Path>) -> Self {
        Self {
            input: input.into(),
            outputs: OutputPaths::in_dir(output_dir),
            validate: false,
            schema_path: None,
            on_validation_failure: FailurePolicy::Abort,
            clean_postcodes: false,
            strip_street_periods: false,
            limit: None,
            dry_run: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_paths_use_default_file_names() {
        let paths = OutputPaths::in_dir("/out");
        assert_eq!(paths.nodes, PathBuf::from("/out/nodes.csv"));
        assert_eq!(paths.node_tags, PathBuf::from("/out/nodes_tags.csv"));
        assert_eq!(paths.ways, PathBuf::from("/out/ways.csv"));
        assert_eq!(paths.way_nodes, PathBuf::from("/out/ways_nodes.csv"));
        assert_eq!(paths.way_tags, PathBuf::from("/out/ways_tags.csv"));
    }

    #[test]
    fn defaults_match_documented_options() {
        let config = PipelineConfig::new("map.osm", "out");
        assert!(!config.validate);
        assert!(!config.clean_postcodes);
        assert_eq!(config.on_validation_failure, FailurePolicy::Abort);
    }
}

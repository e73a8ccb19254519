/// Counters collected over one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub elements_seen: u64,
    pub nodes: u64,
    pub ways: u64,
    pub node_tags: u64,
    pub way_tags: u64,
    pub way_nodes: u64,
    pub dropped_tags: u64,
    pub skipped_invalid: u64,
    pub streets_cleaned: u64,
    pub postcodes_cleaned: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn primary_records(&self) -> u64 {
        self.nodes + self.ways
    }

    pub fn tag_records(&self) -> u64 {
        self.node_tags + self.way_tags
    }

    pub fn total_records(&self) -> u64 {
        self.primary_records() + self.tag_records() + self.way_nodes
    }

    /// Prints the end-of-run table shown by the CLI.
    pub fn print_summary(&self) {
        println!("Elements read:      {}", self.elements_seen);
        println!("Nodes written:      {}", self.nodes);
        println!("Node tags written:  {}", self.node_tags);
        println!("Ways written:       {}", self.ways);
        println!("Way nodes written:  {}", self.way_nodes);
        println!("Way tags written:   {}", self.way_tags);
        println!("Tags dropped:       {}", self.dropped_tags);
        println!("Invalid skipped:    {}", self.skipped_invalid);
        println!("Streets cleaned:    {}", self.streets_cleaned);
        println!("Postcodes cleaned:  {}", self.postcodes_cleaned);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_zero() {
        let stats = PipelineStats::new();
        assert_eq!(stats.total_records(), 0);
        assert_eq!(stats.dropped_tags, 0);
        assert_eq!(stats.skipped_invalid, 0);
    }

    #[test]
    fn totals_add_up() {
        let stats = PipelineStats {
            nodes: 3,
            ways: 2,
            node_tags: 4,
            way_tags: 5,
            way_nodes: 7,
            ..PipelineStats::default()
        };
        assert_eq!(stats.primary_records(), 5);
        assert_eq!(stats.tag_records(), 9);
        assert_eq!(stats.total_records(), 21);
    }
}

use crate::classify::{classify, split_namespace, KeyClass};
use crate::error::ShapeError;
use crate::models::{NodeRecord, RawElement, ShapedElement, TagRecord, WayNodeRecord, WayRecord};
use crate::normalize::{Cleaned, ValueNormalizer};
use crate::stats::PipelineStats;
use tracing::debug;

pub const DEFAULT_TAG_TYPE: &str = "regular";

/// Turns one top-level `<node>` or `<way>` into its table records.
#[derive(Debug, Clone, Default)]
pub struct ElementShaper {
    normalizer: ValueNormalizer,
}

impl ElementShaper {
    pub fn new(normalizer: ValueNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn shape(&self, element: &RawElement) -> Result<ShapedElement, ShapeError> {
        self.shape_counted(element, &mut PipelineStats::default())
    }

    /// Same as [`shape`](Self::shape), also tallying dropped tags and cleaned values.
    pub fn shape_counted(
        &self,
        element: &RawElement,
        stats: &mut PipelineStats,
    ) -> Result<ShapedElement, ShapeError> {
        let id = element.attr("id").map(str::to_string);

        match element.name.as_str() {
            "node" => {
                let node = NodeRecord {
                    id: id.clone(),
                    lat: owned_attr(element, "lat"),
                    lon: owned_attr(element, "lon"),
                    user: owned_attr(element, "user"),
                    uid: owned_attr(element, "uid"),
                    version: owned_attr(element, "version"),
                    changeset: owned_attr(element, "changeset"),
                    timestamp: owned_attr(element, "timestamp"),
                };
                let tags = self.shape_tags(element, &id, stats);
                Ok(ShapedElement::Node { node, tags })
            }
            "way" => {
                let way = WayRecord {
                    id: id.clone(),
                    user: owned_attr(element, "user"),
                    uid: owned_attr(element, "uid"),
                    version: owned_attr(element, "version"),
                    changeset: owned_attr(element, "changeset"),
                    timestamp: owned_attr(element, "timestamp"),
                };
                let nodes = element
                    .children_named("nd")
                    .enumerate()
                    .map(|(position, nd)| WayNodeRecord {
                        id: id.clone(),
                        node_id: owned_attr(nd, "ref"),
                        position,
                    })
                    .collect();
                let tags = self.shape_tags(element, &id, stats);
                Ok(ShapedElement::Way { way, nodes, tags })
            }
            other => Err(ShapeError::Unsupported(other.to_string())),
        }
    }

    fn shape_tags(
        &self,
        element: &RawElement,
        id: &Option<String>,
        stats: &mut PipelineStats,
    ) -> Vec<TagRecord> {
        let mut tags = Vec::new();

        for child in element.children_named("tag") {
            let raw_key = child.attr("k").unwrap_or_default();
            if classify(raw_key) == KeyClass::Problem {
                debug!(id = id.as_deref(), key = raw_key, "Dropping tag with problem characters");
                stats.dropped_tags += 1;
                continue;
            }

            let (tag_type, key) = split_namespace(raw_key).unwrap_or((DEFAULT_TAG_TYPE, raw_key));
            let value = child.attr("v").map(|v| {
                let (value, rule) = self.normalizer.apply(tag_type, key, v);
                match rule {
                    Cleaned::Street => stats.streets_cleaned += 1,
                    Cleaned::Postcode => stats.postcodes_cleaned += 1,
                    Cleaned::Unchanged => {}
                }
                value
            });

            tags.push(TagRecord {
                id: id.clone(),
                key: key.to_string(),
                value,
                tag_type: tag_type.to_string(),
            });
        }

        tags
    }
}

fn owned_attr(element: &RawElement, key: &str) -> Option<String> {
    element.attr(key).map(str::to_string)
}

use crate::config::{OutputPaths, CSV_BUFFER_SIZE};
use crate::models::{RecordKind, ShapedElement};
use anyhow::{Context, Result};
use csv::{Writer, WriterBuilder};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Append-only destination for shaped elements.
pub trait RecordSink {
    fn write(&mut self, shaped: &ShapedElement) -> Result<()>;

    /// Called once on every exit path of a run, including aborts.
    fn flush(&mut self) -> Result<()>;
}

/// Five CSV tables, one per record kind, each with a fixed header row.
pub struct CsvSinks<W: Write> {
    nodes: Writer<W>,
    node_tags: Writer<W>,
    ways: Writer<W>,
    way_nodes: Writer<W>,
    way_tags: Writer<W>,
}

impl CsvSinks<BufWriter<File>> {
    pub fn create(paths: &OutputPaths) -> Result<Self> {
        Self::from_writers(
            open_file(&paths.nodes)?,
            open_file(&paths.node_tags)?,
            open_file(&paths.ways)?,
            open_file(&paths.way_nodes)?,
            open_file(&paths.way_tags)?,
        )
    }
}

fn open_file(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    Ok(BufWriter::with_capacity(CSV_BUFFER_SIZE, file))
}

impl<W: Write> CsvSinks<W> {
    pub fn from_writers(nodes: W, node_tags: W, ways: W, way_nodes: W, way_tags: W) -> Result<Self> {
        Ok(Self {
            nodes: table(nodes, RecordKind::Node)?,
            node_tags: table(node_tags, RecordKind::NodeTags)?,
            ways: table(ways, RecordKind::Way)?,
            way_nodes: table(way_nodes, RecordKind::WayNodes)?,
            way_tags: table(way_tags, RecordKind::WayTags)?,
        })
    }

    /// Flushes and hands back the underlying writers in table order.
    pub fn into_inner(self) -> Result<[W; 5]> {
        let finish = |w: Writer<W>, kind: RecordKind| {
            w.into_inner()
                .map_err(|e| anyhow::anyhow!("Failed to flush {} table: {}", kind, e.error()))
        };
        Ok([
            finish(self.nodes, RecordKind::Node)?,
            finish(self.node_tags, RecordKind::NodeTags)?,
            finish(self.ways, RecordKind::Way)?,
            finish(self.way_nodes, RecordKind::WayNodes)?,
            finish(self.way_tags, RecordKind::WayTags)?,
        ])
    }
}

fn table<W: Write>(inner: W, kind: RecordKind) -> Result<Writer<W>> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(inner);
    writer
        .write_record(kind.fields())
        .with_context(|| format!("Failed to write {} header", kind))?;
    Ok(writer)
}

fn write_rows<W: Write, T: Serialize>(
    writer: &mut Writer<W>,
    kind: RecordKind,
    rows: impl IntoIterator<Item = T>,
) -> Result<()> {
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write {} row", kind))?;
    }
    Ok(())
}

impl<W: Write> RecordSink for CsvSinks<W> {
    fn write(&mut self, shaped: &ShapedElement) -> Result<()> {
        match shaped {
            ShapedElement::Node { node, tags } => {
                write_rows(&mut self.nodes, RecordKind::Node, [node])?;
                write_rows(&mut self.node_tags, RecordKind::NodeTags, tags)?;
            }
            ShapedElement::Way { way, nodes, tags } => {
                write_rows(&mut self.ways, RecordKind::Way, [way])?;
                write_rows(&mut self.way_nodes, RecordKind::WayNodes, nodes)?;
                write_rows(&mut self.way_tags, RecordKind::WayTags, tags)?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for (writer, kind) in [
            (&mut self.nodes, RecordKind::Node),
            (&mut self.node_tags, RecordKind::NodeTags),
            (&mut self.ways, RecordKind::Way),
            (&mut self.way_nodes, RecordKind::WayNodes),
            (&mut self.way_tags, RecordKind::WayTags),
        ] {
            writer
                .flush()
                .with_context(|| format!("Failed to flush {} table", kind))?;
        }
        Ok(())
    }
}

/// Discards everything; used for dry runs.
#[derive(Debug, Default)]
pub struct NullSink;

impl RecordSink for NullSink {
    fn write(&mut self, _shaped: &ShapedElement) -> Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeRecord, TagRecord, WayNodeRecord, WayRecord};
    use tempfile::TempDir;

    fn tables(sinks: CsvSinks<Vec<u8>>) -> Vec<String> {
        sinks
            .into_inner()
            .unwrap()
            .into_iter()
            .map(|bytes| String::from_utf8(bytes).unwrap())
            .collect()
    }

    fn memory_sinks() -> CsvSinks<Vec<u8>> {
        CsvSinks::from_writers(Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new()).unwrap()
    }

    #[test]
    fn headers_are_written_up_front() {
        let out = tables(memory_sinks());
        assert_eq!(out[0], "id,lat,lon,user,uid,version,changeset,timestamp\n");
        assert_eq!(out[1], "id,key,value,type\n");
        assert_eq!(out[2], "id,user,uid,version,changeset,timestamp\n");
        assert_eq!(out[3], "id,node_id,position\n");
        assert_eq!(out[4], "id,key,value,type\n");
    }

    #[test]
    fn rows_land_in_matching_tables() {
        let mut sinks = memory_sinks();
        sinks
            .write(&ShapedElement::Node {
                node: NodeRecord {
                    id: Some("1".to_string()),
                    lat: Some("37.8".to_string()),
                    ..NodeRecord::default()
                },
                tags: vec![TagRecord {
                    id: Some("1".to_string()),
                    key: "name".to_string(),
                    value: Some("Cafe, \"Strada\"".to_string()),
                    tag_type: "regular".to_string(),
                }],
            })
            .unwrap();
        sinks
            .write(&ShapedElement::Way {
                way: WayRecord {
                    id: Some("2".to_string()),
                    ..WayRecord::default()
                },
                nodes: vec![WayNodeRecord {
                    id: Some("2".to_string()),
                    node_id: Some("1".to_string()),
                    position: 0,
                }],
                tags: vec![],
            })
            .unwrap();
        sinks.flush().unwrap();

        let out = tables(sinks);
        assert_eq!(out[0].lines().nth(1), Some("1,37.8,,,,,,"));
        assert_eq!(
            out[1].lines().nth(1),
            Some("1,name,\"Cafe, \"\"Strada\"\"\",regular")
        );
        assert_eq!(out[2].lines().nth(1), Some("2,,,,,"));
        assert_eq!(out[3].lines().nth(1), Some("2,1,0"));
        assert_eq!(out[4].lines().count(), 1);
    }

    #[test]
    fn create_makes_missing_directories() {
        let dir = TempDir::new().unwrap();
        let paths = OutputPaths::in_dir(dir.path().join("nested/out"));
        let mut sinks = CsvSinks::create(&paths).unwrap();
        sinks.flush().unwrap();
        for path in paths.all() {
            assert!(path.exists(), "{} should exist", path.display());
        }
    }
}

use crate::config::{FailurePolicy, PipelineConfig, PROGRESS_INTERVAL};
use crate::error::MalformedInputError;
use crate::models::{RawElement, ShapedElement};
use crate::normalize::{StreetNormalizer, ValueNormalizer};
use crate::parser::ElementReader;
use crate::schema::{self, Schema};
use crate::shape::ElementShaper;
use crate::sink::{CsvSinks, NullSink, RecordSink};
use crate::stats::PipelineStats;
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use tracing::{debug, info, warn};

/// Top-level elements the pipeline turns into records
pub const SHAPED_ELEMENTS: &[&str] = &["node", "way"];

/// Shapes, optionally validates, and writes one element at a time.
pub struct Driver {
    shaper: ElementShaper,
    schema: Option<Schema>,
    policy: FailurePolicy,
    limit: Option<u64>,
    progress: ProgressBar,
}

impl Driver {
    pub fn new(shaper: ElementShaper) -> Self {
        Self {
            shaper,
            schema: None,
            policy: FailurePolicy::Abort,
            limit: None,
            progress: ProgressBar::new_spinner(),
        }
    }

    pub fn with_schema(mut self, schema: Schema, policy: FailurePolicy) -> Self {
        self.schema = Some(schema);
        self.policy = policy;
        self
    }

    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    /// Replaces the default spinner, e.g. with `ProgressBar::hidden()`.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let streets = StreetNormalizer::default().with_period_stripping(config.strip_street_periods);
        let shaper = ElementShaper::new(ValueNormalizer::new(streets, config.clean_postcodes));
        let mut driver = Self::new(shaper).with_limit(config.limit);

        if config.validate {
            let schema = match &config.schema_path {
                Some(path) => Schema::from_path(path)?,
                None => Schema::embedded().context("Embedded schema is invalid")?,
            };
            driver = driver.with_schema(schema, config.on_validation_failure);
        }

        Ok(driver)
    }

    /// Drains `elements` into `sink`. The sink is flushed whether or not the run succeeds.
    pub fn run<I, S>(&self, elements: I, sink: &mut S) -> Result<PipelineStats>
    where
        I: IntoIterator<Item = Result<RawElement, MalformedInputError>>,
        S: RecordSink + ?Sized,
    {
        let outcome = self.drive(elements, sink);
        self.progress.finish_and_clear();
        let flushed = sink.flush();
        let stats = outcome?;
        flushed?;
        Ok(stats)
    }

    fn drive<I, S>(&self, elements: I, sink: &mut S) -> Result<PipelineStats>
    where
        I: IntoIterator<Item = Result<RawElement, MalformedInputError>>,
        S: RecordSink + ?Sized,
    {
        let mut stats = PipelineStats::new();

        for element in elements {
            if self.limit.is_some_and(|limit| stats.elements_seen >= limit) {
                info!(limit = self.limit, "Element limit reached");
                break;
            }

            let element = element.with_context(|| {
                format!(
                    "Input is not well-formed after {} elements",
                    stats.elements_seen
                )
            })?;
            stats.elements_seen += 1;

            if stats.elements_seen % PROGRESS_INTERVAL == 0 {
                self.progress.set_position(stats.elements_seen);
            }

            if !SHAPED_ELEMENTS.contains(&element.name.as_str()) {
                debug!(name = element.name.as_str(), "Skipping element");
                continue;
            }

            let shaped = self.shaper.shape_counted(&element, &mut stats)?;

            if let Some(schema) = &self.schema {
                if let Err(e) = schema::validate(&shaped, schema) {
                    match self.policy {
                        FailurePolicy::Abort => {
                            return Err(anyhow::Error::new(e).context(format!(
                                "Validation failed for {} {}",
                                shaped.primary_kind(),
                                shaped.id().unwrap_or("<no id>")
                            )));
                        }
                        FailurePolicy::SkipAndLog => {
                            warn!(
                                id = shaped.id(),
                                kind = %shaped.primary_kind(),
                                error = %e,
                                "Skipping element that failed validation"
                            );
                            stats.skipped_invalid += 1;
                            continue;
                        }
                    }
                }
            }

            sink.write(&shaped)?;
            count_written(&shaped, &mut stats);
        }

        Ok(stats)
    }
}

fn count_written(shaped: &ShapedElement, stats: &mut PipelineStats) {
    match shaped {
        ShapedElement::Node { tags, .. } => {
            stats.nodes += 1;
            stats.node_tags += tags.len() as u64;
        }
        ShapedElement::Way { nodes, tags, .. } => {
            stats.ways += 1;
            stats.way_nodes += nodes.len() as u64;
            stats.way_tags += tags.len() as u64;
        }
    }
}

/// Runs the whole pipeline for `config`: input file to the five CSV tables.
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineStats> {
    let driver = Driver::from_config(config)?;
    let reader = ElementReader::open(&config.input, SHAPED_ELEMENTS)?;

    info!(
        input = %config.input.display(),
        validate = config.validate,
        clean_postcodes = config.clean_postcodes,
        "Processing map"
    );

    let stats = if config.dry_run {
        driver.run(reader, &mut NullSink)?
    } else {
        let mut sinks = CsvSinks::create(&config.outputs)?;
        driver.run(reader, &mut sinks)?
    };

    info!(
        nodes = stats.nodes,
        ways = stats.ways,
        tags = stats.tag_records(),
        way_nodes = stats.way_nodes,
        dropped_tags = stats.dropped_tags,
        skipped = stats.skipped_invalid,
        "Pipeline complete"
    );

    Ok(stats)
}

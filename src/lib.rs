//! osm-etl: OpenStreetMap XML extract to relational CSV pipeline
//!
//! This crate streams an OSM XML extract and flattens it into five CSV tables
//! ready for a relational load:
//!
//! 1. **Parse** -- Stream top-level `node` and `way` elements, one subtree at a
//!    time, from plain or bzip2-compressed XML
//! 2. **Shape** -- Turn each element into a primary record plus its tag rows
//!    (and, for ways, ordered node references), dropping tags whose keys carry
//!    problem characters and cleaning street suffixes on the way
//! 3. **Validate** (optional) -- Check every record against a declarative schema
//!    and either abort or skip-and-log on failure
//! 4. **Write** -- Append rows to the nodes, node tags, ways, way nodes and way
//!    tags tables, each with a fixed header row
//!
//! A separate **audit** pass reads the same stream and reports data-quality
//! findings (element counts, tag key shapes, odd postcodes and street suffixes,
//! distinct contributors) without writing anything.
//!
//! # Architecture
//!
//! - **Bounded memory** -- Only the current top-level element is held; its
//!   subtree is dropped as soon as it is written
//! - **Pure stages** -- Classification, normalization and shaping are plain
//!   functions over one element; the driver owns the sink and the counters
//! - **Fail fast or skip** -- Malformed XML always aborts; validation failures
//!   follow the configured [`config::FailurePolicy`]
//! - **Flush on every exit** -- Sinks are flushed before an error propagates
//!
//! # Key Modules
//!
//! - [`parser`] -- Streaming XML reader with BZ2 decompression
//! - [`classify`] -- Tag key shape classes and namespace splitting
//! - [`normalize`] -- Street suffix and postcode cleaning
//! - [`shape`] -- Element to record shaping
//! - [`schema`] -- Declarative record validation
//! - [`sink`] -- CSV table writers
//! - [`pipeline`] -- Stream driver tying the stages together
//! - [`audit`] -- Data-quality reports
//! - [`models`] -- Raw elements, records and record kinds
//! - [`stats`] -- Per-run counters
//! - [`config`] -- Constants and run configuration
//! - [`error`] -- Typed errors for each stage
//!
//! # Example Usage
//!
//! ```bash
//! # Convert an extract, validating every record
//! osm-etl process -i berkeley.osm -o out/ --validate
//!
//! # Skip invalid elements instead of aborting, and truncate ZIP+4 codes
//! osm-etl process -i berkeley.osm.bz2 -o out/ --validate \
//!     --on-validation-failure skip-and-log --clean-postcodes
//!
//! # Report data-quality findings
//! osm-etl audit -i berkeley.osm
//! ```

pub mod audit;
pub mod classify;
pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod schema;
pub mod shape;
pub mod sink;
pub mod stats;

pub mod artifact;
pub mod build;
pub mod config;
pub mod errors;
pub mod glob;
pub mod pattern;
pub mod placeholder;
pub mod provenance;
pub mod query;
pub mod spec;

pub use artifact::{Dependency, DownloadableArtifact, PatternType};
pub use build::{BuildNumber, BuildRef};
pub use config::ResolverConfig;
pub use errors::{ChecksumAlgorithm, Error};
pub use glob::{IncludeExcludePatterns, path_conflicts};
pub use pattern::{PathTriple, SearchPattern, TripleSet};
pub use placeholder::{apply_target, pattern_to_regex, replace_placeholders};
pub use provenance::{BuildManifest, SearchResultEntry, SearchResults, filter_by_build};
pub use query::{FindQuery, QueryTree, Sort, SortOrder, compile};
pub use spec::{DownloadSpec, FileSpec, SpecType};

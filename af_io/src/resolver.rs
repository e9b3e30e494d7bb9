//! From download spec to local files.

use std::sync::Arc;

use tracing::{debug, info, warn};

use af_core::{
    BuildManifest, BuildRef, Dependency, DownloadSpec, DownloadableArtifact, Error, FileSpec,
    FindQuery, ResolverConfig, SearchResultEntry, apply_target, filter_by_build,
};

use crate::downloader::Downloader;
use crate::progress::ProgressCallback;
use crate::repository::{HttpRepository, Repository};
use crate::traits::{HttpClient, ReqwestHttpClient};

/// A build whose number is known.
#[derive(Clone, Debug, PartialEq, Eq)]
struct ResolvedBuild {
    name: String,
    number: String,
}

pub struct Resolver {
    config: Arc<ResolverConfig>,
    repository: Arc<dyn Repository>,
    downloader: Downloader,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Self {
        let client: Arc<dyn HttpClient> =
            Arc::new(ReqwestHttpClient::with_user_agent(config.user_agent()));
        let repository = Arc::new(HttpRepository::new(client.clone(), config.base_url()));
        Self::with_parts(Arc::new(config), client, repository)
    }

    pub fn with_parts(
        config: Arc<ResolverConfig>,
        client: Arc<dyn HttpClient>,
        repository: Arc<dyn Repository>,
    ) -> Self {
        Self {
            downloader: Downloader::new(client, config.clone()),
            config,
            repository,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.downloader = self.downloader.with_progress(progress);
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve every entry of `spec` and download the results.
    pub async fn download(&self, spec: &DownloadSpec) -> Result<Vec<Dependency>, Error> {
        spec.validate()?;

        let mut artifacts = Vec::new();
        for file in &spec.files {
            artifacts.extend(self.artifacts(file).await?);
        }
        info!(count = artifacts.len(), "Resolved artifacts");

        self.downloader.download_all(&artifacts).await
    }

    /// The downloadable artifacts of one spec entry, with their targets.
    pub async fn artifacts(&self, file: &FileSpec) -> Result<Vec<DownloadableArtifact>, Error> {
        let results = self.search(file).await?;
        let mut artifacts: Vec<DownloadableArtifact> = results
            .iter()
            .map(|entry| {
                DownloadableArtifact::from_search_result(self.config.base_url(), entry, "")
                    .with_flat(file.is_flat())
                    .with_explode(file.is_explode())
                    .with_pattern_type(file.pattern_type())
            })
            .collect();

        let placeholder_source = file.pattern.as_deref().unwrap_or("*");
        apply_target(&mut artifacts, placeholder_source, &file.target)?;
        Ok(artifacts)
    }

    /// Search for the items of one spec entry, narrowed to its build if it
    /// has one.
    pub async fn search(&self, file: &FileSpec) -> Result<Vec<SearchResultEntry>, Error> {
        file.validate()?;
        let build = match file.build() {
            Some(raw) => self.resolve_build(raw).await?,
            None => None,
        };

        if let Some(criteria) = file.criteria()? {
            let results = self.repository.search(&file.find_query(criteria)).await?;
            return self.narrow_to_build(results, build.as_ref()).await;
        }

        let Some(build) = build else {
            return Ok(Vec::new());
        };
        let criteria = af_core::query::build_criteria(&build.name, &build.number);
        let results = self.repository.search(&file.find_query(criteria)).await?;
        // The build's own artifacts are its manifest.
        let manifest = BuildManifest::from_results(&results);
        Ok(filter_by_build(results, &manifest, &build.name, &build.number))
    }

    async fn narrow_to_build(
        &self,
        results: Vec<SearchResultEntry>,
        build: Option<&ResolvedBuild>,
    ) -> Result<Vec<SearchResultEntry>, Error> {
        let Some(build) = build else {
            return Ok(results);
        };
        let manifest_results = self
            .repository
            .search(&FindQuery::build_manifest(&build.name, &build.number))
            .await?;
        let manifest = BuildManifest::from_results(&manifest_results);
        debug!(build = %build.name, number = %build.number, checksums = manifest.len(), "Loaded build manifest");
        Ok(filter_by_build(results, &manifest, &build.name, &build.number))
    }

    /// Parse `raw` and look up symbolic build numbers. A build that cannot be
    /// found is logged and ignored.
    async fn resolve_build(&self, raw: &str) -> Result<Option<ResolvedBuild>, Error> {
        let build = BuildRef::parse(raw)?;
        if !build.number.is_symbolic() {
            return Ok(Some(ResolvedBuild {
                name: build.name,
                number: build.number.to_string(),
            }));
        }

        match self
            .repository
            .latest_build_number(&build.name, &build.number)
            .await?
        {
            Some(number) => {
                debug!(build = %build.name, number = %number, "Resolved {}", build.number);
                Ok(Some(ResolvedBuild {
                    name: build.name,
                    number,
                }))
            }
            None => {
                warn!("{}", build.not_found_message());
                Ok(None)
            }
        }
    }
}

use crate::app::fetch::{AnnotationJobFetcher, PolledJobFetcher};
use crate::app::ports::{AnnotationService, JobService, SourceFetcher};
use crate::config::Config;
use crate::constants;
use crate::error::Result;
use crate::infra::{GeneMarkFormService, JobKeyService, ProdigalRunner, RastService};
use crate::parser::{parser_for, GeneParser};
use crate::types::SourceKind;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Maps each source to how it is queried and how its output is read. Built
/// once from a `Config`; fetchers can be swapped out before a run starts.
pub struct SourceRegistry {
    fetchers: HashMap<SourceKind, std::result::Result<Arc<dyn SourceFetcher>, String>>,
    parsers: HashMap<SourceKind, Arc<dyn GeneParser>>,
    annotation_delay: Duration,
    annotation_job: Option<String>,
}

impl SourceRegistry {
    /// Every parser and no fetchers. Sources fail with a configuration error
    /// until a fetcher is supplied.
    pub fn empty() -> Self {
        let parsers = SourceKind::ALL
            .iter()
            .map(|kind| (*kind, Arc::<dyn GeneParser>::from(parser_for(*kind))))
            .collect();
        Self {
            fetchers: HashMap::new(),
            parsers,
            annotation_delay: Duration::from_millis(constants::ANNOTATION_POLL_DELAY_MS),
            annotation_job: None,
        }
    }

    /// Registry wired to the public services named in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(constants::USER_AGENT)
            .build()?;
        let mut registry = Self::empty();
        registry.annotation_delay = config.annotation_poll_delay();
        registry.annotation_job = config.rast.job_id.clone();
        let delay = config.job_poll_delay();
        let endpoints = &config.endpoints;

        registry.fetchers.insert(
            SourceKind::Glimmer,
            Ok(polled(Arc::new(JobKeyService::glimmer(client.clone(), &endpoints.glimmer)), delay)),
        );
        registry.fetchers.insert(
            SourceKind::GeneMark,
            Ok(polled(Arc::new(JobKeyService::genemark(client.clone(), &endpoints.genemark)), delay)),
        );

        let forms = [
            (SourceKind::GeneMarkHmm, &endpoints.genemark_hmm),
            (SourceKind::GeneMarkS, &endpoints.genemark_s),
            (SourceKind::GeneMarkHeuristic, &endpoints.genemark_heuristic),
            (SourceKind::GeneMarkS2, &endpoints.genemark_s2),
        ];
        for (kind, url) in forms {
            let entry = GeneMarkFormService::for_source(
                client.clone(),
                kind,
                url.as_str(),
                endpoints.genemark_files.as_str(),
                config.species.as_deref(),
            )
            .map(|service| polled(Arc::new(service), delay))
            .map_err(|e| e.to_string());
            if let Err(reason) = &entry {
                if config.is_enabled(kind) {
                    warn!("{} cannot be queried: {}", kind, reason);
                }
            }
            registry.fetchers.insert(kind, entry);
        }

        registry.fetchers.insert(
            SourceKind::Prodigal,
            Ok(Arc::new(ProdigalRunner::new(config.prodigal.executable.clone()))),
        );

        match (&config.rast.username, &config.rast.password) {
            (Some(username), Some(password)) => {
                let service = RastService::new(client.clone(), endpoints.rast.as_str(), username, password);
                registry = registry.with_annotation_service(Arc::new(service));
            }
            _ if config.is_enabled(SourceKind::Rast) => {
                warn!("{} cannot be queried: no RAST credentials (set RAST_USERNAME and RAST_PASSWORD)", SourceKind::Rast);
            }
            _ => {}
        }
        debug!("registry built with {} fetchers", registry.fetchers.len());
        Ok(registry)
    }

    pub fn with_fetcher(mut self, kind: SourceKind, fetcher: Arc<dyn SourceFetcher>) -> Self {
        self.fetchers.insert(kind, Ok(fetcher));
        self
    }

    /// Enables RAST through a caller-provided annotation service.
    pub fn with_annotation_service(self, service: Arc<dyn AnnotationService>) -> Self {
        let fetcher = AnnotationJobFetcher::new(service, self.annotation_delay, self.annotation_job.clone());
        self.with_fetcher(SourceKind::Rast, Arc::new(fetcher))
    }

    pub fn fetcher(&self, kind: SourceKind) -> std::result::Result<Arc<dyn SourceFetcher>, String> {
        match self.fetchers.get(&kind) {
            Some(entry) => entry.clone(),
            None => Err(match kind {
                SourceKind::Rast => "no RAST credentials or annotation service configured".to_string(),
                other => format!("no fetcher registered for {}", other),
            }),
        }
    }

    pub fn parser(&self, kind: SourceKind) -> Arc<dyn GeneParser> {
        match self.parsers.get(&kind) {
            Some(parser) => parser.clone(),
            None => Arc::from(parser_for(kind)),
        }
    }
}

fn polled(service: Arc<dyn JobService>, delay: Duration) -> Arc<dyn SourceFetcher> {
    Arc::new(PolledJobFetcher::new(service, delay))
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

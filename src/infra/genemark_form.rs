use crate::app::ports::{JobHandle, JobService, JobStatus};
use crate::error::{GeneError, Result};
use crate::types::{SequenceInput, SourceKind};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use scraper::{Html, Selector};
use tracing::{debug, instrument};

/// GeneMark web form: the sequence is uploaded as a file and the response page
/// links to the output under the server's `tmp` directory.
pub struct GeneMarkFormService {
    client: reqwest::Client,
    url: String,
    file_domain: String,
    fields: Vec<(&'static str, String)>,
}

impl GeneMarkFormService {
    /// Form fields for one of the GeneMark web tools. GeneMark.hmm needs a
    /// species model.
    pub fn for_source(
        client: reqwest::Client,
        source: SourceKind,
        url: impl Into<String>,
        file_domain: impl Into<String>,
        species: Option<&str>,
    ) -> Result<Self> {
        let fields: Vec<(&'static str, String)> = match source {
            SourceKind::GeneMarkHmm => {
                let species = species.ok_or_else(|| {
                    GeneError::Config("GeneMark.hmm requires a species model".to_string())
                })?;
                vec![
                    ("org", species.to_string()),
                    ("submit", "Start GeneMark.hmm".into()),
                    ("format", "LST".into()),
                    ("subject", "GeneMark.hmm prokaryotic".into()),
                ]
            }
            SourceKind::GeneMarkS => vec![
                ("submit", "Start GeneMarkS".into()),
                ("mode", "phage".into()),
                ("format", "LST".into()),
                ("subject", "GeneMarkS".into()),
                ("gcode", "11".into()),
            ],
            SourceKind::GeneMarkHeuristic => vec![
                ("submit", "Start GeneMark.hmm".into()),
                ("format", "LST".into()),
                ("subject", "GeneMark.hmm".into()),
                ("gcode", "11".into()),
                ("strand", "both".into()),
                ("mod_type", "1999".into()),
            ],
            SourceKind::GeneMarkS2 => vec![
                ("submit", "GeneMarkS-2".into()),
                ("mode", "auto".into()),
                ("format", "lst".into()),
                ("subject", "GeneMarkS-2".into()),
                ("gcode", "11".into()),
            ],
            other => {
                return Err(GeneError::Config(format!("{} is not a GeneMark form tool", other)));
            }
        };
        Ok(Self {
            client,
            url: url.into(),
            file_domain: file_domain.into(),
            fields,
        })
    }

    fn form(&self, sequence: &SequenceInput) -> Form {
        let file = Part::bytes(sequence.fasta.clone()).file_name(sequence.name.clone());
        let mut form = Form::new()
            .text("sequence", "")
            .text("email", "")
            .part("file", file);
        for (name, value) in &self.fields {
            form = form.text(*name, value.clone());
        }
        form
    }
}

/// First `href` on the page pointing into the server's `tmp` output directory.
pub fn extract_result_link(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]")
        .map_err(|e| GeneError::Transport(format!("invalid link selector: {:?}", e)))?;
    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| href.contains("tmp"))
        .map(|href| href.to_string())
        .ok_or_else(|| GeneError::Transport("response page has no result link".to_string()))
}

fn join_url(domain: &str, link: &str) -> String {
    if link.starts_with("http://") || link.starts_with("https://") {
        link.to_string()
    } else {
        format!("{}/{}", domain.trim_end_matches('/'), link.trim_start_matches('/'))
    }
}

#[async_trait]
impl JobService for GeneMarkFormService {
    #[instrument(skip(self, sequence), fields(url = %self.url))]
    async fn submit(&self, sequence: &SequenceInput) -> Result<JobHandle> {
        let page = self
            .client
            .post(&self.url)
            .multipart(self.form(sequence))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let link = extract_result_link(&page)?;
        let url = join_url(&self.file_domain, &link);
        debug!("result link {}", url);
        Ok(JobHandle(url))
    }

    async fn poll(&self, job: &JobHandle) -> Result<JobStatus> {
        let resp = self.client.get(&job.0).send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(JobStatus::Ready(resp.text().await?))
        } else {
            Ok(JobStatus::Failed(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_result_link() {
        let html = r#"<html><body>
            <a href="/help.html">help</a>
            <a href="tmp/gmhmmp_4412.lst">output</a>
        </body></html>"#;
        assert_eq!(extract_result_link(html).unwrap(), "tmp/gmhmmp_4412.lst");
    }

    #[test]
    fn test_missing_link_is_transport_error() {
        let err = extract_result_link("<html><p>queue full</p></html>").unwrap_err();
        assert!(matches!(err, GeneError::Transport(_)));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("http://exon.gatech.edu/GeneMark/", "tmp/x.lst"),
            "http://exon.gatech.edu/GeneMark/tmp/x.lst"
        );
        assert_eq!(join_url("http://a/", "https://b/tmp/x"), "https://b/tmp/x");
    }

    #[test]
    fn test_hmm_requires_species() {
        let client = reqwest::Client::new();
        assert!(GeneMarkFormService::for_source(client.clone(), SourceKind::GeneMarkHmm, "u", "d", None).is_err());
        assert!(GeneMarkFormService::for_source(client.clone(), SourceKind::GeneMarkHmm, "u", "d", Some("Bacillus_subtilis_168")).is_ok());
        assert!(GeneMarkFormService::for_source(client, SourceKind::Glimmer, "u", "d", None).is_err());
    }
}

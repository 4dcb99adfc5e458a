use crate::app::ports::AnnotationService;
use crate::constants;
use crate::error::{GeneError, Result};
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use serde_json::json;
use tracing::{debug, instrument};

const SUBMIT_FUNCTION: &str = "submit_RAST_job";
const STATUS_FUNCTION: &str = "status_of_RAST_job";
const RETRIEVE_FUNCTION: &str = "retrieve_RAST_job";

/// Client for the RAST annotation server. Every call is a form POST naming a
/// server function; `args` is YAML, and JSON is valid YAML.
pub struct RastService {
    client: reqwest::Client,
    url: String,
    username: String,
    password: String,
}

impl RastService {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    async fn call(&self, function: &str, args: String) -> Result<String> {
        let form = [
            ("function", function),
            ("args", args.as_str()),
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
        ];
        let resp = self
            .client
            .post(&self.url)
            .header(USER_AGENT, constants::USER_AGENT)
            .form(&form)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.text().await?)
    }
}

pub fn submit_args(fasta: &str, name: &str) -> String {
    json!({
        "-determineFamily": 0,
        "-domain": "Bacteria",
        "-filetype": "fasta",
        "-geneCaller": "RAST",
        "-geneticCode": 11,
        "-keepGeneCalls": 0,
        "-non_active": 0,
        "-organismName": name,
        "-taxonomyID": "",
        "-file": fasta,
    })
    .to_string()
}

/// Job id from a `submit_RAST_job` reply.
pub fn parse_submit(body: &str) -> Result<String> {
    expect_ok(body)?;
    yaml_value(body, "job_id")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| GeneError::Transport("RAST accepted the job but sent no job_id".to_string()))
}

/// Whether a `status_of_RAST_job` reply reports the job complete.
pub fn parse_status(body: &str) -> Result<bool> {
    match yaml_value(body, "status").as_deref() {
        Some("complete") => Ok(true),
        Some("error") => Err(GeneError::Transport(format!("RAST job failed: {}", error_message(body)))),
        Some(_) => Ok(false),
        None => Err(GeneError::Transport("RAST status reply has no status".to_string())),
    }
}

/// Annotation text from a `retrieve_RAST_job` reply.
pub fn parse_contents(body: &str) -> Result<String> {
    expect_ok(body)?;
    yaml_value(body, "contents").ok_or_else(|| GeneError::Transport("RAST reply has no contents".to_string()))
}

fn expect_ok(body: &str) -> Result<()> {
    match yaml_value(body, "status").as_deref() {
        Some("ok") => Ok(()),
        Some(status) => Err(GeneError::Transport(format!(
            "RAST answered '{}': {}",
            status,
            error_message(body)
        ))),
        None => Err(GeneError::Transport("RAST reply has no status".to_string())),
    }
}

fn error_message(body: &str) -> String {
    yaml_value(body, "error_msg").unwrap_or_else(|| "no message".to_string())
}

/// Value of the first `key:` entry at any depth. Handles plain and quoted
/// scalars and `|` literal blocks, which is all the server emits.
fn yaml_value(body: &str, key: &str) -> Option<String> {
    let mut lines = body.lines();
    while let Some(line) = lines.next() {
        let indent = line.len() - line.trim_start().len();
        let Some(rest) = line.trim_start().strip_prefix(key).and_then(|r| r.strip_prefix(':')) else {
            continue;
        };
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            continue;
        }
        let value = rest.trim();
        if value.starts_with('|') {
            return Some(literal_block(lines, indent, value.ends_with('-')));
        }
        return Some(unquote(value));
    }
    None
}

fn literal_block<'a>(lines: impl Iterator<Item = &'a str>, key_indent: usize, strip: bool) -> String {
    let mut block = Vec::new();
    let mut block_indent = None;
    for line in lines {
        if line.trim().is_empty() {
            block.push("");
            continue;
        }
        let indent = line.len() - line.trim_start().len();
        if indent <= key_indent {
            break;
        }
        let cut = *block_indent.get_or_insert(indent);
        block.push(line.get(cut.min(indent)..).unwrap_or(""));
    }
    while block.last() == Some(&"") {
        block.pop();
    }
    let mut text = block.join("\n");
    if !strip && !text.is_empty() {
        text.push('\n');
    }
    text
}

fn unquote(value: &str) -> String {
    if let Some(inner) = value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
        return inner.replace("''", "'");
    }
    if let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        }
        return out;
    }
    value.to_string()
}

#[async_trait]
impl AnnotationService for RastService {
    #[instrument(skip(self, fasta), fields(url = %self.url))]
    async fn submit(&self, fasta: &str, name: &str) -> Result<String> {
        let body = self.call(SUBMIT_FUNCTION, submit_args(fasta, name)).await?;
        let job_id = parse_submit(&body)?;
        debug!("RAST job {}", job_id);
        Ok(job_id)
    }

    async fn check_complete(&self, job_id: &str) -> Result<bool> {
        let body = self.call(STATUS_FUNCTION, json!({ "-job": [job_id] }).to_string()).await?;
        parse_status(&body)
    }

    async fn retrieve(&self, job_id: &str) -> Result<String> {
        let args = json!({ "-job": job_id, "-format": "gff3" }).to_string();
        let body = self.call(RETRIEVE_FUNCTION, args).await?;
        parse_contents(&body)
    }
}

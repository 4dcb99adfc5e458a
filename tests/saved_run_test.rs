use async_trait::async_trait;
use gene_consensus::app::ports::SourceFetcher;
use gene_consensus::report::ConsensusReport;
use gene_consensus::storage::SavedRun;
use gene_consensus::tasks::CancelToken;
use gene_consensus::{
    AgreementDenominator, Config, GeneError, Pipeline, Result, RunOutcome, SequenceInput, SourceKind, SourceRegistry,
};
use std::sync::Arc;
use tempfile::tempdir;

struct Canned(&'static str);

#[async_trait]
impl SourceFetcher for Canned {
    async fn fetch(&self, _sequence: &SequenceInput, _cancel: &CancelToken) -> Result<String> {
        Ok(self.0.to_string())
    }
}

struct Refused;

#[async_trait]
impl SourceFetcher for Refused {
    async fn fetch(&self, _sequence: &SequenceInput, _cancel: &CancelToken) -> Result<String> {
        Err(GeneError::Transport("connection refused".into()))
    }
}

const PRODIGAL_OUT: &str = "\
DEFINITION  seqnum=1;seqlen=2000;seqhdr=\"phage\"
FEATURES             Location/Qualifiers
     CDS             <2..451
                     /note=\"ID=1_1;partial=10\"
     CDS             complement(500..1310)
                     /note=\"ID=1_2;partial=00\"
//
";

const GLIMMER_OUT: &str = ">phage\norf00001        2      451  +2     3.10\norf00002     1200      500  -1     7.70\n";

#[tokio::test]
async fn test_saved_run_reopens_without_querying() {
    let dir = tempdir().unwrap();
    let fasta = dir.path().join("phage.fasta");
    std::fs::write(&fasta, ">phage\nACGTACGTAA\n").unwrap();
    let sequence = SequenceInput::from_fasta_file(&fasta).unwrap();
    assert_eq!(sequence.name, "phage");

    let registry = SourceRegistry::empty()
        .with_fetcher(SourceKind::Prodigal, Arc::new(Canned(PRODIGAL_OUT)))
        .with_fetcher(SourceKind::Glimmer, Arc::new(Canned(GLIMMER_OUT)))
        .with_fetcher(SourceKind::GeneMark, Arc::new(Refused));
    let config = Config {
        enabled_sources: vec![SourceKind::Prodigal, SourceKind::Glimmer, SourceKind::GeneMark],
        ..Config::default()
    };
    let pipeline = Pipeline::new(config.clone(), registry);
    let outcome = pipeline.run(sequence.clone()).await;

    let path = dir.path().join("runs").join("phage.json");
    outcome.to_saved_run(&config).save(&path).unwrap();

    let saved = SavedRun::load(&path).unwrap();
    assert_eq!(saved.sequence_sha256, sequence.fingerprint());
    assert_eq!(saved.config.enabled_sources, config.enabled_sources);

    let reopened = RunOutcome::from_saved_run(&saved);
    let groups = reopened.consensus(AgreementDenominator::Succeeded);
    // Forward calls agree exactly; reverse calls share start 500 but differ on stop.
    assert_eq!(groups.len(), 2);
    assert!(groups.iter().all(|g| g.all_agree));
    assert!(groups[0].representative.start_approximate());
    // Frequency tie on the reverse group goes to the longer call.
    assert_eq!(groups[1].representative.stop(), 1310);

    let report = ConsensusReport::build(&reopened, &groups, AgreementDenominator::Succeeded);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source, SourceKind::GeneMark);
    assert_eq!(report.calls_by_source.len(), 2);
}

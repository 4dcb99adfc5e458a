/// Source label constants to ensure consistency across configuration, saved runs and reports

pub const GLIMMER_LABEL: &str = "glimmer";
pub const GENEMARK_LABEL: &str = "gm";
pub const GENEMARK_HMM_LABEL: &str = "hmm";
pub const GENEMARK_S_LABEL: &str = "gms";
pub const GENEMARK_HEURISTIC_LABEL: &str = "heuristic";
pub const GENEMARK_S2_LABEL: &str = "gms2";
pub const PRODIGAL_LABEL: &str = "prodigal";
pub const RAST_LABEL: &str = "rast";

// Service endpoints
pub const GENEMARK_FILE_DOMAIN: &str = "http://exon.gatech.edu/GeneMark/";
pub const GENEMARK_SERVER_URL: &str = "http://18.220.233.194/genemark";
pub const GLIMMER_SERVER_URL: &str = "http://18.220.233.194/glimmer";
pub const GENEMARK_HMM_URL: &str = "http://exon.gatech.edu/GeneMark/gmhmmp.cgi";
pub const GENEMARK_S_URL: &str = "http://exon.gatech.edu/GeneMark/genemarks.cgi";
pub const GENEMARK_HEURISTIC_URL: &str = "http://exon.gatech.edu/GeneMark/heuristic_gmhmmp.cgi";
pub const GENEMARK_S2_URL: &str = "http://exon.gatech.edu/GeneMark/genemarks2.cgi";
pub const RAST_URL: &str = "http://pubseed.theseed.org/rast/server.cgi";

pub const USER_AGENT: &str = "gene_consensus";

// Poll intervals. Job-key servers answer within seconds; RAST jobs take minutes
// and the service asks clients not to check more often than this.
pub const JOB_POLL_DELAY_MS: u64 = 2_000;
pub const ANNOTATION_POLL_DELAY_MS: u64 = 15_000;
pub const MIN_ANNOTATION_POLL_DELAY_MS: u64 = 10_000;

pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_ANNOTATION_TIMEOUT_SECS: u64 = 6 * 60 * 60;

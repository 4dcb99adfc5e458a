//! Adapters that reach the outside world: web services and local binaries.

pub mod genemark_form;
pub mod http_client;
pub mod prodigal;
pub mod rast;

pub use genemark_form::GeneMarkFormService;
pub use http_client::JobKeyService;
pub use prodigal::ProdigalRunner;
pub use rast::RastService;

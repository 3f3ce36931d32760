//! Workflow pipelines orchestrating stateless services.

pub mod cert_login;

pub use cert_login::{CertLoginPipeline, CertLoginReport, LoginStage};

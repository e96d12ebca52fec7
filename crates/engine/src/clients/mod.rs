//! Outbound collaborators used by the step executors.
//!
//! Both traits are object safe so the engine can hold them as `Arc<dyn _>`
//! and tests can swap in mocks.

pub mod http;
pub mod mail;

pub use http::{HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient, TransportError};
pub use mail::{LogMailer, MailError, Mailer};

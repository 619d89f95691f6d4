//! # remotekit
//!
//! Credential gating and remote sessions for compiled unit scripts.
//!
//! ## Fail-closed credentials
//!
//! [`CredentialResolver::resolve`] either returns a [`Credential`] or a
//! [`CredentialError`]. Callers must not contact a machine whose credential
//! did not resolve. Secret values are redacted from every `Debug` and
//! `Display` implementation and are never logged.
//!
//! ## Sessions
//!
//! A [`Transport`] opens one [`Session`] per machine. Opening authenticates
//! and sends nothing; a refused login is a [`TransportError`] raised before
//! any script content leaves the host. [`RemoteExecutor::run`] then either
//! waits for the session ([`Mode::Blocking`]) or hands it to a dedicated
//! worker thread and returns a [`SessionHandle`] ([`Mode::NonBlocking`]).
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use remotekit::{
//!     CredentialResolver, EnvStore, Mode, RemoteExecutor, Run, SshTransport, Target, WriterSink,
//! };
//! # fn demo(script: &unitscript::CompiledScript) -> Result<(), Box<dyn std::error::Error>> {
//!
//! let resolver = CredentialResolver::new().with_store(EnvStore::new("BASTION_SECRET_"));
//! let credential = resolver.resolve("r1")?;
//!
//! let executor = RemoteExecutor::new(Arc::new(SshTransport::default()));
//! let sink = Box::new(WriterSink::new(std::io::stdout()).prefixed("[r1] "));
//! if let Run::Completed(outcome) =
//!     executor.run(&Target::new("r1"), credential, script, sink, Mode::Blocking)?
//! {
//!     println!("exit code {}", outcome.exit_code);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Backends
//!
//! - `ssh` (default): shells out to the OpenSSH client

#![deny(unsafe_code)]

/// Credential types and stores.
pub mod credential;
/// Error types for credentials and sessions.
pub mod error;
/// Blocking and non-blocking session runner.
pub mod executor;
/// Output relayed from sessions.
pub mod sink;
/// Transport and session capabilities.
pub mod transport;

pub use credential::{
    Credential, CredentialResolver, CredentialStore, EnvStore, FileStore, MemoryStore, Secret,
};
pub use error::{CredentialError, Result, TransportError};
pub use executor::{Mode, RemoteExecutor, Run, SessionHandle, SessionOutcome, SessionStatus};
pub use sink::{CaptureSink, OutputLine, OutputSink, Stream, WriterSink};
#[cfg(feature = "ssh")]
pub use transport::ssh::{SshOptions, SshTransport};
pub use transport::{Output, Session, Target, Transport};

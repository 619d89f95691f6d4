//! ssh transport implementation.
//!
//! Shells out to the system OpenSSH client. Login itself uses keys or an
//! agent in batch mode; the resolved credential is the privilege secret,
//! handed to `sudo` on the remote side through the first line of stdin so
//! it never shows up in a process list or a log.
//!
//! ## Session layout
//!
//! 1. `ssh -o BatchMode=yes … <dest> true` probes the login. A failure here
//!    is a [`TransportError`] and nothing else is sent.
//! 2. `ssh … <dest> '<prime sudo>; exec bash -s'` starts the session.
//! 3. [`Session::send`] writes the secret line, then the script, then closes
//!    stdin. Output is relayed line by line from two reader threads.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::credential::{Credential, Secret};
use crate::error::{Result, TransportError};
use crate::sink::{OutputLine, Stream};

use super::{Output, Session, Target, Transport};

/// Remote command run by every session: prime sudo from the first stdin
/// line, then interpret the rest of stdin
pub const REMOTE_COMMAND: &str =
    "IFS= read -r pw; printf '%s\\n' \"$pw\" | sudo -S -p '' -v; unset pw; exec bash -s";

/// Client diagnostics that mean the login itself was refused
const AUTH_FAILURE_MARKERS: [&str; 4] = [
    "Permission denied",
    "Authentication failed",
    "Host key verification failed",
    "Too many authentication failures",
];

/// Options for the ssh client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshOptions {
    /// Client program (default `ssh`)
    pub program: String,
    /// Seconds before a connection attempt is abandoned
    pub connect_timeout: Option<u64>,
    pub identity_file: Option<PathBuf>,
    /// Extra client arguments, placed before the destination
    pub extra_args: Vec<String>,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            connect_timeout: Some(10),
            identity_file: None,
            extra_args: Vec::new(),
        }
    }
}

/// Transport implementation using the OpenSSH client.
#[derive(Debug, Clone, Default)]
pub struct SshTransport {
    options: SshOptions,
}

impl SshTransport {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SshOptions {
        &self.options
    }

    /// Client arguments up to and including the destination
    pub fn client_args(&self, target: &Target) -> Vec<String> {
        let mut args = vec!["-o".to_string(), "BatchMode=yes".to_string()];
        if let Some(timeout) = self.options.connect_timeout {
            args.push("-o".to_string());
            args.push(format!("ConnectTimeout={timeout}"));
        }
        if let Some(port) = target.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        if let Some(identity) = &self.options.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args.extend(self.options.extra_args.iter().cloned());
        args.push(target.destination());
        args
    }

    fn command(&self, target: &Target) -> Command {
        let mut cmd = Command::new(&self.options.program);
        cmd.args(self.client_args(target));
        cmd
    }

    fn spawn_error(&self, machine: &str, e: std::io::Error) -> TransportError {
        if e.kind() == std::io::ErrorKind::NotFound {
            TransportError::ClientNotFound {
                program: self.options.program.clone(),
            }
        } else {
            TransportError::io(machine, e)
        }
    }

    /// Check that the login works without sending anything
    pub fn probe(&self, target: &Target) -> Result<()> {
        log::debug!("{}: probing {}", target.machine, target.destination());
        let output = self
            .command(target)
            .arg("true")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(&target.machine, e))?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(classify_failure(
            &target.machine,
            output.status.code(),
            &stderr,
        ))
    }
}

/// Turn a failed probe into a transport error
pub fn classify_failure(machine: &str, code: Option<i32>, stderr: &str) -> TransportError {
    let message = stderr.trim().to_string();
    let message = if message.is_empty() {
        match code {
            Some(code) => format!("client exited with status {code}"),
            None => "client terminated by signal".to_string(),
        }
    } else {
        message
    };

    if code == Some(255) && AUTH_FAILURE_MARKERS.iter().any(|m| stderr.contains(m)) {
        TransportError::Authentication {
            machine: machine.to_string(),
            message,
        }
    } else {
        TransportError::Connection {
            machine: machine.to_string(),
            message,
        }
    }
}

impl Transport for SshTransport {
    fn open(&self, target: &Target, credential: &Credential) -> Result<Box<dyn Session>> {
        self.probe(target)?;

        let mut child = self
            .command(target)
            .arg(REMOTE_COMMAND)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(&target.machine, e))?;
        log::info!("{}: session opened to {}", target.machine, target.destination());

        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(relay(stdout, Stream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(relay(stderr, Stream::Stderr, tx));
        }

        Ok(Box::new(SshSession {
            machine: target.machine.clone(),
            secret: credential.secret().clone(),
            stdin: child.stdin.take(),
            child,
            rx,
            readers,
        }))
    }
}

/// Forward every line of `pipe` into the session channel
fn relay<R: Read + Send + 'static>(
    pipe: R,
    stream: Stream,
    tx: Sender<OutputLine>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let reader = BufReader::new(pipe);
        for line in reader.lines() {
            let Ok(text) = line else { break };
            if tx.send(OutputLine { stream, text }).is_err() {
                break;
            }
        }
    })
}

struct SshSession {
    machine: String,
    secret: Secret,
    child: Child,
    stdin: Option<ChildStdin>,
    rx: Receiver<OutputLine>,
    readers: Vec<JoinHandle<()>>,
}

impl Session for SshSession {
    fn send(&mut self, script: &str) -> Result<()> {
        let Some(mut stdin) = self.stdin.take() else {
            return Err(TransportError::io(
                &self.machine,
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "script already sent"),
            ));
        };

        if !self.secret.is_single_line() {
            return Err(TransportError::io(
                &self.machine,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "credential contains a line break",
                ),
            ));
        }

        let write = |stdin: &mut ChildStdin| -> std::io::Result<()> {
            stdin.write_all(self.secret.expose().as_bytes())?;
            stdin.write_all(b"\n")?;
            stdin.write_all(script.as_bytes())?;
            if !script.ends_with('\n') {
                stdin.write_all(b"\n")?;
            }
            stdin.flush()
        };
        write(&mut stdin).map_err(|e| TransportError::io(&self.machine, e))?;
        log::debug!("{}: sent {} bytes of script", self.machine, script.len());
        // Dropping stdin closes it, which ends `bash -s`
        Ok(())
    }

    fn next_output(&mut self, wait: Duration) -> Output {
        match self.rx.recv_timeout(wait) {
            Ok(line) => Output::Line(line),
            Err(RecvTimeoutError::Timeout) => Output::Pending,
            Err(RecvTimeoutError::Disconnected) => Output::Closed,
        }
    }

    fn wait(&mut self) -> Result<i32> {
        drop(self.stdin.take());
        let status = self
            .child
            .wait()
            .map_err(|e| TransportError::io(&self.machine, e))?;
        for reader in self.readers.drain(..) {
            let _ = reader.join();
        }
        Ok(status.code().unwrap_or(-1))
    }

    fn kill(&mut self) -> Result<()> {
        drop(self.stdin.take());
        match self.child.kill() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(TransportError::io(&self.machine, e)),
        }
    }
}

//! Toolchain context hosted in a worker process.

use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};

use crate::error::ToolchainError;
use crate::protocol::{read_frame, write_frame, Request, Response, SessionId};
use crate::result::CompilationResult;
use crate::session::{read_source, CompilationSession};
use crate::settings::ToolchainSettings;
use crate::{ToolchainFactory, WORKER_SUBCOMMAND};

/// Pipes to a running worker. Dropping the connection closes the request
/// pipe and reaps the worker.
struct Connection {
    child: Child,
    requests: Option<BufWriter<ChildStdin>>,
    responses: BufReader<ChildStdout>,
    broken: bool,
}

impl Connection {
    fn spawn(exe: &Path) -> Result<Self, ToolchainError> {
        let mut child = Command::new(exe)
            .arg(WORKER_SUBCOMMAND)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| ToolchainError::Isolation {
                reason: format!("cannot start worker {}: {e}", exe.display()),
            })?;
        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolchainError::Isolation {
                reason: "worker pipes unavailable".to_string(),
            });
        };
        tracing::debug!(pid = child.id(), exe = %exe.display(), "spawned toolchain worker");
        Ok(Self {
            child,
            requests: Some(BufWriter::new(stdin)),
            responses: BufReader::new(stdout),
            broken: false,
        })
    }

    fn call(&mut self, request: &Request) -> Result<Response, ToolchainError> {
        let Some(requests) = self.requests.as_mut().filter(|_| !self.broken) else {
            return Err(ToolchainError::Isolation {
                reason: "worker connection is closed".to_string(),
            });
        };
        let result = write_frame(requests, request)
            .and_then(|()| read_frame::<_, Response>(&mut self.responses));
        match result {
            Ok(Some(response)) => Ok(response),
            Ok(None) => {
                self.broken = true;
                Err(ToolchainError::Isolation {
                    reason: "worker exited unexpectedly".to_string(),
                })
            }
            Err(e) => {
                self.broken = true;
                Err(ToolchainError::Isolation {
                    reason: format!("worker connection failed: {e}"),
                })
            }
        }
    }

    fn shutdown(mut self) {
        if !self.broken {
            if let Err(err) = self.call(&Request::Shutdown) {
                tracing::debug!(error = %err, "worker did not acknowledge shutdown");
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.broken = true;
        self.requests = None;
        match self.child.wait() {
            Ok(status) => tracing::debug!(%status, "toolchain worker exited"),
            Err(err) => tracing::warn!(error = %err, "failed to reap toolchain worker"),
        }
    }
}

type SharedConnection = Arc<Mutex<Connection>>;

fn call(connection: &SharedConnection, request: &Request) -> Result<Response, ToolchainError> {
    let mut connection = connection.lock().map_err(|_| ToolchainError::Isolation {
        reason: "worker connection poisoned".to_string(),
    })?;
    connection.call(request)
}

fn unexpected(response: Response) -> ToolchainError {
    match response {
        Response::Failed { message } => ToolchainError::Worker { message },
        other => ToolchainError::Protocol {
            reason: format!("unexpected response {other:?}"),
        },
    }
}

/// A toolchain whose context lives in a child process.
///
/// The child is the `worker` executable run with the
/// [`WORKER_SUBCOMMAND`]. Dropping the toolchain disposes it.
pub struct ProcessToolchain {
    settings: ToolchainSettings,
    worker: PathBuf,
    connection: Option<SharedConnection>,
    references: Vec<String>,
}

impl ProcessToolchain {
    /// Creates an uninitialized toolchain that will run `worker`.
    pub fn new(settings: ToolchainSettings, worker: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            worker: worker.into(),
            connection: None,
            references: Vec::new(),
        }
    }

    /// Names of every reference the worker resolved at `init`.
    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// Returns `true` between `init` and `dispose`.
    pub fn is_initialized(&self) -> bool {
        self.connection.is_some()
    }
}

impl ToolchainFactory for ProcessToolchain {
    fn init(&mut self) -> Result<(), ToolchainError> {
        if self.connection.is_some() {
            return Ok(());
        }
        let mut connection = Connection::spawn(&self.worker)?;
        let init = Request::Init {
            settings: self.settings.clone(),
        };
        match connection.call(&init) {
            Ok(Response::Ready { references }) => {
                tracing::info!(references = references.len(), "toolchain worker initialized");
                self.references = references;
                self.connection = Some(Arc::new(Mutex::new(connection)));
                Ok(())
            }
            Ok(other) => {
                connection.shutdown();
                Err(unexpected(other))
            }
            Err(err) => {
                connection.shutdown();
                Err(err)
            }
        }
    }

    fn create(&mut self, debug_build: bool) -> Result<Box<dyn CompilationSession>, ToolchainError> {
        self.init()?;
        let Some(connection) = self.connection.clone() else {
            return Err(ToolchainError::Isolation {
                reason: "toolchain worker is not running".to_string(),
            });
        };
        match call(&connection, &Request::Create { debug: debug_build })? {
            Response::Created { session } => Ok(Box::new(ProcessSession {
                connection,
                session,
            })),
            other => Err(unexpected(other)),
        }
    }

    fn dispose(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        self.references.clear();
        match Arc::try_unwrap(connection) {
            Ok(connection) => match connection.into_inner() {
                Ok(connection) => connection.shutdown(),
                Err(poisoned) => poisoned.into_inner().shutdown(),
            },
            Err(shared) => {
                // Sessions still alive keep the worker; ask it to stop anyway.
                // The last session to drop reaps it.
                if let Err(err) = call(&shared, &Request::Shutdown) {
                    tracing::debug!(error = %err, "worker did not acknowledge shutdown");
                }
                if let Ok(mut connection) = shared.lock() {
                    connection.broken = true;
                }
            }
        }
    }
}

impl Drop for ProcessToolchain {
    fn drop(&mut self) {
        self.dispose();
    }
}

struct ProcessSession {
    connection: SharedConnection,
    session: SessionId,
}

impl ProcessSession {
    fn expect_done(&self, request: &Request) -> Result<(), ToolchainError> {
        match call(&self.connection, request)? {
            Response::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

impl CompilationSession for ProcessSession {
    fn load(&mut self, source: &mut dyn Read, name: &str) -> Result<(), ToolchainError> {
        let text = read_source(source, name)?;
        self.expect_done(&Request::Load {
            session: self.session,
            name: name.to_string(),
            text: text.into_bytes(),
        })
    }

    fn add_dependency(&mut self, path: &Path) {
        let request = Request::AddDependency {
            session: self.session,
            path: path.to_path_buf(),
        };
        if let Err(err) = self.expect_done(&request) {
            tracing::debug!(path = %path.display(), error = %err, "custom reference not added");
        }
    }

    fn compile(&mut self, output_name: &str) -> Result<CompilationResult, ToolchainError> {
        let request = Request::Compile {
            session: self.session,
            output_name: output_name.to_string(),
        };
        match call(&self.connection, &request)? {
            Response::Compiled(module) => Ok(Ok(module)),
            Response::CompileFailed(failures) => Ok(Err(failures)),
            other => Err(unexpected(other)),
        }
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        let broken = self
            .connection
            .lock()
            .map_or(true, |connection| connection.broken);
        if !broken {
            let _ = self.expect_done(&Request::Release {
                session: self.session,
            });
        }
    }
}

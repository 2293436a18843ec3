//! The worker side of the process toolchain.

use std::collections::HashMap;
use std::io::{Read, Write};

use crate::error::ToolchainError;
use crate::in_process::InProcessToolchain;
use crate::protocol::{read_frame, write_frame, Request, Response, SessionId};
use crate::session::{CompilationSession, LocalSession, SourceUnit};
use crate::ToolchainFactory;

#[derive(Default)]
struct Worker {
    toolchain: Option<InProcessToolchain>,
    sessions: HashMap<SessionId, LocalSession>,
    next_session: SessionId,
}

impl Worker {
    fn failed(message: impl ToString) -> Response {
        Response::Failed {
            message: message.to_string(),
        }
    }

    fn session(&mut self, id: SessionId) -> Result<&mut LocalSession, Response> {
        self.sessions
            .get_mut(&id)
            .ok_or_else(|| Self::failed(format!("unknown session {id}")))
    }

    fn handle(&mut self, request: Request) -> Response {
        match request {
            Request::Init { settings } => {
                let mut toolchain = InProcessToolchain::new(settings);
                match toolchain.init() {
                    Ok(()) => {
                        let references = toolchain.references();
                        self.toolchain = Some(toolchain);
                        Response::Ready { references }
                    }
                    Err(err) => Self::failed(err),
                }
            }
            Request::Create { debug } => {
                let Some(toolchain) = self.toolchain.as_mut() else {
                    return Self::failed("toolchain is not initialized");
                };
                match toolchain.create_local(debug) {
                    Ok(session) => {
                        let id = self.next_session;
                        self.next_session = self.next_session.wrapping_add(1);
                        self.sessions.insert(id, session);
                        Response::Created { session: id }
                    }
                    Err(err) => Self::failed(err),
                }
            }
            Request::Load {
                session,
                name,
                text,
            } => {
                let session = match self.session(session) {
                    Ok(session) => session,
                    Err(response) => return response,
                };
                match String::from_utf8(text) {
                    Ok(text) => {
                        session.load_unit(SourceUnit::new(name, text));
                        Response::Done
                    }
                    Err(_) => Self::failed(ToolchainError::Load {
                        name,
                        reason: "source is not valid UTF-8".to_string(),
                    }),
                }
            }
            Request::AddDependency { session, path } => match self.session(session) {
                Ok(session) => {
                    session.add_dependency(&path);
                    Response::Done
                }
                Err(response) => response,
            },
            Request::Compile {
                session,
                output_name,
            } => {
                let session = match self.session(session) {
                    Ok(session) => session,
                    Err(response) => return response,
                };
                match session.compile(&output_name) {
                    Ok(Ok(module)) => Response::Compiled(module),
                    Ok(Err(failures)) => Response::CompileFailed(failures),
                    Err(err) => Self::failed(err),
                }
            }
            Request::Release { session } => {
                self.sessions.remove(&session);
                Response::Done
            }
            Request::Shutdown => {
                self.sessions.clear();
                if let Some(mut toolchain) = self.toolchain.take() {
                    toolchain.dispose();
                }
                Response::Done
            }
        }
    }
}

/// Serves requests from `input` until `Shutdown` or end of stream.
pub fn serve<R: Read, W: Write>(mut input: R, mut output: W) -> Result<(), ToolchainError> {
    let protocol = |e: std::io::Error| ToolchainError::Protocol {
        reason: e.to_string(),
    };
    let mut worker = Worker::default();
    tracing::debug!("toolchain worker started");
    while let Some(request) = read_frame::<_, Request>(&mut input).map_err(protocol)? {
        let shutdown = request == Request::Shutdown;
        let response = worker.handle(request);
        write_frame(&mut output, &response).map_err(protocol)?;
        if shutdown {
            break;
        }
    }
    tracing::debug!("toolchain worker stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ToolchainSettings;
    use std::io::Cursor;
    use tinker_module::{ModuleImage, Visibility};

    fn run(requests: &[Request]) -> Vec<Response> {
        let mut input = Vec::new();
        for request in requests {
            write_frame(&mut input, request).unwrap();
        }
        let mut output = Vec::new();
        serve(Cursor::new(input), &mut output).unwrap();

        let mut cursor = Cursor::new(output);
        let mut responses = Vec::new();
        while let Some(response) = read_frame(&mut cursor).unwrap() {
            responses.push(response);
        }
        responses
    }

    fn init(dir: &std::path::Path) -> Request {
        Request::Init {
            settings: ToolchainSettings {
                probe_dirs: vec![dir.to_path_buf()],
                references: vec!["host_core".to_string()],
                deny_warnings: false,
            },
        }
    }

    #[test]
    fn full_conversation() {
        let dir = tempfile::tempdir().unwrap();
        ModuleImage::new("host_core")
            .with_export("log", 1, Visibility::Public)
            .write_file(&dir.path().join("host_core.tkm"))
            .unwrap();

        let responses = run(&[
            init(dir.path()),
            Request::Create { debug: false },
            Request::Load {
                session: 0,
                name: "main.tks".to_string(),
                text: b"use host_core::log;\npub fn f() { log(1); }".to_vec(),
            },
            Request::Compile {
                session: 0,
                output_name: "plugin".to_string(),
            },
            Request::Release { session: 0 },
            Request::Shutdown,
        ]);

        assert_eq!(
            responses[0],
            Response::Ready {
                references: vec!["host_core".to_string()]
            }
        );
        assert_eq!(responses[1], Response::Created { session: 0 });
        assert_eq!(responses[2], Response::Done);
        let Response::Compiled(module) = &responses[3] else {
            panic!("expected a compiled module, got {:?}", responses[3]);
        };
        assert_eq!(ModuleImage::from_bytes(&module.image).unwrap().name, "plugin");
        assert_eq!(responses[4], Response::Done);
        assert_eq!(responses[5], Response::Done);
    }

    #[test]
    fn compile_failures_are_a_response() {
        let dir = tempfile::tempdir().unwrap();
        ModuleImage::new("host_core")
            .write_file(&dir.path().join("host_core.tkm"))
            .unwrap();
        let responses = run(&[
            init(dir.path()),
            Request::Create { debug: true },
            Request::Load {
                session: 0,
                name: "bad.tks".to_string(),
                text: b"fn f( {".to_vec(),
            },
            Request::Compile {
                session: 0,
                output_name: "plugin".to_string(),
            },
        ]);
        assert!(matches!(responses[3], Response::CompileFailed(_)));
    }

    #[test]
    fn requests_before_init_fail() {
        let responses = run(&[
            Request::Create { debug: false },
            Request::Compile {
                session: 3,
                output_name: "plugin".to_string(),
            },
        ]);
        assert!(matches!(responses[0], Response::Failed { .. }));
        assert!(matches!(responses[1], Response::Failed { .. }));
    }

    #[test]
    fn init_failure_names_missing_reference() {
        let dir = tempfile::tempdir().unwrap();
        let responses = run(&[init(dir.path())]);
        let Response::Failed { message } = &responses[0] else {
            panic!("expected failure, got {:?}", responses[0]);
        };
        assert!(message.contains("host_core"));
    }
}

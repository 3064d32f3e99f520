//! Presentation session
//!
//! Toolkit-independent state behind the input field, the "Generar Texto"
//! button and the output region. Front-ends forward button presses to
//! [`Session::submit`], run the returned request on whatever executor they
//! own, and hand the outcome back through [`Session::complete`].

use bloomgen_core::{CancellationFlag, CompletionSet, CoreError, GenerationRequest};
use std::fmt::Write as _;

use crate::BloomgenApp;

/// Input that closes the application
pub const EXIT_COMMAND: &str = "salir";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the user
    Idle,
    /// A request is in flight
    Generating,
    /// Closed by the exit command; no further transitions
    Terminated,
}

/// What the front-end must do after a button press
#[derive(Debug)]
pub enum Submission {
    /// Close the window
    Exit,
    /// Run this request and report back with [`Session::complete`]
    Generate(GenerationRequest),
    /// The press arrived while busy or after termination
    Ignored,
}

/// True when `input` case-insensitively equals the exit command
pub fn is_exit_command(input: &str) -> bool {
    input.to_lowercase() == EXIT_COMMAND
}

/// Numbered blocks, one per completion, each followed by a blank line
pub fn render_completions(set: &CompletionSet) -> String {
    let mut out = String::new();
    for (idx, text) in set.numbered() {
        let _ = write!(out, "{}. {}\n\n", idx, text);
    }
    out
}

pub fn render_error(err: &CoreError) -> String {
    format!("Error: {}\n", err)
}

pub struct Session {
    app: BloomgenApp,
    state: SessionState,
    output: String,
    in_flight: Option<CancellationFlag>,
}

impl Session {
    pub fn new(app: BloomgenApp) -> Self {
        Self {
            app,
            state: SessionState::Idle,
            output: String::new(),
            in_flight: None,
        }
    }

    pub fn app(&self) -> &BloomgenApp {
        &self.app
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current contents of the output region
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Handle activation of the submit control with the input taken verbatim
    pub fn submit(&mut self, input: &str) -> Submission {
        if self.state != SessionState::Idle {
            tracing::debug!(state = ?self.state, "submission ignored");
            return Submission::Ignored;
        }

        if is_exit_command(input) {
            tracing::info!("exit requested");
            self.state = SessionState::Terminated;
            return Submission::Exit;
        }

        let request = self.app.request(input);
        self.in_flight = Some(request.cancel.clone());
        self.state = SessionState::Generating;
        tracing::debug!(request_id = %request.id, "generating");
        Submission::Generate(request)
    }

    /// Record the outcome of the in-flight request and return to Idle
    pub fn complete(&mut self, result: Result<CompletionSet, CoreError>) {
        if self.state != SessionState::Generating {
            tracing::warn!(state = ?self.state, "completion without a request in flight");
            return;
        }

        self.output = match result {
            Ok(set) => render_completions(&set),
            Err(err) => {
                tracing::warn!("generation failed: {}", err);
                render_error(&err)
            }
        };
        self.in_flight = None;
        self.state = SessionState::Idle;
    }

    /// Ask the in-flight request to stop; it still reports through `complete`
    pub fn cancel(&self) {
        if let Some(flag) = &self.in_flight {
            flag.cancel();
        }
    }

    /// Submit and wait for the result on the current task
    pub async fn submit_and_wait(&mut self, input: &str) -> SessionState {
        if let Submission::Generate(request) = self.submit(input) {
            let result = self.app.submit(request).await;
            self.complete(result);
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::generators::EchoGenerator;
    use async_trait::async_trait;
    use bloomgen_core::{GenerationParams, Generator, RequestId, Result as CoreResult};

    struct FailingGenerator;

    #[async_trait]
    impl Generator for FailingGenerator {
        async fn generate(&self, _request: GenerationRequest) -> CoreResult<CompletionSet> {
            Err(CoreError::Backend("out of memory".to_string()))
        }
    }

    fn session_with(generator: impl Generator + 'static, sequences: usize) -> Session {
        let app = BloomgenApp::builder("session-test")
            .params(GenerationParams::default().with_num_return_sequences(sequences))
            .generator(generator)
            .build()
            .unwrap();
        Session::new(app)
    }

    #[test]
    fn test_exit_command_any_case() {
        for input in ["salir", "SALIR", "Salir", "sAlIr"] {
            assert!(is_exit_command(input), "{input}");
        }
        for input in ["salir ", " salir", "salida", "exit", ""] {
            assert!(!is_exit_command(input), "{input}");
        }
    }

    #[test]
    fn test_exit_terminates_without_output() {
        let mut session = session_with(EchoGenerator, 1);
        assert!(matches!(session.submit("Salir"), Submission::Exit));
        assert_eq!(session.state(), SessionState::Terminated);
        assert_eq!(session.output(), "");

        assert!(matches!(session.submit("hola"), Submission::Ignored));
        assert_eq!(session.state(), SessionState::Terminated);
    }

    #[test]
    fn test_render_numbers_in_order() {
        let set = CompletionSet::new(
            RequestId::from_string("r"),
            vec!["uno".to_string(), "dos".to_string(), "tres".to_string()],
        );
        assert_eq!(render_completions(&set), "1. uno\n\n2. dos\n\n3. tres\n\n");
    }

    #[test]
    fn test_busy_session_ignores_presses() {
        let mut session = session_with(EchoGenerator, 1);
        let Submission::Generate(request) = session.submit("hola") else {
            panic!("expected a request");
        };
        assert_eq!(request.prompt, "hola");
        assert_eq!(session.state(), SessionState::Generating);

        assert!(matches!(session.submit("otra"), Submission::Ignored));
        assert!(matches!(session.submit("salir"), Submission::Ignored));
    }

    #[test]
    fn test_cancel_reaches_request() {
        let mut session = session_with(EchoGenerator, 1);
        let Submission::Generate(request) = session.submit("hola") else {
            panic!("expected a request");
        };
        session.cancel();
        assert!(request.cancel.is_cancelled());

        session.complete(Err(CoreError::Cancelled));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.output(), "Error: Generation cancelled\n");
    }

    #[tokio::test]
    async fn test_new_output_replaces_old() {
        let mut session = session_with(EchoGenerator, 2);

        assert_eq!(session.submit_and_wait("primero").await, SessionState::Idle);
        assert_eq!(session.output(), "1. primero\n\n2. primero\n\n");

        session.submit_and_wait("segundo").await;
        assert_eq!(session.output(), "1. segundo\n\n2. segundo\n\n");
    }

    #[tokio::test]
    async fn test_empty_prompt_renders() {
        let mut session = session_with(EchoGenerator, 1);
        session.submit_and_wait("").await;
        assert_eq!(session.output(), "1. \n\n");
    }

    #[tokio::test]
    async fn test_errors_surface_and_return_to_idle() {
        let mut session = session_with(FailingGenerator, 1);
        assert_eq!(session.submit_and_wait("hola").await, SessionState::Idle);
        assert_eq!(session.output(), "Error: Backend error: out of memory\n");
    }
}

// ABOUTME: Cooperative prepare/process/finalize state machine shared by engine parts
// ABOUTME: Captures fatal errors as structured values and reports progress after every tick

use super::context::EngineContext;
use async_trait::async_trait;
use serde::Serialize;

/// Lifecycle of an engine part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PartState {
    #[default]
    Init,
    Prepared,
    Running,
    Finished,
    Error,
}

impl PartState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PartState::Finished | PartState::Error)
    }
}

/// Phase in which a fatal error happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Prepare,
    Process,
    Finalize,
}

/// The fatal error of a part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{kind:?} failed: {message}")]
pub struct PartError {
    pub kind: ErrorKind,
    pub message: String,
}

impl PartError {
    pub fn new(kind: ErrorKind, err: &anyhow::Error) -> Self {
        Self {
            kind,
            message: format!("{:#}", err),
        }
    }
}

/// Snapshot returned by every tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartStatus {
    pub done: bool,
    pub error: Option<PartError>,
    pub step: String,
    pub substep: String,
    pub domain: String,
    /// Warnings raised since the previous tick
    pub warnings: Vec<String>,
}

/// Runtime state every part embeds
#[derive(Debug, Clone, Default)]
pub struct PartCore {
    pub state: PartState,
    warnings: Vec<String>,
    reported_warnings: usize,
    error: Option<PartError>,
    pub step: String,
    pub substep: String,
    pub domain: String,
}

impl PartCore {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Self::default()
        }
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn error(&self) -> Option<&PartError> {
        self.error.as_ref()
    }

    /// Record a fatal error and enter the error state; the first error wins
    pub fn fail(&mut self, kind: ErrorKind, err: anyhow::Error) {
        tracing::error!("{:#}", err);
        if self.error.is_none() {
            self.error = Some(PartError::new(kind, &err));
        }
        self.state = PartState::Error;
    }

    /// Merge a nested part's tick outcome: its new warnings and its fatal error
    pub fn inherit(&mut self, child: &PartStatus) {
        self.warnings.extend(child.warnings.iter().cloned());
        if self.error.is_none() {
            self.error = child.error.clone();
        }
    }

    /// Build the tick status; warnings are reported once
    pub fn status(&mut self) -> PartStatus {
        let warnings = self.warnings[self.reported_warnings..].to_vec();
        self.reported_warnings = self.warnings.len();

        PartStatus {
            done: self.state.is_terminal(),
            error: self.error.clone(),
            step: self.step.clone(),
            substep: self.substep.clone(),
            domain: self.domain.clone(),
            warnings,
        }
    }
}

/// A resumable unit of work driven by repeated [`Part::tick`] calls
#[async_trait]
pub trait Part: Send {
    fn core(&self) -> &PartCore;

    fn core_mut(&mut self) -> &mut PartCore;

    /// One-time setup
    async fn prepare(&mut self, ctx: &mut EngineContext) -> anyhow::Result<()>;

    /// One slice of work; `Ok(false)` once the main work is complete
    async fn process(&mut self, ctx: &mut EngineContext) -> anyhow::Result<bool>;

    async fn finalize(&mut self, ctx: &mut EngineContext) -> anyhow::Result<()>;

    /// Advance the state machine by one step
    ///
    /// Never returns an error: failures end up in [`PartStatus::error`] and
    /// leave the part in [`PartState::Error`].
    async fn tick(&mut self, ctx: &mut EngineContext) -> PartStatus {
        match self.core().state {
            PartState::Init => match self.prepare(ctx).await {
                Ok(()) => self.core_mut().state = PartState::Prepared,
                Err(e) => self.core_mut().fail(ErrorKind::Prepare, e),
            },
            PartState::Prepared | PartState::Running => match self.process(ctx).await {
                Ok(_) if self.core().error.is_some() => {
                    self.core_mut().state = PartState::Error;
                }
                Ok(true) => self.core_mut().state = PartState::Running,
                Ok(false) => match self.finalize(ctx).await {
                    Ok(()) => self.core_mut().state = PartState::Finished,
                    Err(e) => self.core_mut().fail(ErrorKind::Finalize, e),
                },
                Err(e) => self.core_mut().fail(ErrorKind::Process, e),
            },
            PartState::Finished | PartState::Error => {}
        }

        self.core_mut().status()
    }

    fn is_done(&self) -> bool {
        self.core().state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::database::memory::MemoryDriver;
    use anyhow::bail;

    /// Counts down `remaining` process calls, optionally failing in a phase
    struct Countdown {
        core: PartCore,
        remaining: u32,
        fail_in: Option<ErrorKind>,
        finalized: bool,
    }

    impl Countdown {
        fn new(remaining: u32, fail_in: Option<ErrorKind>) -> Self {
            Self {
                core: PartCore::new("test"),
                remaining,
                fail_in,
                finalized: false,
            }
        }
    }

    #[async_trait]
    impl Part for Countdown {
        fn core(&self) -> &PartCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut PartCore {
            &mut self.core
        }

        async fn prepare(&mut self, _ctx: &mut EngineContext) -> anyhow::Result<()> {
            if self.fail_in == Some(ErrorKind::Prepare) {
                bail!("cannot prepare");
            }
            self.core.add_warning("prepared with a warning");
            Ok(())
        }

        async fn process(&mut self, _ctx: &mut EngineContext) -> anyhow::Result<bool> {
            if self.fail_in == Some(ErrorKind::Process) {
                bail!("cannot process");
            }
            self.remaining = self.remaining.saturating_sub(1);
            Ok(self.remaining > 0)
        }

        async fn finalize(&mut self, _ctx: &mut EngineContext) -> anyhow::Result<()> {
            if self.fail_in == Some(ErrorKind::Finalize) {
                bail!("cannot finalize");
            }
            self.finalized = true;
            Ok(())
        }
    }

    fn context() -> EngineContext {
        EngineContext::new(Box::new(MemoryDriver::new("test")), Configuration::default())
    }

    #[tokio::test]
    async fn test_lifecycle_runs_to_finished() {
        let mut ctx = context();
        let mut part = Countdown::new(2, None);

        let status = part.tick(&mut ctx).await;
        assert!(!status.done);
        assert_eq!(part.core().state, PartState::Prepared);
        assert_eq!(status.warnings, vec!["prepared with a warning"]);

        let status = part.tick(&mut ctx).await;
        assert!(!status.done);
        assert_eq!(part.core().state, PartState::Running);
        assert!(status.warnings.is_empty());

        let status = part.tick(&mut ctx).await;
        assert!(status.done);
        assert!(status.error.is_none());
        assert!(part.finalized);
        assert_eq!(part.core().state, PartState::Finished);

        let status = part.tick(&mut ctx).await;
        assert!(status.done);
        assert_eq!(part.core().warnings().len(), 1);
    }

    #[tokio::test]
    async fn test_errors_are_captured_per_phase() {
        for kind in [ErrorKind::Prepare, ErrorKind::Process, ErrorKind::Finalize] {
            let mut ctx = context();
            let mut part = Countdown::new(1, Some(kind));

            let mut status = part.tick(&mut ctx).await;
            while !status.done {
                status = part.tick(&mut ctx).await;
            }

            let error = status.error.expect("error expected");
            assert_eq!(error.kind, kind);
            assert!(error.message.starts_with("cannot"));
            assert_eq!(part.core().state, PartState::Error);
            assert!(!part.finalized);
        }
    }

    #[test]
    fn test_inherit_keeps_first_error() {
        let mut core = PartCore::new("db");
        core.fail(ErrorKind::Prepare, anyhow::anyhow!("first"));

        let child = PartStatus {
            done: true,
            error: Some(PartError {
                kind: ErrorKind::Process,
                message: "second".to_string(),
            }),
            step: String::new(),
            substep: String::new(),
            domain: String::new(),
            warnings: vec!["child warning".to_string()],
        };
        core.inherit(&child);

        assert_eq!(core.error().map(|e| e.message.as_str()), Some("first"));
        assert_eq!(core.warnings(), &["child warning".to_string()]);
    }

    #[test]
    fn test_status_serializes_to_json() {
        let mut core = PartCore::new("shop");
        core.step = "wp_posts".to_string();
        let json = serde_json::to_value(core.status()).unwrap();
        assert_eq!(json["domain"], "shop");
        assert_eq!(json["step"], "wp_posts");
        assert_eq!(json["done"], false);
    }
}

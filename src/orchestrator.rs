//! Single-flight scan orchestration.
//!
//! An [`Orchestrator`] owns the request state (`Idle -> Pending -> Displaying`)
//! and drives one round trip at a time through a [`ScanApi`], handing the
//! outcome to a [`ResultsSurface`]. A second `run` while one is pending is a
//! no-op.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, warn};

use crate::client::ScanApi;
use crate::error::ScanError;
use crate::render::ResultsView;
use crate::types::ScanResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Pending,
    Displaying,
}

/// Where results end up. Implementations only mutate presentation state.
pub trait ResultsSurface: Send + Sync {
    /// Drop whatever a previous run displayed.
    fn clear(&self);
    fn show_results(&self, result: &ScanResult, view: &ResultsView);
    fn show_error(&self, message: &str);
}

/// What a call to [`Orchestrator::run`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Another run was pending; nothing was sent.
    Ignored,
    Displayed(ResultsView),
    Failed(ScanError),
}

pub struct Orchestrator<A, S> {
    api: A,
    surface: S,
    phase: Mutex<Phase>,
}

impl<A: ScanApi, S: ResultsSurface> Orchestrator<A, S> {
    pub fn new(api: A, surface: S) -> Self {
        Self {
            api,
            surface,
            phase: Mutex::new(Phase::Idle),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.lock()
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Send `options` to the scan endpoint and display the outcome.
    pub async fn run(&self, options: &[String]) -> Outcome {
        let Some(pending) = self.begin() else {
            debug!("scan already in flight, ignoring");
            return Outcome::Ignored;
        };

        self.surface.clear();
        let outcome = match self.api.scan(options).await {
            Ok(result) => {
                let view = ResultsView::from_result(&result);
                self.surface.show_results(&result, &view);
                Outcome::Displayed(view)
            }
            Err(e) => {
                match &e {
                    ScanError::Transport(cause) => error!(%cause, "scan request failed"),
                    ScanError::Application(msg) => warn!(%msg, "scan rejected by backend"),
                }
                self.surface.show_error(e.display_message());
                Outcome::Failed(e)
            }
        };
        pending.resolve();
        outcome
    }

    fn lock(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> Option<Pending<'_>> {
        let mut phase = self.lock();
        if *phase == Phase::Pending {
            return None;
        }
        *phase = Phase::Pending;
        Some(Pending {
            phase: &self.phase,
            resolved: false,
        })
    }
}

/// Held for the duration of a run. If the run future is dropped before it
/// resolves, the phase falls back to `Idle`.
struct Pending<'a> {
    phase: &'a Mutex<Phase>,
    resolved: bool,
}

impl Pending<'_> {
    fn resolve(mut self) {
        self.resolved = true;
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = Phase::Displaying;
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
            if *phase == Phase::Pending {
                *phase = Phase::Idle;
            }
        }
    }
}

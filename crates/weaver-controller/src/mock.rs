//! Scripted controllers for executor and engine tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use weaver_core::plan::TaskSpec;

use crate::client::{Applied, FabricController};
use crate::error::ControllerError;

/// A controller that replays a scripted sequence of responses.
///
/// `apply` pops the front of the script; an empty script means
/// `Ok(Applied::Created)`, so tests only script the interesting calls.
#[derive(Default)]
pub struct ScriptedController {
    auth: Mutex<VecDeque<Result<(), ControllerError>>>,
    apply: Mutex<VecDeque<Result<Applied, ControllerError>>>,
    auth_calls: AtomicU32,
    applies: AtomicU32,
    delay: Option<Duration>,
}

impl ScriptedController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before answering each call, to keep a job observably running.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_auth(&self, result: Result<(), ControllerError>) {
        self.auth.lock().unwrap().push_back(result);
    }

    pub fn push_apply(&self, result: Result<Applied, ControllerError>) {
        self.apply.lock().unwrap().push_back(result);
    }

    pub fn auth_calls(&self) -> u32 {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn apply_calls(&self) -> u32 {
        self.applies.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FabricController for ScriptedController {
    async fn authenticate(&self) -> Result<(), ControllerError> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.auth.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn apply(&self, _spec: &TaskSpec) -> Result<Applied, ControllerError> {
        self.applies.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.apply
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Applied::Created))
    }
}

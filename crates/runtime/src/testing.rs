//! Test doubles shared by the runtime's unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use {
    async_trait::async_trait,
    secrecy::Secret,
    tgsync_common::{BotIdentity, ConnectionStatus, SessionKind},
    tgsync_vault::{KdfParams, TokenSealer},
    tokio::sync::Notify,
};

use crate::{
    context::SyncContext,
    error::{Error, Result},
    notify::{Notice, NoticeLevel, Notifier, StatusIndicator},
    session::{SessionConnector, SessionDescriptor},
    sweeper::Distributor,
    token::{BotTokenAccess, PinPrompt},
};

/// Let spawned tasks and the queue worker catch up.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Token access with KDF parameters cheap enough for tests.
pub fn fast_token_access() -> BotTokenAccess {
    BotTokenAccess::new(TokenSealer::new(KdfParams {
        m_cost: 256,
        t_cost: 1,
        p_cost: 1,
    }))
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn infos(&self) -> Vec<Notice> {
        self.by_level(NoticeLevel::Info)
    }

    pub fn errors(&self) -> Vec<Notice> {
        self.by_level(NoticeLevel::Error)
    }

    fn by_level(&self, level: NoticeLevel) -> Vec<Notice> {
        self.notices()
            .into_iter()
            .filter(|n| n.level == level)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

type IndicatorUpdate = (SessionKind, ConnectionStatus, Option<String>);

#[derive(Default)]
pub struct RecordingIndicator {
    updates: Mutex<Vec<IndicatorUpdate>>,
    destroyed: AtomicBool,
}

impl RecordingIndicator {
    pub fn updates(&self) -> Vec<IndicatorUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl StatusIndicator for RecordingIndicator {
    fn update(&self, kind: SessionKind, status: ConnectionStatus, error: Option<&str>) {
        self.updates
            .lock()
            .unwrap()
            .push((kind, status, error.map(str::to_string)));
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

/// Answers PIN prompts from a script; an exhausted script cancels.
pub struct ScriptedPinPrompt {
    answers: Mutex<VecDeque<Option<String>>>,
    calls: AtomicUsize,
}

impl ScriptedPinPrompt {
    pub fn new(answers: Vec<Option<&str>>) -> Self {
        Self {
            answers: Mutex::new(
                answers
                    .into_iter()
                    .map(|a| a.map(str::to_string))
                    .collect(),
            ),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PinPrompt for ScriptedPinPrompt {
    async fn prompt_pin(&self) -> Option<Secret<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .flatten()
            .map(Secret::new)
    }
}

/// What the next [`FakeConnector::connect`] does.
pub enum Step {
    Connect,
    /// Report a transport failure and return `Disconnected`.
    Drop(&'static str),
    /// Fail outside session handling.
    Fail(&'static str),
    /// Wait for the notify, then connect.
    Hang(Arc<Notify>),
}

pub struct FakeConnector {
    kind: SessionKind,
    steps: Mutex<VecDeque<Step>>,
    identity: Mutex<Option<BotIdentity>>,
    probe_fails: AtomicBool,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    probes: AtomicUsize,
    cache_clears: AtomicUsize,
}

impl FakeConnector {
    pub fn new(kind: SessionKind) -> Self {
        Self {
            kind,
            steps: Mutex::new(VecDeque::new()),
            identity: Mutex::new(None),
            probe_fails: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
            cache_clears: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, step: Step) {
        self.steps.lock().unwrap().push_back(step);
    }

    pub fn fail_probes(&self) {
        self.probe_fails.store(true, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn cache_clears(&self) -> usize {
        self.cache_clears.load(Ordering::SeqCst)
    }

    fn connected(&self, session: &SessionDescriptor) -> Result<ConnectionStatus> {
        if self.kind == SessionKind::Bot {
            *self.identity.lock().unwrap() = Some(BotIdentity {
                id: 7,
                username: Some("fake_bot".into()),
                first_name: "Fake".into(),
            });
        }
        session.report(ConnectionStatus::Connected, None);
        Ok(ConnectionStatus::Connected)
    }
}

#[async_trait]
impl SessionConnector for FakeConnector {
    fn kind(&self) -> SessionKind {
        self.kind
    }

    async fn connect(
        &self,
        _ctx: &SyncContext,
        session: &Arc<SessionDescriptor>,
    ) -> Result<ConnectionStatus> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Connect);
        match step {
            Step::Connect => self.connected(session),
            Step::Drop(reason) => {
                session.report(ConnectionStatus::Disconnected, Some(reason));
                Ok(ConnectionStatus::Disconnected)
            },
            Step::Fail(reason) => Err(Error::message(reason)),
            Step::Hang(release) => {
                release.notified().await;
                self.connected(session)
            },
        }
    }

    async fn disconnect(&self, session: &SessionDescriptor) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        session.report(ConnectionStatus::Disconnected, None);
    }

    fn identity(&self) -> Option<BotIdentity> {
        self.identity.lock().unwrap().clone()
    }

    async fn probe(&self) -> Result<BotIdentity> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.probe_fails.load(Ordering::SeqCst) {
            return Err(Error::message("probe timed out"));
        }
        self.identity().ok_or(Error::BotIdentityUnavailable)
    }

    async fn clear_cache(&self) {
        self.cache_clears.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeDistributor {
    failure: Option<&'static str>,
    forwards: AtomicUsize,
    discards: AtomicUsize,
}

impl FakeDistributor {
    pub fn failing(reason: &'static str) -> Self {
        Self {
            failure: Some(reason),
            ..Default::default()
        }
    }

    pub fn forward_calls(&self) -> usize {
        self.forwards.load(Ordering::SeqCst)
    }

    pub fn discard_calls(&self) -> usize {
        self.discards.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Distributor for FakeDistributor {
    async fn forward_unprocessed(&self, _ctx: &SyncContext) -> Result<usize> {
        self.forwards.fetch_add(1, Ordering::SeqCst);
        match self.failure {
            Some(reason) => Err(Error::message(reason)),
            None => Ok(0),
        }
    }

    fn discard_cached_unprocessed(&self) {
        self.discards.fetch_add(1, Ordering::SeqCst);
    }
}

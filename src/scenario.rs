//! Scenario test context
//!
//! Owns one [`SessionCollection`] for the lifetime of a test suite and hands
//! each test case a transport scoped to a named session. In replay mode the
//! transport is a [`MockTransport`]; in record mode it is a [`Recorder`] over
//! the live transport, and [`ScenarioContext::finish`] saves the collection.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{Config, Mode};
use crate::matcher::RequestValidator;
use crate::network::BlockingClient;
use crate::recording::{HttpSession, Recorder, SessionCollection};
use crate::replay::Cursor;
use crate::storage::SessionStore;
use crate::transport::{MockTransport, Transport};
use crate::{ReplayError, Result};

/// Replay state kept between acquisitions of the same session
struct Playback {
    session: Arc<HttpSession>,
    position: usize,
}

/// Per-suite recording/replay context
pub struct ScenarioContext {
    mode: Mode,
    store: SessionStore,
    collection: SessionCollection,
    live: Option<Box<dyn Transport>>,
    base_uri: String,
    default_validator: RequestValidator,
    validators: HashMap<String, RequestValidator>,
    playback: HashMap<String, Playback>,
    fresh: HashSet<String>,
}

impl ScenarioContext {
    /// Replay context over the sessions stored in `store`
    ///
    /// # Errors
    ///
    /// Returns error if the collection cannot be loaded
    pub fn replay(store: SessionStore) -> Result<Self> {
        let collection = store.load_collection()?;
        Ok(Self::with_parts(Mode::Replay, store, collection, None))
    }

    /// Record context forwarding to `live`, which serves `base_uri`
    ///
    /// Sessions already in `store` are kept; sessions recorded through this
    /// context replace them on [`finish`](Self::finish). Every recorded
    /// session remembers `base_uri`.
    ///
    /// # Errors
    ///
    /// Returns error if an existing collection cannot be loaded
    pub fn record(
        store: SessionStore,
        live: Box<dyn Transport>,
        base_uri: impl Into<String>,
    ) -> Result<Self> {
        let collection = store.load_or_default()?;
        let mut context = Self::with_parts(Mode::Record, store, collection, Some(live));
        context.base_uri = base_uri.into();
        Ok(context)
    }

    /// Build a context from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the collection cannot be loaded or the live client
    /// cannot be created
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = SessionStore::new(config.session_file.clone());
        let mut context = match config.mode {
            Mode::Replay => Self::replay(store)?,
            Mode::Record => {
                let live = config.live.as_ref().ok_or_else(|| {
                    ReplayError::ConfigError("Record mode requires a [live] target".to_string())
                })?;
                let client = BlockingClient::new(live.target.clone())?;
                Self::record(store, Box::new(client), live.target.clone())?
            }
        };
        context.default_validator = config.matching.default_validator();
        Ok(context)
    }

    fn with_parts(
        mode: Mode,
        store: SessionStore,
        collection: SessionCollection,
        live: Option<Box<dyn Transport>>,
    ) -> Self {
        Self {
            mode,
            store,
            collection,
            live,
            base_uri: String::new(),
            default_validator: RequestValidator::default(),
            validators: HashMap::new(),
            playback: HashMap::new(),
            fresh: HashSet::new(),
        }
    }

    /// Operating mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Sessions held by this context
    pub fn collection(&self) -> &SessionCollection {
        &self.collection
    }

    /// Use `validator` for `name` instead of the recorded one
    ///
    /// In record mode the validator is also stored with the session.
    pub fn set_validator(&mut self, name: &str, validator: RequestValidator) {
        self.validators.insert(name.to_string(), validator);
    }

    /// Run `f` with a transport scoped to session `name`
    ///
    /// The transport is released when `f` returns, whether it succeeded or
    /// not. Acquiring the same session again continues from where the last
    /// acquisition stopped.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` in replay mode if the session is missing, or
    /// whatever `f` returns
    pub fn execute_with_mock<T, F>(&mut self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Transport) -> Result<T>,
    {
        match self.mode {
            Mode::Replay => self.execute_replay(name, f),
            Mode::Record => self.execute_record(name, f),
        }
    }

    fn execute_replay<T, F>(&mut self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Transport) -> Result<T>,
    {
        if !self.playback.contains_key(name) {
            let session = Arc::new(self.collection.get(name)?.clone());
            debug!("Loaded session {} ({} messages)", name, session.len());
            self.playback.insert(
                name.to_string(),
                Playback {
                    session,
                    position: 0,
                },
            );
        }

        let validator = self.validators.get(name).cloned();
        let Some(playback) = self.playback.get_mut(name) else {
            return Err(ReplayError::SessionNotFound(name.to_string()));
        };

        let mut transport = MockTransport::resume(Arc::clone(&playback.session), playback.position);
        if let Some(validator) = validator {
            transport = transport.with_validator(validator);
        }

        let result = f(&mut transport);
        playback.position = transport.release().position();
        result
    }

    fn execute_record<T, F>(&mut self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Transport) -> Result<T>,
    {
        let validator = self
            .validators
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.default_validator.clone());

        let Some(live) = self.live.as_mut() else {
            return Err(ReplayError::ConfigError(
                "Record mode requires a live transport".to_string(),
            ));
        };

        // A session is re-recorded from scratch the first time a run touches it
        if !self.fresh.contains(name) {
            let session = HttpSession::new(name)?.with_base_uri(self.base_uri.clone());
            self.collection.insert(session)?;
            self.fresh.insert(name.to_string());
            info!("Recording session {} against {}", name, self.base_uri);
        }

        let session = self.collection.get_mut(name)?;
        session.set_validator(validator);

        let mut recorder = Recorder::new(live.as_mut(), session);
        f(&mut recorder)
    }

    /// Position reached in session `name`
    ///
    /// In record mode this is the number of messages recorded so far.
    pub fn cursor(&self, name: &str) -> Option<Cursor> {
        match self.mode {
            Mode::Replay => self
                .playback
                .get(name)
                .map(|p| Cursor::resume(p.position, p.session.len())),
            Mode::Record => self
                .collection
                .get(name)
                .ok()
                .map(|s| Cursor::resume(s.len(), s.len())),
        }
    }

    /// Check that every recorded message of `name` was consumed
    ///
    /// Always succeeds in record mode.
    ///
    /// # Errors
    ///
    /// Returns `UnconsumedRecordings` if messages were left over, or
    /// `SessionNotFound` if the session was never acquired
    pub fn verify_consumed(&self, name: &str) -> Result<()> {
        if self.mode.is_record() {
            return Ok(());
        }

        let playback = self
            .playback
            .get(name)
            .ok_or_else(|| ReplayError::SessionNotFound(name.to_string()))?;

        if playback.position == playback.session.len() {
            Ok(())
        } else {
            Err(ReplayError::UnconsumedRecordings {
                session: name.to_string(),
                consumed: playback.position,
                len: playback.session.len(),
            })
        }
    }

    /// End the suite, saving recorded sessions in record mode
    ///
    /// Replay mode never writes to the store.
    ///
    /// # Errors
    ///
    /// Returns error if saving fails
    pub fn finish(self) -> Result<()> {
        if self.mode.is_record() {
            self.store.save(&self.collection)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Request, Response};
    use tempfile::TempDir;

    /// Live stand-in answering every request with 200 and a counter body
    struct CountingService {
        served: usize,
    }

    impl Transport for CountingService {
        fn send(&mut self, _request: Request) -> Result<Response> {
            self.served += 1;
            Ok(Response::new(200).with_body(self.served.to_string().into_bytes()))
        }
    }

    const LIVE: &str = "http://management.example.test";

    fn quota_request() -> Request {
        Request::new("GET", "/servers/abc/serverquotas").with_header("User-Agent", "CloudCmdlets/0.1.0")
    }

    fn store_with_quota(dir: &TempDir) -> SessionStore {
        let store = SessionStore::new(dir.path().join("cmdlets.mock"));
        let mut session = HttpSession::new("Quota").unwrap();
        session.record(quota_request(), Response::new(200).with_body(b"[1]".to_vec()));
        session.record(quota_request(), Response::new(200).with_body(b"[2]".to_vec()));
        store.save(&std::iter::once(session).collect()).unwrap();
        store
    }

    #[test]
    fn test_replay_resumes_across_acquisitions() {
        let dir = TempDir::new().unwrap();
        let mut context = ScenarioContext::replay(store_with_quota(&dir)).unwrap();

        let first = context
            .execute_with_mock("Quota", |t| t.send(quota_request()))
            .unwrap();
        assert_eq!(first.body, b"[1]");
        assert!(context.verify_consumed("Quota").is_err());

        let second = context
            .execute_with_mock("Quota", |t| t.send(quota_request()))
            .unwrap();
        assert_eq!(second.body, b"[2]");

        let third = context.execute_with_mock("Quota", |t| t.send(quota_request()));
        assert!(matches!(third, Err(ReplayError::ExhaustedSession { .. })));

        assert_eq!(context.cursor("Quota").unwrap().remaining(), 0);
        assert!(context.verify_consumed("Quota").is_ok());
    }

    #[test]
    fn test_replay_missing_session() {
        let dir = TempDir::new().unwrap();
        let mut context = ScenarioContext::replay(store_with_quota(&dir)).unwrap();

        let result = context.execute_with_mock("Absent", |t| t.send(quota_request()));
        assert!(matches!(result, Err(ReplayError::SessionNotFound(_))));
        assert!(context.cursor("Absent").is_none());
    }

    #[test]
    fn test_validator_override() {
        let dir = TempDir::new().unwrap();
        let mut context = ScenarioContext::replay(store_with_quota(&dir)).unwrap();

        let foreign = Request::new("GET", "/elsewhere").with_header("User-Agent", "curl/8.0");
        let rejected = context.execute_with_mock("Quota", |t| t.send(foreign.clone()));
        assert!(matches!(rejected, Err(ReplayError::RequestMismatch { .. })));
        assert_eq!(context.cursor("Quota").unwrap().position(), 0);

        context.set_validator("Quota", RequestValidator::MethodOnly);
        let accepted = context.execute_with_mock("Quota", |t| t.send(foreign));
        assert!(accepted.is_ok());
    }

    #[test]
    fn test_replay_never_writes() {
        let dir = TempDir::new().unwrap();
        let store = store_with_quota(&dir);
        let before = std::fs::read(store.path()).unwrap();

        let mut context = ScenarioContext::replay(store.clone()).unwrap();
        context
            .execute_with_mock("Quota", |t| t.send(quota_request()))
            .unwrap();
        context.finish().unwrap();

        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn test_record_then_replay() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("cmdlets.mock"));

        let mut context =
            ScenarioContext::record(store.clone(), Box::new(CountingService { served: 0 }), LIVE).unwrap();
        context.set_validator("Quota", RequestValidator::MethodOnly);
        for _ in 0..2 {
            context
                .execute_with_mock("Quota", |t| t.send(quota_request()))
                .unwrap();
        }
        assert_eq!(context.cursor("Quota").unwrap().len(), 2);
        context.finish().unwrap();

        let loaded = store.load("Quota").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.base_uri(), LIVE);
        assert_eq!(loaded.validator(), &RequestValidator::MethodOnly);

        let mut replay = ScenarioContext::replay(store).unwrap();
        let bodies: Vec<Vec<u8>> = (0..2)
            .map(|_| {
                replay
                    .execute_with_mock("Quota", |t| t.send(quota_request()))
                    .unwrap()
                    .body
            })
            .collect();
        assert_eq!(bodies, vec![b"1".to_vec(), b"2".to_vec()]);
    }

    #[test]
    fn test_record_replaces_stale_session() {
        let dir = TempDir::new().unwrap();
        let store = store_with_quota(&dir);

        let mut context =
            ScenarioContext::record(store.clone(), Box::new(CountingService { served: 0 }), LIVE).unwrap();
        context
            .execute_with_mock("Quota", |t| t.send(quota_request()))
            .unwrap();
        context.finish().unwrap();

        assert_eq!(store.load("Quota").unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_name_reported_on_every_attempt() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("cmdlets.mock"));
        let mut context =
            ScenarioContext::record(store, Box::new(CountingService { served: 0 }), LIVE).unwrap();

        for _ in 0..2 {
            let result = context.execute_with_mock("../escape", |t| t.send(quota_request()));
            assert!(matches!(result, Err(ReplayError::InvalidSessionName(_))));
        }
        assert!(context.collection().is_empty());
    }
}

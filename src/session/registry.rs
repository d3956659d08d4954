//! Concurrent registry of open sessions keyed by [`TransmitterId`].
//!
//! Each session sits behind its own mutex, so connections from unrelated
//! transmitters never wait on each other. A [`SessionHandle`] owns its
//! session independently of the map: once a newer handshake takes over the
//! transmitter's entry, the older session is still fed and finalized through
//! its handle. The map itself is only touched to
//! look a session up, install one, or drop it once finalized; session locks
//! are never taken while a map guard is held.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use dashmap::{DashMap, mapref::entry::Entry};
use tracing::{debug, info};

use super::{
    AcceptStatus,
    FinalizeReason,
    FinalizedImage,
    ReassemblyError,
    SessionReassembler,
    TransmitterId,
};
use crate::{config::PlaceholderFill, frame::Frame, grid::GridShape, params::SessionParams};

type SharedSession = Arc<Mutex<SessionReassembler>>;

fn lock(session: &SharedSession) -> MutexGuard<'_, SessionReassembler> {
    // Slot updates are single assignments, so a poisoned session is intact.
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reference to one open session held by the connection that feeds it.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    transmitter: TransmitterId,
    session: SharedSession,
}

impl SessionHandle {
    /// Transmitter the session belongs to.
    #[must_use]
    pub fn transmitter(&self) -> &TransmitterId { &self.transmitter }

    /// Parameters the session was opened with.
    #[must_use]
    pub fn params(&self) -> SessionParams { lock(&self.session).params() }

    /// Whether every slot has been filled.
    #[must_use]
    pub fn is_complete(&self) -> bool { lock(&self.session).is_complete() }

    /// Whether the session still accepts frames.
    #[must_use]
    pub fn is_open(&self) -> bool { lock(&self.session).is_open() }
}

/// Registry of open sessions, one per transmitter.
///
/// The registry is an explicit object; share it between connection tasks with
/// an [`Arc`].
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use stillframe::{
///     encoder::FrameEncoder,
///     session::{SessionRegistry, TransmitterId},
/// };
///
/// let registry = SessionRegistry::default();
/// let sequence = FrameEncoder::default().encode(Bytes::from(vec![9_u8; 200])).unwrap();
/// let id = TransmitterId::new("TX1").unwrap();
/// let handle = registry
///     .get_or_create(&id, sequence.params(), sequence.grid(), "frame.jpg")
///     .unwrap();
///
/// let mut image = None;
/// for frame in sequence {
///     image = registry.accept(&handle, frame).unwrap();
/// }
/// assert_eq!(image.unwrap().buffer(), &[9_u8; 200][..]);
/// assert!(registry.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<TransmitterId, SharedSession>,
    fill: PlaceholderFill,
}

impl SessionRegistry {
    /// Create a registry whose sessions fill missing slots with `fill`.
    #[must_use]
    pub fn new(fill: PlaceholderFill) -> Self {
        Self {
            sessions: DashMap::new(),
            fill,
        }
    }

    /// Placeholder used by sessions this registry creates.
    #[must_use]
    pub const fn fill(&self) -> PlaceholderFill { self.fill }

    /// Number of transmitters with a registered session.
    #[must_use]
    pub fn len(&self) -> usize { self.sessions.len() }

    /// Whether no session is open.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.sessions.is_empty() }

    /// Whether `id` has an open session.
    #[must_use]
    pub fn contains(&self, id: &TransmitterId) -> bool { self.sessions.contains_key(id) }

    /// Return the open session for `id`, creating one if none exists.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::ParamsConflict`] when `id` already has an
    /// open session negotiated with different parameters. Use
    /// [`replace`](Self::replace) to supersede it.
    pub fn get_or_create(
        &self,
        id: &TransmitterId,
        params: SessionParams,
        grid: GridShape,
        image_name: &str,
    ) -> Result<SessionHandle, ReassemblyError> {
        loop {
            let existing = self.sessions.get(id).map(|entry| Arc::clone(entry.value()));
            if let Some(session) = existing {
                let guard = lock(&session);
                if guard.is_open() {
                    if guard.params() != params {
                        return Err(ReassemblyError::ParamsConflict {
                            open: guard.params(),
                            offered: params,
                        });
                    }
                    drop(guard);
                    return Ok(Self::handle(id, session));
                }
                drop(guard);
                self.detach(id, &session);
                continue;
            }

            let session = self.open(id, params, grid, image_name);
            // An occupied entry means another connection won the race; re-check it.
            if let Entry::Vacant(vacant) = self.sessions.entry(id.clone()) {
                vacant.insert(Arc::clone(&session));
                debug!(transmitter = %id, ?params, "session opened");
                return Ok(Self::handle(id, session));
            }
        }
    }

    /// Start a fresh session for a new handshake from `id`.
    ///
    /// Unlike [`get_or_create`](Self::get_or_create) this never joins an open
    /// session. A session `id` already had stays open for the handle that
    /// feeds it and is only dropped from lookup, so overlapping transfers from
    /// one transmitter each keep their own slots.
    #[must_use]
    pub fn begin(
        &self,
        id: &TransmitterId,
        params: SessionParams,
        grid: GridShape,
        image_name: &str,
    ) -> SessionHandle {
        let session = self.open(id, params, grid, image_name);
        if self.sessions.insert(id.clone(), Arc::clone(&session)).is_some() {
            debug!(transmitter = %id, "earlier session left to its connection");
        }
        debug!(transmitter = %id, image = image_name, ?params, "session opened");
        Self::handle(id, session)
    }

    /// Install a fresh session for `id`, finalizing any open one as
    /// [`FinalizeReason::Superseded`].
    ///
    /// Returns the new handle and the superseded image, if there was one.
    #[must_use]
    pub fn replace(
        &self,
        id: &TransmitterId,
        params: SessionParams,
        grid: GridShape,
        image_name: &str,
    ) -> (SessionHandle, Option<FinalizedImage>) {
        let session = self.open(id, params, grid, image_name);
        let previous = self.sessions.insert(id.clone(), Arc::clone(&session));
        let superseded = previous.and_then(|old| {
            lock(&old)
                .finalize(FinalizeReason::Superseded)
                .ok()
                .inspect(|image| log_finalized(image))
        });
        debug!(transmitter = %id, ?params, "session replaced");
        (Self::handle(id, session), superseded)
    }

    /// Accept `frame` into the session behind `handle`.
    ///
    /// # Errors
    ///
    /// See [`accept_at`](Self::accept_at).
    pub fn accept(
        &self,
        handle: &SessionHandle,
        frame: Frame,
    ) -> Result<Option<FinalizedImage>, ReassemblyError> {
        self.accept_at(handle, frame, Instant::now())
    }

    /// Accept `frame` with an explicit clock reading.
    ///
    /// When the frame fills the last slot the session is finalized, dropped
    /// from the registry, and its image returned.
    ///
    /// # Errors
    ///
    /// Propagates the [`ReassemblyError`] raised by
    /// [`SessionReassembler::accept_at`]. The session stays open.
    pub fn accept_at(
        &self,
        handle: &SessionHandle,
        frame: Frame,
        now: Instant,
    ) -> Result<Option<FinalizedImage>, ReassemblyError> {
        let mut session = lock(&handle.session);
        match session.accept_at(frame, now)? {
            AcceptStatus::Incomplete { .. } => Ok(None),
            AcceptStatus::Complete => {
                let image = session.finalize_at(FinalizeReason::Complete, now)?;
                drop(session);
                self.detach(&handle.transmitter, &handle.session);
                log_finalized(&image);
                Ok(Some(image))
            }
        }
    }

    /// Finalize the session behind `handle` and drop it from the registry.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::SessionFinalized`] if the session already
    /// ended, for example because a newer handshake superseded it.
    pub fn finalize(
        &self,
        handle: &SessionHandle,
        reason: FinalizeReason,
    ) -> Result<FinalizedImage, ReassemblyError> {
        let result = lock(&handle.session).finalize(reason);
        self.detach(&handle.transmitter, &handle.session);
        result.inspect(log_finalized)
    }

    /// Finalize every session idle for at least `timeout` at `now`.
    pub fn finalize_expired_at(&self, now: Instant, timeout: Duration) -> Vec<FinalizedImage> {
        let candidates: Vec<(TransmitterId, SharedSession)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut expired = Vec::new();
        for (id, session) in candidates {
            let mut guard = lock(&session);
            if !guard.is_expired_at(now, timeout) {
                continue;
            }
            let image = guard.finalize_at(FinalizeReason::InactivityTimeout, now);
            drop(guard);
            self.detach(&id, &session);
            if let Ok(image) = image {
                log_finalized(&image);
                expired.push(image);
            }
        }
        expired
    }

    /// Finalize every open session with `reason` and empty the registry.
    pub fn finalize_all(&self, reason: FinalizeReason) -> Vec<FinalizedImage> {
        let candidates: Vec<(TransmitterId, SharedSession)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        candidates
            .into_iter()
            .filter_map(|(id, session)| {
                let image = lock(&session).finalize(reason);
                self.detach(&id, &session);
                image.ok().inspect(log_finalized)
            })
            .collect()
    }

    fn open(
        &self,
        id: &TransmitterId,
        params: SessionParams,
        grid: GridShape,
        image_name: &str,
    ) -> SharedSession {
        Arc::new(Mutex::new(SessionReassembler::new(
            id.clone(),
            image_name,
            params,
            grid,
            self.fill,
        )))
    }

    fn handle(id: &TransmitterId, session: SharedSession) -> SessionHandle {
        SessionHandle {
            transmitter: id.clone(),
            session,
        }
    }

    /// Remove `id` only while it still maps to `session`.
    fn detach(&self, id: &TransmitterId, session: &SharedSession) {
        self.sessions
            .remove_if(id, |_, current| Arc::ptr_eq(current, session));
    }
}

fn log_finalized(image: &FinalizedImage) {
    info!(
        transmitter = %image.transmitter(),
        image = image.image_name(),
        reason = %image.reason(),
        missing = image.missing().len(),
        total_frames = image.params().total_frames(),
        "session finalized"
    );
}

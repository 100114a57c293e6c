use jacques_protocol::Session;

/// State changes emitted by the session registry.
///
/// Each variant describes what happened, not what should happen. Emission is
/// synchronous under the registry's lock, so for a given session id the
/// event order matches the mutation order, and `SessionRemoved` is always
/// the last event observed for its id.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// A session was created or mutated; carries the post-mutation snapshot.
    SessionUpdated(Box<Session>),
    /// A session left the registry.
    SessionRemoved { session_id: String },
    /// The focused session changed; carries a snapshot when focus is set.
    FocusChanged {
        session_id: Option<String>,
        session: Option<Box<Session>>,
    },
}

impl RegistryEvent {
    /// The session id this event concerns, when it concerns exactly one.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            RegistryEvent::SessionUpdated(session) => Some(&session.session_id),
            RegistryEvent::SessionRemoved { session_id } => Some(session_id),
            RegistryEvent::FocusChanged { session_id, .. } => session_id.as_deref(),
        }
    }
}

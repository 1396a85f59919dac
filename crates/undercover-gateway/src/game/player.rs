//! Players and their outbound sinks.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use undercover_core::protocol::{PlayerView, ResponseEnvelope, Role};

/// Process-unique identity of one outbound queue.
pub type SinkId = u64;

static NEXT_SINK_ID: AtomicU64 = AtomicU64::new(1);

/// Outcome of a non-blocking delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Queue full; the message was dropped.
    Full,
    /// Receiver is gone.
    Closed,
}

/// Bounded outbound queue of one connection.
///
/// Not `Clone`: the session owns the only sender, so dropping a sink ends the
/// connection's relay.
#[derive(Debug)]
pub struct Sink {
    id: SinkId,
    tx: mpsc::Sender<ResponseEnvelope>,
}

impl Sink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ResponseEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = NEXT_SINK_ID.fetch_add(1, Ordering::Relaxed);
        (Self { id, tx }, rx)
    }

    pub fn id(&self) -> SinkId {
        self.id
    }

    /// True once the connection dropped its receiving half.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn deliver(&self, env: ResponseEnvelope) -> Delivery {
        match self.tx.try_send(env) {
            Ok(()) => Delivery::Sent,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

#[derive(Debug)]
pub struct Player {
    pub id: String,
    pub name: String,
    /// Visible role. Eliminated players show as `Observer`.
    pub role: Role,
    /// Role held before elimination or leaving.
    pub original: Option<Role>,
    /// Word held before leaving; the visible `word` is cleared on exit.
    pub original_word: Option<String>,
    /// Secret word; empty for blank, admin, observers.
    pub word: String,
    /// `None` while disconnected; broadcasts skip the player.
    pub sink: Option<Sink>,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            original: None,
            original_word: None,
            word: String::new(),
            sink: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.role.is_alive()
    }

    pub fn is_connected(&self) -> bool {
        self.sink.is_some()
    }

    /// True when `sink_id` is the sink currently attached.
    pub fn owns_sink(&self, sink_id: SinkId) -> bool {
        self.sink.as_ref().is_some_and(|s| s.id() == sink_id)
    }

    /// Role reported in the final result.
    pub fn final_role(&self) -> Role {
        self.original.unwrap_or(self.role)
    }

    /// Word reported in the final result.
    pub fn final_word(&self) -> &str {
        self.original_word.as_deref().unwrap_or(&self.word)
    }

    /// What everybody else may see: no word, no secret role.
    pub fn public_view(&self) -> PlayerView {
        PlayerView {
            id: self.id.clone(),
            name: self.name.clone(),
            role: (!self.role.is_secret()).then_some(self.role),
            word: None,
        }
    }

    /// The owner's (or the game master's) view.
    pub fn private_view(&self) -> PlayerView {
        PlayerView {
            id: self.id.clone(),
            name: self.name.clone(),
            role: Some(self.role),
            word: (!self.word.is_empty()).then(|| self.word.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_view_hides_secret_role_and_word() {
        let mut p = Player::new("p1", "alice", Role::Spy);
        p.word = "banana".into();
        let v = p.public_view();
        assert_eq!(v.role, None);
        assert_eq!(v.word, None);

        let v = p.private_view();
        assert_eq!(v.role, Some(Role::Spy));
        assert_eq!(v.word.as_deref(), Some("banana"));
    }

    #[test]
    fn observers_and_admin_are_visible() {
        assert_eq!(Player::new("a", "a", Role::Admin).public_view().role, Some(Role::Admin));
        assert_eq!(Player::new("o", "o", Role::Observer).public_view().role, Some(Role::Observer));
    }

    #[test]
    fn full_sink_drops_instead_of_blocking() {
        let (sink, mut rx) = Sink::channel(1);
        assert_eq!(sink.deliver(ResponseEnvelope::error("a")), Delivery::Sent);
        assert_eq!(sink.deliver(ResponseEnvelope::error("b")), Delivery::Full);
        assert!(rx.try_recv().is_ok());
        drop(rx);
        assert_eq!(sink.deliver(ResponseEnvelope::error("c")), Delivery::Closed);
        assert!(sink.is_closed());
    }

    #[test]
    fn final_word_survives_clearing() {
        let mut p = Player::new("p1", "alice", Role::Normal);
        p.word = "apple".into();
        assert_eq!(p.final_word(), "apple");
        p.original_word = Some(std::mem::take(&mut p.word));
        assert!(p.word.is_empty());
        assert_eq!(p.final_word(), "apple");
    }

    #[test]
    fn sink_ids_are_unique() {
        let (a, _ra) = Sink::channel(1);
        let (b, _rb) = Sink::channel(1);
        assert_ne!(a.id(), b.id());
    }
}

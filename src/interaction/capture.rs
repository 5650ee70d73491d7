//! Scoped document-level listener subscriptions.

use serde::{Deserialize, Serialize};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerKind {
    PointerMove,
    PointerUp,
    Blur,
}

impl ListenerKind {
    pub const ALL: [ListenerKind; 3] =
        [ListenerKind::PointerMove, ListenerKind::PointerUp, ListenerKind::Blur];

    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerKind::PointerMove => "pointermove",
            ListenerKind::PointerUp => "pointerup",
            ListenerKind::Blur => "blur",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u32);

/// Whatever owns the global event listeners (the document, a test double).
pub trait ListenerHost {
    fn subscribe(&self, kind: ListenerKind) -> ListenerId;
    fn unsubscribe(&self, id: ListenerId);
}

/// Live subscriptions for one interaction; released on drop.
pub struct PointerCapture {
    host: Rc<dyn ListenerHost>,
    ids: Vec<ListenerId>,
}

impl PointerCapture {
    pub fn acquire(host: Rc<dyn ListenerHost>) -> Self {
        let ids = ListenerKind::ALL.iter().map(|&kind| host.subscribe(kind)).collect();
        tracing::debug!("pointer capture acquired");
        Self { host, ids }
    }

    pub fn ids(&self) -> &[ListenerId] {
        &self.ids
    }
}

impl Drop for PointerCapture {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            self.host.unsubscribe(id);
        }
        tracing::debug!("pointer capture released");
    }
}

impl std::fmt::Debug for PointerCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointerCapture").field("ids", &self.ids).finish()
    }
}

/// Host that records subscriptions in memory.
#[derive(Debug, Default)]
pub struct RecordingHost {
    state: std::cell::RefCell<RecordingState>,
}

#[derive(Debug, Default)]
struct RecordingState {
    next: u32,
    active: Vec<(ListenerId, ListenerKind)>,
}

impl RecordingHost {
    pub fn active(&self) -> Vec<ListenerKind> {
        self.state.borrow().active.iter().map(|(_, k)| *k).collect()
    }
}

impl ListenerHost for RecordingHost {
    fn subscribe(&self, kind: ListenerKind) -> ListenerId {
        let mut state = self.state.borrow_mut();
        state.next += 1;
        let id = ListenerId(state.next);
        state.active.push((id, kind));
        id
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.state.borrow_mut().active.retain(|(active, _)| *active != id);
    }
}

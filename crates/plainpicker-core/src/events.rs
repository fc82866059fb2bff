use chrono::NaiveDate;
use tracing::trace;
use uuid::Uuid;

pub type PickerId = Uuid;

/// Notifications a picker emits to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerEvent {
    Select(NaiveDate),
    RangeSelect { start: NaiveDate, end: NaiveDate },
    Open,
    Close,
    Draw,
    /// The bound field value was rewritten. `fired_by` names the picker
    /// that wrote it so its own change listener can skip the echo.
    FieldChange {
        value: String,
        fired_by: Option<PickerId>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Listener<E> {
    id: SubscriptionId,
    once: bool,
    callback: Box<dyn FnMut(&E)>,
}

/// Small typed event emitter owned by a picker.
pub struct EventEmitter<E> {
    next_id: u64,
    listeners: Vec<Listener<E>>,
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self {
            next_id: 0,
            listeners: Vec::new(),
        }
    }
}

impl<E> std::fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<E: std::fmt::Debug> EventEmitter<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&E) + 'static,
    {
        self.push(callback, false)
    }

    /// Listener removed after its first delivery.
    pub fn subscribe_once<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&E) + 'static,
    {
        self.push(callback, true)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|listener| listener.id != id);
        before != self.listeners.len()
    }

    pub fn emit(&mut self, event: &E) {
        trace!(?event, listeners = self.listeners.len(), "emitting picker event");
        for listener in &mut self.listeners {
            (listener.callback)(event);
        }
        self.listeners.retain(|listener| !listener.once);
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    fn push<F>(&mut self, callback: F, once: bool) -> SubscriptionId
    where
        F: FnMut(&E) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener {
            id,
            once,
            callback: Box::new(callback),
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::{EventEmitter, PickerEvent};

    #[test]
    fn subscribe_emit_unsubscribe() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut emitter = EventEmitter::new();

        let sink = Rc::clone(&seen);
        let id = emitter.subscribe(move |event: &PickerEvent| sink.borrow_mut().push(event.clone()));
        let once_sink = Rc::clone(&seen);
        emitter.subscribe_once(move |_: &PickerEvent| once_sink.borrow_mut().push(PickerEvent::Close));

        emitter.emit(&PickerEvent::Open);
        emitter.emit(&PickerEvent::Draw);
        assert_eq!(
            *seen.borrow(),
            vec![PickerEvent::Open, PickerEvent::Close, PickerEvent::Draw]
        );

        assert!(emitter.unsubscribe(id));
        assert!(!emitter.unsubscribe(id));
        assert!(emitter.is_empty());
        emitter.emit(&PickerEvent::Open);
        assert_eq!(seen.borrow().len(), 3);
    }
}

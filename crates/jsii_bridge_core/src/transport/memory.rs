//! In-process kernel channel.
//!
//! A `MemoryChannel` plays the kernel side with a responder closure that maps
//! every sent line to the lines the kernel would answer with. The paired
//! `MemoryHandle` stays with the caller for inspection.

use super::{KernelChannel, TransportError, TransportResult};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

type Responder = Box<dyn FnMut(&str) -> Vec<String>>;

#[derive(Default)]
struct MemoryState {
    inbound: VecDeque<String>,
    sent: Vec<String>,
    responder: Option<Responder>,
    closed: bool,
}

pub struct MemoryChannel {
    state: Rc<RefCell<MemoryState>>,
}

/// Caller-side view of a `MemoryChannel`.
#[derive(Clone)]
pub struct MemoryHandle {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryChannel {
    /// Channel that only returns lines queued through the handle.
    pub fn new() -> (Self, MemoryHandle) {
        let state = Rc::new(RefCell::new(MemoryState::default()));
        (
            Self {
                state: Rc::clone(&state),
            },
            MemoryHandle { state },
        )
    }

    /// Channel whose responder answers every sent line.
    pub fn with_responder(
        responder: impl FnMut(&str) -> Vec<String> + 'static,
    ) -> (Self, MemoryHandle) {
        let (channel, handle) = Self::new();
        channel.state.borrow_mut().responder = Some(Box::new(responder));
        (channel, handle)
    }
}

impl KernelChannel for MemoryChannel {
    fn send_line(&mut self, line: &str) -> TransportResult<()> {
        let responder = {
            let mut state = self.state.borrow_mut();
            if state.closed {
                return Err(TransportError::Closed);
            }
            state.sent.push(line.to_string());
            state.responder.take()
        };

        // Responder runs outside the borrow so it may use a cloned handle.
        if let Some(mut responder) = responder {
            let replies = responder(line);
            let mut state = self.state.borrow_mut();
            state.inbound.extend(replies);
            state.responder = Some(responder);
        }
        Ok(())
    }

    fn read_line(&mut self) -> TransportResult<String> {
        let mut state = self.state.borrow_mut();
        if state.closed {
            return Err(TransportError::Closed);
        }
        state.inbound.pop_front().ok_or(TransportError::Disconnected)
    }

    fn close(&mut self) -> TransportResult<()> {
        self.state.borrow_mut().closed = true;
        Ok(())
    }
}

impl MemoryHandle {
    /// Queues one kernel line.
    pub fn push_line(&self, line: impl Into<String>) {
        self.state.borrow_mut().inbound.push_back(line.into());
    }

    /// Every line the bridge has sent so far.
    pub fn sent_lines(&self) -> Vec<String> {
        self.state.borrow().sent.clone()
    }

    /// Sent lines parsed as JSON; unparseable lines are skipped.
    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.state
            .borrow()
            .sent
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }
}

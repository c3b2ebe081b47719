//! Connection registry and kill dispatch, shared by every connection of a
//! server instance.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use rand::Rng;
use tokio::sync::Notify;

use mimic_common::err::{ErrorKind, KillKind, ServerError, SqlResult};

const CONNECTION_ID_BITS: u32 = 16;
const MAX_CONNECTION_SEQ: u32 = 1 << CONNECTION_ID_BITS;

/// Cancellation handle owned by a connection. `kill` is called by the
/// control plane from any task; the owning connection observes it through
/// `killed` / `consume`.
#[derive(Debug, Default)]
pub struct KillSwitch {
    state: Mutex<Option<KillKind>>,
    notify: Notify,
}

impl KillSwitch {
    pub fn new() -> Self {
        KillSwitch::default()
    }

    pub fn kill(&self, kind: KillKind) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        // A connection kill outranks a pending query kill.
        match *state {
            Some(KillKind::Connection) => {}
            _ => *state = Some(kind),
        }
        drop(state);
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    /// Wait until a kill is delivered. Does not clear the signal.
    pub async fn killed(&self) -> KillKind {
        loop {
            // Register interest before checking, so a kill landing between
            // the check and the await is not lost.
            let notified = self.notify.notified();
            if let Some(kind) = *self.state.lock().unwrap_or_else(|e| e.into_inner()) {
                return kind;
            }
            notified.await;
        }
    }

    /// Take the pending kill, if any. A query kill is consumed so the
    /// command loop can continue; a connection kill stays latched.
    pub fn consume(&self) -> Option<KillKind> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match *state {
            Some(KillKind::Query) => state.take(),
            other => other,
        }
    }
}

/// Registry of live connections with globally unique 32-bit ids composed
/// as `(server_id << 16) | conn_seq`.
pub struct Control {
    server_id: u16,
    seq: Mutex<u32>,
    connections: DashMap<u32, Arc<KillSwitch>>,
}

impl Control {
    pub fn new(server_id: Option<u16>) -> Self {
        let server_id = server_id.unwrap_or_else(|| rand::thread_rng().gen());
        Control {
            server_id,
            seq: Mutex::new(0),
            connections: DashMap::new(),
        }
    }

    pub fn server_id(&self) -> u16 {
        self.server_id
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Allocate an id and register a fresh kill switch for it.
    pub fn add(&self) -> SqlResult<(u32, Arc<KillSwitch>)> {
        if self.connections.len() >= MAX_CONNECTION_SEQ as usize {
            return Err(ServerError::mysql(
                ErrorKind::ConCountError,
                "Too many connections",
            ));
        }

        let prefix = (self.server_id as u32) << CONNECTION_ID_BITS;
        let mut seq = self.seq.lock().unwrap_or_else(|e| e.into_inner());
        // The modulo sequence may lap ids still in flight; skip those.
        let connection_id = loop {
            let candidate = prefix | *seq;
            *seq = (*seq + 1) % MAX_CONNECTION_SEQ;
            if !self.connections.contains_key(&candidate) {
                break candidate;
            }
        };
        drop(seq);

        let switch = Arc::new(KillSwitch::new());
        self.connections.insert(connection_id, switch.clone());
        Ok((connection_id, switch))
    }

    pub fn remove(&self, connection_id: u32) {
        self.connections.remove(&connection_id);
    }

    /// Signal the target connection. Returns false when the id is unknown.
    pub fn kill(&self, connection_id: u32, kind: KillKind) -> bool {
        match self.connections.get(&connection_id) {
            Some(switch) => {
                switch.kill(kind);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_id_layout() {
        let control = Control::new(Some(0x00AB));
        let (id, _switch) = control.add().unwrap();
        assert_eq!(0x00AB_0000, id);
        let (id2, _switch) = control.add().unwrap();
        assert_eq!(0x00AB_0001, id2);
    }

    #[test]
    fn test_skips_ids_in_use() {
        let control = Control::new(Some(1));
        let (first, _s1) = control.add().unwrap();
        // Wrap the sequence all the way around to just before `first`.
        *control.seq.lock().unwrap() = first & 0xFFFF;
        let (second, _s2) = control.add().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_kill_dispatch() {
        let control = Control::new(Some(2));
        let (id, switch) = control.add().unwrap();
        assert!(control.kill(id, KillKind::Query));
        assert_eq!(Some(KillKind::Query), switch.consume());
        // query kill is consumed
        assert_eq!(None, switch.consume());
        assert!(!control.kill(0xFFFF_FFFF, KillKind::Query));
    }

    #[test]
    fn test_connection_kill_stays_latched() {
        let switch = KillSwitch::new();
        switch.kill(KillKind::Connection);
        assert_eq!(Some(KillKind::Connection), switch.consume());
        assert_eq!(Some(KillKind::Connection), switch.consume());
        // a later query kill does not downgrade it
        switch.kill(KillKind::Query);
        assert_eq!(Some(KillKind::Connection), switch.consume());
    }

    #[tokio::test]
    async fn test_killed_wakes_waiter() {
        let switch = Arc::new(KillSwitch::new());
        let waiter = {
            let switch = switch.clone();
            tokio::spawn(async move { switch.killed().await })
        };
        tokio::task::yield_now().await;
        switch.kill(KillKind::Query);
        assert_eq!(KillKind::Query, waiter.await.unwrap());
    }

    #[test]
    fn test_remove_frees_slot() {
        let control = Control::new(Some(3));
        let (id, _switch) = control.add().unwrap();
        assert_eq!(1, control.len());
        control.remove(id);
        assert!(control.is_empty());
    }
}

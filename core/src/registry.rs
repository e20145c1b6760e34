use std::collections::HashMap;
use std::sync::{Arc, Weak};

use notify_api::{OwnerId, PortId, Token, WatchFlags};
use parking_lot::Mutex;
use tracing::debug;

use crate::dispatch::{DispatchStats, Matched};
use crate::error::{Error, Result};
use crate::owner::{Association, Owner};
use crate::target::WatchTarget;
use crate::transport::{Target, Transport};

/// Stable handle of a listener.
pub type ListenerId = u64;

pub const DEFAULT_MAX_LISTENERS: usize = 4096;

struct Listener {
    target: WatchTarget,
    flags: WatchFlags,
    port: PortId,
    token: Token,
    owner: Weak<Owner>,
    owner_id: OwnerId,
    association: Association,
}

impl Listener {
    /// Drop the owner registration. Must not be called with the registry
    /// locked: upgrading may yield the last strong reference to the owner,
    /// whose drop runs hooks that lock the registry.
    fn detach_owner(&self) {
        if let Some(owner) = self.owner.upgrade() {
            owner.detach(self.association);
        }
    }

    fn info(&self, id: ListenerId) -> ListenerInfo {
        ListenerInfo {
            id,
            target: self.target,
            flags: self.flags,
            port: self.port,
            token: self.token,
            owner: self.owner_id,
        }
    }
}

/// Copy of a listener's public fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerInfo {
    pub id: ListenerId,
    pub target: WatchTarget,
    pub flags: WatchFlags,
    pub port: PortId,
    pub token: Token,
    pub owner: OwnerId,
}

struct ListenerGroup {
    target: WatchTarget,
    members: Vec<ListenerId>,
}

#[derive(Default)]
pub(crate) struct RegistryState {
    listeners: HashMap<ListenerId, Listener>,
    groups: HashMap<WatchTarget, ListenerGroup>,
    next_id: ListenerId,
}

impl RegistryState {
    fn find(&self, target: WatchTarget, port: PortId, token: Token) -> Option<ListenerId> {
        self.groups.get(&target)?.members.iter().copied().find(|id| {
            self.listeners
                .get(id)
                .is_some_and(|l| l.port == port && l.token == token)
        })
    }

    fn insert(&mut self, id: ListenerId, listener: Listener) {
        let target = listener.target;
        self.listeners.insert(id, listener);
        self.groups
            .entry(target)
            .or_insert_with(|| ListenerGroup {
                target,
                members: Vec::new(),
            })
            .members
            .push(id);
    }

    /// Unlink a listener, dropping its group if it was the last member.
    fn remove(&mut self, id: ListenerId) -> Option<Listener> {
        let listener = self.listeners.remove(&id)?;
        if let Some(group) = self.groups.get_mut(&listener.target) {
            group.members.retain(|m| *m != id);
            if group.members.is_empty() {
                debug!(object = %group.target, "listener group emptied");
                self.groups.remove(&listener.target);
            }
        }
        Some(listener)
    }

    /// Destinations interested in `flags`: the wildcard group first, then
    /// the group of `team` if given, each in subscription order.
    pub(crate) fn matching_targets(&self, team: Option<i32>, flags: WatchFlags) -> Vec<Matched> {
        let groups = std::iter::once(WatchTarget::All).chain(team.map(WatchTarget::Team));
        let mut matched = Vec::new();
        for key in groups {
            let Some(group) = self.groups.get(&key) else {
                continue;
            };
            for listener in group.members.iter().filter_map(|id| self.listeners.get(id)) {
                if listener.flags.intersects(flags) {
                    matched.push(Matched {
                        group: key,
                        target: Target {
                            port: listener.port,
                            token: listener.token,
                        },
                    });
                }
            }
        }
        matched
    }
}

pub(crate) struct Shared {
    pub(crate) state: Mutex<RegistryState>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) stats: DispatchStats,
    max_listeners: usize,
}

/// Process-wide registry of system watchers. Cloning shares the registry.
#[derive(Clone)]
pub struct Registry {
    pub(crate) shared: Arc<Shared>,
}

impl Registry {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_max_listeners(transport, DEFAULT_MAX_LISTENERS)
    }

    pub fn with_max_listeners(transport: Arc<dyn Transport>, max_listeners: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(RegistryState::default()),
                transport,
                stats: DispatchStats::default(),
                max_listeners,
            }),
        }
    }

    /// Start watching `target` for the events in `flags`, delivered to
    /// `(port, token)`.
    ///
    /// Subscribing again with the same target, port and token adds `flags`
    /// to the existing listener and returns its id. The listener is removed
    /// automatically when `owner` is destroyed.
    pub fn subscribe(
        &self,
        target: WatchTarget,
        flags: WatchFlags,
        port: PortId,
        token: Token,
        owner: &Arc<Owner>,
    ) -> Result<ListenerId> {
        if flags.is_empty() {
            return Err(Error::InvalidArgument("empty interest flags".into()));
        }
        if port < 0 {
            return Err(Error::InvalidArgument(format!("bad port {port}")));
        }
        if let WatchTarget::Team(team) = target {
            if team < 0 {
                return Err(Error::InvalidArgument(format!("bad team id {team}")));
            }
        }

        let mut state = self.shared.state.lock();
        if let Some(id) = state.find(target, port, token) {
            if let Some(listener) = state.listeners.get_mut(&id) {
                listener.flags |= flags;
                debug!(
                    id,
                    object = %target,
                    port,
                    token,
                    flags = ?listener.flags,
                    "listener flags merged"
                );
            }
            return Ok(id);
        }

        if state.listeners.len() >= self.shared.max_listeners {
            return Err(Error::ResourceExhausted(self.shared.max_listeners));
        }

        let id = state.next_id;
        let registry = Arc::downgrade(&self.shared);
        let association = owner
            .attach(move || {
                if let Some(shared) = registry.upgrade() {
                    Registry { shared }.release(id);
                }
            })
            .ok_or_else(|| {
                Error::InvalidArgument(format!("owner {} already destroyed", owner.id()))
            })?;
        state.next_id += 1;
        state.insert(
            id,
            Listener {
                target,
                flags,
                port,
                token,
                owner: Arc::downgrade(owner),
                owner_id: owner.id(),
                association,
            },
        );
        debug!(id, object = %target, port, token, ?flags, owner = owner.id(), "listener added");
        Ok(id)
    }

    /// Stop watching the events in `flags`. The listener goes away once no
    /// flags remain.
    pub fn unsubscribe(
        &self,
        target: WatchTarget,
        flags: WatchFlags,
        port: PortId,
        token: Token,
    ) -> Result<()> {
        if flags.is_empty() {
            return Err(Error::InvalidArgument("empty interest flags".into()));
        }

        let removed = {
            let mut state = self.shared.state.lock();
            let id = state
                .find(target, port, token)
                .ok_or(Error::NotFound { target, port, token })?;
            let Some(listener) = state.listeners.get_mut(&id) else {
                return Err(Error::NotFound { target, port, token });
            };
            listener.flags.remove(flags);
            if !listener.flags.is_empty() {
                debug!(
                    id,
                    object = %target,
                    port,
                    token,
                    flags = ?listener.flags,
                    "listener flags reduced"
                );
                return Ok(());
            }
            state.remove(id).map(|listener| (id, listener))
        };

        if let Some((id, listener)) = removed {
            listener.detach_owner();
            debug!(id, object = %target, port, token, "listener removed");
        }
        Ok(())
    }

    /// Remove a listener by handle. Removing an absent listener is a no-op.
    pub fn release(&self, id: ListenerId) -> bool {
        let removed = self.shared.state.lock().remove(id);
        match removed {
            Some(listener) => {
                listener.detach_owner();
                debug!(id, object = %listener.target, port = listener.port, "listener released");
                true
            }
            None => false,
        }
    }

    /// Remove the listener addressed by `(target, port, token)` if present.
    pub(crate) fn remove_matching(
        &self,
        target: WatchTarget,
        port: PortId,
        token: Token,
    ) -> bool {
        let removed = {
            let mut state = self.shared.state.lock();
            state
                .find(target, port, token)
                .and_then(|id| state.remove(id).map(|l| (id, l)))
        };
        match removed {
            Some((id, listener)) => {
                listener.detach_owner();
                debug!(id, object = %target, port, token, "stale listener removed");
                true
            }
            None => false,
        }
    }

    pub fn listener(&self, id: ListenerId) -> Option<ListenerInfo> {
        let state = self.shared.state.lock();
        state.listeners.get(&id).map(|l| l.info(id))
    }

    pub fn find(&self, target: WatchTarget, port: PortId, token: Token) -> Option<ListenerInfo> {
        let state = self.shared.state.lock();
        let id = state.find(target, port, token)?;
        state.listeners.get(&id).map(|l| l.info(id))
    }

    /// Members of one group in subscription order.
    pub fn group(&self, target: WatchTarget) -> Vec<ListenerInfo> {
        let state = self.shared.state.lock();
        state
            .groups
            .get(&target)
            .map(|group| {
                group
                    .members
                    .iter()
                    .filter_map(|id| state.listeners.get(id).map(|l| l.info(*id)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn listener_count(&self) -> usize {
        self.shared.state.lock().listeners.len()
    }

    pub fn group_count(&self) -> usize {
        self.shared.state.lock().groups.len()
    }
}

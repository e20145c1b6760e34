use std::sync::Arc;

use notify_api::OwnerId;
use parking_lot::Mutex;
use tracing::debug;

/// Handle of one closure attached to an owner.
pub type Association = u64;

type Hook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct OwnerState {
    destroyed: bool,
    next_association: Association,
    hooks: Vec<(Association, Hook)>,
}

pub struct Owner {
    id: OwnerId,
    state: Mutex<OwnerState>,
}

impl Owner {
    pub fn new(id: OwnerId) -> Arc<Self> {
        Arc::new(Self {
            id,
            state: Mutex::new(OwnerState::default()),
        })
    }

    pub fn id(&self) -> OwnerId {
        self.id
    }

    /// Attach a closure to run when the owner is destroyed.
    ///
    /// Returns `None` if the owner has already been destroyed; the closure is
    /// dropped without running in that case.
    pub fn attach(&self, hook: impl FnOnce() + Send + 'static) -> Option<Association> {
        let mut state = self.state.lock();
        if state.destroyed {
            return None;
        }
        let association = state.next_association;
        state.next_association += 1;
        state.hooks.push((association, Box::new(hook)));
        Some(association)
    }

    /// Detach a closure without running it. Returns whether it was attached.
    pub fn detach(&self, association: Association) -> bool {
        let mut state = self.state.lock();
        let before = state.hooks.len();
        state.hooks.retain(|(a, _)| *a != association);
        state.hooks.len() != before
    }

    /// Number of closures still attached.
    pub fn attached(&self) -> usize {
        self.state.lock().hooks.len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    /// Run every attached closure once. Later calls do nothing.
    ///
    /// Closures run after the owner's own lock is released, so they may take
    /// other locks (the registry's) freely.
    pub fn destroy(&self) -> usize {
        let hooks = {
            let mut state = self.state.lock();
            state.destroyed = true;
            std::mem::take(&mut state.hooks)
        };
        let count = hooks.len();
        if count > 0 {
            debug!(owner = self.id, hooks = count, "owner destroyed");
        }
        for (_, hook) in hooks {
            hook();
        }
        count
    }
}

impl Drop for Owner {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Owner")
            .field("id", &self.id)
            .field("attached", &self.attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn destroy_runs_each_hook_once() {
        let owner = Owner::new(1);
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let h = hits.clone();
            owner.attach(move || {
                h.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(owner.destroy(), 3);
        assert_eq!(owner.destroy(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(owner.is_destroyed());
    }

    #[test]
    fn detached_hook_never_runs() {
        let owner = Owner::new(2);
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let a = owner
            .attach(move || {
                h.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert!(owner.detach(a));
        assert!(!owner.detach(a));
        owner.destroy();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn attach_after_destroy_fails() {
        let owner = Owner::new(3);
        owner.destroy();
        assert!(owner.attach(|| {}).is_none());
        assert_eq!(owner.attached(), 0);
    }

    #[test]
    fn drop_destroys() {
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let owner = Owner::new(4);
            let h = hits.clone();
            owner.attach(move || {
                h.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}

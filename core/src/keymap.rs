//! Keybinding Registry
//!
//! Maps `(owner, keycode)` pairs to handlers. The registry is owned by the
//! application rather than living in a global, and it is generic over the
//! handler type so the headless core never needs to know what a handler
//! receives.
//!
//! # Resolution
//!
//! Bindings are kept in insertion order. Resolving a keycode for an owner:
//!
//! 1. the first binding registered by that owner for the keycode wins;
//! 2. otherwise the first binding owned by [`OwnerId::GLOBAL`] or
//!    [`OwnerId::APP`] for the keycode;
//! 3. otherwise [`KeymapError::NoHandlerForKey`].
//!
//! Two modules binding the same key never see each other, since a module's
//! owner id only ever matches its own bindings or the shared ones.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keycodes::Keycode;

/// Scope a binding belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(pub u64);

impl OwnerId {
    /// Global bindings, active whatever module is current
    pub const GLOBAL: OwnerId = OwnerId(0);
    /// Bindings of the application core (navigation, panel toggles)
    pub const APP: OwnerId = OwnerId(1);

    /// Allocate a fresh owner id for a module
    ///
    /// Never returns one of the reserved ids.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(2);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Whether this is one of the shared (non-module) scopes
    #[must_use]
    pub fn is_shared(self) -> bool {
        self == Self::GLOBAL || self == Self::APP
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::GLOBAL => write!(f, "global"),
            Self::APP => write!(f, "app"),
            Self(n) => write!(f, "owner-{n}"),
        }
    }
}

/// Stable identifier of one registration, used to unregister it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BindingId(u64);

/// Errors from the keymap
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum KeymapError {
    /// Nothing is bound to the key for this owner or the shared scopes
    #[error("key {key} has no function")]
    NoHandlerForKey {
        /// The unresolved key
        key: Keycode,
        /// The owner resolution was attempted for
        owner: OwnerId,
    },
}

/// One registered binding
pub struct Binding<H> {
    /// Registration id
    pub id: BindingId,
    /// Scope
    pub owner: OwnerId,
    /// Key the binding answers to
    pub keycode: Keycode,
    /// Handler name, shown in error reports
    pub name: String,
    /// Optional help text
    pub doc: Option<String>,
    /// The handler itself
    pub handler: H,
}

impl<H> fmt::Debug for Binding<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("keycode", &self.keycode)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Help entry for a binding
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingHelp {
    /// Key
    pub keycode: Keycode,
    /// Handler name
    pub name: String,
    /// Help text, if any
    pub doc: Option<String>,
}

/// The keybinding registry
pub struct Keymap<H> {
    bindings: Vec<Binding<H>>,
    next_id: u64,
}

impl<H> Keymap<H> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
            next_id: 0,
        }
    }

    /// Register a handler for a key
    ///
    /// Duplicates are allowed; resolution order is insertion order.
    pub fn register(
        &mut self,
        owner: OwnerId,
        keycode: Keycode,
        name: impl Into<String>,
        doc: Option<String>,
        handler: H,
    ) -> BindingId {
        let id = BindingId(self.next_id);
        self.next_id += 1;

        let name = name.into();
        tracing::trace!(%owner, key = %keycode, %name, "binding registered");

        self.bindings.push(Binding {
            id,
            owner,
            keycode,
            name,
            doc,
            handler,
        });
        id
    }

    /// Remove a single binding
    pub fn unregister(&mut self, id: BindingId) -> bool {
        let before = self.bindings.len();
        self.bindings.retain(|b| b.id != id);
        self.bindings.len() != before
    }

    /// Remove every binding of an owner, returning how many went away
    pub fn unregister_owner(&mut self, owner: OwnerId) -> usize {
        let before = self.bindings.len();
        self.bindings.retain(|b| b.owner != owner);
        before - self.bindings.len()
    }

    fn position(&self, keycode: Keycode, owner: OwnerId) -> Result<usize, KeymapError> {
        let mut shared = None;
        for (idx, binding) in self.bindings.iter().enumerate() {
            if binding.keycode != keycode {
                continue;
            }
            if binding.owner == owner {
                return Ok(idx);
            }
            if shared.is_none() && binding.owner.is_shared() {
                shared = Some(idx);
            }
        }
        shared.ok_or(KeymapError::NoHandlerForKey { key: keycode, owner })
    }

    /// Resolve the binding for a key pressed while `owner` is current
    pub fn resolve(&self, keycode: Keycode, owner: OwnerId) -> Result<&Binding<H>, KeymapError> {
        let idx = self.position(keycode, owner)?;
        Ok(&self.bindings[idx])
    }

    /// Mutable variant of [`Keymap::resolve`], for `FnMut` handlers
    pub fn resolve_mut(
        &mut self,
        keycode: Keycode,
        owner: OwnerId,
    ) -> Result<&mut Binding<H>, KeymapError> {
        let idx = self.position(keycode, owner)?;
        Ok(&mut self.bindings[idx])
    }

    /// Help entries for one owner, in registration order
    pub fn bindings_for(&self, owner: OwnerId) -> Vec<BindingHelp> {
        self.bindings
            .iter()
            .filter(|b| b.owner == owner)
            .map(|b| BindingHelp {
                keycode: b.keycode,
                name: b.name.clone(),
                doc: b.doc.clone(),
            })
            .collect()
    }

    /// Number of registered bindings
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl<H> Default for Keymap<H> {
    fn default() -> Self {
        Self::new()
    }
}

//! Variable storage: a chain of scope frames.
//!
//! Frames live in an index-addressed arena with parent-index links rather
//! than an `Rc` graph. Closures routinely produce cyclic, shared frame
//! graphs (a closure stored in a variable of the very frame it closes
//! over); with indices those cycles are inert data, and the whole arena is
//! reclaimed when the interpreter is dropped. Mutation of a frame is
//! visible through every [`EnvId`] referring to it — that aliasing is what
//! makes shared mutable captured state work.

use std::collections::HashMap;

use log::debug;

use crate::value::Value;

/// Handle to a single scope frame inside an [`Environment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvId(usize);

#[derive(Debug)]
struct Frame<'src> {
    values: HashMap<String, Value<'src>>,
    enclosing: Option<EnvId>,
}

/// The frame arena. Exactly one global frame exists per interpreter run; it
/// sits at index 0 and has no enclosing link.
#[derive(Debug)]
pub struct Environment<'src> {
    frames: Vec<Frame<'src>>,
}

impl<'src> Environment<'src> {
    /// The global frame.
    pub const GLOBAL: EnvId = EnvId(0);

    pub fn new() -> Self {
        Environment {
            frames: vec![Frame {
                values: HashMap::new(),
                enclosing: None,
            }],
        }
    }

    /// Create a child frame of `enclosing` and return its handle.
    pub fn push(&mut self, enclosing: EnvId) -> EnvId {
        let id = EnvId(self.frames.len());

        self.frames.push(Frame {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        });

        debug!("New frame {:?} enclosing {:?}", id, enclosing);

        id
    }

    /// Insert into frame `env`. Duplicate-declaration policy is the
    /// resolver's concern, not enforced here.
    pub fn define(&mut self, env: EnvId, name: &str, value: Value<'src>) {
        self.frames[env.0].values.insert(name.to_string(), value);
    }

    /// Search `env` then each enclosing frame in order.
    pub fn get(&self, env: EnvId, name: &str) -> Result<Value<'src>, String> {
        match self.resolve_frame(env, name) {
            Some(id) => Ok(self.frames[id.0].values[name].clone()),
            None => Err(format!("Undefined variable '{}'.", name)),
        }
    }

    /// Search like [`Self::get`] and mutate the first frame containing
    /// `name`.
    pub fn assign(&mut self, env: EnvId, name: &str, value: Value<'src>) -> Result<(), String> {
        match self.resolve_frame(env, name) {
            Some(id) => {
                self.frames[id.0].values.insert(name.to_string(), value);

                Ok(())
            }
            None => Err(format!("Undefined variable '{}'.", name)),
        }
    }

    /// Jump exactly `distance` enclosing links without searching; cost is
    /// O(distance), not O(frame size). The resolver guarantees the name is
    /// defined there — a miss is a distance-bookkeeping bug, not a
    /// recoverable error.
    pub fn get_at(&self, env: EnvId, distance: usize, name: &str) -> Value<'src> {
        let frame = self.ancestor(env, distance);

        self.frames[frame.0]
            .values
            .get(name)
            .cloned()
            .expect("resolved variable missing from its frame")
    }

    /// Mutating counterpart of [`Self::get_at`].
    pub fn assign_at(&mut self, env: EnvId, distance: usize, name: &str, value: Value<'src>) {
        let frame = self.ancestor(env, distance);

        let slot = self.frames[frame.0]
            .values
            .get_mut(name)
            .expect("resolved variable missing from its frame");

        *slot = value;
    }

    /// First frame in the chain starting at `env` that defines `name`.
    fn resolve_frame(&self, env: EnvId, name: &str) -> Option<EnvId> {
        let mut id = env;

        loop {
            if self.frames[id.0].values.contains_key(name) {
                return Some(id);
            }

            id = self.frames[id.0].enclosing?;
        }
    }

    fn ancestor(&self, env: EnvId, distance: usize) -> EnvId {
        let mut id = env;

        for _ in 0..distance {
            id = self.frames[id.0]
                .enclosing
                .expect("resolution distance exceeded frame depth");
        }

        id
    }
}

impl Default for Environment<'_> {
    fn default() -> Self {
        Self::new()
    }
}

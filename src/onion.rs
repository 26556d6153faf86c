//! Layered envelope sequencing.
//!
//! An onion is a stack of independent layers around one logical value. Each
//! push wraps fresh caller data in its own envelope; it never re-encrypts the
//! layer below. Only the outermost layer is addressable, so layers come off
//! top-down, each with its own capability.

use tracing::debug;

use crate::keys::{Capability, LayerKey};
use crate::layer::Layer;
use crate::status::{Outcome, Peeled, Reason, Sealed, State};

/// An ordered stack of layers. The outermost layer is the most recent push.
#[derive(Debug, Default)]
pub struct Onion {
    // Innermost first; the top of the stack is the last element.
    layers: Vec<Layer>,
}

impl Onion {
    /// Create an empty onion: no data committed yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seal `plaintext` into a new outermost layer.
    ///
    /// With `destructive` the capability is discarded and the layer becomes
    /// permanently inert (`OK/WORM`). A failed seal leaves the onion as it was.
    pub fn push(&mut self, plaintext: &[u8], destructive: bool) -> Sealed {
        let mut layer = Layer::new();
        let sealed = if destructive {
            layer.seal_destructive(plaintext)
        } else {
            layer.seal(plaintext)
        };

        if sealed.outcome.is_ok() {
            self.layers.push(layer);
            debug!(depth = self.layers.len(), destructive, "layer pushed");
        }
        sealed
    }

    /// Peel the outermost layer with `capability`.
    ///
    /// On `OK` the layer is removed and its plaintext returned. Any other
    /// outcome leaves the layer in place; failed attempts are never
    /// destructive. An empty onion has nothing to peel (`NO/READONLY`).
    pub fn pop(&mut self, capability: &Capability) -> Peeled {
        let Some(top) = self.layers.last_mut() else {
            return Peeled::rejected(Reason::ReadOnly);
        };

        let peeled = top.peel(capability);
        if peeled.outcome.is_ok() {
            self.layers.pop();
            debug!(depth = self.layers.len(), "layer popped");
        }
        peeled
    }

    /// Number of layers present, voided ones included.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Number of destructively sealed layers still in the stack.
    pub fn voided(&self) -> usize {
        self.layers.iter().filter(|layer| layer.is_voided()).count()
    }

    /// Public key of the outermost layer.
    pub fn top_key(&self) -> Option<&LayerKey> {
        self.layers.last().and_then(|layer| layer.public_key())
    }

    /// Iterate over the layers, outermost first.
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().rev()
    }

    #[cfg(test)]
    pub(crate) fn corrupt_top(&mut self) {
        if let Some(top) = self.layers.last_mut() {
            top.corrupt();
        }
    }
}

impl State for Onion {
    /// The outermost layer's state; `NO/READONLY` when empty.
    fn state(&self) -> Outcome {
        self.layers
            .last()
            .map_or(Outcome::no(Reason::ReadOnly), |layer| layer.state())
    }
}

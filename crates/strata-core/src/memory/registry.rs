//! Layer registry: one storage handle per [`Layer`].
//!
//! The table is built once at startup and is read-only afterwards. Adding a
//! layer means extending [`Layer`] and the factory that builds this table.

use strata_types::layer::Layer;

use crate::store::box_layer_store::BoxLayerStore;

/// Process-wide mapping from layer to its storage collection.
pub struct LayerRegistry {
    /// Indexed by [`Layer::index`]; always exactly [`Layer::COUNT`] entries.
    stores: Vec<BoxLayerStore>,
}

impl LayerRegistry {
    /// Build the table by calling `factory` once per layer, in [`Layer::ALL`] order.
    pub fn new(factory: impl FnMut(Layer) -> BoxLayerStore) -> Self {
        Self {
            stores: Layer::ALL.into_iter().map(factory).collect(),
        }
    }

    /// Fallible variant of [`LayerRegistry::new`]; the first factory error wins.
    pub fn try_new<E>(factory: impl FnMut(Layer) -> Result<BoxLayerStore, E>) -> Result<Self, E> {
        let stores = Layer::ALL
            .into_iter()
            .map(factory)
            .collect::<Result<Vec<_>, E>>()?;
        Ok(Self { stores })
    }

    /// Storage handle for `layer`.
    pub fn get(&self, layer: Layer) -> &BoxLayerStore {
        &self.stores[layer.index()]
    }

    /// Every layer with its handle, in registry order.
    pub fn iter(&self) -> impl Iterator<Item = (Layer, &BoxLayerStore)> {
        Layer::ALL.into_iter().zip(self.stores.iter())
    }

    /// The layer named exactly `name`, if this registry routes to it.
    ///
    /// Routing is a lookup in the closed set; near-misses such as
    /// `"Preferences"` are not layers.
    pub fn resolve(&self, name: &str) -> Option<Layer> {
        Layer::ALL.into_iter().find(|layer| layer.as_str() == name)
    }
}

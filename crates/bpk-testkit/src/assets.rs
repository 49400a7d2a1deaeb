use std::collections::BTreeMap;

use bpk_reconcile::{AssetDefinition, AssetResolver};
use bpk_schemas::AssetRef;

/// Asset table keyed by reference. Unknown references do not resolve.
#[derive(Clone, Debug, Default)]
pub struct FakeAssets {
    defs: BTreeMap<AssetRef, AssetDefinition>,
}

impl FakeAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, asset: AssetRef, name: &str) -> Self {
        self.insert(asset, name);
        self
    }

    pub fn insert(&mut self, asset: AssetRef, name: &str) {
        self.defs.insert(
            asset,
            AssetDefinition {
                asset,
                name: name.to_string(),
            },
        );
    }

    /// Simulate a content update that dropped an asset.
    pub fn remove(&mut self, asset: AssetRef) -> bool {
        self.defs.remove(&asset).is_some()
    }
}

impl AssetResolver for FakeAssets {
    fn resolve(&self, asset: AssetRef) -> Option<AssetDefinition> {
        self.defs.get(&asset).cloned()
    }
}

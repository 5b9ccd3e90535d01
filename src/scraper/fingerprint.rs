use std::collections::HashSet;

/// Product identifiers already handed out during one keyword's run
#[derive(Debug, Default)]
pub struct FingerprintTracker {
    seen: HashSet<String>,
}

impl FingerprintTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `product_id`; returns false if it was already seen
    pub fn insert(&mut self, product_id: &str) -> bool {
        if self.seen.contains(product_id) {
            return false;
        }
        self.seen.insert(product_id.to_string())
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.seen.contains(product_id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Forget everything; called at every keyword boundary
    pub fn reset(&mut self) {
        self.seen.clear();
    }
}

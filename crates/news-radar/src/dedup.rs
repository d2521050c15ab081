use dashmap::DashSet;

/// Identifiers already surfaced by the radar. Grows for the process lifetime.
#[derive(Debug, Default)]
pub struct DedupRegistry {
    seen: DashSet<String>,
}

impl DedupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id`; true only for the first caller, even under concurrent inserts.
    pub fn insert(&self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

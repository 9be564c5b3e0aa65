use std::collections::HashSet;

/// Users allowed to use the bot. An empty list lets everyone in.
#[derive(Debug, Clone, Default)]
pub struct AccessList {
    allowed: HashSet<u64>,
}

impl AccessList {
    pub fn new(user_ids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            allowed: user_ids.into_iter().collect(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn is_allowed(&self, user_id: u64) -> bool {
        self.is_open() || self.allowed.contains(&user_id)
    }
}

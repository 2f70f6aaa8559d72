use linked_hash_map::LinkedHashMap;
use serde::{Deserialize, Serialize};
use crate::types::PageId;

/// Orders cached pages by eviction preference
pub trait ReplacementStrategy: Send + Sync {
    /// Record an access to the page
    fn update(&mut self, page_id: PageId);

    /// Forget a page that left the cache
    fn remove(&mut self, page_id: PageId);

    /// Eviction candidates, most preferred victim first
    fn get_evict<'a>(&'a self) -> Box<dyn Iterator<Item = PageId> + 'a>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplacementStrategyType {
    LRU
}

pub fn replacement_strategy_factory(
    strategy_type: ReplacementStrategyType
) -> Box<dyn ReplacementStrategy + Send + Sync> {
    match strategy_type {
        ReplacementStrategyType::LRU => Box::new(LRUReplacementStrategy {
            map: LinkedHashMap::new()
        })
    }
}

/// LRU replacement strategy
pub struct LRUReplacementStrategy {
    map: LinkedHashMap<PageId, ()>,
}

impl ReplacementStrategy for LRUReplacementStrategy {
    fn update(&mut self, page_id: PageId) {
        self.map.remove(&page_id);
        self.map.insert(page_id, ());
    }

    fn remove(&mut self, page_id: PageId) {
        self.map.remove(&page_id);
    }

    fn get_evict<'a>(&'a self) -> Box<dyn Iterator<Item = PageId> + 'a> {
        Box::new(self.map.keys().copied())
    }
}

use std::sync::Arc;

use crate::engine::SearchEngine;
use crate::extraction::FeatureExtractor;
use crate::metadata::MetadataStore;

pub struct HandlerState<E, M> {
    pub engine: Arc<SearchEngine<E, M>>,
}

impl<E, M> HandlerState<E, M>
where
    E: FeatureExtractor,
    M: MetadataStore,
{
    pub fn new(engine: Arc<SearchEngine<E, M>>) -> Self {
        Self { engine }
    }
}

// Manual impl: a derive would require `E: Clone` and `M: Clone`.
impl<E, M> Clone for HandlerState<E, M> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

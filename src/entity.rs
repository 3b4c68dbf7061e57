use crate::model::Model;
use crate::prelude::Id;
use getset::{CopyGetters, Getters};
use std::sync::Arc;

/// Initial membership assignment for an entity. Receives the entity index
/// and the model; membership must be established through
/// `Model::assign_entity` so that it stays symmetric.
pub type EntityDistFun = Arc<dyn Fn(usize, &mut Model) + Send + Sync>;

/// A named subpopulation; the unit of group mixing.
#[derive(Clone, Getters, CopyGetters)]
pub struct Entity {
    #[getset(get_copy = "pub")]
    id: usize,
    #[getset(get = "pub")]
    name: String,
    pub(crate) members: Vec<Id>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Entity {
            id: 0,
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn members(&self) -> &[Id] {
        &self.members
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn set_id(&mut self, id: usize) {
        self.id = id;
    }
}

/// Distribution function splitting the population into consecutive
/// equally-sized blocks, one per entity.
pub fn distribute_entity_evenly(nentities: usize) -> EntityDistFun {
    Arc::new(move |entity: usize, model: &mut Model| {
        let n = model.size();
        let lo = entity * n / nentities;
        let hi = (entity + 1) * n / nentities;
        for agent in lo..hi {
            model.assign_entity(agent, entity);
        }
    })
}

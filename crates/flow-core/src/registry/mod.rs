//! Registro de categorías de evento.
//!
//! Rol en el flujo:
//! - Todo el estado de negocio derivado (en progreso, transferido, fallido…)
//!   sale exclusivamente de este mapeo.
//! - Se construye una sola vez (`Lazy`) y es inmutable para todo el proceso;
//!   no hay registro en tiempo de ejecución.

mod category;

use std::collections::BTreeSet;

use indexmap::IndexMap;
use once_cell::sync::Lazy;

pub use category::{CategoryDescriptor, EventCategory, EventType, InstanceStatus, StorageStatus, Track};

static REGISTRY: Lazy<CategoryRegistry> = Lazy::new(CategoryRegistry::build);

/// Acceso al registro global.
pub fn registry() -> &'static CategoryRegistry {
    &REGISTRY
}

/// Índices precalculados sobre la taxonomía.
#[derive(Debug)]
pub struct CategoryRegistry {
    by_name: IndexMap<&'static str, EventCategory>,
    by_topic: IndexMap<String, EventCategory>,
    status_track: BTreeSet<EventCategory>,
    storage_track: BTreeSet<EventCategory>,
    successful_transfer: BTreeSet<EventCategory>,
}

impl CategoryRegistry {
    fn build() -> Self {
        let by_name = EventCategory::ALL.iter().map(|c| (c.name(), *c)).collect();
        let by_topic = EventCategory::ALL.iter().map(|c| (c.topic(), *c)).collect();
        let status_track = EventCategory::ALL.iter().copied().filter(|c| c.is_status_track()).collect();
        let storage_track = EventCategory::ALL.iter().copied().filter(|c| c.is_storage_track()).collect();
        let successful_transfer = [EventCategory::InstanceDispatched, EventCategory::InstanceManuallyProcessed].into_iter()
                                                                                                              .collect();
        Self { by_name,
               by_topic,
               status_track,
               storage_track,
               successful_transfer }
    }

    /// Busca una categoría por nombre (`INSTANCE_MAPPED`). `None` si no existe.
    pub fn category_of(&self, name: &str) -> Option<EventCategory> {
        self.by_name.get(name).copied()
    }

    /// Busca la categoría asociada a un canal de ingesta (`instance-mapped`).
    pub fn category_for_topic(&self, topic: &str) -> Option<EventCategory> {
        self.by_topic.get(topic).copied()
    }

    /// Categorías de la pista de estado cuyo estado pertenece a `statuses`.
    pub fn categories_with_instance_status(&self, statuses: &BTreeSet<InstanceStatus>) -> BTreeSet<EventCategory> {
        self.status_track
            .iter()
            .copied()
            .filter(|c| c.instance_status().is_some_and(|s| statuses.contains(&s)))
            .collect()
    }

    /// Categorías de la pista de almacenamiento cuyo estado pertenece a
    /// `statuses`. `NeverStored` no aporta categorías.
    pub fn categories_with_storage_status(&self, statuses: &BTreeSet<StorageStatus>) -> BTreeSet<EventCategory> {
        self.storage_track
            .iter()
            .copied()
            .filter(|c| c.storage_status().is_some_and(|s| statuses.contains(&s)))
            .collect()
    }

    pub fn all_status_track_categories(&self) -> &BTreeSet<EventCategory> {
        &self.status_track
    }

    pub fn all_storage_track_categories(&self) -> &BTreeSet<EventCategory> {
        &self.storage_track
    }

    /// Categorías de despacho exitoso: las únicas que llevan `destination_id`.
    pub fn successful_transfer_categories(&self) -> &BTreeSet<EventCategory> {
        &self.successful_transfer
    }

    /// Categorías en orden de declaración.
    pub fn categories(&self) -> impl Iterator<Item = EventCategory> + '_ {
        self.by_name.values().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_are_disjoint_and_cover_taxonomy() {
        let reg = registry();
        assert!(reg.all_status_track_categories().is_disjoint(reg.all_storage_track_categories()));
        assert_eq!(reg.all_status_track_categories().len() + reg.all_storage_track_categories().len(),
                   EventCategory::ALL.len());
    }

    #[test]
    fn lookup_by_name_and_topic() {
        let reg = registry();
        assert_eq!(reg.category_of("INSTANCE_DELETED"), Some(EventCategory::InstanceDeleted));
        assert_eq!(reg.category_of("INSTANCE_UNKNOWN"), None);
        assert_eq!(reg.category_for_topic("instance-dispatching-error"),
                   Some(EventCategory::InstanceDispatchingError));
    }

    #[test]
    fn categories_by_instance_status() {
        let reg = registry();
        let transferred = reg.categories_with_instance_status(&[InstanceStatus::Transferred].into());
        assert_eq!(transferred,
                   [EventCategory::InstanceDispatched,
                    EventCategory::InstanceManuallyProcessed,
                    EventCategory::InstanceStatusOverriddenAsTransferred].into());
        let failed = reg.categories_with_instance_status(&[InstanceStatus::Failed].into());
        assert_eq!(failed.len(), 5);
        assert!(reg.categories_with_instance_status(&BTreeSet::new()).is_empty());
    }

    #[test]
    fn categories_by_storage_status_ignores_never_stored() {
        let reg = registry();
        let set = reg.categories_with_storage_status(&[StorageStatus::NeverStored, StorageStatus::Stored].into());
        assert_eq!(set, [EventCategory::InstanceRegistered].into());
    }

    #[test]
    fn successful_transfer_set_is_info_and_transferred() {
        for c in registry().successful_transfer_categories() {
            assert_eq!(c.event_type(), EventType::Info);
            assert_eq!(c.instance_status(), Some(InstanceStatus::Transferred));
        }
    }
}

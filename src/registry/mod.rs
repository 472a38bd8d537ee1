//! Metadata registry: persistence and name resolution for entities, feature
//! views and feature services. Replace-by-name semantics; objects are
//! validated before they are persisted.

pub mod sqlite;

use crate::entity::Entity;
use crate::error::Result;
use crate::feature_service::FeatureService;
use crate::feature_view::FeatureView;

pub use sqlite::SqliteRegistry;

pub trait Registry: Send + Sync {
    fn apply_entity(&self, entity: &Entity) -> Result<()>;
    fn apply_feature_view(&self, view: &FeatureView) -> Result<()>;
    fn apply_feature_service(&self, service: &FeatureService) -> Result<()>;

    fn get_entity(&self, name: &str) -> Result<Option<Entity>>;
    fn get_feature_view(&self, name: &str) -> Result<Option<FeatureView>>;
    fn get_feature_service(&self, name: &str) -> Result<Option<FeatureService>>;

    fn list_entities(&self) -> Result<Vec<Entity>>;
    fn list_feature_views(&self) -> Result<Vec<FeatureView>>;
    fn list_feature_services(&self) -> Result<Vec<FeatureService>>;

    fn delete_entity(&self, name: &str) -> Result<()>;
    fn delete_feature_view(&self, name: &str) -> Result<()>;
    fn delete_feature_service(&self, name: &str) -> Result<()>;

    /// Remove every stored definition. Idempotent.
    fn teardown(&self) -> Result<()>;
}

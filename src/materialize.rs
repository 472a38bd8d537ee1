//! Materialization: moving the freshest feature values from the offline
//! store into the online store.

use crate::error::{FeatureStoreError, Result};
use crate::feature_view::FeatureView;
use crate::offline::OfflineStore;
use crate::online::OnlineStore;
use crate::registry::Registry;
use crate::validation::{not_found_message, require_columns};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub struct MaterializationCoordinator {
    registry: Arc<dyn Registry>,
    offline: Arc<dyn OfflineStore>,
    online: Arc<dyn OnlineStore>,
}

impl MaterializationCoordinator {
    pub fn new(
        registry: Arc<dyn Registry>,
        offline: Arc<dyn OfflineStore>,
        online: Arc<dyn OnlineStore>,
    ) -> Self {
        Self {
            registry,
            offline,
            online,
        }
    }

    /// Materialize the latest value per entity as of `end_date` (no lower
    /// bound). `view_names` of `None` selects every registered view.
    pub async fn materialize_incremental(
        &self,
        end_date: DateTime<Utc>,
        view_names: Option<&[String]>,
    ) -> Result<()> {
        let views = self.resolve_views(view_names)?;
        self.run(views, None, end_date).await
    }

    /// Reprocess the closed window `[start_date, end_date]`.
    pub async fn materialize(
        &self,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        view_names: Option<&[String]>,
    ) -> Result<()> {
        let views = self.resolve_views(view_names)?;
        self.run(views, Some(start_date), end_date).await
    }

    /// Resolve all requested names before touching any store, so a bad name
    /// fails the whole call with nothing written.
    fn resolve_views(&self, view_names: Option<&[String]>) -> Result<Vec<FeatureView>> {
        match view_names {
            None => self.registry.list_feature_views(),
            Some(names) => {
                let mut views = Vec::with_capacity(names.len());
                for name in names {
                    match self.registry.get_feature_view(name)? {
                        Some(view) => views.push(view),
                        None => {
                            let known = self.registry.list_feature_views()?;
                            return Err(FeatureStoreError::NotFound(not_found_message(
                                "Feature view",
                                name,
                                known.iter().map(|v| v.name.as_str()),
                            )));
                        }
                    }
                }
                Ok(views)
            }
        }
    }

    async fn run(
        &self,
        views: Vec<FeatureView>,
        start_date: Option<DateTime<Utc>>,
        end_date: DateTime<Utc>,
    ) -> Result<()> {
        let run_id = Uuid::new_v4();
        info!(%run_id, views = views.len(), %end_date, "starting materialization");

        for view in &views {
            if !view.online {
                debug!(%run_id, view = %view.name, "skipping offline-only view");
                continue;
            }

            let snapshot = self
                .offline
                .pull_latest_from_source(view, start_date, Some(end_date))
                .await?;

            if snapshot.height() == 0 {
                info!(%run_id, view = %view.name, "no rows to materialize");
                continue;
            }

            let mut required = view.join_keys();
            if let Some(field) = view.source.timestamp_field() {
                required.push(field.to_string());
            }
            required.extend(view.feature_names());
            require_columns(
                &snapshot,
                &required,
                &format!("materialization snapshot for '{}'", view.name),
            )?;

            self.online.write_features(view, &snapshot, Some(end_date))?;
            info!(%run_id, view = %view.name, rows = snapshot.height(), "materialized view");
        }

        Ok(())
    }
}

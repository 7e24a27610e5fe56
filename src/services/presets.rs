//! Voice presets: owner-scoped CRUD with read-through caching.

use std::sync::Arc;

use log::info;
use serde_json::{Value, json};

use crate::errors::{AppError, AppResult};
use crate::models::{NewPreset, VoicePreset};
use crate::services::cache::ResultCache;
use crate::services::store::documents::{create_typed, get_typed, list_typed, update_typed};
use crate::services::store::{Collection, Direction, DocumentStore, Query};

pub struct PresetService {
    documents: Arc<dyn DocumentStore>,
    cache: Arc<ResultCache>,
}

fn validate(preset: &NewPreset) -> AppResult<()> {
    if preset.name.trim().is_empty() {
        return Err(AppError::Validation("Preset name is required".to_string()));
    }
    preset.transformation.validate()
}

fn preset_fields(preset: &NewPreset) -> AppResult<Value> {
    Ok(json!({
        "name": preset.name.trim(),
        "description": preset.description,
        "transformation": serde_json::to_value(&preset.transformation)?,
        "tags": preset.tags,
        "category": preset.category,
        "isPublic": preset.is_public,
    }))
}

impl PresetService {
    pub fn new(documents: Arc<dyn DocumentStore>, cache: Arc<ResultCache>) -> Self {
        Self { documents, cache }
    }

    pub async fn create(&self, user_id: &str, preset: NewPreset) -> AppResult<VoicePreset> {
        validate(&preset)?;
        let mut doc = preset_fields(&preset)?;
        doc["userId"] = Value::String(user_id.to_string());

        let created: VoicePreset =
            create_typed(self.documents.as_ref(), Collection::VoicePresets, &doc).await?;
        info!("Created preset {} for {}", created.id, user_id);

        self.cache.put_preset(&created).await;
        self.cache.forget_user_presets(user_id).await;
        Ok(created)
    }

    async fn load(&self, preset_id: &str) -> AppResult<Option<VoicePreset>> {
        if let Some(preset) = self.cache.preset(preset_id).await {
            return Ok(Some(preset));
        }
        let preset: Option<VoicePreset> =
            get_typed(self.documents.as_ref(), Collection::VoicePresets, preset_id).await?;
        if let Some(preset) = &preset {
            self.cache.put_preset(preset).await;
        }
        Ok(preset)
    }

    /// Public presets are visible to everyone, private ones only to the owner.
    pub async fn get(&self, user_id: &str, preset_id: &str) -> AppResult<VoicePreset> {
        match self.load(preset_id).await? {
            Some(preset) if preset.visible_to(user_id) => Ok(preset),
            _ => Err(AppError::NotFound("Preset".to_string())),
        }
    }

    async fn owned(&self, user_id: &str, preset_id: &str) -> AppResult<VoicePreset> {
        match self.load(preset_id).await? {
            Some(preset) if preset.user_id == user_id => Ok(preset),
            _ => Err(AppError::NotFound("Preset".to_string())),
        }
    }

    pub async fn list_own(&self, user_id: &str) -> AppResult<Vec<VoicePreset>> {
        if let Some(presets) = self.cache.user_presets(user_id).await {
            return Ok(presets);
        }
        let query = Query::new()
            .where_eq("userId", user_id)
            .order_by("createdAt", Direction::Desc);
        let presets: Vec<VoicePreset> =
            list_typed(self.documents.as_ref(), Collection::VoicePresets, &query).await?;
        self.cache.put_user_presets(user_id, &presets).await;
        Ok(presets)
    }

    pub async fn list_public(&self) -> AppResult<Vec<VoicePreset>> {
        let query = Query::new()
            .where_eq("isPublic", true)
            .order_by("createdAt", Direction::Desc);
        list_typed(self.documents.as_ref(), Collection::VoicePresets, &query).await
    }

    pub async fn update(&self, user_id: &str, preset_id: &str, preset: NewPreset) -> AppResult<VoicePreset> {
        self.owned(user_id, preset_id).await?;
        validate(&preset)?;

        let updated: VoicePreset = update_typed(
            self.documents.as_ref(),
            Collection::VoicePresets,
            preset_id,
            preset_fields(&preset)?,
        )
        .await?;

        self.cache.put_preset(&updated).await;
        self.cache.forget_user_presets(user_id).await;
        Ok(updated)
    }

    pub async fn delete(&self, user_id: &str, preset_id: &str) -> AppResult<()> {
        self.owned(user_id, preset_id).await?;
        self.documents
            .delete(Collection::VoicePresets, preset_id)
            .await?;
        self.cache.forget_preset(preset_id).await;
        self.cache.forget_user_presets(user_id).await;
        info!("Deleted preset {} of {}", preset_id, user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheTtls;
    use crate::models::VoiceTransformation;
    use crate::services::store::{MemoryDocumentStore, MemoryKvStore};

    fn service() -> PresetService {
        let cache = Arc::new(ResultCache::new(Arc::new(MemoryKvStore::new()), CacheTtls::default()));
        PresetService::new(Arc::new(MemoryDocumentStore::new()), cache)
    }

    fn new_preset(name: &str, is_public: bool) -> NewPreset {
        NewPreset {
            name: name.to_string(),
            transformation: VoiceTransformation {
                pitch: Some(15.0),
                ..Default::default()
            },
            category: "fun".to_string(),
            is_public,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn private_presets_are_hidden_from_others() {
        let service = service();
        let private = service.create("owner", new_preset("Deep", false)).await.unwrap();
        let public = service.create("owner", new_preset("Chipmunk", true)).await.unwrap();

        assert_eq!(service.get("owner", &private.id).await.unwrap().name, "Deep");
        assert!(matches!(
            service.get("stranger", &private.id).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(service.get("stranger", &public.id).await.unwrap().user_id, "owner");

        let listed = service.list_public().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, public.id);
    }

    #[tokio::test]
    async fn list_own_is_refreshed_after_writes() {
        let service = service();
        service.create("u1", new_preset("A", false)).await.unwrap();
        assert_eq!(service.list_own("u1").await.unwrap().len(), 1);

        let second = service.create("u1", new_preset("B", false)).await.unwrap();
        let names: Vec<String> = service
            .list_own("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["B", "A"]);

        service.delete("u1", &second.id).await.unwrap();
        assert_eq!(service.list_own("u1").await.unwrap().len(), 1);
        assert!(service.get("u1", &second.id).await.is_err());
    }

    #[tokio::test]
    async fn only_owner_may_change_a_preset() {
        let service = service();
        let preset = service.create("owner", new_preset("Robot", true)).await.unwrap();

        let err = service
            .update("other", &preset.id, new_preset("Hijacked", true))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(service.delete("other", &preset.id).await.is_err());

        let updated = service
            .update("owner", &preset.id, new_preset("Robot v2", true))
            .await
            .unwrap();
        assert_eq!(updated.name, "Robot v2");
        assert_eq!(service.get("other", &preset.id).await.unwrap().name, "Robot v2");
    }

    #[tokio::test]
    async fn invalid_presets_are_rejected() {
        let service = service();
        assert!(matches!(
            service.create("u1", new_preset("  ", false)).await,
            Err(AppError::Validation(_))
        ));

        let mut bad = new_preset("Loud", false);
        bad.transformation.volume = Some(80.0);
        assert!(service.create("u1", bad).await.is_err());
    }
}

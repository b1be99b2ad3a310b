//! # Services
//!
//! Orchestration between user actions and the ports. Services are built per
//! request from shared ports plus an explicit [`SessionContext`]; they never
//! look identity up on their own.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::advisor::generate_response;
use crate::error::{AppError, Result, ValidationError};
use crate::filter::QueryView;
use crate::models::{
    Category, MediaPayload, ProfileStats, QueryDraft, QueryRecord, QueryStatus, SessionContext, Submission,
    UserProfile, GENERAL,
};
use crate::stats::profile_stats;
use crate::traits::{MediaStore, ProfileRepo, QueryRepo};

/// Default artificial latency before an answer is produced.
pub const DEFAULT_PROCESSING_DELAY: Duration = Duration::from_millis(1500);

/// Validates questions, generates answers and persists the resulting record.
pub struct QuerySubmitter {
    repo: Arc<dyn QueryRepo>,
    media: Option<Arc<dyn MediaStore>>,
    ctx: SessionContext,
    delay: Duration,
}

impl QuerySubmitter {
    pub fn new(repo: Arc<dyn QueryRepo>, ctx: SessionContext) -> Self {
        Self {
            repo,
            media: None,
            ctx,
            delay: DEFAULT_PROCESSING_DELAY,
        }
    }

    /// Image attachments are rejected with a permission error unless a store is set.
    pub fn with_media_store(mut self, media: Arc<dyn MediaStore>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Turns a draft into a persisted, resolved record.
    ///
    /// Exactly one record is written on success and nothing on failure. If
    /// the returned future is dropped before completion (e.g. the client went
    /// away during the processing delay) nothing is written either.
    pub async fn submit(&self, draft: QueryDraft) -> Result<Submission> {
        let question = draft.question.trim();
        if question.is_empty() {
            return Err(ValidationError::EmptyQuestion.into());
        }

        let crop_type = draft
            .crop_type
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        let category = draft.category.unwrap_or(Category::General);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let response = generate_response(question, crop_type.as_deref(), category);

        let mut image_preview = None;
        let mut voice_attached = false;
        for attachment in draft.attachments {
            match attachment {
                MediaPayload::Image { content_type, data } => {
                    let store = self
                        .media
                        .as_ref()
                        .ok_or_else(|| AppError::PermissionDenied("image uploads are disabled".into()))?;
                    let media_id = store.save_upload(data, &content_type).await.map_err(AppError::backend)?;
                    image_preview = Some(media_id);
                }
                MediaPayload::Voice { base64 } => {
                    // Kept for the session only; not transcribed.
                    voice_attached |= !base64.is_empty();
                }
            }
        }

        let record = QueryRecord {
            id: Uuid::now_v7(),
            owner_id: self.ctx.owner_id(),
            question: question.to_string(),
            crop_type: crop_type.unwrap_or_else(|| GENERAL.to_string()),
            category,
            response,
            status: QueryStatus::Resolved,
            created_at: Utc::now(),
        };

        if let Err(e) = self.repo.create_query(&record).await {
            self.discard_upload(image_preview.as_deref()).await;
            return Err(AppError::backend(e));
        }
        log::info!(
            "query {} created for owner {} ({})",
            record.id,
            record.owner_id,
            record.category.slug()
        );

        Ok(Submission {
            record,
            image_preview,
            voice_attached,
        })
    }

    /// Removes an image uploaded for a submission that was not persisted.
    async fn discard_upload(&self, media_id: Option<&str>) {
        let (Some(store), Some(media_id)) = (self.media.as_ref(), media_id) else {
            return;
        };
        if let Err(e) = store.remove(media_id).await {
            log::warn!("failed to remove orphaned upload {}: {:#}", media_id, e);
        }
    }
}

/// Owner-scoped reads and deletes over stored records.
pub struct QueryStore {
    repo: Arc<dyn QueryRepo>,
    ctx: SessionContext,
}

impl QueryStore {
    pub fn new(repo: Arc<dyn QueryRepo>, ctx: SessionContext) -> Self {
        Self { repo, ctx }
    }

    /// Newest first.
    pub async fn list(&self) -> Result<Vec<QueryRecord>> {
        let mut records = self
            .repo
            .list_queries(self.ctx.owner_id())
            .await
            .map_err(AppError::backend)?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Lists and applies the search/category view in one go.
    pub async fn view(&self, view: &QueryView) -> Result<Vec<QueryRecord>> {
        Ok(view.apply(&self.list().await?))
    }

    pub async fn get(&self, id: Uuid) -> Result<QueryRecord> {
        self.repo
            .get_query(self.ctx.owner_id(), id)
            .await
            .map_err(AppError::backend)?
            .ok_or_else(|| AppError::not_found("Query", id))
    }

    /// Deleting a missing (or foreign) record is reported as `NotFound`.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let removed = self
            .repo
            .delete_query(self.ctx.owner_id(), id)
            .await
            .map_err(AppError::backend)?;
        if !removed {
            log::warn!("delete of unknown query {} by owner {}", id, self.ctx.owner_id());
            return Err(AppError::not_found("Query", id));
        }
        Ok(())
    }

    pub async fn delete_all(&self) -> Result<()> {
        let removed = self
            .repo
            .delete_all_queries(self.ctx.owner_id())
            .await
            .map_err(AppError::backend)?;
        log::info!("cleared {} queries for owner {}", removed, self.ctx.owner_id());
        Ok(())
    }
}

/// Farm profile plus activity statistics.
pub struct ProfileService {
    profiles: Arc<dyn ProfileRepo>,
    queries: Arc<dyn QueryRepo>,
    ctx: SessionContext,
}

impl ProfileService {
    pub fn new(profiles: Arc<dyn ProfileRepo>, queries: Arc<dyn QueryRepo>, ctx: SessionContext) -> Self {
        Self { profiles, queries, ctx }
    }

    /// An owner without a saved profile gets an empty one.
    pub async fn profile(&self) -> Result<UserProfile> {
        Ok(self
            .profiles
            .get_profile(self.ctx.owner_id())
            .await
            .map_err(AppError::backend)?
            .unwrap_or_default())
    }

    pub async fn save(&self, mut profile: UserProfile) -> Result<()> {
        profile.primary_crops.retain(|c| !c.trim().is_empty());
        self.profiles
            .upsert_profile(self.ctx.owner_id(), &profile)
            .await
            .map_err(AppError::backend)
    }

    pub async fn stats(&self) -> Result<ProfileStats> {
        let records = self
            .queries
            .list_queries(self.ctx.owner_id())
            .await
            .map_err(AppError::backend)?;
        Ok(profile_stats(&records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::Advisory;
    use crate::models::{Identity, Language};
    use crate::traits::{MockMediaStore, MockProfileRepo, MockQueryRepo};
    use mockall::predicate::*;

    fn ctx() -> SessionContext {
        SessionContext::new(Identity::demo(), Language::English)
    }

    fn submitter(repo: MockQueryRepo) -> QuerySubmitter {
        QuerySubmitter::new(Arc::new(repo), ctx()).with_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn submit_persists_one_resolved_record() {
        let mut repo = MockQueryRepo::new();
        repo.expect_create_query()
            .withf(|r| r.status == QueryStatus::Resolved && !r.response.is_empty())
            .times(1)
            .returning(|_| Ok(()));

        let out = submitter(repo).submit(QueryDraft::new("  How deep to sow beans?  ")).await.unwrap();
        assert_eq!(out.record.question, "How deep to sow beans?");
        assert_eq!(out.record.crop_type, "General");
        assert_eq!(out.record.category, Category::General);
        assert_eq!(out.record.owner_id, Uuid::nil());
        assert!(out.image_preview.is_none());
    }

    #[tokio::test]
    async fn blank_question_is_rejected_without_writing() {
        let mut repo = MockQueryRepo::new();
        repo.expect_create_query().never();

        for question in ["", "   ", "\n\t"] {
            let err = submitter(MockQueryRepo::new()).submit(QueryDraft::new(question)).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(ValidationError::EmptyQuestion)));
        }
        let err = submitter(repo).submit(QueryDraft::new(" ")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::EmptyQuestion)));
    }

    #[tokio::test]
    async fn irrigation_scenario() {
        let mut repo = MockQueryRepo::new();
        repo.expect_create_query().times(1).returning(|_| Ok(()));

        let draft = QueryDraft::new("Best irrigation schedule for wheat?")
            .crop_type("wheat")
            .category(Category::Irrigation);
        let record = submitter(repo).submit(draft).await.unwrap().record;

        assert!(record.response.starts_with(Advisory::Irrigation.heading()));
        assert!(record.response.contains("wheat"));
        assert_eq!(record.status.as_str(), "resolved");
        assert_eq!(record.crop_type, "wheat");
        assert_eq!(record.category, Category::Irrigation);
    }

    #[tokio::test]
    async fn voice_does_not_change_the_rule() {
        let mut repo = MockQueryRepo::new();
        repo.expect_create_query().returning(|_| Ok(()));

        let draft = QueryDraft::new("bugs on my corn").attach(MediaPayload::Voice {
            base64: "AAEC".into(),
        });
        let out = submitter(repo).submit(draft).await.unwrap();
        assert!(out.voice_attached);
        assert!(out.record.response.starts_with(Advisory::PestManagement.heading()));
    }

    #[tokio::test]
    async fn image_is_stored_as_preview_only() {
        let mut repo = MockQueryRepo::new();
        repo.expect_create_query().times(1).returning(|_| Ok(()));
        let mut media = MockMediaStore::new();
        media
            .expect_save_upload()
            .withf(|_, content_type| content_type == "image/png")
            .times(1)
            .returning(|_, _| Ok("abcd1234".into()));

        let draft = QueryDraft::new("spots on leaves").attach(MediaPayload::Image {
            content_type: "image/png".into(),
            data: vec![1, 2, 3],
        });
        let out = submitter(repo)
            .with_media_store(Arc::new(media))
            .submit(draft)
            .await
            .unwrap();
        assert_eq!(out.image_preview.as_deref(), Some("abcd1234"));
    }

    #[tokio::test]
    async fn failed_upload_aborts_before_persisting() {
        let mut repo = MockQueryRepo::new();
        repo.expect_create_query().never();
        let mut media = MockMediaStore::new();
        media.expect_save_upload().returning(|_, _| Err(anyhow::anyhow!("disk full")));

        let draft = QueryDraft::new("spots on leaves").attach(MediaPayload::Image {
            content_type: "image/png".into(),
            data: vec![1],
        });
        let err = submitter(repo).with_media_store(Arc::new(media)).submit(draft).await.unwrap_err();
        assert!(matches!(err, AppError::Backend(_)));
    }

    #[tokio::test]
    async fn failed_persist_removes_the_uploaded_image() {
        let mut repo = MockQueryRepo::new();
        repo.expect_create_query().returning(|_| Err(anyhow::anyhow!("database is locked")));
        let mut media = MockMediaStore::new();
        media.expect_save_upload().times(1).returning(|_, _| Ok("abcd1234".into()));
        media
            .expect_remove()
            .withf(|media_id| media_id == "abcd1234")
            .times(1)
            .returning(|_| Ok(()));

        let draft = QueryDraft::new("spots on leaves").attach(MediaPayload::Image {
            content_type: "image/png".into(),
            data: vec![1],
        });
        let err = submitter(repo).with_media_store(Arc::new(media)).submit(draft).await.unwrap_err();
        assert!(matches!(err, AppError::Backend(msg) if msg.contains("locked")));
    }

    #[tokio::test]
    async fn empty_voice_clip_does_not_clear_an_earlier_one() {
        let mut repo = MockQueryRepo::new();
        repo.expect_create_query().returning(|_| Ok(()));

        let draft = QueryDraft::new("when to harvest?")
            .attach(MediaPayload::Voice { base64: "AAEC".into() })
            .attach(MediaPayload::Voice { base64: String::new() });
        assert!(submitter(repo).submit(draft).await.unwrap().voice_attached);
    }

    #[tokio::test]
    async fn backend_failure_surfaces_as_backend_error() {
        let mut repo = MockQueryRepo::new();
        repo.expect_create_query().returning(|_| Err(anyhow::anyhow!("database is locked")));
        let err = submitter(repo).submit(QueryDraft::new("water?")).await.unwrap_err();
        assert!(matches!(err, AppError::Backend(msg) if msg.contains("locked")));
    }

    #[tokio::test]
    async fn dropped_during_delay_writes_nothing() {
        let mut repo = MockQueryRepo::new();
        repo.expect_create_query().never();
        let submitter = QuerySubmitter::new(Arc::new(repo), ctx()).with_delay(Duration::from_secs(30));

        let pending = submitter.submit(QueryDraft::new("water?"));
        let timed_out = tokio::time::timeout(Duration::from_millis(20), pending).await;
        assert!(timed_out.is_err());
    }

    #[tokio::test]
    async fn delete_of_absent_record_reports_not_found() {
        let mut repo = MockQueryRepo::new();
        let id = Uuid::now_v7();
        repo.expect_delete_query()
            .with(eq(Uuid::nil()), eq(id))
            .times(2)
            .returning({
                let mut first = true;
                move |_, _| {
                    let removed = first;
                    first = false;
                    Ok(removed)
                }
            });

        let store = QueryStore::new(Arc::new(repo), ctx());
        store.delete(id).await.unwrap();
        let err = store.delete(id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_, _)));
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let older = QueryRecord {
            id: Uuid::now_v7(),
            owner_id: Uuid::nil(),
            question: "old".into(),
            crop_type: "General".into(),
            category: Category::General,
            response: "r".into(),
            status: QueryStatus::Resolved,
            created_at: Utc::now() - chrono::Duration::hours(1),
        };
        let newer = QueryRecord {
            question: "new".into(),
            created_at: Utc::now(),
            ..older.clone()
        };
        let mut repo = MockQueryRepo::new();
        let rows = vec![older, newer];
        repo.expect_list_queries().returning(move |_| Ok(rows.clone()));

        let listed = QueryStore::new(Arc::new(repo), ctx()).list().await.unwrap();
        assert_eq!(listed[0].question, "new");
        assert_eq!(listed[1].question, "old");
    }

    #[tokio::test]
    async fn missing_profile_is_empty() {
        let mut profiles = MockProfileRepo::new();
        profiles.expect_get_profile().returning(|_| Ok(None));
        let service = ProfileService::new(Arc::new(profiles), Arc::new(MockQueryRepo::new()), ctx());
        assert_eq!(service.profile().await.unwrap(), UserProfile::default());
    }

    #[tokio::test]
    async fn saving_profile_drops_blank_crops() {
        let mut profiles = MockProfileRepo::new();
        profiles
            .expect_upsert_profile()
            .withf(|_, p| p.primary_crops == vec!["rice".to_string()])
            .times(1)
            .returning(|_, _| Ok(()));
        let service = ProfileService::new(Arc::new(profiles), Arc::new(MockQueryRepo::new()), ctx());
        let profile = UserProfile {
            primary_crops: vec!["rice".into(), "  ".into()],
            ..Default::default()
        };
        service.save(profile).await.unwrap();
    }
}

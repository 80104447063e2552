//! Classify submitted URLs and record each result in the history store.

use super::ServiceError;
use crate::config::UploadConfig;
use crate::identity::Identity;
use crate::prediction::{PredictionResult, Predictor, UrlTable};
use crate::storage::{self, ApprovalStatus, HistoryRecord, HistoryStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct PredictionService {
    predictor: Arc<Predictor>,
    store: Arc<dyn HistoryStore>,
    max_upload_bytes: usize,
}

impl PredictionService {
    pub fn new(predictor: Arc<Predictor>, store: Arc<dyn HistoryStore>, upload: &UploadConfig) -> Self {
        Self {
            predictor,
            store,
            max_upload_bytes: upload.max_bytes,
        }
    }

    /// Classify every row of an uploaded CSV and persist the results.
    /// Nothing is persisted unless the whole batch succeeds.
    pub fn predict_upload(
        &self,
        bytes: &[u8],
        identity: &Identity,
    ) -> Result<Vec<HistoryRecord>, ServiceError> {
        if bytes.len() > self.max_upload_bytes {
            return Err(ServiceError::UploadTooLarge {
                size: bytes.len(),
                limit: self.max_upload_bytes,
            });
        }
        let table = UrlTable::from_csv(bytes)?;
        let results = self.predictor.predict_table(&table)?;

        let now = storage::now();
        let records: Vec<HistoryRecord> = results
            .into_iter()
            .map(|r| new_record(r, identity, now))
            .collect();
        self.store.insert_many(&records)?;

        info!(
            submitter = %identity.user_id,
            role = %identity.role,
            count = records.len(),
            "upload classified"
        );
        Ok(records)
    }

    pub fn predict_url(&self, url: &str, identity: &Identity) -> Result<HistoryRecord, ServiceError> {
        let result = self.predictor.predict_one(url)?;
        let record = new_record(result, identity, storage::now());
        self.store.insert_many(std::slice::from_ref(&record))?;
        info!(
            submitter = %identity.user_id,
            id = %record.id,
            classifier = %record.classifier,
            "url classified"
        );
        Ok(record)
    }
}

/// Admin submissions are approved on entry; others start without a review state.
fn new_record(result: PredictionResult, identity: &Identity, now: DateTime<Utc>) -> HistoryRecord {
    HistoryRecord {
        id: Uuid::new_v4().to_string(),
        submitter_id: identity.user_id.clone(),
        submitter_role: identity.role,
        original_url: result.url,
        detection: result.detection,
        classifier: result.label,
        need_review: false,
        approved: identity.is_admin().then_some(ApprovalStatus::Approved),
        approved_at: None,
        approved_by: None,
        created_at: now,
        updated_at: now,
    }
}

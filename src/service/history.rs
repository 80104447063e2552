//! History listing and the review workflow: submit → pending → approved / rejected.

use super::ServiceError;
use crate::identity::Identity;
use crate::storage::{
    self, ApprovalStatus, HistoryFilter, HistoryQuery, HistoryRecord, HistoryStore, Page,
    PageRequest, SortOrder,
};
use crate::verdict::Label;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Listing parameters as they arrive from a caller. Label and status names are
/// validated against the closed enums.
#[derive(Debug, Clone)]
pub struct HistoryListing {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: u32,
    pub size: u32,
    pub classifier: Option<String>,
    pub approved_status: Option<String>,
}

impl Default for HistoryListing {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            page: 1,
            size: 10,
            classifier: None,
            approved_status: None,
        }
    }
}

impl HistoryListing {
    fn query(&self) -> Result<HistoryQuery, ServiceError> {
        let page = PageRequest::new(self.page, self.size).ok_or_else(|| {
            ServiceError::InvalidInput(format!("page {} / size {}", self.page, self.size))
        })?;
        let classifier = self
            .classifier
            .as_deref()
            .map(str::parse::<Label>)
            .transpose()
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;
        let approved = self
            .approved_status
            .as_deref()
            .map(str::parse::<ApprovalStatus>)
            .transpose()
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;

        Ok(HistoryQuery {
            filter: HistoryFilter {
                created_from: self.from,
                created_to: self.to,
                classifier,
                approved,
                ..HistoryFilter::default()
            },
            sort: SortOrder::CreatedAsc,
            page,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierTotal {
    #[serde(rename = "type")]
    pub label: Label,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub total: u64,
    pub detection_benign: u64,
    pub detection_malware: u64,
    pub classifier: Vec<ClassifierTotal>,
}

pub struct HistoryService {
    store: Arc<dyn HistoryStore>,
}

impl HistoryService {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// The caller's own records.
    pub fn user_history(
        &self,
        identity: &Identity,
        listing: &HistoryListing,
    ) -> Result<Page<HistoryRecord>, ServiceError> {
        let mut query = listing.query()?;
        query.filter.submitter_id = Some(identity.user_id.clone());
        Ok(self.store.find(&query)?)
    }

    /// Approved records from every submitter. `approved_status` is ignored.
    pub fn approved_global_history(
        &self,
        listing: &HistoryListing,
    ) -> Result<Page<HistoryRecord>, ServiceError> {
        let mut query = listing.query()?;
        query.filter.approved = Some(ApprovalStatus::Approved);
        Ok(self.store.find(&query)?)
    }

    pub fn all_history(
        &self,
        identity: &Identity,
        listing: &HistoryListing,
    ) -> Result<Page<HistoryRecord>, ServiceError> {
        require_admin(identity)?;
        Ok(self.store.find(&listing.query()?)?)
    }

    /// Records submitted for review and not yet decided.
    pub fn pending_approvals(
        &self,
        identity: &Identity,
        listing: &HistoryListing,
    ) -> Result<Page<HistoryRecord>, ServiceError> {
        require_admin(identity)?;
        let mut query = listing.query()?;
        query.filter.approved = Some(ApprovalStatus::Pending);
        query.filter.need_review = Some(true);
        Ok(self.store.find(&query)?)
    }

    /// Reviewed-and-approved records, most recent decision first.
    pub fn recent_approvals(&self, page: u32, size: u32) -> Result<Page<HistoryRecord>, ServiceError> {
        let page = PageRequest::new(page, size)
            .ok_or_else(|| ServiceError::InvalidInput(format!("page {} / size {}", page, size)))?;
        let query = HistoryQuery {
            filter: HistoryFilter {
                approved: Some(ApprovalStatus::Approved),
                need_review: Some(true),
                ..HistoryFilter::default()
            },
            sort: SortOrder::ApprovedAtDesc,
            page,
        };
        Ok(self.store.find(&query)?)
    }

    pub fn get(&self, id: &str) -> Result<HistoryRecord, ServiceError> {
        self.store
            .get(id)?
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    /// Owner asks for review. Records owned by someone else read as not found.
    pub fn submit_for_approval(
        &self,
        identity: &Identity,
        id: &str,
    ) -> Result<HistoryRecord, ServiceError> {
        let mut record = self
            .store
            .get(id)?
            .filter(|r| r.submitter_id == identity.user_id)
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;

        record.need_review = true;
        record.approved = Some(ApprovalStatus::Pending);
        record.updated_at = storage::now();
        self.persist(&record)?;

        info!(id, submitter = %identity.user_id, "submitted for approval");
        Ok(record)
    }

    pub fn approve(&self, identity: &Identity, id: &str) -> Result<HistoryRecord, ServiceError> {
        self.review(identity, id, ApprovalStatus::Approved)
    }

    pub fn reject(&self, identity: &Identity, id: &str) -> Result<HistoryRecord, ServiceError> {
        self.review(identity, id, ApprovalStatus::Rejected)
    }

    pub fn delete(&self, identity: &Identity, id: &str) -> Result<(), ServiceError> {
        require_admin(identity)?;
        if !self.store.delete(id)? {
            return Err(ServiceError::NotFound(id.to_string()));
        }
        info!(id, admin = %identity.user_id, "history deleted");
        Ok(())
    }

    /// Counts over the date range: global for admins, own records otherwise.
    pub fn report(
        &self,
        identity: &Identity,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Report, ServiceError> {
        let filter = HistoryFilter {
            created_from: from,
            created_to: to,
            submitter_id: (!identity.is_admin()).then(|| identity.user_id.clone()),
            ..HistoryFilter::default()
        };
        let counts = self.store.label_counts(&filter)?;

        let count_of = |label: Label| {
            counts
                .iter()
                .find(|(l, _)| *l == label)
                .map(|(_, n)| *n)
                .unwrap_or(0)
        };
        let classifier: Vec<ClassifierTotal> = Label::ALL
            .into_iter()
            .map(|label| ClassifierTotal {
                label,
                total: count_of(label),
            })
            .collect();
        let total = classifier.iter().map(|c| c.total).sum();
        let detection_benign = count_of(Label::Benign);

        Ok(Report {
            total,
            detection_benign,
            detection_malware: total - detection_benign,
            classifier,
        })
    }

    fn review(
        &self,
        identity: &Identity,
        id: &str,
        decision: ApprovalStatus,
    ) -> Result<HistoryRecord, ServiceError> {
        require_admin(identity)?;
        let mut record = self.get(id)?;

        let now = storage::now();
        record.approved = Some(decision);
        record.approved_at = Some(now);
        record.approved_by = Some(identity.user_id.clone());
        record.updated_at = now;
        self.persist(&record)?;

        info!(id, admin = %identity.user_id, decision = %decision, "review recorded");
        Ok(record)
    }

    fn persist(&self, record: &HistoryRecord) -> Result<(), ServiceError> {
        if self.store.update(record)? {
            Ok(())
        } else {
            Err(ServiceError::NotFound(record.id.clone()))
        }
    }
}

fn require_admin(identity: &Identity) -> Result<(), ServiceError> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied)
    }
}

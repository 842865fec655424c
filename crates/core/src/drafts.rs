//! In-progress form drafts.
//!
//! A draft is keyed by form identity and kept apart from committed requests:
//! it only becomes a [`NewRequest`] through [`RequestDraft::into_new_request`]
//! and is discarded once that request has been submitted.

use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::domain::request::{LineItem, NewRequest, RequestCategory, SubmissionKind};
use crate::errors::DomainError;
use crate::store::StoreError;

const MAX_FORM_KEY_LEN: usize = 128;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormKey(String);

impl FormKey {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("form_key", "form key is required"));
        }
        if trimmed.len() > MAX_FORM_KEY_LEN {
            return Err(DomainError::validation(
                "form_key",
                format!("form key must be at most {MAX_FORM_KEY_LEN} bytes"),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn file_name(&self) -> String {
        let mut name = String::with_capacity(self.0.len() * 2 + 5);
        for byte in self.0.as_bytes() {
            name.push_str(&format!("{byte:02x}"));
        }
        name.push_str(".json");
        name
    }
}

impl fmt::Display for FormKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Partially filled request form. Every field is optional until submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDraft {
    pub category: RequestCategory,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    pub requested_by: Option<String>,
    pub department: Option<String>,
    pub approver: Option<String>,
    pub purpose: Option<String>,
    pub leave_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default = "Utc::now")]
    pub saved_at: DateTime<Utc>,
}

impl RequestDraft {
    pub fn empty(category: RequestCategory) -> Self {
        Self {
            category,
            line_items: Vec::new(),
            requested_by: None,
            department: None,
            approver: None,
            purpose: None,
            leave_type: None,
            start_date: None,
            end_date: None,
            saved_at: Utc::now(),
        }
    }

    pub fn into_new_request(self) -> Result<NewRequest, DomainError> {
        let kind = match self.category {
            RequestCategory::MaterialRequest => SubmissionKind::MaterialRequest,
            RequestCategory::Advance => {
                SubmissionKind::Advance { purpose: self.purpose.unwrap_or_default() }
            }
            RequestCategory::Leave => SubmissionKind::Leave {
                leave_type: self.leave_type.unwrap_or_default(),
                start_date: self
                    .start_date
                    .ok_or_else(|| DomainError::validation("start_date", "start_date is required"))?,
                end_date: self
                    .end_date
                    .ok_or_else(|| DomainError::validation("end_date", "end_date is required"))?,
            },
            RequestCategory::Retirement => {
                return Err(DomainError::validation(
                    "category",
                    "retirements are filed against an approved advance, not from a draft",
                ));
            }
        };

        Ok(NewRequest {
            kind,
            line_items: self.line_items,
            requested_by: self.requested_by.unwrap_or_default(),
            department: self.department.unwrap_or_default(),
            approver: self.approver,
        })
    }
}

#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn load(&self, key: &FormKey) -> Result<Option<RequestDraft>, StoreError>;
    async fn save(&self, key: &FormKey, draft: &RequestDraft) -> Result<(), StoreError>;
    /// Returns whether a draft existed.
    async fn discard(&self, key: &FormKey) -> Result<bool, StoreError>;
}

/// One JSON file per form key inside a directory.
#[derive(Clone, Debug)]
pub struct FileDraftStore {
    directory: PathBuf,
}

impl FileDraftStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into() }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, key: &FormKey) -> PathBuf {
        self.directory.join(key.file_name())
    }
}

fn io_error(path: &Path, error: std::io::Error) -> StoreError {
    StoreError::Unavailable(format!("draft file `{}`: {error}", path.display()))
}

#[async_trait]
impl DraftStore for FileDraftStore {
    async fn load(&self, key: &FormKey) -> Result<Option<RequestDraft>, StoreError> {
        let path = self.path_for(key);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(io_error(&path, error)),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|error| StoreError::Decode(format!("draft `{key}`: {error}")))
    }

    async fn save(&self, key: &FormKey, draft: &RequestDraft) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|error| io_error(&self.directory, error))?;

        let path = self.path_for(key);
        let encoded = serde_json::to_vec_pretty(draft)
            .map_err(|error| StoreError::Decode(format!("draft `{key}`: {error}")))?;
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, encoded).await.map_err(|error| io_error(&staging, error))?;
        tokio::fs::rename(&staging, &path).await.map_err(|error| io_error(&path, error))
    }

    async fn discard(&self, key: &FormKey) -> Result<bool, StoreError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(io_error(&path, error)),
        }
    }
}

#[derive(Default)]
pub struct InMemoryDraftStore {
    drafts: RwLock<HashMap<FormKey, RequestDraft>>,
}

#[async_trait]
impl DraftStore for InMemoryDraftStore {
    async fn load(&self, key: &FormKey) -> Result<Option<RequestDraft>, StoreError> {
        Ok(self.drafts.read().await.get(key).cloned())
    }

    async fn save(&self, key: &FormKey, draft: &RequestDraft) -> Result<(), StoreError> {
        self.drafts.write().await.insert(key.clone(), draft.clone());
        Ok(())
    }

    async fn discard(&self, key: &FormKey) -> Result<bool, StoreError> {
        Ok(self.drafts.write().await.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    use super::{DraftStore, FileDraftStore, FormKey, RequestDraft};
    use crate::domain::request::{LineItem, RequestCategory, SubmissionKind};
    use crate::errors::DomainError;

    fn material_draft() -> RequestDraft {
        RequestDraft {
            line_items: vec![LineItem {
                item_name: "rebar".to_string(),
                quantity: Decimal::from(4),
                quantity_type: "tonnes".to_string(),
                amount: Decimal::from(600),
                description: "12mm".to_string(),
            }],
            requested_by: Some("Tunde".to_string()),
            department: Some("Projects".to_string()),
            ..RequestDraft::empty(RequestCategory::MaterialRequest)
        }
    }

    #[tokio::test]
    async fn file_store_round_trips_and_discards() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileDraftStore::new(dir.path().join("drafts"));
        let key = FormKey::parse("material-request:tunde").expect("key");

        assert_eq!(store.load(&key).await.expect("load empty"), None);

        let draft = material_draft();
        store.save(&key, &draft).await.expect("save");
        assert_eq!(store.load(&key).await.expect("load"), Some(draft));

        assert!(store.discard(&key).await.expect("discard"));
        assert!(!store.discard(&key).await.expect("discard twice"));
        assert_eq!(store.load(&key).await.expect("load after discard"), None);
    }

    #[tokio::test]
    async fn file_names_do_not_escape_the_directory() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileDraftStore::new(dir.path());
        let key = FormKey::parse("../../etc/passwd").expect("key");

        store.save(&key, &material_draft()).await.expect("save");
        let entries = std::fs::read_dir(dir.path()).expect("list").count();
        assert_eq!(entries, 1);
        assert!(store.load(&key).await.expect("load").is_some());
    }

    #[test]
    fn form_key_rejects_blank_input() {
        assert!(matches!(FormKey::parse("   "), Err(DomainError::Validation { .. })));
        assert!(FormKey::parse(&"k".repeat(129)).is_err());
    }

    #[test]
    fn leave_draft_requires_dates_before_submission() {
        let draft = RequestDraft {
            leave_type: Some("sick".to_string()),
            start_date: NaiveDate::from_ymd_opt(2026, 5, 4),
            requested_by: Some("Amaka".to_string()),
            department: Some("HR".to_string()),
            ..RequestDraft::empty(RequestCategory::Leave)
        };
        let error = draft.clone().into_new_request().expect_err("end date missing");
        assert!(matches!(error, DomainError::Validation { ref field, .. } if field == "end_date"));

        let complete = RequestDraft { end_date: NaiveDate::from_ymd_opt(2026, 5, 6), ..draft };
        let new_request = complete.into_new_request().expect("complete leave draft");
        assert!(matches!(new_request.kind, SubmissionKind::Leave { .. }));
    }

    #[test]
    fn retirement_drafts_cannot_be_submitted() {
        let error = RequestDraft::empty(RequestCategory::Retirement)
            .into_new_request()
            .expect_err("retirements need an advance");
        assert!(matches!(error, DomainError::Validation { ref field, .. } if field == "category"));
    }
}

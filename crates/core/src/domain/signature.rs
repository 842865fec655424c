use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn generate() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("DOC-{}", &suffix[..12]))
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecipientId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Completed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningMode {
    #[default]
    Sequential,
    Parallel,
}

impl SigningMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sequential" => Some(Self::Sequential),
            "parallel" => Some(Self::Parallel),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Signature,
    Initials,
    DateSigned,
    Textbox,
    Checkbox,
    FullName,
}

impl FieldKind {
    pub fn required_by_default(&self) -> bool {
        matches!(self, Self::Signature | Self::Initials)
    }

    pub fn default_size(&self) -> FieldSize {
        match self {
            Self::Signature => FieldSize { width: 20.0, height: 6.0 },
            Self::Initials => FieldSize { width: 8.0, height: 5.0 },
            Self::Checkbox => FieldSize { width: 3.0, height: 3.0 },
            Self::DateSigned | Self::Textbox | Self::FullName => {
                FieldSize { width: 16.0, height: 4.0 }
            }
        }
    }
}

/// Top-left corner of a field, in percent of the page width and height.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldPosition {
    pub x: f64,
    pub y: f64,
}

impl FieldPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn clamped(self) -> Self {
        Self { x: clamp_percent(self.x), y: clamp_percent(self.y) }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSize {
    pub width: f64,
    pub height: f64,
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,
    pub name: String,
    pub email: String,
    pub order: u32,
    pub color: String,
}

impl Recipient {
    pub fn is_addressable(&self) -> bool {
        !self.name.trim().is_empty() && !self.email.trim().is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacedField {
    pub id: FieldId,
    pub kind: FieldKind,
    pub page: u32,
    pub position: FieldPosition,
    pub size: FieldSize,
    pub required: bool,
    pub assigned_to: RecipientId,
}

/// A signature request after it has been sent. Recipients and fields are a
/// frozen snapshot of the composer at send time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignatureDocument {
    pub id: DocumentId,
    pub file_name: String,
    pub page_count: u32,
    pub subject: String,
    pub message: String,
    pub signing_mode: SigningMode,
    pub status: DocumentStatus,
    pub recipients: Vec<Recipient>,
    pub fields: Vec<PlacedField>,
    pub snapshot_digest: String,
    pub created_at: DateTime<Utc>,
}

impl SignatureDocument {
    /// Recipients whose turn it is: the lowest `order` in sequential mode,
    /// everyone in parallel mode.
    pub fn next_signers(&self) -> Vec<&Recipient> {
        match self.signing_mode {
            SigningMode::Parallel => self.recipients.iter().collect(),
            SigningMode::Sequential => {
                self.recipients.iter().min_by_key(|recipient| recipient.order).into_iter().collect()
            }
        }
    }

    pub fn fields_for(&self, recipient: RecipientId) -> impl Iterator<Item = &PlacedField> {
        self.fields.iter().filter(move |field| field.assigned_to == recipient)
    }

    pub fn verify_snapshot(&self) -> bool {
        snapshot_digest(&self.recipients, &self.fields) == self.snapshot_digest
    }
}

#[derive(Serialize)]
struct Snapshot<'a> {
    recipients: &'a [Recipient],
    fields: &'a [PlacedField],
}

pub fn snapshot_digest(recipients: &[Recipient], fields: &[PlacedField]) -> String {
    let canonical = serde_json::to_vec(&Snapshot { recipients, fields }).unwrap_or_default();
    let digest = Sha256::digest(&canonical);
    encode_hex(digest.as_slice())
}

fn encode_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push(HEX[(byte >> 4) as usize] as char);
        output.push(HEX[(byte & 0x0f) as usize] as char);
    }
    output
}

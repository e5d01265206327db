use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{note, user};

use super::shared::double_option;

/// Name and email of the user who uploaded a note.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UploaderSummary {
    #[schema(example = "Ada Lovelace")]
    pub name: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
}

impl From<user::Model> for UploaderSummary {
    fn from(model: user::Model) -> Self {
        Self {
            name: model.name,
            email: model.email,
        }
    }
}

/// Response DTO for a single note.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NoteResponse {
    /// Note ID (UUIDv7).
    #[schema(example = "01936f0e-1234-7abc-8000-000000000001")]
    pub id: String,
    #[schema(example = "Graph Algorithms")]
    pub title: String,
    #[schema(example = "CS101")]
    pub subject: String,
    #[schema(example = 3)]
    pub semester: i32,
    #[schema(example = "Unit 4")]
    pub unit: Option<String>,
    pub description: Option<String>,
    /// Generated storage filename.
    #[schema(example = "1718000000000-482913377.pdf")]
    pub filename: String,
    #[schema(example = "uploads/1718000000000-482913377.pdf")]
    pub file_path: String,
    /// Blob size in bytes.
    #[schema(example = 142857)]
    pub file_size: Option<i64>,
    /// ID of the uploading user.
    pub uploaded_by: i32,
    /// Present on list and fetch responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader: Option<UploaderSummary>,
    pub downloads: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<note::Model> for NoteResponse {
    fn from(model: note::Model) -> Self {
        Self {
            id: model.id.to_string(),
            title: model.title,
            subject: model.subject,
            semester: model.semester,
            unit: model.unit,
            description: model.description,
            filename: model.filename,
            file_path: model.file_path,
            file_size: model.file_size,
            uploaded_by: model.uploaded_by,
            uploader: None,
            downloads: model.downloads,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<(note::Model, Option<user::Model>)> for NoteResponse {
    fn from((model, uploader): (note::Model, Option<user::Model>)) -> Self {
        Self {
            uploader: uploader.map(UploaderSummary::from),
            ..Self::from(model)
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct NoteEnvelope {
    #[schema(example = true)]
    pub success: bool,
    pub message: String,
    pub note: NoteResponse,
}

impl NoteEnvelope {
    pub fn new(message: impl Into<String>, note: NoteResponse) -> Self {
        Self {
            success: true,
            message: message.into(),
            note,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct NoteListResponse {
    #[schema(example = true)]
    pub success: bool,
    pub message: String,
    pub count: usize,
    pub notes: Vec<NoteResponse>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SubjectListResponse {
    #[schema(example = true)]
    pub success: bool,
    pub message: String,
    pub count: usize,
    #[schema(example = json!(["CS101", "MATH201"]))]
    pub subjects: Vec<String>,
}

/// Filters accepted by the note listing.
#[derive(Deserialize, Default, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NoteListQuery {
    /// Exact subject match.
    pub subject: Option<String>,
    /// Semester number; non-numeric values are ignored.
    pub semester: Option<String>,
    /// Case-insensitive substring of the title or description.
    pub search: Option<String>,
}

/// Text fields collected from the upload form.
#[derive(Default, Debug)]
pub struct UploadFields {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub semester: Option<String>,
    pub unit: Option<String>,
    pub description: Option<String>,
}

/// Partial metadata update. File replacement is not supported.
#[derive(Deserialize, Default, PartialEq, Debug, utoipa::ToSchema)]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub semester: Option<i32>,
    /// `null` clears the unit.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub unit: Option<Option<String>>,
    /// `null` clears the description.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
}

use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::ExprTrait;
use sea_orm::*;
use uuid::Uuid;

use crate::entity::{note, user};
use crate::error::AppError;
use crate::models::note::{NoteListQuery, UpdateNoteRequest, UploadFields};
use crate::models::shared::{optional_text, parse_semester, require_text, validate_semester};

/// Where an uploaded blob landed, as recorded on the note.
#[derive(Debug, Clone)]
pub struct BlobLocation {
    pub filename: String,
    pub file_path: String,
    pub file_size: u64,
}

/// Unvalidated input for a new note.
#[derive(Debug)]
pub struct NewNote {
    pub fields: UploadFields,
    pub blob: BlobLocation,
    pub uploaded_by: i32,
}

/// Conjunctive listing filter. `search` matches title OR description.
///
/// `subject` and `semester` are pushed into the query. `search` is matched
/// in process because SQLite's `LOWER()` only folds ASCII.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NoteFilter {
    pub subject: Option<String>,
    pub semester: Option<i32>,
    pub search: Option<String>,
}

impl From<NoteListQuery> for NoteFilter {
    fn from(query: NoteListQuery) -> Self {
        Self {
            subject: query.subject.filter(|s| !s.is_empty()),
            semester: query
                .semester
                .and_then(|s| s.trim().parse::<i32>().ok()),
            search: query
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }
}

impl NoteFilter {
    fn condition(&self) -> Condition {
        let mut cond = Condition::all();

        if let Some(ref subject) = self.subject {
            cond = cond.add(note::Column::Subject.eq(subject.as_str()));
        }
        if let Some(semester) = self.semester {
            cond = cond.add(note::Column::Semester.eq(semester));
        }

        cond
    }

    pub fn matches_search(&self, model: &note::Model) -> bool {
        self.matches_text(&model.title, model.description.as_deref())
    }

    /// Case-insensitive substring match on the title or description.
    fn matches_text(&self, title: &str, description: Option<&str>) -> bool {
        let Some(ref search) = self.search else {
            return true;
        };
        let needle = search.to_lowercase();

        title.to_lowercase().contains(&needle)
            || description.is_some_and(|d| d.to_lowercase().contains(&needle))
    }
}

/// Persistence for note records.
///
/// Every write validates its input first, so a rejected request never
/// touches the stored row.
pub struct NoteStore<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> NoteStore<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Validate and insert a note for an already stored blob.
    pub async fn create(&self, input: NewNote) -> Result<note::Model, AppError> {
        let NewNote {
            fields,
            blob,
            uploaded_by,
        } = input;

        let title = require_text("Title", fields.title.as_deref())?;
        let subject = require_text("Subject", fields.subject.as_deref())?;
        let semester = parse_semester(fields.semester.as_deref())?;
        let file_size = i64::try_from(blob.file_size)
            .map_err(|_| AppError::Validation("File size out of range".into()))?;

        let now = Utc::now();
        let new_note = note::ActiveModel {
            id: Set(Uuid::now_v7()),
            title: Set(title),
            subject: Set(subject),
            semester: Set(semester),
            unit: Set(optional_text(fields.unit.as_deref())),
            description: Set(optional_text(fields.description.as_deref())),
            filename: Set(blob.filename),
            file_path: Set(blob.file_path),
            file_size: Set(Some(file_size)),
            uploaded_by: Set(uploaded_by),
            downloads: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        Ok(new_note.insert(self.conn).await?)
    }

    pub async fn find(&self, id: Uuid) -> Result<note::Model, AppError> {
        note::Entity::find_by_id(id)
            .one(self.conn)
            .await?
            .ok_or_else(not_found)
    }

    pub async fn find_with_uploader(
        &self,
        id: Uuid,
    ) -> Result<(note::Model, Option<user::Model>), AppError> {
        note::Entity::find_by_id(id)
            .find_also_related(user::Entity)
            .one(self.conn)
            .await?
            .ok_or_else(not_found)
    }

    /// Matching notes with their uploaders, newest first.
    pub async fn list(
        &self,
        filter: &NoteFilter,
    ) -> Result<Vec<(note::Model, Option<user::Model>)>, DbErr> {
        let rows = note::Entity::find()
            .filter(filter.condition())
            .find_also_related(user::Entity)
            .order_by_desc(note::Column::CreatedAt)
            .all(self.conn)
            .await?;

        Ok(rows
            .into_iter()
            .filter(|(model, _)| filter.matches_search(model))
            .collect())
    }

    /// Distinct subjects, ascending.
    pub async fn subjects(&self) -> Result<Vec<String>, DbErr> {
        note::Entity::find()
            .select_only()
            .column(note::Column::Subject)
            .distinct()
            .order_by_asc(note::Column::Subject)
            .into_tuple::<String>()
            .all(self.conn)
            .await
    }

    /// Bump the download counter in a single statement and return the note.
    pub async fn record_download(&self, id: Uuid) -> Result<note::Model, AppError> {
        let result = note::Entity::update_many()
            .col_expr(
                note::Column::Downloads,
                Expr::col(note::Column::Downloads).add(1),
            )
            .filter(note::Column::Id.eq(id))
            .exec(self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(not_found());
        }

        self.find(id).await
    }

    /// Apply the provided metadata fields. An empty request is a no-op.
    ///
    /// An unknown id is reported before any field is validated.
    pub async fn update(
        &self,
        id: Uuid,
        changes: UpdateNoteRequest,
    ) -> Result<note::Model, AppError> {
        let existing = self.find(id).await?;

        let title = changes
            .title
            .as_deref()
            .map(|t| require_text("Title", Some(t)))
            .transpose()?;
        let subject = changes
            .subject
            .as_deref()
            .map(|s| require_text("Subject", Some(s)))
            .transpose()?;
        let semester = changes.semester.map(validate_semester).transpose()?;

        if changes == UpdateNoteRequest::default() {
            return Ok(existing);
        }

        let mut active: note::ActiveModel = existing.into();
        if let Some(title) = title {
            active.title = Set(title);
        }
        if let Some(subject) = subject {
            active.subject = Set(subject);
        }
        if let Some(semester) = semester {
            active.semester = Set(semester);
        }
        if let Some(unit) = changes.unit {
            active.unit = Set(optional_text(unit.as_deref()));
        }
        if let Some(description) = changes.description {
            active.description = Set(optional_text(description.as_deref()));
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(self.conn).await?)
    }

    /// Remove the record. A row that is already gone is `NotFound`.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let result = note::Entity::delete_by_id(id).exec(self.conn).await?;
        if result.rows_affected == 0 {
            return Err(not_found());
        }
        Ok(())
    }
}

fn not_found() -> AppError {
    AppError::NotFound("Note not found".into())
}

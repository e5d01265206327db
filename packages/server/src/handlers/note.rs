use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, body::Body};
use storage::{BlobName, BlobStore, BoxReader};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{ADMIN_ROLE, AuthUser};
use crate::extractors::json::AppJson;
use crate::models::note::*;
use crate::models::shared::MessageResponse;
use crate::state::AppState;
use crate::store::{BlobLocation, NewNote, NoteFilter, NoteStore};

/// The only media type accepted for uploads.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Room for multipart framing and the text fields on top of the file cap.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn upload_body_limit(max_upload_size: u64) -> DefaultBodyLimit {
    let cap = usize::try_from(max_upload_size).unwrap_or(usize::MAX);
    DefaultBodyLimit::max(cap.saturating_add(MULTIPART_OVERHEAD))
}

#[utoipa::path(
    post,
    path = "/api/notes/upload",
    tag = "Notes",
    operation_id = "uploadNote",
    summary = "Upload a PDF note",
    description = "Creates a note from a multipart form. The `file` field is required and must be \
        `application/pdf` within the size cap (10 MiB by default). Text fields: `title`, `subject`, \
        `semester` (1-8), optional `unit` and `description`. The file is stored before the record; \
        if the record cannot be created the stored file is removed again. Requires the admin role.",
    request_body(content_type = "multipart/form-data", description = "PDF file plus note metadata"),
    responses(
        (status = 201, description = "Note created", body = NoteEnvelope),
        (status = 400, description = "Validation error (VALIDATION_ERROR, FILE_TOO_LARGE)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(user_id = auth_user.user_id))]
pub async fn upload_note(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_role(ADMIN_ROLE)?;

    let mut form = UploadForm::default();
    if let Err(e) = read_upload_form(&mut multipart, &state, &mut form).await {
        if let Some(stored) = form.stored.take() {
            discard_blob(&*state.blob_store, &stored.name).await;
        }
        return Err(e);
    }

    let stored = form
        .stored
        .ok_or_else(|| AppError::Validation("No file uploaded".into()))?;

    let new_note = NewNote {
        fields: form.fields,
        blob: BlobLocation {
            filename: stored.name.to_string(),
            file_path: state.blob_store.locate(&stored.name),
            file_size: stored.size,
        },
        uploaded_by: auth_user.user_id,
    };

    match NoteStore::new(&state.db).create(new_note).await {
        Ok(model) => {
            info!(note_id = %model.id, filename = %model.filename, "Note uploaded");
            Ok((
                StatusCode::CREATED,
                Json(NoteEnvelope::new(
                    "Note uploaded successfully",
                    NoteResponse::from(model),
                )),
            ))
        }
        Err(e) => {
            discard_blob(&*state.blob_store, &stored.name).await;
            Err(e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/notes",
    tag = "Notes",
    operation_id = "listNotes",
    summary = "List notes with optional filters",
    description = "Returns every matching note, newest first, each with its uploader's name and \
        email. `subject` matches exactly, `semester` must be numeric (otherwise ignored), and \
        `search` is a case-insensitive substring match on the title or description. No pagination.",
    params(NoteListQuery),
    responses(
        (status = 200, description = "Matching notes", body = NoteListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user, query))]
pub async fn list_notes(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<NoteListQuery>,
) -> Result<Json<NoteListResponse>, AppError> {
    let filter = NoteFilter::from(query);
    let rows = NoteStore::new(&state.db).list(&filter).await?;

    let notes: Vec<NoteResponse> = rows.into_iter().map(NoteResponse::from).collect();

    Ok(Json(NoteListResponse {
        success: true,
        message: "Notes retrieved successfully".into(),
        count: notes.len(),
        notes,
    }))
}

#[utoipa::path(
    get,
    path = "/api/notes/{id}",
    tag = "Notes",
    operation_id = "getNote",
    summary = "Get a note by ID",
    params(("id" = String, Path, description = "Note ID (UUID)")),
    responses(
        (status = 200, description = "Note details", body = NoteEnvelope),
        (status = 400, description = "Malformed ID (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Note not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user), fields(id))]
pub async fn get_note(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<NoteEnvelope>, AppError> {
    let id = parse_note_id(&id)?;
    let row = NoteStore::new(&state.db).find_with_uploader(id).await?;

    Ok(Json(NoteEnvelope::new(
        "Note retrieved successfully",
        NoteResponse::from(row),
    )))
}

#[utoipa::path(
    get,
    path = "/api/notes/download/{id}",
    tag = "Notes",
    operation_id = "downloadNote",
    summary = "Download a note's PDF",
    description = "Increments the note's download counter, then streams the file as an \
        attachment. The increment is kept even if the file turns out to be missing.",
    params(("id" = String, Path, description = "Note ID (UUID)")),
    responses(
        (status = 200, description = "PDF content"),
        (status = 400, description = "Malformed ID (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Note or file not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user), fields(id))]
pub async fn download_note(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_note_id(&id)?;
    let model = NoteStore::new(&state.db).record_download(id).await?;

    let name = BlobName::parse(&model.filename)
        .map_err(|e| AppError::Internal(format!("Note {id} has a bad filename: {e}")))?;
    let size = state.blob_store.size(&name).await?;
    let reader = state.blob_store.get_stream(&name).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    let content_type = mime_guess::from_path(&model.filename)
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_value(&model.filename),
        )
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}

#[utoipa::path(
    put,
    path = "/api/notes/{id}",
    tag = "Notes",
    operation_id = "updateNote",
    summary = "Update a note's metadata",
    description = "Partially updates a note: only provided fields change, and all of them are \
        validated before anything is written. The file itself cannot be replaced. An empty payload \
        returns the note unchanged. Requires the admin role.",
    params(("id" = String, Path, description = "Note ID (UUID)")),
    request_body = UpdateNoteRequest,
    responses(
        (status = 200, description = "Note updated", body = NoteEnvelope),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Note not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_note(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateNoteRequest>,
) -> Result<Json<NoteEnvelope>, AppError> {
    auth_user.require_role(ADMIN_ROLE)?;
    let id = parse_note_id(&id)?;

    let model = NoteStore::new(&state.db).update(id, payload).await?;

    Ok(Json(NoteEnvelope::new(
        "Note updated successfully",
        NoteResponse::from(model),
    )))
}

#[utoipa::path(
    delete,
    path = "/api/notes/{id}",
    tag = "Notes",
    operation_id = "deleteNote",
    summary = "Delete a note and its file",
    description = "Removes the stored file (a file that is already gone is ignored), then the \
        record. Requires the admin role.",
    params(("id" = String, Path, description = "Note ID (UUID)")),
    responses(
        (status = 200, description = "Note deleted", body = MessageResponse),
        (status = 400, description = "Malformed ID (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Note not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_note(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    auth_user.require_role(ADMIN_ROLE)?;
    let id = parse_note_id(&id)?;

    let store = NoteStore::new(&state.db);
    let model = store.find(id).await?;

    match BlobName::parse(&model.filename) {
        Ok(name) => {
            if !state.blob_store.delete(&name).await? {
                warn!(filename = %model.filename, "File already missing while deleting note");
            }
        }
        Err(e) => warn!(filename = %model.filename, "Skipping file removal: {e}"),
    }

    // A failure here leaves the record pointing at a removed file. A row
    // removed concurrently since `find` reports NotFound.
    store.delete(id).await?;
    info!(note_id = %id, "Note deleted");

    Ok(Json(MessageResponse::new("Note deleted successfully")))
}

#[utoipa::path(
    get,
    path = "/api/notes/subjects/list",
    tag = "Notes",
    operation_id = "listSubjects",
    summary = "List distinct subjects",
    description = "Returns each subject that appears on at least one note exactly once, sorted.",
    responses(
        (status = 200, description = "Distinct subjects", body = SubjectListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user))]
pub async fn list_subjects(
    _auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<SubjectListResponse>, AppError> {
    let subjects = NoteStore::new(&state.db).subjects().await?;

    Ok(Json(SubjectListResponse {
        success: true,
        message: "Subjects retrieved successfully".into(),
        count: subjects.len(),
        subjects,
    }))
}

/// A blob written during the current upload.
struct StoredUpload {
    name: BlobName,
    size: u64,
}

#[derive(Default)]
struct UploadForm {
    stored: Option<StoredUpload>,
    fields: UploadFields,
}

/// Drain the multipart body, writing the file field to blob storage as soon
/// as it arrives. On error `form.stored` still names any blob already written.
async fn read_upload_form(
    multipart: &mut Multipart,
    state: &AppState,
    form: &mut UploadForm,
) -> Result<(), AppError> {
    let max_size = state.config.storage.max_upload_size;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_size))?
    {
        let Some(field_name) = field.name().map(str::to_string) else {
            continue;
        };

        match field_name.as_str() {
            "file" => {
                if form.stored.is_some() {
                    return Err(AppError::Validation("Only one file may be uploaded".into()));
                }
                if !is_pdf(field.content_type()) {
                    return Err(AppError::Validation("Only PDF files are allowed".into()));
                }

                let name = BlobName::generate(field.file_name().unwrap_or_default());
                let size =
                    stream_field_to_store(field, &*state.blob_store, &name, max_size).await?;
                form.stored = Some(StoredUpload { name, size });
            }
            "title" | "subject" | "semester" | "unit" | "description" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, max_size))?;
                let slot = match field_name.as_str() {
                    "title" => &mut form.fields.title,
                    "subject" => &mut form.fields.subject,
                    "semester" => &mut form.fields.semester,
                    "unit" => &mut form.fields.unit,
                    _ => &mut form.fields.description,
                };
                *slot = Some(text);
            }
            _ => {} // Ignore unknown fields.
        }
    }

    Ok(())
}

fn is_pdf(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(PDF_MEDIA_TYPE))
}

fn multipart_error(err: MultipartError, max_size: u64) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::FileTooLarge { limit: max_size }
    } else {
        AppError::Validation(format!("Multipart error: {}", err.body_text()))
    }
}

/// Stream a multipart field to blob storage via a temp file, enforcing the cap.
async fn stream_field_to_store(
    mut field: Field<'_>,
    blob_store: &dyn BlobStore,
    name: &BlobName,
    max_size: u64,
) -> Result<u64, AppError> {
    let temp_path = std::env::temp_dir().join(format!("notes-upload-{}", Uuid::new_v4()));

    let result = async {
        let mut temp_file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create temp file: {e}")))?;

        let mut total_size: u64 = 0;

        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, max_size))?
        {
            total_size += chunk.len() as u64;
            if total_size > max_size {
                return Err(AppError::FileTooLarge { limit: max_size });
            }
            temp_file
                .write_all(&chunk)
                .await
                .map_err(|e| AppError::Internal(format!("Temp file write failed: {e}")))?;
        }

        temp_file
            .flush()
            .await
            .map_err(|e| AppError::Internal(format!("Temp file flush failed: {e}")))?;
        drop(temp_file);

        let file = tokio::fs::File::open(&temp_path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to reopen temp file: {e}")))?;
        let reader: BoxReader = Box::new(file);
        Ok(blob_store.put_stream(name, reader).await?)
    }
    .await;

    // Best effort.
    let _ = tokio::fs::remove_file(&temp_path).await;

    result
}

/// Compensating delete for a blob whose record never made it.
async fn discard_blob(blob_store: &dyn BlobStore, name: &BlobName) {
    match blob_store.delete(name).await {
        Ok(_) => info!(filename = %name, "Removed file of failed upload"),
        Err(e) => warn!(filename = %name, "Failed to remove file of failed upload: {e}"),
    }
}

fn parse_note_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::Validation("Invalid note ID".into()))
}

/// Build a safe `Content-Disposition` header value.
fn content_disposition_value(filename: &str) -> String {
    let ascii_safe: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii_name = if ascii_safe.is_empty() {
        "download".to_string()
    } else {
        ascii_safe
    };

    format!("attachment; filename=\"{ascii_name}\"")
}

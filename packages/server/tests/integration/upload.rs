use reqwest::multipart::{Form, Part};

use crate::common::{NoteForm, PDF_BYTES, TestApp, routes};

mod note_upload {
    use super::*;

    #[tokio::test]
    async fn admin_can_upload_pdf() {
        let app = TestApp::spawn().await;

        let res = app
            .upload(
                &app.admin_token,
                NoteForm {
                    title: "  Graph Algorithms  ",
                    ..Default::default()
                },
                "graphs.pdf",
                "application/pdf",
                PDF_BYTES.to_vec(),
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["success"], true);
        let note = &res.body["note"];
        assert_eq!(note["title"], "Graph Algorithms");
        assert_eq!(note["subject"], "CS101");
        assert_eq!(note["semester"], 3);
        assert_eq!(note["unit"], "Unit 4");
        assert_eq!(note["downloads"], 0);
        assert_eq!(note["uploadedBy"], app.admin_id);
        assert_eq!(note["fileSize"].as_u64().unwrap(), PDF_BYTES.len() as u64);
        assert!(note["createdAt"].as_str().is_some());

        let filename = note["filename"].as_str().unwrap();
        assert!(filename.ends_with(".pdf"));
        assert_ne!(filename, "graphs.pdf");
        assert!(note["filePath"].as_str().unwrap().ends_with(filename));
        assert!(app.blob_exists(filename));
        assert_eq!(
            std::fs::read(app.upload_dir.join(filename)).unwrap(),
            PDF_BYTES
        );
    }

    #[tokio::test]
    async fn filename_keeps_original_extension() {
        let app = TestApp::spawn().await;

        let res = app
            .upload(
                &app.admin_token,
                NoteForm::default(),
                "Scanned.PDF",
                "application/pdf",
                PDF_BYTES.to_vec(),
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        let filename = res.body["note"]["filename"].as_str().unwrap();
        assert!(filename.ends_with(".PDF"));
        assert!(app.blob_exists(filename));
    }

    #[tokio::test]
    async fn repeated_uploads_get_distinct_filenames() {
        let app = TestApp::spawn().await;

        let a = app.create_note(NoteForm::default()).await;
        let b = app.create_note(NoteForm::default()).await;
        assert_ne!(a, b);

        let first = app.get_with_token(&routes::note(&a), &app.user_token).await;
        let second = app.get_with_token(&routes::note(&b), &app.user_token).await;
        assert_ne!(
            first.body["note"]["filename"],
            second.body["note"]["filename"]
        );
        assert_eq!(app.blob_count(), 2);
    }

    #[tokio::test]
    async fn blank_optional_fields_are_absent() {
        let app = TestApp::spawn().await;

        let res = app
            .upload(
                &app.admin_token,
                NoteForm {
                    unit: Some("   "),
                    description: None,
                    ..Default::default()
                },
                "notes.pdf",
                "application/pdf",
                PDF_BYTES.to_vec(),
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert!(res.body["note"]["unit"].is_null());
        assert!(res.body["note"]["description"].is_null());
    }
}

mod upload_rejections {
    use super::*;

    #[tokio::test]
    async fn non_pdf_is_rejected_without_leaving_a_file() {
        let app = TestApp::spawn().await;

        let res = app
            .upload(
                &app.admin_token,
                NoteForm::default(),
                "diagram.png",
                "image/png",
                b"\x89PNG fake".to_vec(),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "VALIDATION_ERROR");
        assert_eq!(res.body["success"], false);
        assert_eq!(app.blob_count(), 0);
    }

    #[tokio::test]
    async fn pdf_extension_with_wrong_media_type_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .upload(
                &app.admin_token,
                NoteForm::default(),
                "sneaky.pdf",
                "text/plain",
                PDF_BYTES.to_vec(),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(app.blob_count(), 0);
    }

    #[tokio::test]
    async fn oversized_file_is_rejected_without_leaving_a_file() {
        let app = TestApp::spawn_with_limit(1024).await;

        let res = app
            .upload(
                &app.admin_token,
                NoteForm::default(),
                "huge.pdf",
                "application/pdf",
                vec![b'x'; 1025],
            )
            .await;

        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.code(), "FILE_TOO_LARGE");
        assert_eq!(app.blob_count(), 0);

        let list = app.get_with_token(routes::NOTES, &app.user_token).await;
        assert_eq!(list.body["count"], 0);
    }

    #[tokio::test]
    async fn file_exactly_at_the_cap_is_accepted() {
        let app = TestApp::spawn_with_limit(1024).await;

        let res = app
            .upload(
                &app.admin_token,
                NoteForm::default(),
                "exact.pdf",
                "application/pdf",
                vec![b'x'; 1024],
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["note"]["fileSize"], 1024);
    }

    #[tokio::test]
    async fn missing_file_is_a_bad_request() {
        let app = TestApp::spawn().await;

        let form = Form::new()
            .text("title", "No file")
            .text("subject", "CS101")
            .text("semester", "1");
        let res = app.send_multipart(&app.admin_token, form).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "VALIDATION_ERROR");
        assert_eq!(app.blob_count(), 0);
    }

    #[tokio::test]
    async fn second_file_field_is_rejected_and_first_file_removed() {
        let app = TestApp::spawn().await;

        let first = Part::bytes(PDF_BYTES.to_vec())
            .file_name("a.pdf")
            .mime_str("application/pdf")
            .unwrap();
        let second = Part::bytes(PDF_BYTES.to_vec())
            .file_name("b.pdf")
            .mime_str("application/pdf")
            .unwrap();
        let form = Form::new()
            .text("title", "Two files")
            .text("subject", "CS101")
            .text("semester", "1")
            .part("file", first)
            .part("file", second);

        let res = app.send_multipart(&app.admin_token, form).await;

        assert_eq!(res.status, 400);
        assert_eq!(app.blob_count(), 0);
    }

    #[tokio::test]
    async fn plain_user_cannot_upload() {
        let app = TestApp::spawn().await;

        let res = app
            .upload(
                &app.user_token,
                NoteForm::default(),
                "notes.pdf",
                "application/pdf",
                PDF_BYTES.to_vec(),
            )
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.code(), "PERMISSION_DENIED");
        assert_eq!(app.blob_count(), 0);
    }
}

mod upload_compensation {
    use super::*;

    #[tokio::test]
    async fn missing_title_removes_written_file() {
        let app = TestApp::spawn().await;

        // File first, so it is stored before the metadata is seen.
        let part = Part::bytes(PDF_BYTES.to_vec())
            .file_name("untitled.pdf")
            .mime_str("application/pdf")
            .unwrap();
        let form = Form::new()
            .part("file", part)
            .text("subject", "CS101")
            .text("semester", "2");

        let res = app.send_multipart(&app.admin_token, form).await;

        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.code(), "VALIDATION_ERROR");
        assert_eq!(app.blob_count(), 0);
    }

    #[tokio::test]
    async fn out_of_range_semester_removes_written_file() {
        let app = TestApp::spawn().await;

        let res = app
            .upload(
                &app.admin_token,
                NoteForm {
                    semester: "9",
                    ..Default::default()
                },
                "notes.pdf",
                "application/pdf",
                PDF_BYTES.to_vec(),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(app.blob_count(), 0);
    }

    #[tokio::test]
    async fn non_numeric_semester_removes_written_file() {
        let app = TestApp::spawn().await;

        let res = app
            .upload(
                &app.admin_token,
                NoteForm {
                    semester: "first",
                    ..Default::default()
                },
                "notes.pdf",
                "application/pdf",
                PDF_BYTES.to_vec(),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(app.blob_count(), 0);
    }

    #[tokio::test]
    async fn store_failure_removes_written_file() {
        let app = TestApp::spawn().await;

        // An admin token for a user the database has never seen: the insert
        // trips the uploader foreign key after the file is already stored.
        let ghost = notes_server::utils::jwt::sign(
            crate::common::JWT_SECRET,
            9999,
            "ghost@example.com",
            "admin",
        )
        .unwrap();

        let res = app
            .upload(
                &ghost,
                NoteForm::default(),
                "notes.pdf",
                "application/pdf",
                PDF_BYTES.to_vec(),
            )
            .await;

        assert_eq!(res.status, 500, "{}", res.text);
        assert_eq!(res.code(), "INTERNAL_ERROR");
        assert_eq!(app.blob_count(), 0);
    }
}

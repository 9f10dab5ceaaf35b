//! End-to-end tests for EML and MBOX extraction and the task runner.

use std::path::{Path, PathBuf};

use mailsift::config::Config;
use mailsift::error::MailError;
use mailsift::export::output::DirectoryOutput;
use mailsift::model::record::CSV_HEADERS;
use mailsift::parser::eml::parse_eml;
use mailsift::parser::mbox::{parse_mbox, MboxParser};
use mailsift::task::{self, InputFile};

const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ─── EML ────────────────────────────────────────────────────────────

#[test]
fn test_simple_eml_metadata() {
    let tmp = tempfile::tempdir().unwrap();
    let out = DirectoryOutput::new(tmp.path()).unwrap();

    let (files, record) = parse_eml(fixture("simple_message.eml"), &out).unwrap();

    assert!(files.is_empty());
    assert_eq!(record.subject.as_deref(), Some("Test Email for EML Parsing"));
    assert_eq!(record.message_id, "<test-message-1234@example.com>");
    assert_eq!(record.timestamp.as_deref(), Some("2025-06-17T12:30:00+00:00"));
    assert!(record.attachments.is_empty());
    assert_eq!(record.body, "This is a test email.\n");
    assert!(file_names(tmp.path()).is_empty());
}

#[test]
fn test_eml_with_attachment() {
    let tmp = tempfile::tempdir().unwrap();
    let out = DirectoryOutput::new(tmp.path()).unwrap();

    let (files, record) = parse_eml(fixture("attachment_message.eml"), &out).unwrap();

    assert_eq!(
        record.attachments,
        vec!["Company Policy Guidelines.txt".to_string()]
    );
    assert_eq!(record.content_type, "multipart/mixed");
    assert!(record.body.contains("Please find the updated policy attached."));

    assert_eq!(files.len(), 1);
    assert_eq!(files[0].extension, "txt");
    assert_eq!(
        files[0].display_name,
        "Company Policy Guidelines._test-message-1234@example.com_"
    );
    assert_eq!(std::fs::read_to_string(&files[0].path).unwrap(), "Policy v2\n");
}

#[test]
fn test_eml_with_inline_image() {
    let tmp = tempfile::tempdir().unwrap();
    let out = DirectoryOutput::new(tmp.path()).unwrap();

    let (files, record) = parse_eml(fixture("inline_content_message.eml"), &out).unwrap();

    assert_eq!(record.attachments, vec!["myimage.png".to_string()]);
    assert_eq!(record.body, "See the image below.\n");
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].extension, "png");
    assert_eq!(
        std::fs::read(&files[0].path).unwrap(),
        vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]
    );
}

// ─── MBOX ───────────────────────────────────────────────────────────

#[test]
fn test_mbox_message_count() {
    let parser = MboxParser::new(fixture("simple_message.mbox")).unwrap();
    let mut count: u64 = 0;
    let total = parser
        .parse(&mut |_offset, _bytes| {
            count += 1;
            true
        })
        .unwrap();
    assert_eq!(count, 2);
    assert_eq!(total, 2);
}

#[test]
fn test_simple_mbox_rows() {
    let tmp = tempfile::tempdir().unwrap();
    let out = DirectoryOutput::new(tmp.path()).unwrap();

    let (files, records) = parse_mbox(fixture("simple_message.mbox"), &out, MAX_MESSAGE_SIZE);

    assert!(files.is_empty());
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].subject.as_deref(), Some("Plain Text Email 1"));
    assert_eq!(records[1].subject.as_deref(), Some("Plain Text Email 2"));
    assert!(records[0].body.contains("plain text email number 1"));
    assert!(records[1].body.contains(">From the archives"));
    assert_eq!(records[1].timestamp.as_deref(), Some("2024-01-01T00:00:02+00:00"));
}

#[test]
fn test_mbox_attachments_accumulate_across_messages() {
    let tmp = tempfile::tempdir().unwrap();
    let out = DirectoryOutput::new(tmp.path()).unwrap();

    let (files, records) =
        parse_mbox(fixture("attachment_message.mbox"), &out, MAX_MESSAGE_SIZE);

    assert_eq!(records.len(), 3);
    assert_eq!(files.len(), 3);
    for (i, record) in records.iter().enumerate() {
        let expected = format!("attachment{}.txt", i + 1);
        assert_eq!(record.attachments, vec![expected]);
    }
    for (i, file) in files.iter().enumerate() {
        assert_eq!(
            std::fs::read_to_string(&file.path).unwrap(),
            format!("Attachment number {}\n", i + 1)
        );
    }
    assert_eq!(
        file_names(tmp.path()),
        vec![
            "attachment1._msg3@example.com_.txt",
            "attachment2._msg4@example.com_.txt",
            "attachment3._msg5@example.com_.txt",
        ]
    );
}

#[test]
fn test_mbox_inline_image() {
    let tmp = tempfile::tempdir().unwrap();
    let out = DirectoryOutput::new(tmp.path()).unwrap();

    let (files, records) =
        parse_mbox(fixture("inline_content_message.mbox"), &out, MAX_MESSAGE_SIZE);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attachments, vec!["my_inline_image.png".to_string()]);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].display_name, "my_inline_image._msg10@example.com_");
}

#[test]
fn test_empty_mbox_yields_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let out = DirectoryOutput::new(tmp.path()).unwrap();

    let (files, records) = parse_mbox(fixture("empty.mbox"), &out, MAX_MESSAGE_SIZE);
    assert!(files.is_empty());
    assert!(records.is_empty());
}

#[test]
fn test_invalid_mbox_yields_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let out = DirectoryOutput::new(tmp.path()).unwrap();

    let (files, records) = parse_mbox(fixture("not_a_mailbox.mbox"), &out, MAX_MESSAGE_SIZE);
    assert!(files.is_empty());
    assert!(records.is_empty());
}

#[test]
fn test_missing_mbox_yields_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let out = DirectoryOutput::new(tmp.path()).unwrap();

    let (files, records) = parse_mbox(tmp.path().join("missing.mbox"), &out, MAX_MESSAGE_SIZE);
    assert!(files.is_empty());
    assert!(records.is_empty());
}

#[test]
fn test_mbox_extraction_is_repeatable() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();

    let run = |dir: &Path| {
        let out = DirectoryOutput::new(dir).unwrap();
        let (files, records) =
            parse_mbox(fixture("attachment_message.mbox"), &out, MAX_MESSAGE_SIZE);
        let contents: Vec<Vec<u8>> = files.iter().map(|f| std::fs::read(&f.path).unwrap()).collect();
        (records, contents)
    };

    let (records_a, contents_a) = run(first.path());
    let (records_b, contents_b) = run(second.path());
    assert_eq!(records_a, records_b);
    assert_eq!(contents_a, contents_b);
    assert_eq!(file_names(first.path()), file_names(second.path()));
}

#[test]
fn test_eml_extraction_is_repeatable() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();

    let run = |dir: &Path| {
        let out = DirectoryOutput::new(dir).unwrap();
        let (files, record) = parse_eml(fixture("attachment_message.eml"), &out).unwrap();
        let contents: Vec<Vec<u8>> = files.iter().map(|f| std::fs::read(&f.path).unwrap()).collect();
        let names: Vec<String> = files.iter().map(|f| f.display_name.clone()).collect();
        (record, names, contents)
    };

    let (record_a, names_a, contents_a) = run(first.path());
    let (record_b, names_b, contents_b) = run(second.path());
    assert_eq!(record_a, record_b);
    assert_eq!(names_a, names_b);
    assert_eq!(contents_a, contents_b);
    assert_eq!(file_names(first.path()), file_names(second.path()));
}

// ─── Task ───────────────────────────────────────────────────────────

#[test]
fn test_task_writes_csv_per_input() {
    let tmp = tempfile::tempdir().unwrap();
    let out = DirectoryOutput::new(tmp.path()).unwrap();
    let inputs = vec![
        InputFile::from_path(fixture("simple_message.eml")),
        InputFile::from_path(fixture("attachment_message.mbox")),
    ];

    let result = task::run(&inputs, &out, &Config::default()).unwrap();

    assert_eq!(result.meta.inputs_processed, 2);
    assert_eq!(result.meta.messages, 4);
    assert_eq!(result.meta.attachments, 3);
    assert_eq!(result.output_files.len(), 5);
    assert_eq!(result.output_files[0].extension, "csv");
    assert_eq!(result.output_files[0].display_name, "simple_message.eml");
    assert_eq!(result.output_files[1].extension, "csv");
    assert_eq!(result.output_files[1].display_name, "attachment_message.mbox");

    let mut reader = csv::Reader::from_path(&result.output_files[1].path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    assert_eq!(headers, CSV_HEADERS.to_vec());
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    let attachments_col = CSV_HEADERS.iter().position(|h| *h == "Attachments").unwrap();
    assert_eq!(&rows[0][attachments_col], r#"["attachment1.txt"]"#);
}

#[test]
fn test_task_empty_mbox_still_writes_csv() {
    let tmp = tempfile::tempdir().unwrap();
    let out = DirectoryOutput::new(tmp.path()).unwrap();
    let inputs = vec![InputFile::from_path(fixture("empty.mbox"))];

    let result = task::run(&inputs, &out, &Config::default()).unwrap();
    assert_eq!(result.output_files.len(), 1);

    let mut reader = csv::Reader::from_path(&result.output_files[0].path).unwrap();
    assert_eq!(reader.headers().unwrap().len(), CSV_HEADERS.len());
    assert_eq!(reader.records().count(), 0);
}

#[test]
fn test_task_without_supported_inputs_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let out = DirectoryOutput::new(tmp.path()).unwrap();
    let inputs = vec![InputFile::from_path(fixture("notes.pst"))];

    let err = task::run(&inputs, &out, &Config::default()).unwrap_err();
    assert!(matches!(err, MailError::NoOutput { .. }));
    assert!(err.to_string().contains("Supported extensions: eml, mbox"));
}

//! Integration tests for email body synthesis.

use std::io::{Cursor, Write};
use std::sync::Arc;

use integrations_framework::{
    ContentDisposition, Email, ErrorKind, MimeConfig, Part, Priority, TextPart,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

/// Helper to create an email with sender and recipient set.
fn addressed_email() -> Email {
    let mut email = Email::new();
    email
        .add_from(["fabien@symfony.com"])
        .unwrap()
        .add_to(["thomas@symfony.com"])
        .unwrap();
    email
}

#[test]
fn test_text_only_body_is_single_text_part() {
    let mut email = addressed_email();
    email.set_text("text content");

    let body = email.body().unwrap();

    assert_eq!(body.as_ref(), &Part::Text(TextPart::new("text content")));
    let Part::Text(text) = body.as_ref() else { panic!("expected text part") };
    assert_eq!(text.charset, "utf-8");
}

#[test]
fn test_text_and_html_become_alternative_in_order() {
    let mut email = addressed_email();
    email.set_html("html content").set_text("text content");

    let body = email.body().unwrap();

    let Part::Alternative(alternative) = body.as_ref() else { panic!("expected alternative part") };
    assert_eq!(
        alternative.parts(),
        &[
            Part::Text(TextPart::new("text content")),
            Part::Text(TextPart::html("html content")),
        ]
    );
}

#[test]
fn test_missing_body_is_logic_error() {
    let mut email = addressed_email();
    email.attach(b"data".to_vec(), Some("data.bin"), None).unwrap();

    let err = email.body().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Logic);
    assert_eq!(err.message(), "A message must have a text or an HTML part.");
}

#[test]
fn test_embedding_same_resource_twice_is_idempotent() {
    let mut email = addressed_email();
    email.set_html("<img src=\"cid:logo.png\">");

    email.embed(b"png".to_vec(), Some("logo.png"), Some("image/png")).unwrap();
    email.embed(b"png".to_vec(), Some("logo.png"), Some("image/png")).unwrap();

    assert_eq!(email.attachments().len(), 1);
    let Part::Related(related) = email.body().unwrap().as_ref().clone() else {
        panic!("expected related part")
    };
    assert_eq!(related.related().len(), 1);
}

#[test]
fn test_body_identity_is_memoized_until_mutation() {
    let mut email = addressed_email();
    email.set_text("text content");

    let first = email.body().unwrap();
    let second = email.body().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    email.set_html("html content");
    let third = email.body().unwrap();
    assert!(!Arc::ptr_eq(&second, &third));
    assert!(matches!(third.as_ref(), Part::Alternative(_)));

    email.attach(b"x".to_vec(), Some("x.txt"), Some("text/plain")).unwrap();
    let fourth = email.body().unwrap();
    assert!(!Arc::ptr_eq(&third, &fourth));
}

#[test]
fn test_non_body_mutations_keep_identity() {
    let mut email = addressed_email();
    email.set_text("text content");
    let before = email.body().unwrap();

    email.set_subject("Subject").set_priority(2);
    email.add_cc(["cc@symfony.com"]).unwrap();

    assert!(Arc::ptr_eq(&before, &email.body().unwrap()));
}

#[rstest]
#[case(Some(10), Priority::Lowest, 5)]
#[case(Some(-10), Priority::Highest, 1)]
#[case(Some(1), Priority::Highest, 1)]
#[case(Some(4), Priority::Low, 4)]
#[case(None, Priority::Normal, 3)]
fn test_priority_is_clamped(#[case] input: Option<i64>, #[case] expected: Priority, #[case] level: u8) {
    let mut email = Email::new();
    if let Some(input) = input {
        email.set_priority(input);
    }

    assert_eq!(email.priority(), expected);
    assert_eq!(email.priority().level(), level);
}

#[test]
fn test_serialization_round_trip() {
    let mut email = addressed_email();
    email
        .set_subject("Round trip")
        .set_text("text content")
        .set_html("<img src=\"cid:test.gif\">")
        .set_priority(2);
    email.add_reply_to(["reply@symfony.com"]).unwrap();
    email.add_text_header("X-Campaign", "spring").unwrap();
    email.embed(b"GIF89a".to_vec(), Some("test.gif"), Some("image/gif")).unwrap();
    email.attach(b"%PDF".to_vec(), Some("doc.pdf"), Some("application/pdf")).unwrap();

    let json = serde_json::to_string(&email).unwrap();
    let restored: Email = serde_json::from_str(&json).unwrap();

    assert!(json.contains("\"R0lGODlh\""));
    assert_eq!(restored.subject(), email.subject());
    assert_eq!(restored.from(), email.from());
    assert_eq!(restored.to(), email.to());
    assert_eq!(restored.reply_to(), email.reply_to());
    assert_eq!(restored.headers(), email.headers());
    assert_eq!(restored.priority(), Priority::High);
    assert_eq!(restored.attachments(), email.attachments());
    assert_eq!(restored.body().unwrap(), email.body().unwrap());
}

#[test]
fn test_explicit_body_survives_round_trip() {
    let mut email = addressed_email();
    email.set_body(Part::Text(TextPart::new("explicit")));

    let json = serde_json::to_string(&email).unwrap();
    let restored: Email = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.body().unwrap().as_ref(), &Part::Text(TextPart::new("explicit")));
}

#[test]
fn test_cid_reference_produces_related_part() {
    let mut email = addressed_email();
    email
        .set_text("text content")
        .set_html("<div background=\"cid:test.gif\"></div>");
    email.embed(b"GIF89a".to_vec(), Some("test.gif"), Some("image/gif")).unwrap();

    let body = email.body().unwrap();

    let Part::Related(related) = body.as_ref() else { panic!("expected related part") };
    let Part::Alternative(alternative) = related.main() else { panic!("expected alternative part") };
    let Part::Data(image) = &related.related()[0] else { panic!("expected data part") };

    let content_id = image.content_id.clone().unwrap();
    assert!(content_id.ends_with("@symfony"));
    assert_eq!(image.name.as_deref(), Some(content_id.as_str()));
    assert_eq!(image.disposition, ContentDisposition::Inline);
    assert_eq!(
        alternative.parts()[1],
        Part::Text(TextPart::html(format!("<div background=\"cid:{}\"></div>", content_id)))
    );
    assert_eq!(email.html(), Some("<div background=\"cid:test.gif\"></div>"));
}

#[test]
fn test_content_id_domain_comes_from_config() {
    let config = MimeConfig::builder().content_id_domain("example.com").build().unwrap();
    let mut email = Email::with_config(config);
    email.set_html("<img src=\"cid:a.png\">");
    email.embed(b"png".to_vec(), Some("a.png"), Some("image/png")).unwrap();

    let body = email.body().unwrap();

    let Part::Related(related) = body.as_ref() else { panic!("expected related part") };
    let Part::Data(image) = &related.related()[0] else { panic!("expected data part") };
    assert!(image.content_id.as_deref().unwrap().ends_with("@example.com"));
}

#[test]
fn test_unreferenced_embed_uses_configured_content_id_domain() {
    let config = MimeConfig::builder().content_id_domain("example.com").build().unwrap();
    let mut email = Email::with_config(config);
    email
        .add_from(["fabien@symfony.com"])
        .unwrap()
        .add_to(["thomas@symfony.com"])
        .unwrap();
    email.set_html("<p>no images</p>");
    email.embed(b"png".to_vec(), Some("logo.png"), Some("image/png")).unwrap();

    let message = String::from_utf8(email.to_message_bytes().unwrap()).unwrap();

    let content_id = message
        .lines()
        .find_map(|line| line.strip_prefix("Content-ID: "))
        .unwrap();
    assert!(content_id.ends_with("@example.com>"), "got {}", content_id);
}

#[test]
fn test_text_file_and_image_become_mixed_in_attach_order() {
    // Arrange
    let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    writeln!(file, "some file content").unwrap();

    let mut email = addressed_email();
    email.set_text("text content");
    email.attach_from_path(file.path(), Some("notes.txt"), None).unwrap();
    email
        .attach_from_reader(&mut Cursor::new(b"GIF89a".to_vec()), Some("image.gif"), Some("image/gif"))
        .unwrap();

    // Act
    let body = email.body().unwrap();

    // Assert
    let Part::Mixed(mixed) = body.as_ref() else { panic!("expected mixed part") };
    let media_types: Vec<_> = mixed.parts().iter().map(Part::media_type).collect();
    assert_eq!(media_types, vec!["text/plain", "text/plain", "image/gif"]);

    let Part::Data(notes) = &mixed.parts()[1] else { panic!("expected data part") };
    assert_eq!(notes.name.as_deref(), Some("notes.txt"));
    assert_eq!(notes.bytes().unwrap().as_ref(), b"some file content\n");
    assert_eq!(notes.disposition, ContentDisposition::Attachment);
}

#[test]
fn test_unreferenced_embed_goes_to_mixed() {
    let mut email = addressed_email();
    email.set_html("<p>no images</p>");
    email.embed(b"png".to_vec(), Some("unused.png"), Some("image/png")).unwrap();

    let body = email.body().unwrap();

    let Part::Mixed(mixed) = body.as_ref() else { panic!("expected mixed part") };
    assert_eq!(mixed.parts().len(), 2);
}

#[test]
fn test_rendered_message_headers() {
    let mut email = addressed_email();
    email
        .set_subject("Hello")
        .set_message_id("abc@example.com")
        .set_text("text content")
        .set_priority(1);
    email.add_bcc(["hidden@symfony.com"]).unwrap();

    let message = String::from_utf8(email.to_message_bytes().unwrap()).unwrap();

    assert!(message.contains("From: fabien@symfony.com\r\n"));
    assert!(message.contains("To: thomas@symfony.com\r\n"));
    assert!(message.contains("Subject: Hello\r\n"));
    assert!(message.contains("Message-ID: <abc@example.com>\r\n"));
    assert!(message.contains("X-Priority: 1 (Highest)\r\n"));
    assert!(message.contains("MIME-Version: 1.0\r\n"));
    assert!(message.contains("Content-Type: text/plain; charset=utf-8\r\n"));
    assert!(!message.contains("hidden@symfony.com"));
}

#[test]
fn test_long_non_ascii_subject_is_folded() {
    let mut email = addressed_email();
    email.set_subject("é".repeat(60)).set_text("text content");

    let message = String::from_utf8(email.to_message_bytes().unwrap()).unwrap();
    let (headers, _) = message.split_once("\r\n\r\n").unwrap();

    assert!(headers.split("\r\n").all(|line| line.len() <= 78));
    let subject: Vec<&str> = headers
        .split("\r\n")
        .skip_while(|line| !line.starts_with("Subject:"))
        .take_while(|line| line.starts_with("Subject:") || line.starts_with(' '))
        .collect();
    assert!(subject.len() > 1);
}

#[test]
fn test_rendering_requires_recipient() {
    let mut email = Email::new();
    email.add_from(["fabien@symfony.com"]).unwrap();
    email.set_text("text content");

    let err = email.to_message_bytes().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Logic);
}

use anyhow::Result;
use loqa_recorder::capture::Artifact;
use loqa_recorder::error::SessionError;
use loqa_recorder::sink::{ArtifactSink, WebhookSink};

fn url_for(sink: &WebhookSink, recording_type: &str) -> Result<Option<String>> {
    Ok(sink.delivery_url(recording_type)?.map(String::from))
}

#[test]
fn test_delivery_url_appends_route() -> Result<()> {
    let sink = WebhookSink::new(Some("https://hooks.example.com/rec".to_string()), "recording");
    assert_eq!(
        url_for(&sink, "meeting")?.as_deref(),
        Some("https://hooks.example.com/rec?route=meeting")
    );

    let sink = WebhookSink::new(
        Some("https://hooks.example.com/rec?token=abc".to_string()),
        "recording",
    );
    assert_eq!(
        url_for(&sink, "dictation")?.as_deref(),
        Some("https://hooks.example.com/rec?token=abc&route=dictation")
    );

    Ok(())
}

#[test]
fn test_delivery_url_encodes_recording_type() -> Result<()> {
    let sink = WebhookSink::new(Some("https://hooks.example.com/rec".to_string()), "recording");
    assert_eq!(
        url_for(&sink, "a&b #c")?.as_deref(),
        Some("https://hooks.example.com/rec?route=a%26b+%23c")
    );

    Ok(())
}

#[tokio::test]
async fn test_invalid_endpoint_fails_delivery() {
    let sink = WebhookSink::new(Some("not a url".to_string()), "recording");
    assert!(matches!(
        sink.delivery_url("meeting"),
        Err(SessionError::Delivery(_))
    ));

    let artifact = Artifact::new(vec![0; 512], "audio/wav");
    assert!(matches!(
        sink.deliver(artifact, "meeting").await,
        Err(SessionError::Delivery(_))
    ));
}

#[test]
fn test_blank_endpoint_is_treated_as_unset() {
    let sink = WebhookSink::new(Some("   ".to_string()), "recording");
    assert!(sink.endpoint().is_none());
    assert!(matches!(sink.delivery_url("meeting"), Ok(None)));
}

#[tokio::test]
async fn test_delivery_without_endpoint_is_skipped() -> Result<()> {
    let sink = WebhookSink::new(None, "recording");
    let artifact = Artifact::new(vec![0; 512], "audio/wav");

    sink.deliver(artifact, "meeting").await?;

    Ok(())
}

#[test]
fn test_artifact_extension_from_mime() {
    assert_eq!(Artifact::new(vec![], "audio/webm;codecs=opus").extension(), "webm");
    assert_eq!(Artifact::new(vec![], "audio/ogg").extension(), "ogg");
    assert_eq!(Artifact::new(vec![], "audio/wav").extension(), "wav");
    assert_eq!(Artifact::new(vec![], "application/octet-stream").extension(), "bin");
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use outpost_provider::{FakeCall, FakeProvider};

#[test]
fn registry_covers_the_closed_set() {
    for name in ["braket", "sagemaker", "console", "cloudshell"] {
        assert!(descriptor(name).is_some(), "{name} must be registered");
    }
    assert!(descriptor("quicksight").is_none());
}

#[test]
fn embedding_modes() {
    assert_eq!(descriptor("braket").unwrap().embedding, EmbedMode::Iframe);
    assert_eq!(descriptor("sagemaker").unwrap().embedding, EmbedMode::Iframe);
    assert_eq!(descriptor("console").unwrap().embedding, EmbedMode::NewTab);
    assert_eq!(descriptor("cloudshell").unwrap().embedding, EmbedMode::NewTab);
}

#[tokio::test]
async fn open_mints_a_federation_url() {
    let provider = Arc::new(FakeProvider::new());
    let session = open(provider.clone(), "braket", "us-west-2", DEFAULT_TOKEN_SECS)
        .await
        .unwrap();

    assert!(session.url.starts_with("https://signin.aws.amazon.com/federation?Action=login"));
    assert!(session.url.contains("us-west-2.console.aws.amazon.com%2Fbraket"));
    assert!(session.url.contains("SigninToken="));
    assert_eq!(session.embedding, EmbedMode::Iframe);

    let calls = provider.calls();
    assert!(matches!(
        &calls[0],
        FakeCall::IssueFederationToken { service, region }
            if service == "braket" && region == "us-west-2"
    ));
}

#[tokio::test]
async fn unknown_service_is_rejected_without_provider_call() {
    let provider = Arc::new(FakeProvider::new());
    let result = open(provider.clone(), "quicksight", "us-east-1", 60).await;
    assert!(matches!(result, Err(CloudSessionError::UnknownService(_))));
    assert!(provider.calls().is_empty());
}

#[test]
fn urlencoding_escapes_reserved_characters() {
    assert_eq!(urlencode("a b/c?d=e"), "a%20b%2Fc%3Fd%3De");
    assert_eq!(urlencode("plain-text_1.2~3"), "plain-text_1.2~3");
}

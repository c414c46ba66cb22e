//! Mock Provider tests.
//!
//! Verifies the `Provider` trait can be mocked with mockall, which is how
//! the agent crate scripts gateway behavior in its loop tests.

use async_trait::async_trait;
use mockall::mock;
use scout_provider::{
    ChatParams, ChatResponse, Message, Provider, ProviderError, ToolCall, Usage,
};
use serde_json::json;

mock! {
    pub Provider {}

    #[async_trait]
    impl Provider for Provider {
        async fn chat(&self, params: ChatParams) -> Result<ChatResponse, ProviderError>;
        fn default_model(&self) -> String;
        fn is_configured(&self) -> bool;
    }
}

#[tokio::test]
async fn test_mock_provider_chat_returns_success() {
    let mut mock = MockProvider::new();

    mock.expect_chat()
        .times(1)
        .returning(|_| Ok(ChatResponse::text("Hello from mock!")));

    let response = mock.chat(ChatParams::default()).await.unwrap();

    assert_eq!(response.content, Some("Hello from mock!".to_string()));
    assert!(!response.has_tool_calls());
}

#[tokio::test]
async fn test_mock_provider_chat_returns_error() {
    let mut mock = MockProvider::new();

    mock.expect_chat()
        .times(1)
        .returning(|_| Err(ProviderError::Api("mock API error".to_string())));

    let result = mock.chat(ChatParams::default()).await;

    match result {
        Err(ProviderError::Api(msg)) => assert_eq!(msg, "mock API error"),
        other => panic!("Expected Api error, got {:?}", other.map(|r| r.content)),
    }
}

#[tokio::test]
async fn test_mock_provider_chat_with_tool_calls() {
    let mut mock = MockProvider::new();

    mock.expect_chat()
        .times(1)
        .withf(|params| params.messages.len() == 1 && params.messages[0].role == "user")
        .returning(|_| {
            Ok(ChatResponse {
                content: None,
                tool_calls: vec![ToolCall {
                    id: "mock_call_1".to_string(),
                    name: "read_file".to_string(),
                    arguments: json!({"file_path": "notes.txt"}),
                }],
                finish_reason: "tool_calls".to_string(),
                usage: Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                },
            })
        });

    let params = ChatParams {
        model: "test-model".to_string(),
        messages: vec![Message::user("Read my notes")],
        ..Default::default()
    };

    let response = mock.chat(params).await.unwrap();

    assert!(response.has_tool_calls());
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].name, "read_file");
    assert_eq!(response.usage.total_tokens, 15);
}

#[test]
fn test_mock_provider_default_model() {
    let mut mock = MockProvider::new();

    mock.expect_default_model()
        .times(1)
        .returning(|| "mock-model-v1".to_string());

    assert_eq!(mock.default_model(), "mock-model-v1");
}

#[test]
fn test_mock_provider_is_configured() {
    let mut mock = MockProvider::new();

    mock.expect_is_configured().times(1).returning(|| true);

    assert!(mock.is_configured());
}

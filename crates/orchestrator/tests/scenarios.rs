//! End-to-end turns through the full stack, with the completion service and
//! the search provider mocked at the HTTP level.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use conversation::ConversationMemory;
use credits::{CreditLedger, CreditStore, LedgerConfig, MemoryStore, REASON_CHAT_SPEND};
use model_gateway::{CompletionClient, GatewayConfig, HttpTransport, ModelGateway};
use orchestrator::Orchestrator;
use pricing::PricingConfig;
use search_client::{SearchConfig, SearchHandler, SearchProvider};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Stack {
    orchestrator: Orchestrator,
    store: Arc<MemoryStore>,
}

async fn build_stack(api: &MockServer, search: &MockServer) -> Stack {
    let store = Arc::new(MemoryStore::new());
    let ledger = CreditLedger::new(store.clone(), LedgerConfig::default());

    let gateway_config = GatewayConfig::builder()
        .api_key("test-key")
        .api_url(api.uri())
        .system_prompt("Eres un asistente de extranjería.")
        .build();
    let transport = Arc::new(HttpTransport::new("test-key").unwrap());
    let client = CompletionClient::new(transport, gateway_config);

    let search_config = SearchConfig::builder()
        .api_key("search-key")
        .api_url(search.uri())
        .build();
    let search_handler = Arc::new(SearchHandler::new(
        SearchProvider::new(search_config).unwrap(),
    ));

    let orchestrator = Orchestrator::new(
        ModelGateway::new(client, search_handler),
        ledger,
        ConversationMemory::default(),
    )
    .with_pricing(PricingConfig {
        margin_multiplier: 1.15,
        usd_eur_rate: 1.0,
    });

    Stack {
        orchestrator,
        store,
    }
}

/// Seed the user and clear the first-contact flag so answers are not
/// decorated with the welcome template.
async fn seed_user(stack: &Stack, phone: &str) -> String {
    let user = stack.orchestrator.ledger().ensure_user(phone).await.unwrap();
    stack.orchestrator.ledger().clear_first_interaction(phone).await;
    user.id
}

/// A primary-shape text reply. 100k input + 25k output tokens on gpt-4.1
/// price to 0.40 USD base, 0.46 USD with the 1.15 margin: 46 display cents.
fn primary_reply(text: &str) -> serde_json::Value {
    json!({
        "output": [{"type": "message",
                    "content": [{"type": "output_text", "text": text}]}],
        "usage": {"input_tokens": 100_000, "cached_tokens": 0, "output_tokens": 25_000}
    })
}

#[tokio::test]
async fn scenario_balance_user_is_debited_exactly_once() {
    let api = MockServer::start().await;
    let search = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(primary_reply("El NIE es tu número de identidad.")),
        )
        .expect(1)
        .mount(&api)
        .await;

    let stack = build_stack(&api, &search).await;
    let user_id = seed_user(&stack, "+34600000001").await;

    let outcome = stack
        .orchestrator
        .answer_question("+34600000001", "¿Qué es un NIE?")
        .await
        .unwrap();

    assert!(outcome.text.contains("NIE"));
    assert!(!outcome.search_used);
    assert_eq!(outcome.cost_cents, 46);

    // 300 initial minus the 46-cent turn.
    assert_eq!(stack.orchestrator.ledger().credits(&user_id).await, 254);

    // Exactly one debit entry, recording the applied delta.
    let entries = stack.store.entries_for_user(&user_id).await.unwrap();
    let debits: Vec<_> = entries
        .iter()
        .filter(|e| e.reason == REASON_CHAT_SPEND)
        .collect();
    assert_eq!(debits.len(), 1);
    assert_eq!(debits[0].delta_cents, -46);
    assert!(debits[0].ref_id.is_some());

    // The ledger sum equals the cached balance.
    let sum: i64 = entries.iter().map(|e| e.delta_cents).sum();
    assert_eq!(sum, 254);
}

#[tokio::test]
async fn scenario_keywords_force_search_without_tool_call() {
    let api = MockServer::start().await;
    let search = MockServer::start().await;

    // First call answers directly; the follow-up consumes injected context.
    let calls = AtomicU32::new(0);
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(move |_: &wiremock::Request| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            let text = if n == 0 {
                "Respuesta sin contexto."
            } else {
                "Según la información actualizada, los requisitos de 2024 son..."
            };
            ResponseTemplate::new(200).set_body_json(json!({
                "output": [{"type": "message",
                            "content": [{"type": "output_text", "text": text}]}],
                "usage": {"input_tokens": 1000, "cached_tokens": 0, "output_tokens": 200}
            }))
        })
        .expect(2)
        .mount(&api)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "usage": {"prompt_tokens": 100, "completion_tokens": 300, "total_tokens": 400},
            "choices": [{"message": {
                "role": "assistant",
                "content": "Requisitos vigentes: ver https://www.inclusion.gob.es/"
            }}]
        })))
        .expect(1)
        .mount(&search)
        .await;

    let stack = build_stack(&api, &search).await;
    seed_user(&stack, "+34600000002").await;

    let outcome = stack
        .orchestrator
        .answer_question(
            "+34600000002",
            "¿Cuáles son los requisitos para renovar en 2024?",
        )
        .await
        .unwrap();

    assert!(outcome.search_used);
    assert_eq!(
        outcome.sources,
        vec!["https://www.inclusion.gob.es/".to_string()]
    );
    assert!(outcome.text.contains("2024"));
}

#[tokio::test]
async fn scenario_primary_rejection_falls_back_to_legacy_shape() {
    let api = MockServer::start().await;
    let search = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "Unsupported parameter: 'input'"}
        })))
        .expect(1)
        .mount(&api)
        .await;

    // The legacy shape reports prompt/completion tokens and no cached figure;
    // the same token counts price to the same 46 cents with cached == 0.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant",
                                     "content": "Respuesta por la vía clásica."}}],
            "usage": {"prompt_tokens": 100_000, "completion_tokens": 25_000,
                      "total_tokens": 125_000}
        })))
        .expect(1)
        .mount(&api)
        .await;

    let stack = build_stack(&api, &search).await;
    let user_id = seed_user(&stack, "+34600000003").await;

    let outcome = stack
        .orchestrator
        .answer_question("+34600000003", "¿Qué es un NIE?")
        .await
        .unwrap();

    assert!(!outcome.text.is_empty());
    assert!(outcome.text.contains("clásica"));
    assert_eq!(outcome.cost_cents, 46);
    assert_eq!(stack.orchestrator.ledger().credits(&user_id).await, 254);
}

#[tokio::test]
async fn scenario_gateway_outage_answers_apology_with_zero_cost() {
    let api = MockServer::start().await;
    let search = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&api)
        .await;

    let stack = build_stack(&api, &search).await;
    let user_id = seed_user(&stack, "+34600000004").await;

    let outcome = stack
        .orchestrator
        .answer_question("+34600000004", "¿Qué es un NIE?")
        .await
        .unwrap();

    assert!(outcome.text.contains("dificultades técnicas"));
    assert_eq!(outcome.cost_cents, 0);
    assert!(!outcome.search_used);

    // Nothing was debited for the failed turn.
    assert_eq!(stack.orchestrator.ledger().credits(&user_id).await, 300);
    let entries = stack.store.entries_for_user(&user_id).await.unwrap();
    assert!(entries.iter().all(|e| e.reason != REASON_CHAT_SPEND));
}

#[tokio::test]
async fn scenario_conversation_history_carries_across_turns() {
    let api = MockServer::start().await;
    let search = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(primary_reply("Respuesta.")),
        )
        .expect(2)
        .mount(&api)
        .await;

    let stack = build_stack(&api, &search).await;
    seed_user(&stack, "+34600000005").await;

    stack
        .orchestrator
        .answer_question("+34600000005", "¿Qué es un NIE?")
        .await
        .unwrap();
    stack
        .orchestrator
        .answer_question("+34600000005", "¿Y cómo lo renuevo?")
        .await
        .unwrap();

    // Two turns: four messages, user and assistant alternating.
    let history = stack.orchestrator.memory().history("+34600000005").await;
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].content, "¿Qué es un NIE?");
    assert_eq!(history[3].content, "Respuesta.");
}

#[tokio::test]
async fn scenario_new_user_first_question_gets_welcome_prefix() {
    let api = MockServer::start().await;
    let search = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(primary_reply("El NIE es...")),
        )
        .mount(&api)
        .await;

    let stack = build_stack(&api, &search).await;

    let outcome = stack
        .orchestrator
        .answer_question("+34600000006", "¿Qué es un NIE?")
        .await
        .unwrap();

    assert!(outcome.text.contains("Reco Extranjería"));
    assert!(outcome.text.contains("El NIE es..."));

    // Second question is not decorated again.
    let outcome = stack
        .orchestrator
        .answer_question("+34600000006", "¿Y la TIE?")
        .await
        .unwrap();
    assert!(!outcome.text.contains("Reco Extranjería"));
}

//! End-to-end pipeline tests over the in-memory stores, plus HTTP contract
//! tests against a real Axum server on a random port.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::net::TcpListener;

use vouch::classify::MessageType;
use vouch::config::RulesConfig;
use vouch::extract::ContactCard;
use vouch::pipeline::{GroupMessage, MessageProcessor};
use vouch::store::{
    EndorsementStore, MemoryEndorsementStore, MemoryProviderStore, MemoryRequestLog, Provider,
    ProviderStore, RequestLog, RequestRecord,
};

struct Harness {
    providers: Arc<MemoryProviderStore>,
    endorsements: Arc<MemoryEndorsementStore>,
    requests: Arc<MemoryRequestLog>,
    processor: MessageProcessor,
}

fn harness() -> Harness {
    let providers = Arc::new(MemoryProviderStore::new());
    let endorsements = Arc::new(MemoryEndorsementStore::new());
    let requests = Arc::new(MemoryRequestLog::new());
    let processor = MessageProcessor::new(
        &RulesConfig::default(),
        Arc::clone(&providers) as Arc<dyn ProviderStore>,
        Arc::clone(&endorsements) as Arc<dyn EndorsementStore>,
        Arc::clone(&requests) as Arc<dyn RequestLog>,
    )
    .expect("default rules are valid");
    Harness {
        providers,
        endorsements,
        requests,
        processor,
    }
}

fn message(id: &str, sender: &str, text: &str) -> GroupMessage {
    GroupMessage {
        id: id.into(),
        group_id: "g-1".into(),
        sender: sender.into(),
        text: text.into(),
        timestamp: Utc::now(),
        quoted_message_id: None,
        contact: None,
    }
}

#[tokio::test]
async fn phone_only_recommendation_matches_stored_provider() {
    let h = harness();
    let existing = Provider::new("John Smith Plumbing").with_phone("+27821234567");
    h.providers.save(&existing).await.unwrap();

    // Local format in the message, international in the store.
    let report = h
        .processor
        .process(
            &message("m-1", "alice", "Highly recommend them, call 0821234567"),
            None,
        )
        .await
        .unwrap();

    assert_eq!(report.endorsements_created.len(), 1);
    assert_eq!(report.endorsements_created[0].match_type, "phone_fuzzy");
    let updated = h.providers.get(&existing.id).await.unwrap().unwrap();
    assert_eq!(updated.endorsement_count, 1);
}

#[tokio::test]
async fn request_then_recommendation_is_attributed() {
    let h = harness();
    let existing = Provider::new("John Smith Plumbing").with_phone("+27821234567");
    h.providers.save(&existing).await.unwrap();

    let mut request = message("req-1", "bob", "Anyone know a good plumber in Cape Town?");
    request.timestamp = Utc::now() - Duration::seconds(60);
    let report = h.processor.process(&request, None).await.unwrap();
    assert!(report.endorsements_created.is_empty());

    let report = h
        .processor
        .process(
            &message("m-2", "alice", "I highly recommend John Smith Plumbing"),
            None,
        )
        .await
        .unwrap();
    assert_eq!(report.endorsements_created.len(), 1);
    let endorsement = &report.endorsements_created[0];
    assert_eq!(endorsement.request_message_id.as_deref(), Some("req-1"));
    // Near-term bucket, all three bonuses, no decay.
    assert!((endorsement.attribution_confidence - 0.75).abs() < 1e-9);
}

#[tokio::test]
async fn quoted_reply_gets_direct_quote_attribution() {
    let h = harness();
    let existing = Provider::new("John Smith Plumbing");
    h.providers.save(&existing).await.unwrap();

    let mut reply = message("m-3", "alice", "I highly recommend John Smith Plumbing");
    reply.quoted_message_id = Some("req-7".into());
    let report = h.processor.process(&reply, None).await.unwrap();

    assert_eq!(report.endorsements_created.len(), 1);
    let endorsement = &report.endorsements_created[0];
    assert_eq!(endorsement.request_message_id.as_deref(), Some("req-7"));
    assert!((endorsement.attribution_confidence - 0.95).abs() < f64::EPSILON);
}

#[tokio::test]
async fn chitchat_is_a_successful_noop() {
    let h = harness();
    let report = h
        .processor
        .process(&message("m-4", "alice", "see you at the braai on saturday"), None)
        .await
        .unwrap();
    assert!(report.success);
    assert!(report.endorsements_created.is_empty());
    let recent = h
        .requests
        .recent("g-1", Utc::now() - Duration::seconds(3600))
        .await
        .unwrap();
    assert!(recent.is_empty());
}

#[tokio::test]
async fn request_is_recorded_in_the_log() {
    let h = harness();
    h.processor
        .process(
            &message("req-9", "bob", "Looking for a reliable electrician, any quotes?"),
            None,
        )
        .await
        .unwrap();

    let recent = h
        .requests
        .recent("g-1", Utc::now() - Duration::seconds(3600))
        .await
        .unwrap();
    assert_eq!(recent.len(), 1);
    let RequestRecord {
        message_id,
        message_type,
        ..
    } = &recent[0];
    assert_eq!(message_id, "req-9");
    assert_eq!(*message_type, MessageType::Request);
}

#[tokio::test]
async fn shared_contact_card_creates_provider() {
    let h = harness();
    let mut msg = message("m-5", "alice", "Highly recommend this electrician");
    msg.contact = Some(ContactCard {
        display_name: Some("Jane's Electrical".into()),
        phone_number: Some("083 123 4567".into()),
        organization: None,
    });

    let report = h.processor.process(&msg, None).await.unwrap();
    assert_eq!(report.endorsements_created.len(), 1, "notes: {:?}", report.notes);

    let provider_id = &report.endorsements_created[0].provider_id;
    let created = h.providers.get(provider_id).await.unwrap().unwrap();
    assert_eq!(created.name, "Jane's Electrical");
    assert_eq!(created.phone.as_deref(), Some("+27831234567"));
}

#[tokio::test]
async fn repeat_endorsements_accumulate() {
    let h = harness();
    let existing = Provider::new("John Smith Plumbing").with_phone("+27821234567");
    h.providers.save(&existing).await.unwrap();

    for i in 0..3 {
        h.processor
            .process(
                &message(
                    &format!("m-{i}"),
                    "alice",
                    "I highly recommend John Smith Plumbing",
                ),
                None,
            )
            .await
            .unwrap();
    }

    let updated = h.providers.get(&existing.id).await.unwrap().unwrap();
    assert_eq!(updated.endorsement_count, 3);
    let endorsements = h.endorsements.for_provider(&existing.id).await.unwrap();
    assert_eq!(endorsements.len(), 3);
}

// ── HTTP contract ───────────────────────────────────────────────────────

async fn serve() -> String {
    let h = harness();
    let app = vouch::webhook::message_routes(
        Arc::new(h.processor),
        secrecy::SecretString::from("test-secret"),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn webhook_rejects_bad_token() {
    let base = serve().await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/v1/messages"))
        .header("X-Hook-Token", "wrong")
        .json(&serde_json::json!({
            "id": "m-1", "group_id": "g-1", "sender": "alice",
            "text": "hello", "timestamp": Utc::now().to_rfc3339(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn webhook_rejects_malformed_body() {
    let base = serve().await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/v1/messages"))
        .header("X-Hook-Token", "test-secret")
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn webhook_processes_valid_message() {
    let base = serve().await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/v1/messages"))
        .header("X-Hook-Token", "test-secret")
        .json(&serde_json::json!({
            "id": "m-1", "group_id": "g-1", "sender": "alice",
            "text": "Anyone know a good plumber?",
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let report: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(report["success"], true);
    assert!(report["endorsements_created"].as_array().unwrap().is_empty());
}

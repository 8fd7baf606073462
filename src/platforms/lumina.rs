// src/platforms/lumina.rs
//! LUMINA: book marketing platform, exercised as an author
//!
//! 12 steps. The two AI agent invocations are skipped by some beginners and
//! intermediates; advanced feature exploration is reserved for experts and
//! power users and is allowed to fail.

use crate::model::PersonaType;
use crate::platforms::{count_at, required_id, signup_or_login, tomorrow};
use crate::runtime::flow::{Flow, FlowStep, GateOdds, StepCondition, StepContext};
use crate::target::TargetError;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const BOOK_ID: &str = "book_id";
const NO_BOOK: &str = "No book uploaded";
const PASSWORD: &str = "TestUser123!";

/// How likely each persona type is to try the AI agents
const AGENT_ADOPTION: GateOdds = GateOdds {
    beginner: 0.5,
    intermediate: 0.7,
    expert: 1.0,
    power_user: 1.0,
};

const ADVANCED_FEATURES: [&str; 4] = [
    "Worktree management",
    "Agent configuration",
    "API integration",
    "Bulk operations",
];

pub fn flow() -> Flow {
    Flow::new("lumina")
        .step(FlowStep::new("signup_or_login", |ctx| async move {
            signup_or_login(&ctx, "test-lumina.local", PASSWORD, json!({})).await
        }))
        .step(FlowStep::new("upload_manuscript", upload_manuscript))
        .step(FlowStep::new("extract_quotes", extract_quotes))
        .step(FlowStep::new("generate_email_campaign", generate_email_campaign))
        .step(FlowStep::new("generate_social_content", |ctx| {
            generate_content(
                ctx,
                json!({ "contentType": "social", "platforms": ["twitter", "facebook", "instagram"] }),
            )
        }))
        .step(FlowStep::new("generate_blog_content", |ctx| {
            generate_content(ctx, json!({ "contentType": "blog" }))
        }))
        .step(FlowStep::new("schedule_social_posts", schedule_social_posts))
        .step(
            FlowStep::new("invoke_quote_curator", |ctx| invoke_agent(ctx, "quote_curator"))
                .when(StepCondition::Chance(AGENT_ADOPTION)),
        )
        .step(
            FlowStep::new("invoke_email_optimizer", |ctx| invoke_agent(ctx, "email_optimizer"))
                .when(StepCondition::Chance(AGENT_ADOPTION)),
        )
        .step(FlowStep::new("view_analytics", view_analytics))
        .step(FlowStep::new("check_agent_status", check_agent_status))
        .step(
            FlowStep::new("explore_advanced_features", explore_advanced_features)
                .retryable(false)
                .optional()
                .when(StepCondition::PersonaIn(vec![
                    PersonaType::Expert,
                    PersonaType::PowerUser,
                ])),
        )
        .fallback_content("book_metadata", "An exciting new book in the fiction genre")
        .fallback_content("manuscript_excerpt", "Chapter 1: The journey begins...")
}

fn book_id(ctx: &StepContext) -> Result<String, TargetError> {
    ctx.require_str(BOOK_ID, NO_BOOK)
}

async fn upload_manuscript(ctx: Arc<StepContext>) -> Result<Value, TargetError> {
    ctx.log().info("Uploading manuscript");

    let description = ctx.generate_content("book_metadata").await;
    let manuscript = ctx.generate_content("manuscript_excerpt").await;

    let endpoint = "/api/manuscripts/upload";
    let response = ctx
        .post(
            endpoint,
            json!({
                "title": format!("Test Book - {}", ctx.agent_name()),
                "author": ctx.persona().name,
                "genre": "FICTION",
                "description": description,
                "file": {
                    "filename": "manuscript.txt",
                    "contentType": "text/plain",
                    "content": manuscript,
                },
            }),
        )
        .await?;

    let id = required_id(&response, "/book/id", endpoint)?;
    ctx.log().info(&format!("Manuscript uploaded: {}", id));
    ctx.remember(BOOK_ID, id.as_str());
    Ok(json!({ "bookId": id }))
}

async fn extract_quotes(ctx: Arc<StepContext>) -> Result<Value, TargetError> {
    let book = book_id(&ctx)?;
    let response = ctx
        .post(
            "/api/content/quotes/extract",
            json!({ "bookId": book, "minQuotes": 20, "maxQuotes": 50 }),
        )
        .await?;

    let count = count_at(&response, "/quotes");
    ctx.log().info(&format!("Quotes extracted: {}", count));
    Ok(json!({ "quotes": count }))
}

async fn generate_email_campaign(ctx: Arc<StepContext>) -> Result<Value, TargetError> {
    let book = book_id(&ctx)?;
    ctx.post(
        "/api/content/email/generate",
        json!({ "bookId": book, "campaignType": "launch", "sequences": 5 }),
    )
    .await?;

    ctx.log().info("Email campaign generated");
    Ok(json!({ "campaignType": "launch" }))
}

async fn generate_content(ctx: Arc<StepContext>, mut request: Value) -> Result<Value, TargetError> {
    let book = book_id(&ctx)?;
    request["bookId"] = Value::from(book);
    let content_type = request["contentType"].as_str().unwrap_or("content").to_string();

    ctx.post("/api/content/generate", request).await?;

    ctx.log().info(&format!("Generated {} content", content_type));
    Ok(json!({ "contentType": content_type }))
}

async fn schedule_social_posts(ctx: Arc<StepContext>) -> Result<Value, TargetError> {
    let book = book_id(&ctx)?;
    let response = ctx
        .post(
            "/api/social/schedule",
            json!({
                "bookId": book,
                "platform": "twitter",
                "content": "Excited to announce my new book!",
                "scheduledFor": tomorrow(),
            }),
        )
        .await?;

    Ok(json!({ "postId": response.body.get("id").cloned().unwrap_or(Value::Null) }))
}

async fn invoke_agent(ctx: Arc<StepContext>, agent_type: &'static str) -> Result<Value, TargetError> {
    let book = book_id(&ctx)?;
    ctx.log().info(&format!("Invoking agent {}", agent_type));

    let response = ctx
        .post(
            "/api/agents/execute",
            json!({ "agentType": agent_type, "bookId": book }),
        )
        .await?;

    Ok(json!({
        "agentType": agent_type,
        "executionId": response.body.get("executionId").cloned().unwrap_or(Value::Null),
    }))
}

async fn view_analytics(ctx: Arc<StepContext>) -> Result<Value, TargetError> {
    let book = book_id(&ctx)?;
    let response = ctx
        .get(format!("/api/content/performance?bookId={}", book))
        .await?;

    let metrics = response.body.as_object().map(|m| m.len()).unwrap_or(0);
    Ok(json!({ "metrics": metrics }))
}

async fn check_agent_status(ctx: Arc<StepContext>) -> Result<Value, TargetError> {
    let response = ctx.get("/api/agents/status").await?;
    Ok(json!({ "agents": count_at(&response, "/agents") }))
}

async fn explore_advanced_features(ctx: Arc<StepContext>) -> Result<Value, TargetError> {
    let decision = ctx
        .make_intelligent_decision(
            "Which advanced feature would you like to explore?",
            &ADVANCED_FEATURES,
        )
        .await;

    ctx.log().info(&format!("Exploring {}", decision.chosen));
    ctx.pause(Duration::from_millis(2000)).await;
    Ok(json!({ "feature": decision.chosen }))
}

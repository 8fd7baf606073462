// src/platforms/mednext.rs
//! MedNext-Healthcare: clinical workflow, exercised as a provider

use crate::platforms::{count_at, required_id, signup_or_login, tomorrow};
use crate::runtime::flow::{Flow, FlowStep, GateOdds, StepCondition, StepContext};
use crate::target::TargetError;
use serde_json::{json, Value};
use std::sync::Arc;

const PATIENT_ID: &str = "patient_id";
const PASSWORD: &str = "TestProvider123!";

const AI_ADOPTION: GateOdds = GateOdds {
    beginner: 0.5,
    intermediate: 0.5,
    expert: 1.0,
    power_user: 1.0,
};

const REPORT_FORMATS: [&str; 3] = ["PDF", "HL7", "FHIR"];

pub fn flow() -> Flow {
    Flow::new("mednext")
        .step(FlowStep::new("signup_or_login", |ctx| async move {
            signup_or_login(
                &ctx,
                "test-mednext.local",
                PASSWORD,
                json!({ "role": "PROVIDER" }),
            )
            .await
        }))
        .step(FlowStep::new("create_patient", create_patient))
        .step(FlowStep::new("schedule_appointment", schedule_appointment))
        .step(FlowStep::new("create_clinical_note", create_clinical_note))
        .step(FlowStep::new("order_lab_tests", order_lab_tests))
        .step(FlowStep::new("prescribe_medication", prescribe_medication))
        .step(FlowStep::new("view_patient_history", view_patient_history))
        .step(
            FlowStep::new("use_clinical_ai", use_clinical_ai)
                .when(StepCondition::Chance(AI_ADOPTION)),
        )
        .step(FlowStep::new("generate_report", generate_report))
        .step(FlowStep::new("view_analytics", |ctx| async move {
            let response = ctx.get("/api/analytics").await?;
            let metrics = response.body.as_object().map(|m| m.len()).unwrap_or(0);
            Ok(json!({ "metrics": metrics }))
        }))
        .fallback_content("patient_name", "John Doe")
        .fallback_content("clinical_note", "Patient presents with mild symptoms")
        .fallback_content("clinical_question", "Recommend treatment approach")
}

fn patient_id(ctx: &StepContext) -> Result<String, TargetError> {
    ctx.require_str(PATIENT_ID, "No patient created")
}

async fn create_patient(ctx: Arc<StepContext>) -> Result<Value, TargetError> {
    let name = ctx.generate_content("patient_name").await;
    let endpoint = "/api/patients";
    let response = ctx
        .post(
            endpoint,
            json!({ "name": name, "dateOfBirth": "1980-01-01", "gender": "M" }),
        )
        .await?;

    let id = required_id(&response, "/patient/id", endpoint)?;
    ctx.log().info(&format!("Patient created: {}", id));
    ctx.remember(PATIENT_ID, id.as_str());
    Ok(json!({ "patientId": id }))
}

async fn schedule_appointment(ctx: Arc<StepContext>) -> Result<Value, TargetError> {
    let patient = patient_id(&ctx)?;
    let response = ctx
        .post(
            "/api/appointments",
            json!({ "patientId": patient, "datetime": tomorrow(), "type": "CONSULTATION" }),
        )
        .await?;

    Ok(json!({
        "appointmentId": response.str_at("/appointment/id"),
    }))
}

async fn create_clinical_note(ctx: Arc<StepContext>) -> Result<Value, TargetError> {
    let patient = patient_id(&ctx)?;
    let note = ctx.generate_content("clinical_note").await;
    ctx.post(
        "/api/clinical-notes",
        json!({ "patientId": patient, "note": note }),
    )
    .await?;
    Ok(json!({ "noteLength": note.len() }))
}

async fn order_lab_tests(ctx: Arc<StepContext>) -> Result<Value, TargetError> {
    let patient = patient_id(&ctx)?;
    let tests = ["CBC", "CMP", "Lipid Panel"];
    ctx.post(
        "/api/lab-orders",
        json!({ "patientId": patient, "tests": tests }),
    )
    .await?;
    Ok(json!({ "tests": tests.len() }))
}

async fn prescribe_medication(ctx: Arc<StepContext>) -> Result<Value, TargetError> {
    let patient = patient_id(&ctx)?;
    ctx.post(
        "/api/prescriptions",
        json!({
            "patientId": patient,
            "medication": "Amoxicillin",
            "dosage": "500mg",
            "frequency": "TID",
        }),
    )
    .await?;
    Ok(json!({ "medication": "Amoxicillin" }))
}

async fn view_patient_history(ctx: Arc<StepContext>) -> Result<Value, TargetError> {
    let patient = patient_id(&ctx)?;
    let response = ctx
        .get(format!("/api/patients/{}/history", patient))
        .await?;
    Ok(json!({ "entries": count_at(&response, "/history") }))
}

async fn use_clinical_ai(ctx: Arc<StepContext>) -> Result<Value, TargetError> {
    let patient = patient_id(&ctx)?;
    let question = ctx.generate_content("clinical_question").await;
    ctx.log().info("Consulting clinical AI assistant");
    ctx.post(
        "/api/ai-assistant",
        json!({ "patientId": patient, "question": question }),
    )
    .await?;
    Ok(json!({ "asked": true }))
}

async fn generate_report(ctx: Arc<StepContext>) -> Result<Value, TargetError> {
    let patient = patient_id(&ctx)?;
    let decision = ctx
        .make_intelligent_decision("Which report format do you need?", &REPORT_FORMATS)
        .await;

    ctx.post(
        "/api/reports",
        json!({ "patientId": patient, "format": decision.chosen }),
    )
    .await?;
    Ok(json!({ "format": decision.chosen }))
}

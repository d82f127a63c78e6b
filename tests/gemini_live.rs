//! Networked check against the real Gemini API
#![cfg(feature = "live_gemini")]

use anyhow::Result;
use wellbeing_report::clients::TextGenerator;
use wellbeing_report::config::Config;

#[tokio::test]
async fn test_gemini_suggestions_round_trip() -> Result<()> {
    dotenvy::dotenv().ok();

    if std::env::var("GEMINI_API_KEY").is_err() {
        eprintln!("Skipping Gemini integration test - set GEMINI_API_KEY to run");
        return Ok(());
    }

    let config = Config::load()?;
    let client = wellbeing_report::clients::shared_client(&config)?;
    let prompt = wellbeing_report::prompts::suggestions_prompt(
        &serde_json::json!({"sleepHours": 5, "mood": "tired"}).into(),
        "moderate",
        0.55,
    )?;

    let text = client.generate(&prompt).await?.unwrap_or_default();
    let suggestions = wellbeing_report::extractor::extract_suggestions(&text);
    println!("Suggestions: {:#?}", suggestions);
    assert!(!suggestions.is_empty());

    // The shared handle is reused, not rebuilt
    let again = wellbeing_report::clients::shared_client(&config)?;
    assert!(std::sync::Arc::ptr_eq(&client, &again));

    Ok(())
}

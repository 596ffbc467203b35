use anyhow::Context;

use facturly_app::{AppConfig, AppContext, Navigation, Route};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    facturly_observability::init();

    let location = std::env::args().nth(1).unwrap_or_else(|| "/".to_string());
    let context = AppContext::new(AppConfig::load());
    context.start().await;

    let outcome = context.navigator(location.as_str()).current();
    println!("{location}: {outcome}");

    if outcome == Navigation::Render(Route::Dashboard) {
        let summary = context.dashboard().await.context("loading dashboard")?;
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("rendering dashboard")?
        );
    }
    Ok(())
}

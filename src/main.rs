mod app;

use anyhow::Result;
use stratus_core::AppError;

use crate::app::App;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    stratus_core::init()?;

    let mut app = match App::new() {
        Ok(app) => app,
        Err(e) => {
            if let Some(app_err) = e.downcast_ref::<AppError>() {
                eprintln!("{}", app_err.user_message());
            }
            return Err(e);
        }
    };
    app.initialize();

    tracing::info!("Stratus started");

    println!("Stratus - Weather for your bookmarked places");
    println!("  Config directory: {}", app.config().config_dir.display());

    if app.config().weather.refresh_on_start {
        app.refresh().await;
    }

    app.print_summary();

    // Graceful shutdown
    app.shutdown().await?;

    Ok(())
}

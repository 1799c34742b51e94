//! Service health

use anyhow::Result;
use colored::Colorize;

use crate::client::ApiClient;
use crate::output::{color_status, print_json, OutputFormat};

pub async fn status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;

    if format == OutputFormat::Json {
        return print_json(&health);
    }

    println!(
        "{} {}",
        "Service:".bold(),
        color_status(&health.status.to_string())
    );

    let mut names: Vec<_> = health.components.keys().collect();
    names.sort();
    for name in names {
        let component = &health.components[name];
        println!(
            "  {:<12} {} {}",
            name,
            color_status(&component.status.to_string()),
            component.message.as_deref().unwrap_or("").dimmed()
        );
    }
    Ok(())
}

#![allow(clippy::result_large_err)]

use barbershop_scheduler::{
    config::{database, shop},
    core::{
        barber::fetch_barbers,
        schedule::{AvailabilityQuery, available_slots},
        slots::TimeSlot,
    },
    errors::Result,
};
use chrono::Utc;
use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn render_board(slots: &[TimeSlot]) -> String {
    slots
        .iter()
        .map(|slot| {
            if slot.available {
                slot.time.clone()
            } else {
                format!("({})", slot.time)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();

    // 3. Load the shop configuration
    let config = shop::load_default_config()
        .inspect_err(|e| error!("Failed to load shop configuration: {}", e))?;
    let clock = config.clock()?;
    info!("Shop configuration loaded (UTC offset {} minutes).", config.utc_offset_minutes);

    // 4. Initialize database
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))?;

    // 5. Print today's board for every active barber
    let now = Utc::now();
    let today = clock.local_date(now);
    let barbers = fetch_barbers(&db).await?;
    if barbers.is_empty() {
        warn!("No active barbers registered.");
    }

    for barber in barbers {
        let query = AvailabilityQuery {
            date: today,
            barber_id: Some(barber.id),
            duration_minutes: None,
        };
        match available_slots(&db, &config, &query, now).await {
            Ok(slots) if slots.is_empty() => info!("{} ({}): closed", barber.name, today),
            Ok(slots) => info!("{} ({}): {}", barber.name, today, render_board(&slots)),
            Err(e) => match e.remediation() {
                Some(hint) => error!("{}: {} {}", barber.name, e, hint),
                None => error!("{}: {}", barber.name, e),
            },
        }
    }

    Ok(())
}

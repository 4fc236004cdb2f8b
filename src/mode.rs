use std::time::Duration;

use log::{info, warn};
use serde_derive::Deserialize;

use crate::config::ModeSetting;
use crate::messages::Mode;

#[derive(Deserialize)]
struct ModeBody {
    mode: Mode,
}

/// Accepts `simulation` / `real` as bare text or as `{"mode": "..."}`.
pub fn parse_mode(body: &str) -> Option<Mode> {
    let body = body.trim();
    match body.to_ascii_lowercase().as_str() {
        "simulation" => Some(Mode::Simulation),
        "real" => Some(Mode::Real),
        _ => serde_json::from_str::<ModeBody>(body).ok().map(|b| b.mode),
    }
}

/// `remote` asks the collector once; any failure or unknown answer gives `fallback`.
pub async fn resolve(setting: ModeSetting, base_url: &str, timeout: Duration, fallback: Mode) -> Mode {
    let mode = match setting {
        ModeSetting::Simulation => Mode::Simulation,
        ModeSetting::Real => Mode::Real,
        ModeSetting::Remote => match fetch(base_url, timeout).await {
            Ok(mode) => mode,
            Err(reason) => {
                warn!("Mode negotiation failed ({}), using {}", reason, fallback);
                fallback
            }
        },
    };
    info!("Running in {} mode", mode);
    mode
}

async fn fetch(base_url: &str, timeout: Duration) -> Result<Mode, String> {
    let url = format!("{}/mode", base_url.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| e.to_string())?;

    let response = client.get(&url).send().await.map_err(|e| e.to_string())?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("status {}", status.as_u16()));
    }

    let body = response.text().await.map_err(|e| e.to_string())?;
    parse_mode(&body).ok_or_else(|| format!("unrecognised mode {:?}", body.trim()))
}

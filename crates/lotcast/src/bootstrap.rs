//! Bootstrap command for seeding the directory tables.
//!
//! Reads a JSON file holding territories, profiles, and Facebook groups
//! and upserts everything into the store. Safe to re-run: existing rows
//! are overwritten, not duplicated.

use miette::Result;
use serde::Deserialize;
use tracing::info;

use lotcast_core::{FacebookGroup, Profile, Territory};
use lotcast_db::Store;

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    territories: Vec<Territory>,
    #[serde(default)]
    profiles: Vec<Profile>,
    #[serde(default)]
    groups: Vec<FacebookGroup>,
}

/// Run the bootstrap command.
pub async fn run(db_path: &str, seed_file: &str) -> Result<()> {
    info!(path = seed_file, "seeding directory tables");

    let raw = std::fs::read_to_string(seed_file)
        .map_err(|e| miette::miette!("failed to read {}: {}", seed_file, e))?;
    let seed: SeedFile =
        serde_json::from_str(&raw).map_err(|e| miette::miette!("invalid seed file: {}", e))?;

    let store = Store::open(db_path).map_err(|e| miette::miette!("{}", e))?;

    // Territories first: profiles and groups reference them.
    for territory in &seed.territories {
        store
            .upsert_territory(territory)
            .map_err(|e| miette::miette!("{}", e))?;
    }
    for profile in &seed.profiles {
        store
            .upsert_profile(profile)
            .map_err(|e| miette::miette!("{}", e))?;
    }
    for group in &seed.groups {
        store
            .upsert_group(group)
            .map_err(|e| miette::miette!("{}", e))?;
    }

    info!(
        territories = seed.territories.len(),
        profiles = seed.profiles.len(),
        groups = seed.groups.len(),
        "bootstrap complete"
    );
    Ok(())
}

//! CLI subcommands.

pub mod generate;
pub mod refgrid;

use std::env;

/// Reads the provider API key from the environment.
///
/// `GOOGLE_MAPS_API_KEY` takes precedence; `GMAPS_KEY` is accepted as a
/// legacy alias.
pub fn api_key_from_env() -> Option<String> {
    env::var("GOOGLE_MAPS_API_KEY")
        .or_else(|_| env::var("GMAPS_KEY"))
        .ok()
        .filter(|k| !k.is_empty())
}

/// Reads the optional URL-signing secret from the environment.
pub fn signing_secret_from_env() -> Option<String> {
    env::var("GOOGLE_MAPS_SECRET").ok().filter(|s| !s.is_empty())
}

use anyhow::Result;
use serde::{Deserialize, Serialize};

use serenity::model::id::UserId;

use crate::audio::{PlayerSettings, SearchMode, SkipPolicy, StreamOptions};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Development guild for command registration
    pub owner_id: Option<u64>,

    // Playback
    pub default_volume: f32,
    pub votes_to_skip: usize,

    // Stream creation
    pub search_mode: SearchMode,
    pub quiet: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// `load` feeds it the process environment; tests feed it a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            // Discord
            discord_token: lookup("DISCORD_TOKEN")
                .ok_or_else(|| anyhow::anyhow!("DISCORD_TOKEN is not set"))?,
            application_id: lookup("APPLICATION_ID")
                .ok_or_else(|| anyhow::anyhow!("APPLICATION_ID is not set"))?
                .parse()?,
            guild_id: lookup("GUILD_ID").and_then(|s| s.parse().ok()),
            owner_id: lookup("OWNER_ID").and_then(|s| s.parse().ok()),

            // Playback
            default_volume: var("DEFAULT_VOLUME", "0.6").parse()?,
            votes_to_skip: var("VOTES_TO_SKIP", "3").parse()?,

            // Stream creation
            search_mode: var("SEARCH_MODE", "auto").parse()?,
            quiet: var("YTDL_QUIET", "true").parse()?,
        })
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Default volume must be between 0.0 and 1.0
    /// - At least one vote must be needed to skip
    /// - Owner id, when given, must be non-zero (Discord ids never are)
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!(
                "Default volume must be between 0.0 and 1.0, got: {}",
                self.default_volume
            );
        }

        if self.votes_to_skip == 0 {
            anyhow::bail!("Votes to skip must be greater than 0");
        }

        if self.owner_id == Some(0) {
            anyhow::bail!("OWNER_ID must be a valid Discord user id");
        }

        Ok(())
    }

    /// Options handed to the voice collaborator for every new stream.
    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            search_mode: self.search_mode,
            quiet: self.quiet,
        }
    }

    /// Settings for every guild queue the registry creates.
    pub fn player_settings(&self) -> PlayerSettings {
        PlayerSettings {
            skip: SkipPolicy {
                owner: self.owner_id.map(UserId::new),
                votes_to_skip: self.votes_to_skip,
            },
            default_volume: self.default_volume,
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes the token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {}, Owner: {})\n  \
            Playback: {}% default vol, {} votes to skip\n  \
            Streams: search={}, quiet={}",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.owner_id.map_or("none".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0).round() as u32,
            self.votes_to_skip,
            self.search_mode,
            self.quiet,
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,
            owner_id: None,

            default_volume: 0.6,
            votes_to_skip: 3,

            search_mode: SearchMode::Auto,
            quiet: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let config =
            Config::from_lookup(lookup(&[("DISCORD_TOKEN", "tok"), ("APPLICATION_ID", "42")]))
                .unwrap();

        assert_eq!(config.discord_token, "tok");
        assert_eq!(config.application_id, 42);
        assert_eq!(config.owner_id, None);
        assert_eq!(config.default_volume, 0.6);
        assert_eq!(config.votes_to_skip, 3);
        assert_eq!(config.search_mode, SearchMode::Auto);
        assert!(config.quiet);
        config.validate().unwrap();
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "tok"),
            ("APPLICATION_ID", "42"),
            ("OWNER_ID", "1234"),
            ("DEFAULT_VOLUME", "0.25"),
            ("VOTES_TO_SKIP", "5"),
            ("SEARCH_MODE", "url"),
            ("YTDL_QUIET", "false"),
        ]))
        .unwrap();

        assert_eq!(config.owner_id, Some(1234));
        assert_eq!(config.default_volume, 0.25);
        assert_eq!(config.votes_to_skip, 5);
        assert_eq!(config.search_mode, SearchMode::Url);
        assert_eq!(
            config.stream_options(),
            StreamOptions {
                search_mode: SearchMode::Url,
                quiet: false
            }
        );

        let settings = config.player_settings();
        assert_eq!(settings.skip.owner, Some(UserId::new(1234)));
        assert_eq!(settings.skip.votes_to_skip, 5);
        assert_eq!(settings.default_volume, 0.25);
    }

    #[test]
    fn missing_token_is_an_error() {
        assert!(Config::from_lookup(lookup(&[("APPLICATION_ID", "42")])).is_err());
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let loud = Config {
            default_volume: 1.5,
            ..Config::default()
        };
        assert!(loud.validate().is_err());

        let no_votes = Config {
            votes_to_skip: 0,
            ..Config::default()
        };
        assert!(no_votes.validate().is_err());
    }

    #[test]
    fn summary_hides_the_token() {
        let config = Config {
            discord_token: "super-secret".into(),
            ..Config::default()
        };
        let summary = config.summary();
        assert!(!summary.contains("super-secret"));
        assert!(summary.contains("60% default vol"));
    }
}

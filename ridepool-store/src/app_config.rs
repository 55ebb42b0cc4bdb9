use ridepool_reservation::ReservationPolicy;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub reservation: ReservationRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReservationRules {
    #[serde(default = "default_max_seats")]
    pub max_seats_per_booking: i32,
    #[serde(default = "default_retries")]
    pub commit_retries: u32,
    #[serde(default)]
    pub require_driver_approval: bool,
}

fn default_max_seats() -> i32 {
    8
}

fn default_retries() -> u32 {
    3
}

impl ReservationRules {
    pub fn policy(&self) -> ReservationPolicy {
        ReservationPolicy {
            max_seats_per_booking: self.max_seats_per_booking,
            commit_retries: self.commit_retries,
            require_driver_approval: self.require_driver_approval,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file
            // Default to 'development' env
            // Note that this file is _optional_
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of RIDEPOOL)
            // Eg.. `RIDEPOOL_DEBUG=1` would set the `debug` key
            .add_source(config::Environment::with_prefix("RIDEPOOL").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

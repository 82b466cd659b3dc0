use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;

use schema::RegulationId;

#[derive(Debug, thiserror::Error)]
#[error("invalid {key} value {value:?}: {reason}")]
pub struct ConfigError {
    key: &'static str,
    value: String,
    reason: String,
}

/// Regulations the flight management checks compare against
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlightRules {
    /// Minimum flight duration
    pub flight_duration: RegulationId,
    /// Minimum and maximum stop duration
    pub stop_window: [RegulationId; 2],
}

impl Default for FlightRules {
    fn default() -> Self {
        Self {
            flight_duration: RegulationId(5),
            stop_window: [RegulationId(6), RegulationId(7)],
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub socket: SocketAddr,
    /// Directory holding the seed CSVs
    pub data_dir: String,
    pub rules: FlightRules,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = FlightRules::default();

        Ok(Self {
            socket: try_load("SERVER_SOCKET", "0.0.0.0:50051")?,
            data_dir: try_load("DATA_DIR", schema::SAMPLE_DATA_DIR)?,
            rules: FlightRules {
                flight_duration: RegulationId(try_load(
                    "FLIGHT_DURATION_REGULATION",
                    &defaults.flight_duration.to_string(),
                )?),
                stop_window: [
                    RegulationId(try_load(
                        "MIN_STOP_REGULATION",
                        &defaults.stop_window[0].to_string(),
                    )?),
                    RegulationId(try_load(
                        "MAX_STOP_REGULATION",
                        &defaults.stop_window[1].to_string(),
                    )?),
                ],
            },
        })
    }
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = env::var(key).unwrap_or_else(|_| {
        log::info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value.parse().map_err(|e: T::Err| ConfigError {
        key,
        reason: e.to_string(),
        value,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_try_load_default() -> Result<(), ConfigError> {
        let port: u16 = try_load("BOOKING_TEST_UNSET_PORT", "50051")?;
        assert_eq!(port, 50051);
        Ok(())
    }

    #[test]
    fn test_try_load_invalid() {
        let result: Result<u16, _> = try_load("BOOKING_TEST_UNSET_PORT", "not-a-port");
        assert!(result.is_err());
    }
}

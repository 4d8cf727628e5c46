use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use thiserror::Error;

// Top-level configuration, one section per engine component
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: Option<DatabaseConfig>,
    pub pricing: PricingConfig,
    pub demand: DemandConfig,
    pub feedback: FeedbackConfig,
    pub simulation: SimulationConfig,
    pub features: FeatureFlags,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

// Application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub json_logs: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            environment: "development".to_string(),
            rust_log: "charity_pricing=debug,tower_http=debug".to_string(),
            json_logs: false,
        }
    }
}

// Postgres settings; absent means the in-memory store is used
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

/// Platform fee applied on the post-uplift subtotal.
#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    pub fee_rate: Decimal,
    pub fixed_fee: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            fee_rate: dec!(0.025),
            fixed_fee: dec!(1.69),
        }
    }
}

/// A demand multiplier that applies once the uplift reaches `threshold` percent.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SuppressionBand {
    pub threshold: f64,
    pub multiplier: f64,
}

/// Knobs of the purchase-decision model and the demand-rate curve.
///
/// The defaults were tuned by inspection. They are kept configurable so they
/// can be validated against real sales data.
#[derive(Debug, Clone, Deserialize)]
pub struct DemandConfig {
    pub base_rate_per_minute: f64,
    pub suppression_bands: Vec<SuppressionBand>,
    pub charity_divisor: f64,
    pub charity_weight: f64,
    pub price_reference: f64,
    pub penalty_weight: f64,
    pub noise_amplitude: f64,
    pub max_samples_per_batch: u32,
}

impl Default for DemandConfig {
    fn default() -> Self {
        Self {
            base_rate_per_minute: 2.5,
            suppression_bands: vec![
                SuppressionBand { threshold: 50.0, multiplier: 0.8 },
                SuppressionBand { threshold: 100.0, multiplier: 0.6 },
                SuppressionBand { threshold: 150.0, multiplier: 0.3 },
                SuppressionBand { threshold: 200.0, multiplier: 0.1 },
            ],
            charity_divisor: 200.0,
            charity_weight: 0.3,
            price_reference: 150.0,
            penalty_weight: 0.5,
            noise_amplitude: 0.1,
            max_samples_per_batch: 500,
        }
    }
}

/// Low-pass uplift controller settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackConfig {
    pub step: Decimal,
    pub min_change: Decimal,
    pub min_uplift: Decimal,
    pub max_uplift: Decimal,
    pub score_per_purchase_rate: f64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            step: dec!(0.2),
            min_change: dec!(5),
            min_uplift: dec!(0),
            max_uplift: dec!(200),
            score_per_purchase_rate: 20.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// Trailing window used to infer a running simulation from purchase timestamps.
    pub activity_window_secs: i64,
    pub min_seats_per_tick: u32,
    pub max_seats_per_tick: u32,
    pub max_seat_attempts: u32,
    pub feedback_every_ticks: u64,
    /// When set, every candidate seat must pass a persona purchase decision.
    pub persona_gate: bool,
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            activity_window_secs: 300,
            min_seats_per_tick: 1,
            max_seats_per_tick: 3,
            max_seat_attempts: 5,
            feedback_every_ticks: 30,
            persona_gate: true,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    pub seed_demo_data: bool,
    pub infer_run_state: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            seed_demo_data: false,
            infer_run_state: true,
        }
    }
}

fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn env_opt<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        _ => Ok(None),
    }
}

/// Parses `50:0.8,100:0.6` into bands sorted by ascending threshold.
pub fn parse_bands(raw: &str) -> Option<Vec<SuppressionBand>> {
    let mut bands = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (threshold, multiplier) = part.split_once(':')?;
        let band = SuppressionBand {
            threshold: threshold.trim().parse().ok()?,
            multiplier: multiplier.trim().parse().ok()?,
        };
        if band.threshold < 0.0 || !(0.0..=1.0).contains(&band.multiplier) {
            return None;
        }
        bands.push(band);
    }
    bands.sort_by(|a, b| a.threshold.total_cmp(&b.threshold));
    Some(bands)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let app_defaults = AppConfig::default();
        let demand_defaults = DemandConfig::default();
        let feedback_defaults = FeedbackConfig::default();
        let sim_defaults = SimulationConfig::default();
        let flag_defaults = FeatureFlags::default();

        let database = match env_opt::<String>("DATABASE_URL")? {
            Some(url) => Some(DatabaseConfig {
                url,
                pool_size: env_or("DB_POOL_SIZE", 20)?,
            }),
            None => None,
        };

        let suppression_bands = match env::var("DEMAND_SUPPRESSION_BANDS") {
            Ok(raw) => parse_bands(&raw).ok_or(ConfigError::Invalid {
                key: "DEMAND_SUPPRESSION_BANDS",
                value: raw,
            })?,
            Err(_) => demand_defaults.suppression_bands.clone(),
        };

        let config = Config {
            app: AppConfig {
                host: env_or("HOST", app_defaults.host)?,
                port: env_or("PORT", app_defaults.port)?,
                environment: env_or("ENVIRONMENT", app_defaults.environment)?,
                rust_log: env_or("RUST_LOG", app_defaults.rust_log)?,
                json_logs: env::var("LOG_FORMAT")
                    .map(|v| v.eq_ignore_ascii_case("json"))
                    .unwrap_or(false),
            },
            database,
            pricing: PricingConfig {
                fee_rate: env_or("PLATFORM_FEE_RATE", dec!(0.025))?,
                fixed_fee: env_or("PLATFORM_FIXED_FEE", dec!(1.69))?,
            },
            demand: DemandConfig {
                base_rate_per_minute: env_or("DEMAND_BASE_RATE", demand_defaults.base_rate_per_minute)?,
                suppression_bands,
                charity_divisor: env_or("DEMAND_CHARITY_DIVISOR", demand_defaults.charity_divisor)?,
                charity_weight: env_or("DEMAND_CHARITY_WEIGHT", demand_defaults.charity_weight)?,
                price_reference: env_or("DEMAND_PRICE_REFERENCE", demand_defaults.price_reference)?,
                penalty_weight: env_or("DEMAND_PENALTY_WEIGHT", demand_defaults.penalty_weight)?,
                noise_amplitude: env_or("DEMAND_NOISE_AMPLITUDE", demand_defaults.noise_amplitude)?,
                max_samples_per_batch: env_or(
                    "DEMAND_MAX_SAMPLES_PER_BATCH",
                    demand_defaults.max_samples_per_batch,
                )?,
            },
            feedback: FeedbackConfig {
                step: env_or("UPLIFT_ADJUST_STEP", feedback_defaults.step)?,
                min_change: env_or("UPLIFT_MIN_CHANGE", feedback_defaults.min_change)?,
                ..feedback_defaults
            },
            simulation: SimulationConfig {
                activity_window_secs: env_or("SIM_ACTIVITY_WINDOW_SECS", sim_defaults.activity_window_secs)?,
                max_seat_attempts: env_or("SIM_MAX_SEAT_ATTEMPTS", sim_defaults.max_seat_attempts)?,
                feedback_every_ticks: env_or("SIM_FEEDBACK_EVERY_TICKS", sim_defaults.feedback_every_ticks)?,
                persona_gate: env_or("SIM_PERSONA_GATE", sim_defaults.persona_gate)?,
                seed: env_opt("SIM_SEED")?,
                ..sim_defaults
            },
            features: FeatureFlags {
                seed_demo_data: env_or("SEED_DEMO_DATA", flag_defaults.seed_demo_data)?,
                infer_run_state: env_or("INFER_RUN_STATE", flag_defaults.infer_run_state)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pricing.fee_rate < Decimal::ZERO {
            return Err(ConfigError::Invalid {
                key: "PLATFORM_FEE_RATE",
                value: self.pricing.fee_rate.to_string(),
            });
        }
        if self.pricing.fixed_fee < Decimal::ZERO {
            return Err(ConfigError::Invalid {
                key: "PLATFORM_FIXED_FEE",
                value: self.pricing.fixed_fee.to_string(),
            });
        }
        if self.feedback.step <= Decimal::ZERO || self.feedback.step > Decimal::ONE {
            return Err(ConfigError::Invalid {
                key: "UPLIFT_ADJUST_STEP",
                value: self.feedback.step.to_string(),
            });
        }
        if self.simulation.feedback_every_ticks == 0 {
            return Err(ConfigError::Invalid {
                key: "SIM_FEEDBACK_EVERY_TICKS",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bands_and_sorts_them() {
        let bands = parse_bands("150:0.3, 50:0.8,100:0.6").expect("valid bands");
        let thresholds: Vec<f64> = bands.iter().map(|b| b.threshold).collect();
        assert_eq!(thresholds, vec![50.0, 100.0, 150.0]);
        assert_eq!(bands[0].multiplier, 0.8);
    }

    #[test]
    fn rejects_malformed_bands() {
        assert!(parse_bands("50-0.8").is_none());
        assert!(parse_bands("50:abc").is_none());
        assert!(parse_bands("50:1.5").is_none());
    }

    #[test]
    fn defaults_match_the_reference_pricing_model() {
        let config = Config::default();
        assert_eq!(config.pricing.fee_rate, dec!(0.025));
        assert_eq!(config.pricing.fixed_fee, dec!(1.69));
        assert_eq!(config.demand.suppression_bands.len(), 4);
        assert_eq!(config.feedback.step, dec!(0.2));
        assert!(config.database.is_none());
    }
}

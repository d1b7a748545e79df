use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub application: ApplicationConfig,
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_expiration_minutes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationConfig {
    /// Externally reachable base URL, used for gateway return URLs
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentsConfig {
    pub click: ClickConfig,
    pub payme: PaymeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClickConfig {
    pub service_id: String,
    pub merchant_id: String,
    #[serde(default = "default_click_checkout_url")]
    pub checkout_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymeConfig {
    pub merchant_id: String,
    #[serde(default = "default_payme_checkout_url")]
    pub checkout_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    pub requests_per_minute: u32,
    pub window_seconds: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            window_seconds: 60,
        }
    }
}

fn default_click_checkout_url() -> String {
    "https://my.click.uz/services/pay".to_string()
}

fn default_payme_checkout_url() -> String {
    "https://checkout.paycom.uz".to_string()
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for environment variable overrides)
        dotenvy::dotenv().ok();

        // config.yml is required; COURSEPAY__SECTION__KEY variables override it
        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(true))
            .add_source(
                config::Environment::with_prefix("COURSEPAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub mercadopago_api_url: String,
    pub payment_notification_url: Option<String>,
    pub push_function_path: String,
    pub http_timeout_secs: u64,
    pub business_utc_offset_minutes: i32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            mercadopago_api_url: env::var("MERCADOPAGO_API_URL")
                .unwrap_or_else(|_| "https://api.mercadopago.com".to_string()),
            payment_notification_url: env::var("PAYMENT_NOTIFICATION_URL").ok()
                .filter(|url| !url.is_empty()),
            push_function_path: env::var("PUSH_FUNCTION_PATH")
                .unwrap_or_else(|_| "/functions/v1/send-push".to_string()),
            http_timeout_secs: parse_or_default("HTTP_TIMEOUT_SECS", 10),
            business_utc_offset_minutes: parse_or_default("BUSINESS_UTC_OFFSET_MINUTES", -180),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_service_role_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    /// Key used for server-side PostgREST calls. Falls back to the anon key
    /// so local setups without a service role still reach the database.
    pub fn database_key(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}

fn parse_or_default<T: std::str::FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_keys(anon: &str, service: &str) -> AppConfig {
        AppConfig {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: anon.to_string(),
            supabase_service_role_key: service.to_string(),
            supabase_jwt_secret: "secret".to_string(),
            mercadopago_api_url: "https://api.mercadopago.com".to_string(),
            payment_notification_url: None,
            push_function_path: "/functions/v1/send-push".to_string(),
            http_timeout_secs: 10,
            business_utc_offset_minutes: -180,
        }
    }

    #[test]
    fn test_database_key_prefers_service_role() {
        assert_eq!(config_with_keys("anon", "service").database_key(), "service");
        assert_eq!(config_with_keys("anon", "").database_key(), "anon");
    }

    #[test]
    fn test_is_configured_requires_service_role() {
        assert!(config_with_keys("anon", "service").is_configured());
        assert!(!config_with_keys("anon", "").is_configured());
    }
}

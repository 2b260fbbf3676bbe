use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub bcrypt_cost: u32,
    pub reset_token_expiration_secs: u64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub request_timeout_secs: u64,
    pub db_max_connections: u32,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub admin_user_ids: Vec<i64>,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET")?;
        // 空密钥等同于未配置
        if jwt_secret.trim().is_empty() {
            return Err(env::VarError::NotPresent);
        }

        let reset_token_expiration = env::var("RESET_TOKEN_EXPIRATION")
            .ok()
            .and_then(|v| v.trim_end_matches('m').parse::<u64>().ok())
            .unwrap_or(15);

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            jwt_secret,
            bcrypt_cost: env_or("BCRYPT_COST", bcrypt::DEFAULT_COST)
                .clamp(MIN_BCRYPT_COST, MAX_BCRYPT_COST),
            reset_token_expiration_secs: reset_token_expiration * 60,
            rate_limit_window_secs: env_or("RATE_LIMIT_WINDOW", 60),
            rate_limit_requests: env_or("RATE_LIMIT_REQUESTS", 100),
            request_timeout_secs: env_or("REQUEST_TIMEOUT", 30),
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            server_port: env_or("SERVER_PORT", 8080),
            api_base_uri: env::var("API_BASE_URI").unwrap_or_else(|_| "/api".into()),
            admin_user_ids: env::var("ADMIN_USER_IDS")
                .map(|v| parse_id_list(&v))
                .unwrap_or_default(),
        })
    }

    pub fn reset_token_expiration(&self) -> Duration {
        Duration::from_secs(self.reset_token_expiration_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_user_ids.contains(&user_id)
    }
}

const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_id_list(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_list_skips_garbage() {
        assert_eq!(parse_id_list("1, 2,x,,42"), vec![1, 2, 42]);
        assert!(parse_id_list("").is_empty());
    }
}

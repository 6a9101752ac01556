use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub llm_provider: String,
    pub llm_timeout_secs: u64,
    pub groq_api_key: String,
    pub groq_model: String,
    pub ollama_url: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_whatsapp_number: String,
    pub operator_phone: String,
    pub open_days: Vec<chrono::Weekday>,
    pub service_start: String,
    pub service_end: String,
    pub max_party_size: u32,
    pub conversation_ttl_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "mesabot.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            llm_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "ollama".to_string()),
            llm_timeout_secs: env::var("LLM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
            groq_model: env::var("GROQ_MODEL")
                .unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string()),
            ollama_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_whatsapp_number: env::var("TWILIO_WHATSAPP_NUMBER").unwrap_or_default(),
            operator_phone: env::var("OPERATOR_PHONE").unwrap_or_default(),
            open_days: parse_open_days(
                &env::var("OPEN_DAYS").unwrap_or_else(|_| "sat,sun".to_string()),
            ),
            service_start: env::var("SERVICE_START").unwrap_or_else(|_| "13:00".to_string()),
            service_end: env::var("SERVICE_END").unwrap_or_else(|_| "16:30".to_string()),
            max_party_size: env::var("MAX_PARTY_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(12),
            conversation_ttl_minutes: env::var("CONVERSATION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }
}

fn parse_open_days(value: &str) -> Vec<chrono::Weekday> {
    value
        .split(',')
        .filter_map(|d| match d.trim().to_lowercase().as_str() {
            "mon" => Some(chrono::Weekday::Mon),
            "tue" => Some(chrono::Weekday::Tue),
            "wed" => Some(chrono::Weekday::Wed),
            "thu" => Some(chrono::Weekday::Thu),
            "fri" => Some(chrono::Weekday::Fri),
            "sat" => Some(chrono::Weekday::Sat),
            "sun" => Some(chrono::Weekday::Sun),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_open_days() {
        let days = parse_open_days("sat,sun");
        assert_eq!(days, vec![chrono::Weekday::Sat, chrono::Weekday::Sun]);
    }

    #[test]
    fn test_parse_open_days_ignores_garbage() {
        let days = parse_open_days("sat,xyz, fri ");
        assert_eq!(days, vec![chrono::Weekday::Sat, chrono::Weekday::Fri]);
    }
}

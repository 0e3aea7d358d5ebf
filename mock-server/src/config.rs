// Mock server configuration
use std::env;

/// Which device API the server speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockVariant {
    /// `GET /api/output`, `POST /api/output/:id`, `output` events
    Single,
    /// `/api/digital-{input,output}?id=<n>` plus simulated input events
    Routed,
}

impl MockVariant {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "a" => Some(MockVariant::Single),
            "routed" | "b" => Some(MockVariant::Routed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub host: String,
    pub port: u16,
    pub variant: MockVariant,
    pub output_count: usize,
    pub input_count: usize,
    pub digital_input_period_ms: u64,
    pub analog_period_ms: u64,
    /// Events buffered per SSE client before it starts skipping
    pub broadcast_capacity: usize,
}

impl MockConfig {
    pub fn for_variant(variant: MockVariant) -> Self {
        let output_count = match variant {
            MockVariant::Single => 3,
            MockVariant::Routed => 4,
        };
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            variant,
            output_count,
            input_count: 4,
            digital_input_period_ms: 1000,
            analog_period_ms: 100,
            broadcast_capacity: 256,
        }
    }

    pub fn from_env() -> Self {
        let variant = env::var("IOPANEL_MOCK_VARIANT")
            .ok()
            .and_then(|v| MockVariant::parse(&v))
            .unwrap_or(MockVariant::Routed);
        let mut cfg = Self::for_variant(variant);

        if let Ok(host) = env::var("IOPANEL_MOCK_HOST") {
            cfg.host = host;
        }
        if let Some(port) = env::var("IOPANEL_MOCK_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            cfg.port = port;
        }
        if let Some(ms) = env_u64("IOPANEL_MOCK_DIGITAL_PERIOD_MS") {
            cfg.digital_input_period_ms = ms;
        }
        if let Some(ms) = env_u64("IOPANEL_MOCK_ANALOG_PERIOD_MS") {
            cfg.analog_period_ms = ms;
        }
        cfg
    }

    /// Ephemeral localhost port, for tests
    pub fn local(variant: MockVariant) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..Self::for_variant(variant)
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.parse().ok()).filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_sizes_match_device_apis() {
        let single = MockConfig::for_variant(MockVariant::Single);
        assert_eq!(single.output_count, 3);
        assert_eq!(single.port, 4000);

        let routed = MockConfig::for_variant(MockVariant::Routed);
        assert_eq!(routed.output_count, 4);
        assert_eq!(routed.input_count, 4);
        assert_eq!(routed.digital_input_period_ms, 1000);
        assert_eq!(routed.analog_period_ms, 100);
    }

    #[test]
    fn variant_parse_accepts_aliases() {
        assert_eq!(MockVariant::parse("Single"), Some(MockVariant::Single));
        assert_eq!(MockVariant::parse("b"), Some(MockVariant::Routed));
        assert_eq!(MockVariant::parse("grpc"), None);
    }
}

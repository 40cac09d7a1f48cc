use crate::error::{to_env_var, ConfigError};
use chatbridge::providers::{
    configs::{
        OllamaProviderConfig, OpenAiProviderConfig, ProviderConfig, TogetherProviderConfig,
    },
    factory::ProviderType,
    ollama, openai, together,
};
use config::{Config, Environment};
use serde::{de, Deserialize, Deserializer};
use std::{fmt::Display, net::SocketAddr, str::FromStr};

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    Together {
        #[serde(default = "default_together_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_together_model")]
        model: String,
        #[serde(default, deserialize_with = "optional_number")]
        temperature: Option<f32>,
        #[serde(
            default = "default_together_max_tokens",
            deserialize_with = "optional_number"
        )]
        max_tokens: Option<i32>,
    },
    OpenAi {
        #[serde(default = "default_openai_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default, deserialize_with = "optional_number")]
        temperature: Option<f32>,
        #[serde(default, deserialize_with = "optional_number")]
        max_tokens: Option<i32>,
    },
    Ollama {
        #[serde(default = "default_ollama_host")]
        host: String,
        #[serde(default = "default_ollama_model")]
        model: String,
        #[serde(default, deserialize_with = "optional_number")]
        temperature: Option<f32>,
        #[serde(default, deserialize_with = "optional_number")]
        max_tokens: Option<i32>,
    },
}

impl ProviderSettings {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            ProviderSettings::Together { .. } => ProviderType::Together,
            ProviderSettings::OpenAi { .. } => ProviderType::OpenAi,
            ProviderSettings::Ollama { .. } => ProviderType::Ollama,
        }
    }

    // Convert to the chatbridge ProviderConfig
    pub fn into_config(self) -> ProviderConfig {
        match self {
            ProviderSettings::Together {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::Together(TogetherProviderConfig {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            }),
            ProviderSettings::OpenAi {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::OpenAi(OpenAiProviderConfig {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            }),
            ProviderSettings::Ollama {
                host,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::Ollama(OllamaProviderConfig {
                host,
                model,
                temperature,
                max_tokens,
            }),
        }
    }
}

/// How each chat request is shaped before it reaches the provider
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatSettings {
    /// Sent as the system message of every conversation
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Appended, lower-cased, to the text of every incoming user message
    #[serde(default)]
    pub instruction_suffix: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub chat: ChatSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Server defaults
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("CHATBRIDGE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                // Handle both NotFound and missing field message variants
                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    // Extract field name from error message "missing field `type`"
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    let env_var = to_env_var(field);
                    Err(ConfigError::MissingEnvVar { env_var })
                } else if let config::ConfigError::NotFound(field) = &err {
                    let env_var = to_env_var(field);
                    Err(ConfigError::MissingEnvVar { env_var })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString<T> {
    Number(T),
    String(String),
}

// Environment values arrive as strings; the tagged provider enum buffers them
// before the field type is known, so numbers are parsed here.
fn optional_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    match Option::<NumberOrString<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(value)) => Ok(Some(value)),
        Some(NumberOrString::String(value)) => {
            value.trim().parse().map(Some).map_err(de::Error::custom)
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_together_host() -> String {
    together::TOGETHER_HOST.to_string()
}

fn default_together_model() -> String {
    together::TOGETHER_MODEL.to_string()
}

fn default_together_max_tokens() -> Option<i32> {
    Some(together::TOGETHER_MAX_TOKENS)
}

fn default_openai_host() -> String {
    openai::OPENAI_HOST.to_string()
}

fn default_openai_model() -> String {
    openai::OPENAI_MODEL.to_string()
}

fn default_ollama_host() -> String {
    ollama::OLLAMA_HOST.to_string()
}

fn default_ollama_model() -> String {
    ollama::OLLAMA_MODEL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("CHATBRIDGE_") {
                env::remove_var(&key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();
        env::set_var("CHATBRIDGE_PROVIDER__TYPE", "together");
        env::set_var("CHATBRIDGE_PROVIDER__API_KEY", "test-key");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 3000);
        assert!(settings.chat.system_prompt.is_none());
        assert!(settings.chat.instruction_suffix.is_none());

        if let ProviderSettings::Together {
            host,
            api_key,
            model,
            temperature,
            max_tokens,
        } = settings.provider
        {
            assert_eq!(host, "https://api.together.xyz");
            assert_eq!(api_key, "test-key");
            assert_eq!(model, "meta-llama/Llama-3-8b-chat-hf");
            assert_eq!(temperature, None);
            assert_eq!(max_tokens, Some(1024));
        } else {
            panic!("Expected Together provider");
        }

        clean_env();
    }

    #[test]
    #[serial]
    fn test_openai_settings() {
        clean_env();
        env::set_var("CHATBRIDGE_PROVIDER__TYPE", "openai");
        env::set_var("CHATBRIDGE_PROVIDER__API_KEY", "sk-test");
        env::set_var("CHATBRIDGE_PROVIDER__MODEL", "gpt-4o-mini");
        env::set_var("CHATBRIDGE_PROVIDER__TEMPERATURE", "0.7");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.provider.provider_type(), ProviderType::OpenAi);
        if let ProviderSettings::OpenAi {
            host,
            model,
            temperature,
            max_tokens,
            ..
        } = settings.provider
        {
            assert_eq!(host, "https://api.openai.com");
            assert_eq!(model, "gpt-4o-mini");
            assert_eq!(temperature, Some(0.7));
            assert_eq!(max_tokens, None);
        } else {
            panic!("Expected OpenAI provider");
        }

        clean_env();
    }

    #[test]
    #[serial]
    fn test_ollama_settings() {
        clean_env();
        env::set_var("CHATBRIDGE_PROVIDER__TYPE", "ollama");
        env::set_var("CHATBRIDGE_PROVIDER__HOST", "http://custom.ollama.host");
        env::set_var("CHATBRIDGE_PROVIDER__MAX_TOKENS", "2000");

        let settings = Settings::new().unwrap();
        let config = settings.provider.into_config();
        assert_eq!(config.model(), "qwen2.5");
        match config {
            ProviderConfig::Ollama(config) => {
                assert_eq!(config.host, "http://custom.ollama.host");
                assert_eq!(config.model, "qwen2.5");
                assert_eq!(config.max_tokens, Some(2000));
            }
            other => panic!("Expected Ollama provider, got {:?}", other),
        }

        clean_env();
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("CHATBRIDGE_SERVER__PORT", "8080");
        env::set_var("CHATBRIDGE_PROVIDER__TYPE", "together");
        env::set_var("CHATBRIDGE_PROVIDER__API_KEY", "test-key");
        env::set_var("CHATBRIDGE_CHAT__SYSTEM_PROMPT", "You are a helpful assistant.");
        env::set_var("CHATBRIDGE_CHAT__INSTRUCTION_SUFFIX", " Always answer in Vietnamese.");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(
            settings.chat.system_prompt.as_deref(),
            Some("You are a helpful assistant.")
        );
        assert_eq!(
            settings.chat.instruction_suffix.as_deref(),
            Some(" Always answer in Vietnamese.")
        );

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_api_key() {
        clean_env();
        env::set_var("CHATBRIDGE_PROVIDER__TYPE", "together");

        let err = Settings::new().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required environment variable: CHATBRIDGE_PROVIDER__API_KEY"
        );

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_provider() {
        clean_env();

        let err = Settings::new().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required environment variable: CHATBRIDGE_PROVIDER__TYPE"
        );
    }

    #[test]
    #[serial]
    fn test_numeric_looking_strings_stay_strings() {
        clean_env();
        env::set_var("CHATBRIDGE_PROVIDER__TYPE", "together");
        env::set_var("CHATBRIDGE_PROVIDER__API_KEY", "00123");
        env::set_var("CHATBRIDGE_PROVIDER__MODEL", "42");
        env::set_var("CHATBRIDGE_PROVIDER__MAX_TOKENS", "512");
        env::set_var("CHATBRIDGE_CHAT__SYSTEM_PROMPT", "true");
        env::set_var("CHATBRIDGE_CHAT__INSTRUCTION_SUFFIX", "1.5");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.chat.system_prompt.as_deref(), Some("true"));
        assert_eq!(settings.chat.instruction_suffix.as_deref(), Some("1.5"));
        match settings.provider.into_config() {
            ProviderConfig::Together(config) => {
                assert_eq!(config.api_key, "00123");
                assert_eq!(config.model, "42");
                assert_eq!(config.max_tokens, Some(512));
            }
            other => panic!("Expected Together provider, got {:?}", other),
        }

        clean_env();
    }

    #[test]
    #[serial]
    fn test_invalid_number_is_rejected() {
        clean_env();
        env::set_var("CHATBRIDGE_PROVIDER__TYPE", "ollama");
        env::set_var("CHATBRIDGE_PROVIDER__TEMPERATURE", "warm");

        assert!(matches!(Settings::new(), Err(ConfigError::Other(_))));

        clean_env();
    }

    #[test]
    fn test_socket_addr_conversion() {
        let server_settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let addr = server_settings.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");

        let invalid = ServerSettings {
            host: "not a host".to_string(),
            port: 3000,
        };
        assert!(invalid.socket_addr().is_err());
    }
}

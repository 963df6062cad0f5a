use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment,
    parse_positive_u64, parse_ratio, parse_store_backend, parse_u16, parse_u64,
};
use super::secret::load_or_create_secret_key;
use super::types::{
    AnalyticsSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings,
    RuntimeSettings, SecuritySettings, ServerHost, ServerPort, ServerSettings, SessionSettings,
    Settings, StoreBackend, StoreSettings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("EXAMPRO_HOST", "0.0.0.0");
        let port = env_or_default("EXAMPRO_PORT", "8000");

        let environment =
            parse_environment(env_optional("EXAMPRO_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("EXAMPRO_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "ExamPro API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let (secret_key, secret_from_env) = match env_optional("SECRET_KEY") {
            Some(value) => (value, true),
            None if strict_config => (String::new(), false),
            None => (load_or_create_secret_key(), false),
        };
        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "exampro");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "exampro_db");
        let database_url = env_optional("DATABASE_URL");

        let backend = parse_store_backend(env_optional("EXAMPRO_STORE"))?;

        let tick_millis =
            parse_positive_u64("SESSION_TICK_MILLIS", env_or_default("SESSION_TICK_MILLIS", "1000"))?;
        let poll_interval_seconds = parse_positive_u64(
            "SESSION_POLL_INTERVAL_SECONDS",
            env_or_default("SESSION_POLL_INTERVAL_SECONDS", "5"),
        )?;
        let retention_seconds = parse_u64(
            "SESSION_RETENTION_SECONDS",
            env_or_default("SESSION_RETENTION_SECONDS", "600"),
        )?;
        let prune_interval_seconds = parse_positive_u64(
            "SESSION_PRUNE_INTERVAL_SECONDS",
            env_or_default("SESSION_PRUNE_INTERVAL_SECONDS", "60"),
        )?;

        let pass_ratio = parse_ratio("PASS_RATIO", env_or_default("PASS_RATIO", "0.4"))?;

        let log_level = env_or_default("EXAMPRO_LOG_LEVEL", "info");
        let json = env_optional("EXAMPRO_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings { secret_key, secret_from_env, algorithm },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            store: StoreSettings { backend },
            session: SessionSettings {
                tick_millis,
                poll_interval_seconds,
                retention_seconds,
                prune_interval_seconds,
            },
            analytics: AnalyticsSettings { pass_ratio },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn store(&self) -> &StoreSettings {
        &self.store
    }

    pub(crate) fn session(&self) -> &SessionSettings {
        &self.session
    }

    pub(crate) fn analytics(&self) -> &AnalyticsSettings {
        &self.analytics
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.security.algorithm != "HS256" {
            return Err(ConfigError::InvalidValue {
                field: "ALGORITHM",
                value: self.security.algorithm.clone(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if !self.security.secret_from_env {
            return Err(ConfigError::MissingSecret("SECRET_KEY"));
        }

        if self.store.backend == StoreBackend::Postgres
            && self.database.database_url.is_none()
            && self.database.postgres_password.is_empty()
        {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[tokio::test]
    async fn defaults_load_in_development() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::remove_var("SESSION_POLL_INTERVAL_SECONDS");

        let settings = Settings::load().expect("settings");
        assert_eq!(settings.session().poll_interval_seconds, 5);
        assert_eq!(settings.session().tick_millis, 1000);
        assert_eq!(settings.analytics().pass_ratio, 0.4);
        assert_eq!(settings.store().backend, StoreBackend::Memory);
    }

    #[tokio::test]
    async fn strict_mode_requires_secret_key() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::remove_var("SECRET_KEY");
        std::env::set_var("EXAMPRO_STRICT_CONFIG", "1");

        let result = Settings::load();
        std::env::set_var("EXAMPRO_STRICT_CONFIG", "0");

        assert!(matches!(result, Err(ConfigError::MissingSecret("SECRET_KEY"))));
    }

    #[tokio::test]
    async fn zero_poll_interval_is_rejected() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("SESSION_POLL_INTERVAL_SECONDS", "0");

        let result = Settings::load();
        std::env::remove_var("SESSION_POLL_INTERVAL_SECONDS");

        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field: "SESSION_POLL_INTERVAL_SECONDS", .. })
        ));
    }
}

//! Environment-backed configuration.
//!
//! Values are read once from the process environment (after loading a `.env` file if one is
//! present) and deserialized into [`Env`] through a small serde deserializer that maps each
//! variable name onto a struct field.

use std::sync::LazyLock;
use std::time::Duration;

use serde::Deserialize;
use serde::de::value::MapDeserializer;
use serde::de::{self, IntoDeserializer};
use thiserror::Error;
use tokio::sync::OnceCell;

static ENV_VARS: LazyLock<OnceCell<Env>> = LazyLock::new(OnceCell::new);

/// Returns the process-wide configuration, reading it on first use.
pub async fn config() -> EnvResult<&'static Env> {
    ENV_VARS.get_or_try_init(|| async { Env::new() }).await
}

pub async fn get_var(var: Var) -> EnvResult<&'static str> {
    let vars = config().await?;
    Ok(match var {
        Var::DatabaseUrl => &vars.database_url,
        Var::CorsAllowOrigins => &vars.cors_allow_origins,
        Var::ViewerHeader => &vars.viewer_header,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Env {
    pub database_url: String,
    #[serde(default = "default_port")]
    pub server_api_port: u16,
    #[serde(default = "default_cors")]
    pub cors_allow_origins: String,
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,
    #[serde(default = "default_service_name")]
    pub api_service_name: String,
    #[serde(default = "default_tracer_name")]
    pub api_tracer_name: String,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default = "default_limit")]
    pub leaderboard_default_limit: i64,
    #[serde(default = "max_limit")]
    pub leaderboard_max_limit: i64,
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,
    #[serde(default = "default_viewer_header")]
    pub viewer_header: String,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

impl Env {
    pub fn new() -> EnvResult<Self> {
        match dotenvy::dotenv() {
            Ok(_) => (),
            Err(e) if e.not_found() => (),
            Err(e) => return Err(e.into()),
        }

        let env = from_env::<Env>()?;
        env.check_limits()?;

        Ok(env)
    }

    /// Rejects limit settings that would leave requests without an explicit limit unservable.
    pub fn check_limits(&self) -> EnvResult<()> {
        let (default, max) = (self.leaderboard_default_limit, self.leaderboard_max_limit);
        if default < 1 || default > max {
            return Err(EnvErr::InvalidLimits { default, max });
        }

        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Var {
    DatabaseUrl,
    CorsAllowOrigins,
    ViewerHeader,
}

#[macro_export]
macro_rules! var {
    ($ev:expr) => {
        $crate::util::env::get_var($ev)
    };
}

const fn default_port() -> u16 {
    3000
}

const fn default_limit() -> i64 {
    10
}

const fn max_limit() -> i64 {
    100
}

const fn default_store_timeout() -> u64 {
    5000
}

const fn default_true() -> bool {
    true
}

fn default_cors() -> String {
    String::from("*")
}

fn default_service_name() -> String {
    String::from("fitness-leaderboard")
}

fn default_tracer_name() -> String {
    String::from("leaderboard-tracer")
}

fn default_log_filter() -> String {
    String::from("fitness_leaderboard=debug,tower_http=debug,axum=debug,sqlx=info,info")
}

fn default_viewer_header() -> String {
    String::from("x-member-id")
}

// ---
//  Deserializer implementation
// ---

/// A single environment value, tagged with the variable it came from for error messages.
struct Val {
    name: String,
    raw: String,
}

impl<'de> IntoDeserializer<'de, EnvDeserializeError> for Val {
    type Deserializer = Self;
    fn into_deserializer(self) -> Self::Deserializer {
        self
    }
}

macro_rules! forward_parsed_vals {
    ($($ty:ident => $method:ident,)*) => {
        $(
            fn $method<V>(self, visitor: V) -> Result<V::Value, EnvDeserializeError>
            where
                V: de::Visitor<'de>
            {
                match self.raw.trim().parse::<$ty>() {
                    Ok(val) => val.into_deserializer().$method(visitor),
                    Err(e) => Err(de::Error::custom(format_args!(
                        "{}: while parsing '{}' (provider: {})",
                        e, self.raw, self.name
                    ))),
                }
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for Val {
    type Error = EnvDeserializeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_string(self.raw)
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        if self.raw.is_empty() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V>(
        self,
        _: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    forward_parsed_vals! {
        bool => deserialize_bool,
        u16 => deserialize_u16,
        u32 => deserialize_u32,
        u64 => deserialize_u64,
        i32 => deserialize_i32,
        i64 => deserialize_i64,
    }

    serde::forward_to_deserialize_any! {
        i8 i16 u8 f32 f64 char str string unit bytes byte_buf map seq
        unit_struct tuple_struct identifier tuple enum
        ignored_any struct
    }
}

pub fn from_env<T>() -> Result<T, EnvDeserializeError>
where
    T: de::DeserializeOwned,
{
    from_iter(dotenvy::vars())
}

pub fn from_iter<Iter, T>(iter: Iter) -> Result<T, EnvDeserializeError>
where
    T: de::DeserializeOwned,
    Iter: IntoIterator<Item = (String, String)>,
{
    let pairs = iter
        .into_iter()
        .map(|(name, raw)| (name.clone(), Val { name, raw }));

    T::deserialize(MapDeserializer::new(pairs))
}

impl de::Error for EnvDeserializeError {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        EnvDeserializeError::Custom(msg.to_string())
    }

    fn missing_field(field: &'static str) -> Self {
        EnvDeserializeError::MissingValue(field.to_uppercase())
    }
}

pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error(transparent)]
    Dotenvy(#[from] dotenvy::Error),

    #[error(transparent)]
    DeserializationError(#[from] EnvDeserializeError),

    #[error(
        "LEADERBOARD_DEFAULT_LIMIT ({default}) must be between 1 and LEADERBOARD_MAX_LIMIT ({max})"
    )]
    InvalidLimits { default: i64, max: i64 },
}

#[derive(Debug, Error)]
pub enum EnvDeserializeError {
    #[error("env deserialization error: {0}")]
    Custom(String),

    #[error("missing environment variable {0}")]
    MissingValue(String),
}

use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::policy::BlockShapePolicy;
use crate::policy::DynamicShape;
use crate::policy::ShapeExprError;

/// Number of leading channel axes. Defaults to 0.
pub const NDTILE_CHANNEL_AXES: &str = "NDTILE_CHANNEL_AXES";

/// Explicit block shape, as comma separated sizes (e.g. "32,32").
pub const NDTILE_BLOCK_SHAPE: &str = "NDTILE_BLOCK_SHAPE";

/// Block shape code, e.g. "(32, 2 * n + 16)".
pub const NDTILE_SHAPE_CODE: &str = "NDTILE_SHAPE_CODE";

/// Set to "1" or "true" to reject extents that are not a multiple of the
/// block size instead of truncating them.
pub const NDTILE_REQUIRE_DIVISIBLE: &str = "NDTILE_REQUIRE_DIVISIBLE";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("invalid shape code")]
    ShapeCode(#[from] ShapeExprError),

    #[error("block shape {explicit:?} conflicts with shape code {code} ({derived:?})")]
    ConflictingBlockShape {
        explicit: Vec<usize>,
        code: String,
        derived: Vec<usize>,
    },

    #[error("no block shape configured")]
    MissingBlockShape,
}

/// How to tile an array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    /// Leading axes that are never partitioned or padded.
    pub channel_axes: usize,
    /// Explicit block sizes, one per spatial axis.
    pub block_shape: Option<Vec<usize>>,
    /// A block shape code; its base shape is used.
    pub shape_code: Option<DynamicShape>,
    /// Reject spatial extents that are not a multiple of the block size.
    pub require_divisible: bool,
}

impl TilingConfig {
    /// Read the configuration from the `NDTILE_*` environment variables.
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name
    /// to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup(NDTILE_CHANNEL_AXES) {
            config.channel_axes = parse_value(NDTILE_CHANNEL_AXES, value.trim())?;
        }
        if let Some(value) = lookup(NDTILE_BLOCK_SHAPE) {
            config.block_shape = Some(
                value
                    .split(',')
                    .map(|size| parse_value(NDTILE_BLOCK_SHAPE, size.trim()))
                    .collect::<Result<_, _>>()?,
            );
        }
        if let Some(value) = lookup(NDTILE_SHAPE_CODE) {
            config.shape_code = Some(DynamicShape::parse(&value)?);
        }
        if let Some(value) = lookup(NDTILE_REQUIRE_DIVISIBLE) {
            config.require_divisible = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: NDTILE_REQUIRE_DIVISIBLE.to_string(),
                        value,
                        reason: "expected a boolean".to_string(),
                    });
                }
            };
        }
        Ok(config)
    }

    /// The configured block shape. When both an explicit shape and a
    /// shape code are present they must agree.
    pub fn block_shape(&self) -> Result<Vec<usize>, ConfigError> {
        match (&self.block_shape, &self.shape_code) {
            (Some(explicit), Some(code)) => {
                let derived = code.block_shape();
                if *explicit != derived {
                    return Err(ConfigError::ConflictingBlockShape {
                        explicit: explicit.clone(),
                        code: code.code().to_string(),
                        derived,
                    });
                }
                Ok(derived)
            }
            (Some(explicit), None) => Ok(explicit.clone()),
            (None, Some(code)) => Ok(code.block_shape()),
            (None, None) => Err(ConfigError::MissingBlockShape),
        }
    }

    /// The configured block shape as a policy.
    pub fn block_shape_policy(&self) -> Result<Box<dyn BlockShapePolicy>, ConfigError> {
        let shape = self.block_shape()?;
        match (&self.block_shape, &self.shape_code) {
            (None, Some(code)) => Ok(Box::new(code.clone())),
            _ => Ok(Box::new(shape)),
        }
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|err: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: err.to_string(),
    })
}

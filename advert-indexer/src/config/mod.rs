//! Configuration and dependency initialization.

mod dependencies;
mod settings;

pub use dependencies::Dependencies;
pub use settings::{
    AdvertApiSettings, CacheSettings, ConnectionMode, OpenSearchSettings, ServerSettings, Settings, CONFIG_PATH_ENV,
    DEFAULT_CONFIG_PATH,
};

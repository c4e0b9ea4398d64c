#![crate_type = "rlib"]

#[macro_use]
extern crate rocket;
#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

pub mod assignment;
pub mod backend;
pub mod editor;
pub mod error;
pub mod forms;
pub mod geometry;
pub mod invite;
pub mod layout;
pub mod models;
pub mod service;
pub mod store;
pub mod views;
pub mod workflow;

use std::sync::Arc;

pub type SharedBackend = Arc<backend::Backend>;

/// Namespace prefix attached to a [`TypedUUIDField`] when it is displayed.
pub trait IdKind {
    const PREFIX: &'static str;
}

pub struct TypedUUIDField<K: IdKind> {
    pub uuid: uuid::Uuid,
    kind: std::marker::PhantomData<K>,
}

impl<K: IdKind> TypedUUIDField<K> {
    pub fn new() -> Self {
        Self::from_uuid(uuid::Uuid::new_v4())
    }

    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self {
            uuid,
            kind: std::marker::PhantomData,
        }
    }
}

impl<K: IdKind> Default for TypedUUIDField<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: IdKind> Clone for TypedUUIDField<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: IdKind> Copy for TypedUUIDField<K> {}

impl<K: IdKind> PartialEq for TypedUUIDField<K> {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl<K: IdKind> Eq for TypedUUIDField<K> {}

impl<K: IdKind> std::hash::Hash for TypedUUIDField<K> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.uuid.hash(state)
    }
}

impl<K: IdKind> PartialOrd for TypedUUIDField<K> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: IdKind> Ord for TypedUUIDField<K> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.uuid.cmp(&other.uuid)
    }
}

impl<K: IdKind> std::fmt::Display for TypedUUIDField<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}_{}", K::PREFIX, self.uuid.to_simple().encode_lower(&mut uuid::Uuid::encode_buffer())))?;
        Ok(())
    }
}

impl<K: IdKind> std::fmt::Debug for TypedUUIDField<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl<K: IdKind> std::str::FromStr for TypedUUIDField<K> {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match uuid::Uuid::parse_str(s.strip_prefix(&format!("{}_", K::PREFIX)).unwrap_or(s)) {
            Ok(id) => Ok(Self::from_uuid(id)),
            Err(_) => Err("invalid UUID")
        }
    }
}

impl<'a, K: IdKind> rocket::request::FromParam<'a> for TypedUUIDField<K> {
    type Error = &'static str;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse()
    }
}

impl<K: IdKind> serde::Serialize for TypedUUIDField<K> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where S: serde::Serializer {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de, K: IdKind> serde::Deserialize<'de> for TypedUUIDField<K> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error> where D: serde::Deserializer<'de> {
        use serde::de::Error;
        use serde::Deserialize;
        let string = String::deserialize(deserializer)?;
        string.parse().map_err(|err: &'static str| Error::custom(err))
    }
}

fn default_page_size() -> usize {
    20
}

fn default_max_page_size() -> usize {
    100
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    /// Base URI signing links are built against.
    pub external_uri: String,
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
    #[serde(default)]
    pub seed_demo: bool,
}

impl Config {
    pub fn new(external_uri: &str) -> Self {
        Self {
            external_uri: external_uri.trim_end_matches('/').to_string(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            seed_demo: false,
        }
    }
}

pub struct App {
    pub rocket: rocket::Rocket<rocket::Build>,
    pub backend: SharedBackend,
}

impl App {
    pub fn new(rocket: rocket::Rocket<rocket::Build>, config: Config, repository: Arc<dyn store::Repository>) -> App {
        let backend = Arc::new(backend::Backend::new(repository, config.clone()));
        App {
            rocket: rocket.manage(config).manage(backend.clone()),
            backend,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("unable to read config: {0}")]
    Config(#[from] rocket::figment::Error),
    #[error("unable to seed repository: {0}")]
    Seed(#[from] store::StoreError),
}

pub fn setup() -> Result<App, SetupError> {
    let rocket = rocket::build();
    let figment = rocket.figment();
    let mut config = figment.extract::<Config>()?;
    config.external_uri = config.external_uri.trim_end_matches('/').to_string();

    let repository = Arc::new(store::MemoryRepository::new());
    if config.seed_demo {
        info!("Seeding in-memory repository with demo data");
        repository.initialize(store::Seed::demo())?;
    }

    Ok(App::new(rocket, config, repository))
}

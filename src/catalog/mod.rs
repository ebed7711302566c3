use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{
    DisplayProfile, MatrixProfile, MediaServerProfile, ReceiverProfile, ScreenProfile,
    SourceProfile, SpeakerProfile,
};

const BUILTIN: &str = include_str!("../../data/catalog.toml");

/// Read-only lookup of equipment profiles by catalog id.
pub trait ProfileCatalog {
    fn display(&self, id: &str) -> Option<&DisplayProfile>;
    fn matrix(&self, id: &str) -> Option<&MatrixProfile>;
    fn receiver(&self, id: &str) -> Option<&ReceiverProfile>;
    fn source(&self, id: &str) -> Option<&SourceProfile>;
    fn speakers(&self, id: &str) -> Option<&SpeakerProfile>;
    fn screen(&self, id: &str) -> Option<&ScreenProfile>;
    fn media_server(&self, id: &str) -> Option<&MediaServerProfile>;
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file: {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog ({origin})")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Displays,
    Matrices,
    Receivers,
    Sources,
    Speakers,
    Screens,
    MediaServers,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Displays,
        Category::Matrices,
        Category::Receivers,
        Category::Sources,
        Category::Speakers,
        Category::Screens,
        Category::MediaServers,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Category::Displays => "displays",
            Category::Matrices => "matrices",
            Category::Receivers => "receivers",
            Category::Sources => "sources",
            Category::Speakers => "speakers",
            Category::Screens => "screens",
            Category::MediaServers => "media_servers",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "display" | "displays" => Ok(Category::Displays),
            "matrix" | "matrices" | "hdfury" | "hdfury_devices" => Ok(Category::Matrices),
            "receiver" | "receivers" | "avr" | "avrs" => Ok(Category::Receivers),
            "source" | "sources" => Ok(Category::Sources),
            "speaker" | "speakers" => Ok(Category::Speakers),
            "screen" | "screens" => Ok(Category::Screens),
            "media_server" | "media_servers" => Ok(Category::MediaServers),
            _ => Err(format!(
                "unknown catalog category: {s} (expected displays|matrices|receivers|sources|speakers|screens|media_servers)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub category: Category,
    pub id: String,
    pub name: String,
}

/// Catalog held in memory, deserialized from TOML tables keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryCatalog {
    pub displays: BTreeMap<String, DisplayProfile>,
    pub matrices: BTreeMap<String, MatrixProfile>,
    pub receivers: BTreeMap<String, ReceiverProfile>,
    pub sources: BTreeMap<String, SourceProfile>,
    pub speakers: BTreeMap<String, SpeakerProfile>,
    pub screens: BTreeMap<String, ScreenProfile>,
    pub media_servers: BTreeMap<String, MediaServerProfile>,
}

impl InMemoryCatalog {
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml_str(BUILTIN, "built-in")
    }

    pub fn from_toml_str(s: &str, origin: &str) -> Result<Self, CatalogError> {
        toml::from_str(s).map_err(|source| CatalogError::Parse {
            origin: origin.to_string(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let s = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&s, &path.display().to_string())
    }

    /// Built-in catalog with `user` merged over it, if given.
    pub fn load(user: Option<&Path>) -> Result<Self, CatalogError> {
        let mut catalog = Self::builtin()?;
        if let Some(path) = user {
            catalog.merge(Self::from_file(path)?);
        }
        Ok(catalog)
    }

    /// Entries of `other` replace entries with the same id.
    pub fn merge(&mut self, other: InMemoryCatalog) {
        self.displays.extend(other.displays);
        self.matrices.extend(other.matrices);
        self.receivers.extend(other.receivers);
        self.sources.extend(other.sources);
        self.speakers.extend(other.speakers);
        self.screens.extend(other.screens);
        self.media_servers.extend(other.media_servers);
    }

    pub fn entries(&self, category: Category) -> Vec<CatalogEntry> {
        fn collect<'a, T: 'a>(
            category: Category,
            map: &'a BTreeMap<String, T>,
            name: impl Fn(&T) -> &str,
        ) -> Vec<CatalogEntry> {
            map.iter()
                .map(|(id, p)| CatalogEntry {
                    category,
                    id: id.clone(),
                    name: name(p).to_string(),
                })
                .collect()
        }

        match category {
            Category::Displays => collect(category, &self.displays, |p| &p.name),
            Category::Matrices => collect(category, &self.matrices, |p| &p.name),
            Category::Receivers => collect(category, &self.receivers, |p| &p.name),
            Category::Sources => collect(category, &self.sources, |p| &p.name),
            Category::Speakers => collect(category, &self.speakers, |p| &p.name),
            Category::Screens => collect(category, &self.screens, |p| &p.name),
            Category::MediaServers => collect(category, &self.media_servers, |p| &p.name),
        }
    }
}

impl ProfileCatalog for InMemoryCatalog {
    fn display(&self, id: &str) -> Option<&DisplayProfile> {
        self.displays.get(id)
    }

    fn matrix(&self, id: &str) -> Option<&MatrixProfile> {
        self.matrices.get(id)
    }

    fn receiver(&self, id: &str) -> Option<&ReceiverProfile> {
        self.receivers.get(id)
    }

    fn source(&self, id: &str) -> Option<&SourceProfile> {
        self.sources.get(id)
    }

    fn speakers(&self, id: &str) -> Option<&SpeakerProfile> {
        self.speakers.get(id)
    }

    fn screen(&self, id: &str) -> Option<&ScreenProfile> {
        self.screens.get(id)
    }

    fn media_server(&self, id: &str) -> Option<&MediaServerProfile> {
        self.media_servers.get(id)
    }
}

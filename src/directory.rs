//! Read-only trigger → bang mapping.
//!
//! The directory is populated once at startup (from one or more files in the
//! DuckDuckGo `bang.js` format, later files overriding earlier ones) and then
//! shared by every request without locking.

use std::fs;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Entertainment,
    Multimedia,
    News,
    OnlineServices,
    Research,
    Shopping,
    Tech,
    Translation,
}

impl Category {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Entertainment" => Some(Self::Entertainment),
            "Multimedia" => Some(Self::Multimedia),
            "News" => Some(Self::News),
            "Online Services" => Some(Self::OnlineServices),
            "Research" => Some(Self::Research),
            "Shopping" => Some(Self::Shopping),
            "Tech" => Some(Self::Tech),
            "Translation" => Some(Self::Translation),
            _ => None,
        }
    }
}

/// One bang. `trigger` always carries its leading `!`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bang {
    pub trigger: String,
    pub url_template: String,
    pub domain: Option<String>,
    pub category: Option<Category>,
    pub relevance: Option<u64>,
    pub short_name: Option<String>,
    pub subcategory: Option<String>,
}

impl Bang {
    pub fn new(trigger: impl Into<String>, url_template: impl Into<String>) -> Self {
        let mut trigger = trigger.into();
        if !trigger.starts_with('!') {
            trigger.insert(0, '!');
        }
        Self {
            trigger,
            url_template: url_template.into(),
            domain: None,
            category: None,
            relevance: None,
            short_name: None,
            subcategory: None,
        }
    }

    /// Sets the bare-site redirect target. Schemeless domains get `https://`.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        let mut domain = domain.into();
        if !domain.starts_with("http") {
            domain.insert_str(0, "https://");
        }
        self.domain = Some(domain);
        self
    }
}

#[derive(Debug, Default)]
pub struct Directory {
    bangs: FxHashMap<Box<[u8]>, Bang>,
}

impl Directory {
    pub fn builder() -> DirectoryBuilder {
        DirectoryBuilder::default()
    }

    /// Reads `paths` in order; triggers in later files replace earlier ones.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut builder = Self::builder();
        for path in paths {
            builder.merge_file(path.as_ref())?;
        }
        let directory = builder.build();
        if directory.is_empty() {
            return Err(Error::EmptyDirectory);
        }
        Ok(directory)
    }

    pub fn from_json(origin: &str, json: &[u8]) -> Result<Self> {
        let mut builder = Self::builder();
        builder.merge_json(origin, json)?;
        Ok(builder.build())
    }

    #[inline]
    pub fn get(&self, trigger: &[u8]) -> Option<&Bang> {
        self.bangs.get(trigger)
    }

    pub fn len(&self) -> usize {
        self.bangs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bangs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bang> {
        self.bangs.values()
    }
}

impl FromIterator<Bang> for Directory {
    fn from_iter<I: IntoIterator<Item = Bang>>(iter: I) -> Self {
        let mut builder = Self::builder();
        for bang in iter {
            builder.insert(bang);
        }
        builder.build()
    }
}

#[derive(Debug, Default)]
pub struct DirectoryBuilder {
    bangs: FxHashMap<Box<[u8]>, Bang>,
}

// Field names follow DuckDuckGo's bang.js.
#[derive(Debug, Deserialize)]
struct RawBang {
    t: Option<String>,
    u: Option<String>,
    d: Option<String>,
    c: Option<String>,
    r: Option<i64>,
    s: Option<String>,
    sc: Option<String>,
}

impl RawBang {
    fn into_bang(self) -> Option<Bang> {
        let mut bang = Bang::new(self.t?, self.u?);
        if let Some(domain) = self.d.filter(|d| !d.is_empty()) {
            bang = bang.with_domain(domain);
        }
        bang.category = self.c.as_deref().and_then(Category::parse);
        bang.relevance = self.r.and_then(|r| u64::try_from(r).ok());
        bang.short_name = self.s;
        bang.subcategory = self.sc;
        Some(bang)
    }
}

impl DirectoryBuilder {
    /// Adds `bang`, replacing any entry with the same trigger.
    pub fn insert(&mut self, bang: Bang) -> &mut Self {
        let key = bang.trigger.as_bytes().into();
        self.bangs.insert(key, bang);
        self
    }

    /// Merges a `bang.js` style JSON array. Returns the number of entries read.
    pub fn merge_json(&mut self, origin: &str, json: &[u8]) -> Result<usize> {
        let raw: Vec<RawBang> = serde_json::from_slice(json).map_err(|source| Error::Json {
            origin: origin.to_string(),
            source,
        })?;

        let mut merged = 0;
        for (index, entry) in raw.into_iter().enumerate() {
            match entry.into_bang() {
                Some(bang) => {
                    self.insert(bang);
                    merged += 1;
                }
                None => warn!(origin, index, "skipping bang without trigger or url template"),
            }
        }
        debug!(origin, merged, "merged bang data");
        Ok(merged)
    }

    pub fn merge_file(&mut self, path: &Path) -> Result<usize> {
        let json = fs::read(path).map_err(|source| Error::BangFile {
            path: path.to_path_buf(),
            source,
        })?;
        self.merge_json(&path.display().to_string(), &json)
    }

    pub fn len(&self) -> usize {
        self.bangs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bangs.is_empty()
    }

    pub fn build(self) -> Directory {
        Directory { bangs: self.bangs }
    }
}

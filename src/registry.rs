use crate::error::RegistryError;
use crate::models::{normalize_base_url, AlertLevel, Source};

/// Ordered collection of monitored sources. Persistence lives elsewhere.
#[derive(Debug, Default, Clone)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

pub(crate) fn validate_name(name: &str) -> Result<String, RegistryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RegistryError::Validation("Name is required".into()));
    }
    Ok(name.to_string())
}

pub(crate) fn validate_url(url: &str) -> Result<String, RegistryError> {
    let url = normalize_base_url(url);
    let lower = url.to_lowercase();
    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return Err(RegistryError::Validation("URL must start with http:// or https://".into()));
    }
    if reqwest::Url::parse(&url).is_err() {
        return Err(RegistryError::Validation("URL is not valid".into()));
    }
    Ok(url)
}

fn clean_group(group: Option<&str>) -> Option<String> {
    group.map(str::trim).filter(|g| !g.is_empty()).map(str::to_string)
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from persisted sources, ordered by their stored position.
    pub fn from_sources(mut sources: Vec<Source>) -> Self {
        sources.sort_by_key(|s| s.sort_order);
        SourceRegistry { sources }
    }

    pub fn list(&self) -> &[Source] {
        &self.sources
    }

    pub fn get(&self, id: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Source, RegistryError> {
        self.sources.iter_mut().find(|s| s.id == id).ok_or(RegistryError::NotFound)
    }

    fn next_sort_order(&self) -> i64 {
        self.sources.iter().map(|s| s.sort_order).max().map(|m| m + 1).unwrap_or(0)
    }

    fn ensure_url_free(&self, url: &str, except: Option<&str>) -> Result<(), RegistryError> {
        if self.sources.iter().any(|s| s.base_url == url && Some(s.id.as_str()) != except) {
            return Err(RegistryError::Duplicate("A source with this URL already exists".into()));
        }
        Ok(())
    }

    pub fn add(&mut self, name: &str, base_url: &str, alert_level: AlertLevel, group: Option<&str>) -> Result<Source, RegistryError> {
        let name = validate_name(name)?;
        let base_url = validate_url(base_url)?;
        self.ensure_url_free(&base_url, None)?;
        let source = Source {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            base_url,
            alert_level,
            group: clean_group(group),
            sort_order: self.next_sort_order(),
        };
        self.sources.push(source.clone());
        Ok(source)
    }

    /// Insert a source with a known id (import). Its stored position is kept unless
    /// another source already holds it, in which case it goes to the end.
    pub fn insert(&mut self, mut source: Source) -> Result<Source, RegistryError> {
        if self.get(&source.id).is_some() {
            return Err(RegistryError::Duplicate("A source with this id already exists".into()));
        }
        source.name = validate_name(&source.name)?;
        source.base_url = validate_url(&source.base_url)?;
        self.ensure_url_free(&source.base_url, None)?;
        source.group = clean_group(source.group.as_deref());
        if self.sources.iter().any(|s| s.sort_order == source.sort_order) {
            source.sort_order = self.next_sort_order();
        }
        let idx = self.sources.partition_point(|s| s.sort_order <= source.sort_order);
        self.sources.insert(idx, source.clone());
        Ok(source)
    }

    pub fn rename(&mut self, id: &str, name: &str) -> Result<(), RegistryError> {
        let name = validate_name(name)?;
        self.get_mut(id)?.name = name;
        Ok(())
    }

    /// Returns true when the normalized URL actually changed.
    pub fn set_url(&mut self, id: &str, base_url: &str) -> Result<bool, RegistryError> {
        let url = validate_url(base_url)?;
        if self.get(id).is_none() {
            return Err(RegistryError::NotFound);
        }
        self.ensure_url_free(&url, Some(id))?;
        let source = self.get_mut(id)?;
        if source.base_url == url {
            return Ok(false);
        }
        source.base_url = url;
        Ok(true)
    }

    pub fn set_alert_level(&mut self, id: &str, level: AlertLevel) -> Result<(), RegistryError> {
        self.get_mut(id)?.alert_level = level;
        Ok(())
    }

    pub fn set_group(&mut self, id: &str, group: Option<&str>) -> Result<(), RegistryError> {
        self.get_mut(id)?.group = clean_group(group);
        Ok(())
    }

    /// Reorder to match `ids`. Sources not mentioned keep their relative order after the listed ones.
    pub fn reorder(&mut self, ids: &[String]) -> Result<(), RegistryError> {
        if let Some(unknown) = ids.iter().find(|id| self.get(id).is_none()) {
            return Err(RegistryError::Validation(format!("Unknown source id: {}", unknown)));
        }
        let mut ordered: Vec<Source> = Vec::with_capacity(self.sources.len());
        for id in ids {
            if ordered.iter().any(|s| &s.id == id) {
                continue;
            }
            if let Some(s) = self.get(id) {
                ordered.push(s.clone());
            }
        }
        for s in &self.sources {
            if !ordered.iter().any(|o| o.id == s.id) {
                ordered.push(s.clone());
            }
        }
        for (i, s) in ordered.iter_mut().enumerate() {
            s.sort_order = i as i64;
        }
        self.sources = ordered;
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<Source, RegistryError> {
        let idx = self.sources.iter().position(|s| s.id == id).ok_or(RegistryError::NotFound)?;
        Ok(self.sources.remove(idx))
    }
}

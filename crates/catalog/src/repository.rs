//! Record storage and the lookup contracts consumed by background jobs.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use buildvault_cache::QueryParams;
use buildvault_core::BuildId;

use crate::model::{Build, BuildRef, Tag};

/// Failure reported by a data collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataError {
    /// The record exists but part of it could not be read (e.g. the read
    /// session backing a payload has closed).
    #[error("data unavailable: {0}")]
    Unavailable(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Read-side contract used by the job subsystem.
pub trait BuildSource: Send + Sync {
    /// Resolve a caller-supplied identifier to a record.
    ///
    /// A numeric identifier is tried as a surrogate id first, then as a name.
    fn lookup(&self, identifier: &str) -> Result<Option<BuildRef>, DataError>;

    /// Re-fetch a record with every field, payload included.
    ///
    /// The implementation owns the read-only unit of work around the fetch.
    fn load_full(&self, id: BuildId) -> Result<Option<Build>, DataError>;
}

impl<S> BuildSource for Arc<S>
where
    S: BuildSource + ?Sized,
{
    fn lookup(&self, identifier: &str) -> Result<Option<BuildRef>, DataError> {
        (**self).lookup(identifier)
    }

    fn load_full(&self, id: BuildId) -> Result<Option<Build>, DataError> {
        (**self).load_full(id)
    }
}

/// Record storage used by the cache-backed catalog service.
pub trait BuildRepository: Send + Sync {
    fn get(&self, id: BuildId) -> Option<Build>;
    fn find_by_name(&self, name: &str) -> Option<Build>;
    /// All records, ordered by id.
    fn list(&self) -> Vec<Build>;
    /// Records matching every present filter, ordered by id.
    fn query(&self, params: &QueryParams) -> Vec<Build>;
    /// Insert or replace; returns the previous record with the same id.
    fn upsert(&self, build: Build) -> Option<Build>;
    fn remove(&self, id: BuildId) -> Option<Build>;
}

impl<R> BuildRepository for Arc<R>
where
    R: BuildRepository + ?Sized,
{
    fn get(&self, id: BuildId) -> Option<Build> {
        (**self).get(id)
    }

    fn find_by_name(&self, name: &str) -> Option<Build> {
        (**self).find_by_name(name)
    }

    fn list(&self) -> Vec<Build> {
        (**self).list()
    }

    fn query(&self, params: &QueryParams) -> Vec<Build> {
        (**self).query(params)
    }

    fn upsert(&self, build: Build) -> Option<Build> {
        (**self).upsert(build)
    }

    fn remove(&self, id: BuildId) -> Option<Build> {
        (**self).remove(id)
    }
}

/// In-memory record store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryBuildRepository {
    inner: RwLock<HashMap<BuildId, Build>>,
}

impl InMemoryBuildRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn with_builds(builds: impl IntoIterator<Item = Build>) -> Self {
        let repo = Self::new();
        for build in builds {
            repo.upsert(build);
        }
        repo
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn has_tag(tags: &[Tag], name: &str) -> bool {
    tags.iter().any(|t| t.name.eq_ignore_ascii_case(name))
}

/// Filter semantics: `name` is a case-insensitive substring match,
/// `author`/`theme`/`color` match a tag name. Absent values and unknown
/// parameter names do not filter.
fn matches(build: &Build, params: &QueryParams) -> bool {
    params.iter().all(|(name, value)| {
        let Some(value) = value.as_deref() else {
            return true;
        };
        match name {
            "name" => build
                .name
                .to_lowercase()
                .contains(&value.to_lowercase()),
            "author" => has_tag(&build.authors, value),
            "theme" => has_tag(&build.themes, value),
            "color" => has_tag(&build.colors, value),
            _ => true,
        }
    })
}

impl BuildRepository for InMemoryBuildRepository {
    fn get(&self, id: BuildId) -> Option<Build> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(&id).cloned()
    }

    fn find_by_name(&self, name: &str) -> Option<Build> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.values().find(|b| b.name == name).cloned()
    }

    fn list(&self) -> Vec<Build> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut builds: Vec<_> = map.values().cloned().collect();
        builds.sort_by_key(|b| b.id);
        builds
    }

    fn query(&self, params: &QueryParams) -> Vec<Build> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut builds: Vec<_> = map
            .values()
            .filter(|b| matches(b, params))
            .cloned()
            .collect();
        builds.sort_by_key(|b| b.id);
        builds
    }

    fn upsert(&self, build: Build) -> Option<Build> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(build.id, build)
    }

    fn remove(&self, id: BuildId) -> Option<Build> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.remove(&id)
    }
}

impl BuildSource for InMemoryBuildRepository {
    fn lookup(&self, identifier: &str) -> Result<Option<BuildRef>, DataError> {
        let identifier = identifier.trim();
        if let Ok(id) = identifier.parse::<BuildId>() {
            if let Some(build) = self.get(id) {
                return Ok(Some(build.to_ref()));
            }
        }
        Ok(self.find_by_name(identifier).map(|b| b.to_ref()))
    }

    fn load_full(&self, id: BuildId) -> Result<Option<Build>, DataError> {
        // The read guard is the unit of work: the clone sees one consistent
        // version of the record.
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileData;

    fn tower() -> Build {
        Build::new(BuildId::new(1), "Tower")
            .with_authors(vec![Tag::new(1, "Ann")])
            .with_themes(vec![Tag::new(1, "Medieval")])
    }

    fn farm() -> Build {
        Build::new(BuildId::new(2), "Wheat Farm").with_themes(vec![Tag::new(2, "Rural")])
    }

    #[test]
    fn lookup_by_id_then_name() {
        let repo = InMemoryBuildRepository::with_builds([tower(), farm()]);

        assert_eq!(repo.lookup("1").unwrap().map(|r| r.name), Some("Tower".into()));
        assert_eq!(
            repo.lookup("Wheat Farm").unwrap().map(|r| r.id),
            Some(BuildId::new(2))
        );
        assert_eq!(repo.lookup("42").unwrap(), None);
        assert_eq!(repo.lookup("Castle").unwrap(), None);
    }

    #[test]
    fn numeric_name_falls_back_to_name_lookup() {
        let repo = InMemoryBuildRepository::with_builds([Build::new(BuildId::new(5), "1984")]);
        assert_eq!(
            repo.lookup("1984").unwrap().map(|r| r.id),
            Some(BuildId::new(5))
        );
    }

    #[test]
    fn load_full_includes_payload() {
        let repo = InMemoryBuildRepository::with_builds([
            tower().with_file("tower.nbt", FileData::Loaded(vec![1, 2, 3]))
        ]);
        let full = repo.load_full(BuildId::new(1)).unwrap().unwrap();
        assert_eq!(full.file.byte_len(), Some(3));
        assert!(repo.load_full(BuildId::new(9)).unwrap().is_none());
    }

    #[test]
    fn query_filters_by_present_params_only() {
        let repo = InMemoryBuildRepository::with_builds([tower(), farm()]);

        let medieval = repo.query(&QueryParams::new().with("theme", "medieval"));
        assert_eq!(medieval.len(), 1);
        assert_eq!(medieval[0].name, "Tower");

        let unfiltered = repo.query(&QueryParams::new().with_absent("theme"));
        assert_eq!(unfiltered.len(), 2);

        let by_name = repo.query(&QueryParams::new().with("name", "farm"));
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, BuildId::new(2));
    }

    #[test]
    fn list_is_ordered_by_id() {
        let repo = InMemoryBuildRepository::with_builds([farm(), tower()]);
        let ids: Vec<_> = repo.list().into_iter().map(|b| b.id.value()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(repo.len(), 2);
    }
}

//! Cache-backed catalog reads and writes.
//!
//! Reads go through the keyed store first. Writes keep point entries exact
//! (both the id key and the name key of the record, plus the old name on a
//! rename) and sweep every listing/query entry of the build namespace.

use tracing::debug;

use buildvault_cache::{all_key, query_key, single_key, KeyedStore, QueryParams};
use buildvault_core::{BuildId, DomainError, DomainResult};
use buildvault_observability::RequestCounter;

use crate::model::{Build, BUILD};
use crate::repository::BuildRepository;

pub struct BuildCatalog<R, S> {
    repository: R,
    cache: S,
    requests: RequestCounter,
}

impl<R, S> BuildCatalog<R, S>
where
    R: BuildRepository,
    S: KeyedStore,
{
    pub fn new(repository: R, cache: S, requests: RequestCounter) -> Self {
        Self {
            repository,
            cache,
            requests,
        }
    }

    pub fn get_by_id(&self, id: BuildId) -> Option<Build> {
        self.requests.increment();
        let key = single_key(BUILD, id.value());
        if let Some(hit) = self.cache.get::<Build>(&key) {
            return Some((*hit).clone());
        }
        let build = self.repository.get(id)?;
        self.cache.put(key, build.clone());
        Some(build)
    }

    pub fn get_by_name(&self, name: &str) -> Option<Build> {
        self.requests.increment();
        let key = single_key(BUILD, name);
        if let Some(hit) = self.cache.get::<Build>(&key) {
            return Some((*hit).clone());
        }
        let build = self.repository.find_by_name(name)?;
        self.cache.put(key, build.clone());
        Some(build)
    }

    pub fn list_all(&self) -> Vec<Build> {
        self.requests.increment();
        let key = all_key(BUILD);
        if let Some(hit) = self.cache.get::<Vec<Build>>(&key) {
            return (*hit).clone();
        }
        let builds = self.repository.list();
        self.cache.put(key, builds.clone());
        builds
    }

    pub fn find(&self, params: QueryParams) -> Vec<Build> {
        self.requests.increment();
        let key = query_key(BUILD, params.clone());
        if let Some(hit) = self.cache.get::<Vec<Build>>(&key) {
            return (*hit).clone();
        }
        let builds = self.repository.query(&params);
        self.cache.put(key, builds.clone());
        builds
    }

    /// Create or replace a build. Names are unique across the catalog.
    pub fn save(&self, build: Build) -> DomainResult<Build> {
        self.requests.increment();
        if build.name.trim().is_empty() {
            return Err(DomainError::validation("build name must not be blank"));
        }
        if let Some(existing) = self.repository.find_by_name(&build.name) {
            if existing.id != build.id {
                return Err(DomainError::conflict(format!(
                    "build name '{}' already used by build {}",
                    build.name, existing.id
                )));
            }
        }

        let previous = self.repository.upsert(build.clone());
        self.evict_point_keys(&build);
        if let Some(previous) = previous.filter(|p| p.name != build.name) {
            self.cache.evict(&single_key(BUILD, previous.name.as_str()));
        }
        self.cache.evict_by_type(BUILD);

        debug!(build_id = %build.id, "saved build");
        Ok(build)
    }

    pub fn delete(&self, id: BuildId) -> DomainResult<Build> {
        self.requests.increment();
        let removed = self
            .repository
            .remove(id)
            .ok_or_else(|| DomainError::not_found(format!("build {}", id)))?;

        self.evict_point_keys(&removed);
        self.cache.evict_by_type(BUILD);

        debug!(build_id = %id, "deleted build");
        Ok(removed)
    }

    pub fn requests(&self) -> &RequestCounter {
        &self.requests
    }

    fn evict_point_keys(&self, build: &Build) {
        self.cache.evict(&single_key(BUILD, build.id.value()));
        self.cache.evict(&single_key(BUILD, build.name.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use buildvault_cache::InMemoryKeyedStore;

    use super::*;
    use crate::model::Tag;
    use crate::repository::InMemoryBuildRepository;

    type Catalog = BuildCatalog<Arc<InMemoryBuildRepository>, Arc<InMemoryKeyedStore>>;

    fn setup() -> (Catalog, Arc<InMemoryBuildRepository>, Arc<InMemoryKeyedStore>) {
        let repo = InMemoryBuildRepository::arc();
        let cache = InMemoryKeyedStore::arc();
        let catalog = BuildCatalog::new(repo.clone(), cache.clone(), RequestCounter::new());
        (catalog, repo, cache)
    }

    fn tower() -> Build {
        Build::new(BuildId::new(1), "Tower").with_themes(vec![Tag::new(1, "Medieval")])
    }

    #[test]
    fn reads_populate_both_point_keys() {
        let (catalog, _repo, cache) = setup();
        catalog.save(tower()).unwrap();

        assert!(catalog.get_by_id(BuildId::new(1)).is_some());
        assert!(catalog.get_by_name("Tower").is_some());

        assert!(cache.get::<Build>(&single_key(BUILD, 1)).is_some());
        assert!(cache.get::<Build>(&single_key(BUILD, "Tower")).is_some());
    }

    #[test]
    fn cached_reads_do_not_see_repository_bypass() {
        let (catalog, repo, _cache) = setup();
        catalog.save(tower()).unwrap();
        catalog.get_by_id(BuildId::new(1));

        // Writing around the service leaves the cached copy in place.
        repo.upsert(tower().with_description("changed"));
        assert_eq!(catalog.get_by_id(BuildId::new(1)).unwrap().description, None);
    }

    #[test]
    fn rename_evicts_old_and_new_name_keys() {
        let (catalog, _repo, cache) = setup();
        catalog.save(tower()).unwrap();
        catalog.get_by_name("Tower");
        catalog.list_all();

        let renamed = Build::new(BuildId::new(1), "Keep");
        catalog.save(renamed).unwrap();

        assert!(cache.get::<Build>(&single_key(BUILD, "Tower")).is_none());
        assert!(cache.get::<Vec<Build>>(&all_key(BUILD)).is_none());
        assert!(catalog.get_by_name("Tower").is_none());
        assert_eq!(catalog.get_by_name("Keep").map(|b| b.id), Some(BuildId::new(1)));
    }

    #[test]
    fn writes_sweep_query_results() {
        let (catalog, _repo, _cache) = setup();
        catalog.save(tower()).unwrap();

        let medieval = QueryParams::new().with("theme", "Medieval");
        assert_eq!(catalog.find(medieval.clone()).len(), 1);

        catalog
            .save(Build::new(BuildId::new(2), "Castle").with_themes(vec![Tag::new(1, "Medieval")]))
            .unwrap();
        assert_eq!(catalog.find(medieval).len(), 2);
    }

    #[test]
    fn writes_leave_other_namespaces_alone() {
        let (catalog, _repo, cache) = setup();
        cache.put(all_key(crate::model::AUTHOR), vec![Tag::new(1, "Ann")]);
        cache.put(all_key(crate::model::THEME), vec![Tag::new(1, "Medieval")]);

        catalog.save(tower()).unwrap();

        assert!(cache.get::<Vec<Tag>>(&all_key(crate::model::AUTHOR)).is_some());
        assert!(cache.get::<Vec<Tag>>(&all_key(crate::model::THEME)).is_some());
    }

    #[test]
    fn delete_evicts_and_reports_missing() {
        let (catalog, _repo, _cache) = setup();
        catalog.save(tower()).unwrap();
        catalog.get_by_id(BuildId::new(1));

        catalog.delete(BuildId::new(1)).unwrap();
        assert!(catalog.get_by_id(BuildId::new(1)).is_none());
        assert!(matches!(
            catalog.delete(BuildId::new(1)),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn save_validates_names() {
        let (catalog, _repo, _cache) = setup();
        assert!(matches!(
            catalog.save(Build::new(BuildId::new(1), "  ")),
            Err(DomainError::Validation(_))
        ));

        catalog.save(tower()).unwrap();
        assert!(matches!(
            catalog.save(Build::new(BuildId::new(2), "Tower")),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn every_call_is_counted() {
        let (catalog, _repo, _cache) = setup();
        catalog.save(tower()).unwrap();
        catalog.get_by_id(BuildId::new(1));
        catalog.list_all();
        assert_eq!(catalog.requests().current(), 3);
    }
}

//! The dependency universe: candidates, their relationships, and the jobs
//! requested against them (§2 DATA MODEL).
//!
//! A [`Uid`] names one logical package slot (what the original solver called
//! a "digest chain" root); a [`Universe`] can hold several competing
//! [`UniverseItem`] candidates under the same `Uid` — at most one local and
//! any number of remote, each a vertex in the SAT encoding built in
//! [`crate::rules`].

use std::collections::HashMap;
use std::fmt;

/// Identity of one logical package slot in the universe (origin/reponame
/// agnostic). Candidates competing for the same slot share a `Uid`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid(String);

impl Uid {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Uid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Uid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Where a candidate comes from: already installed, or available in a repo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Local,
    Remote,
}

/// The two ways two candidates can conflict, mirroring the distinction the
/// original solver draws when deciding whether an upgrade is implied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    /// A remote candidate conflicts with the currently installed local one
    /// (an implicit upgrade-replaces-local relationship).
    RemoteLocal,
    /// Two remote candidates from possibly different repos conflict
    /// explicitly (an `explicit_conflict` rule).
    RemoteRemote,
}

/// One conflict edge declared against another package slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Conflict {
    pub uid: Uid,
    pub kind: ConflictKind,
    /// Digest of the specific conflicting candidate, when known precisely
    /// enough to avoid conflicting with every candidate under `uid`.
    pub digest: Option<String>,
}

/// One alternative within a dependency's OR-group (`alt_next` chains in the
/// original encoding: `dep(a) => b1 | b2 | ...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependAlt {
    pub uid: Uid,
}

/// A single dependency requirement: at least one alternative must be chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Depend {
    pub alternatives: Vec<DependAlt>,
}

impl Depend {
    #[must_use]
    pub fn single(uid: Uid) -> Self {
        Self {
            alternatives: vec![DependAlt { uid }],
        }
    }
}

/// One candidate for a package slot: a specific version from a specific
/// origin, with everything rule generation needs to know about it.
#[derive(Debug, Clone)]
pub struct UniverseItem {
    pub uid: Uid,
    pub name: String,
    pub version: String,
    pub digest: String,
    pub origin: Origin,
    pub reponame: Option<String>,
    pub abi: Option<String>,
    pub vital: bool,
    /// Set when this request target was resolved from more than one
    /// candidate digest (e.g. several local files sharing a UID); only then
    /// do REQUEST_CONFLICT clauses need to pairwise-exclude the requests.
    pub multi_hashed: bool,
    pub depends: Vec<Depend>,
    pub conflicts: Vec<Conflict>,
    pub shlibs_provided: Vec<String>,
    pub shlibs_required: Vec<String>,
    pub requires: Vec<String>,
    pub provides: Vec<String>,
}

impl UniverseItem {
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self.origin, Origin::Local)
    }
}

/// What the caller asked to happen to a requested `Uid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobType {
    Install,
    Upgrade,
    Delete,
    Fetch,
    AutoRemove,
}

/// One explicit request against a `Uid` (the user's top-level asks, as
/// opposed to candidates pulled in transitively through dependencies).
#[derive(Debug, Clone)]
pub struct RequestItem {
    pub uid: Uid,
    pub job_type: JobType,
    /// Candidate digest the request pins to, when the caller asked for an
    /// exact version rather than "best available".
    pub digest: Option<String>,
}

/// The full set of top-level requests driving one solve attempt.
#[derive(Debug, Clone, Default)]
pub struct Jobs {
    pub request_add: HashMap<Uid, Vec<RequestItem>>,
    pub request_delete: HashMap<Uid, Vec<RequestItem>>,
}

impl Jobs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: RequestItem) {
        match item.job_type {
            JobType::Delete | JobType::AutoRemove => {
                self.request_delete.entry(item.uid.clone()).or_default().push(item);
            }
            JobType::Install | JobType::Upgrade | JobType::Fetch => {
                self.request_add.entry(item.uid.clone()).or_default().push(item);
            }
        }
    }

    #[must_use]
    pub fn is_requested(&self, uid: &Uid) -> bool {
        self.request_add.contains_key(uid) || self.request_delete.contains_key(uid)
    }
}

/// One entry in the `provides` index: the `Uid` chain offering the
/// capability, whether it was declared through `shlibs_provided` (a
/// shared-library soname) rather than `provides`, and the exact name it was
/// registered under (§6.1: "a set of `(providing_candidate, is_shlib,
/// provide_name)` triples").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProvideEntry {
    pub uid: Uid,
    pub is_shlib: bool,
    pub provide_name: String,
}

/// The full dependency universe: every candidate under every requested or
/// transitively reachable `Uid`, plus a `provides`-name index used to expand
/// virtual dependencies and shared-library requirements into concrete
/// alternatives.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    pub items: HashMap<Uid, Vec<UniverseItem>>,
    /// Maps a provided capability name (either a `provides` entry or a
    /// `shlibs_provided` soname) to the candidates offering it.
    pub provides: HashMap<String, Vec<ProvideEntry>>,
}

impl Universe {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: UniverseItem) {
        for provide in &item.provides {
            self.provides.entry(provide.clone()).or_default().push(ProvideEntry {
                uid: item.uid.clone(),
                is_shlib: false,
                provide_name: provide.clone(),
            });
        }
        for shlib in &item.shlibs_provided {
            self.provides.entry(shlib.clone()).or_default().push(ProvideEntry {
                uid: item.uid.clone(),
                is_shlib: true,
                provide_name: shlib.clone(),
            });
        }
        self.items.entry(item.uid.clone()).or_default().push(item);
    }

    #[must_use]
    pub fn candidates(&self, uid: &Uid) -> &[UniverseItem] {
        self.items.get(uid).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn local(&self, uid: &Uid) -> Option<&UniverseItem> {
        self.candidates(uid).iter().find(|item| item.is_local())
    }

    /// Resolve a dependency alternative's `Uid` to candidate providers,
    /// falling back to the `provides` index for virtual capabilities.
    #[must_use]
    pub fn providers(&self, uid: &Uid) -> Vec<&Uid> {
        if self.items.contains_key(uid) {
            return vec![uid];
        }
        self.provides
            .get(uid.as_str())
            .into_iter()
            .flatten()
            .map(|entry| &entry.uid)
            .collect()
    }

    pub fn all_uids(&self) -> impl Iterator<Item = &Uid> {
        self.items.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(uid: &str, origin: Origin) -> UniverseItem {
        UniverseItem {
            uid: Uid::new(uid),
            name: uid.to_string(),
            version: "1.0".into(),
            digest: format!("{uid}-digest"),
            origin,
            reponame: None,
            abi: None,
            vital: false,
            multi_hashed: false,
            depends: Vec::new(),
            conflicts: Vec::new(),
            shlibs_provided: Vec::new(),
            shlibs_required: Vec::new(),
            requires: Vec::new(),
            provides: Vec::new(),
        }
    }

    #[test]
    fn local_candidate_is_found_among_several() {
        let mut universe = Universe::new();
        universe.insert(item("graphics/foo", Origin::Remote));
        universe.insert(item("graphics/foo", Origin::Local));

        let local = universe.local(&Uid::new("graphics/foo")).unwrap();
        assert!(local.is_local());
    }

    #[test]
    fn provides_index_resolves_virtual_capability() {
        let mut universe = Universe::new();
        let mut provider = item("graphics/foo-impl", Origin::Remote);
        provider.provides.push("graphics/foo".to_string());
        universe.insert(provider);

        let providers = universe.providers(&Uid::new("graphics/foo"));
        assert_eq!(providers, vec![&Uid::new("graphics/foo-impl")]);
    }

    #[test]
    fn provides_index_resolves_shlib_only_provider() {
        let mut universe = Universe::new();
        let mut provider = item("graphics/foo-impl", Origin::Remote);
        provider.shlibs_provided.push("libfoo.so.1".to_string());
        universe.insert(provider);

        let providers = universe.providers(&Uid::new("libfoo.so.1"));
        assert_eq!(providers, vec![&Uid::new("graphics/foo-impl")]);

        let entries = &universe.provides["libfoo.so.1"];
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_shlib);
        assert_eq!(entries[0].provide_name, "libfoo.so.1");
    }

    #[test]
    fn jobs_route_by_type() {
        let mut jobs = Jobs::new();
        jobs.add(RequestItem {
            uid: Uid::new("a"),
            job_type: JobType::Install,
            digest: None,
        });
        jobs.add(RequestItem {
            uid: Uid::new("b"),
            job_type: JobType::Delete,
            digest: None,
        });

        assert!(jobs.request_add.contains_key(&Uid::new("a")));
        assert!(jobs.request_delete.contains_key(&Uid::new("b")));
        assert!(jobs.is_requested(&Uid::new("a")));
    }
}

//! Main dependency resolver implementation

use crate::callbacks::TerminalCallbacks;
use crate::config::SolverConfig;
use crate::graph::DependencyGraph;
use crate::plan::SolvedJob;
use crate::problem::Problem;
use crate::universe::{JobType, Jobs, Origin, RequestItem, Uid, Universe, UniverseItem};
use crate::{
    DepEdge, DepKind, ExecutionPlan, PackageId, ResolutionContext, ResolutionResult, ResolvedNode,
};
use semver::Version;
use sps2_errors::{Error, PackageError};
use sps2_events::{EventEmitter, EventSender};
use sps2_index::{IndexManager, VersionEntry};
use sps2_platform::{PlatformContext, PlatformManager};
use sps2_types::package::PackageSpec;
use sps2_types::Manifest;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

/// One index-backed candidate discovered while building the universe, keyed
/// by the digest assigned to its `UniverseItem` so the SAT plan can be
/// mapped straight back to its `VersionEntry`.
struct IndexedCandidate<'a> {
    name: String,
    version: Version,
    entry: &'a VersionEntry,
}

/// Dependency resolver
#[derive(Clone, Debug)]
pub struct Resolver {
    /// Package index manager
    index: IndexManager,
    /// Event sender for progress and status updates
    event_sender: Option<EventSender>,
}

impl Resolver {
    /// Create new resolver with index manager
    #[must_use]
    pub fn new(index: IndexManager) -> Self {
        Self {
            index,
            event_sender: None,
        }
    }

    /// Create new resolver with index manager and event sender
    #[must_use]
    pub fn with_events(index: IndexManager, event_sender: EventSender) -> Self {
        Self {
            index,
            event_sender: Some(event_sender),
        }
    }

    /// Resolve dependencies using the SAT solver.
    ///
    /// Builds a dependency [`Universe`] from the index and the caller's
    /// already-installed packages, then hands it to [`Problem::solve`] for
    /// the reiterate loop.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A package is not found in the index
    /// - No valid solution exists (conflicting constraints)
    /// - Version parsing fails
    pub async fn resolve_with_sat(
        &self,
        context: ResolutionContext,
    ) -> Result<ResolutionResult, Error> {
        use tokio::time::{timeout, Duration};

        let resolution_timeout = Duration::from_secs(120);

        timeout(resolution_timeout, async {
            let mut graph = DependencyGraph::new();
            let mut already_satisfied = HashSet::new();

            // First, check installed packages for each dependency.
            let mut remaining_package_deps: HashMap<String, Vec<(PackageSpec, DepKind)>> =
                HashMap::new();

            for spec in &context.runtime_deps {
                if let Some(installed) = context
                    .installed_packages
                    .iter()
                    .find(|pkg| pkg.name == spec.name && spec.version_spec.matches(&pkg.version))
                {
                    let package_id =
                        PackageId::new(installed.name.clone(), installed.version.clone());
                    already_satisfied.insert(package_id.clone());

                    let node = ResolvedNode::local(
                        installed.name.clone(),
                        installed.version.clone(),
                        std::path::PathBuf::new(),
                        Vec::new(),
                    );
                    graph.add_node(node);
                } else {
                    remaining_package_deps
                        .entry(spec.name.clone())
                        .or_default()
                        .push((spec.clone(), DepKind::Runtime));
                }
            }

            for spec in &context.build_deps {
                if let Some(installed) = context
                    .installed_packages
                    .iter()
                    .find(|pkg| pkg.name == spec.name && spec.version_spec.matches(&pkg.version))
                {
                    let package_id =
                        PackageId::new(installed.name.clone(), installed.version.clone());
                    if !already_satisfied.contains(&package_id) {
                        already_satisfied.insert(package_id);

                        let node = ResolvedNode::local(
                            installed.name.clone(),
                            installed.version.clone(),
                            std::path::PathBuf::new(),
                            Vec::new(),
                        );
                        graph.add_node(node);
                    }
                } else {
                    remaining_package_deps
                        .entry(spec.name.clone())
                        .or_default()
                        .push((spec.clone(), DepKind::Build));
                }
            }

            if !remaining_package_deps.is_empty() {
                let (universe, jobs, candidates) =
                    self.build_universe(&remaining_package_deps, &context);

                let config = SolverConfig::default();
                let callbacks = TerminalCallbacks::new(true);
                let mut problem = Problem::new(&universe, &jobs, config, &callbacks);
                if let Some(sender) = self.event_sender.clone() {
                    problem = problem.with_events(sender);
                }

                let plan = problem.solve()?;
                let sat_graph = Self::graph_from_plan(&plan, &candidates)?;

                for (id, node) in sat_graph.nodes {
                    graph.nodes.insert(id.clone(), node);
                }
                for (from, tos) in sat_graph.edges {
                    graph.edges.insert(from, tos);
                }
            }

            for path in &context.local_files {
                Self::resolve_local_file(path, &mut graph).await?;
            }

            let sorted = graph.topological_sort()?;
            let execution_plan = ExecutionPlan::from_sorted_packages(&sorted, &graph);

            Ok(ResolutionResult {
                nodes: graph.nodes,
                execution_plan,
            })
        })
        .await
        .map_err(|_| PackageError::ResolutionTimeout {
            message: "SAT-based dependency resolution timed out after 2 minutes".to_string(),
        })?
    }

    /// Walk the index transitively from `package_deps`, collecting every
    /// reachable candidate into a [`Universe`] plus the top-level [`Jobs`].
    ///
    /// Returns the universe and jobs alongside a digest -> candidate map so
    /// the emitted plan can be turned back into `ResolvedNode`s without a
    /// second index lookup pass.
    fn build_universe<'a>(
        &'a self,
        package_deps: &HashMap<String, Vec<(PackageSpec, DepKind)>>,
        context: &ResolutionContext,
    ) -> (Universe, Jobs, HashMap<String, IndexedCandidate<'a>>) {
        let mut universe = Universe::new();
        let mut jobs = Jobs::new();
        let mut candidates: HashMap<String, IndexedCandidate<'a>> = HashMap::new();

        // Gather every version spec that applies to a given package name,
        // across the initial request and whatever transitive deps reach it.
        let mut specs_by_name: HashMap<String, Vec<PackageSpec>> = HashMap::new();
        let mut queue: VecDeque<(PackageSpec, DepKind)> = VecDeque::new();
        for specs in package_deps.values() {
            for (spec, kind) in specs {
                queue.push_back((spec.clone(), *kind));
            }
        }

        let mut visited_for_traversal = HashSet::new();
        while let Some((spec, kind)) = queue.pop_front() {
            specs_by_name
                .entry(spec.name.clone())
                .or_default()
                .push(spec.clone());

            if !visited_for_traversal.insert(spec.name.clone()) {
                continue;
            }

            let Some(index) = self.index.index() else {
                continue;
            };
            let Some(package_info) = index.packages.get(&spec.name) else {
                continue;
            };

            for (version_str, entry) in &package_info.versions {
                let Ok(version) = Version::parse(version_str) else {
                    continue;
                };
                if !spec.version_spec.matches(&version) {
                    continue;
                }
                for dep_str in &entry.dependencies.runtime {
                    if let Ok(dep_spec) = PackageSpec::parse(dep_str) {
                        queue.push_back((dep_spec, DepKind::Runtime));
                    }
                }
                if kind == DepKind::Build {
                    for dep_str in &entry.dependencies.build {
                        if let Ok(dep_spec) = PackageSpec::parse(dep_str) {
                            queue.push_back((dep_spec, DepKind::Build));
                        }
                    }
                }
            }
        }

        for (name, specs) in &specs_by_name {
            let Some(index) = self.index.index() else {
                continue;
            };
            let Some(package_info) = index.packages.get(name) else {
                continue;
            };

            let uid = Uid::new(name.clone());

            if let Some(installed) = context
                .installed_packages
                .iter()
                .find(|pkg| &pkg.name == name)
            {
                universe.insert(UniverseItem {
                    uid: uid.clone(),
                    name: name.clone(),
                    version: installed.version.to_string(),
                    digest: format!("local:{name}:{}", installed.version),
                    origin: Origin::Local,
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
                });
            }

            for (version_str, entry) in &package_info.versions {
                let Ok(version) = Version::parse(version_str) else {
                    continue;
                };
                if !specs.iter().all(|spec| spec.version_spec.matches(&version)) {
                    continue;
                }

                let digest = format!("remote:{name}:{version_str}");
                let depends = entry
                    .dependencies
                    .runtime
                    .iter()
                    .chain(&entry.dependencies.build)
                    .filter_map(|dep_str| PackageSpec::parse(dep_str).ok())
                    .map(|dep_spec| crate::universe::Depend::single(Uid::new(dep_spec.name)))
                    .collect();

                universe.insert(UniverseItem {
                    uid: uid.clone(),
                    name: name.clone(),
                    version: version_str.clone(),
                    digest: digest.clone(),
                    origin: Origin::Remote,
                    reponame: None,
                    abi: None,
                    vital: false,
                    multi_hashed: false,
                    depends,
                    conflicts: Vec::new(),
                    shlibs_provided: Vec::new(),
                    shlibs_required: Vec::new(),
                    requires: Vec::new(),
                    provides: Vec::new(),
                });

                candidates.insert(
                    digest,
                    IndexedCandidate {
                        name: name.clone(),
                        version,
                        entry,
                    },
                );
            }
        }

        for name in package_deps.keys() {
            jobs.add(RequestItem {
                uid: Uid::new(name.clone()),
                job_type: JobType::Install,
                digest: None,
            });
        }

        (universe, jobs, candidates)
    }

    /// Turn a solved job plan into a [`DependencyGraph`], looking dependency
    /// edges back up from the index entry each `Install`/`Upgrade` target
    /// came from.
    fn graph_from_plan(
        plan: &[SolvedJob],
        candidates: &HashMap<String, IndexedCandidate<'_>>,
    ) -> Result<DependencyGraph, Error> {
        let mut graph = DependencyGraph::new();

        for job in plan {
            if !matches!(job.job_type, JobType::Install | JobType::Upgrade | JobType::Fetch) {
                continue;
            }
            let Some(candidate) = candidates.get(&job.item0.digest) else {
                continue;
            };

            let mut deps = Vec::new();
            for dep_str in &candidate.entry.dependencies.runtime {
                if let Ok(dep_spec) = PackageSpec::parse(dep_str) {
                    deps.push(DepEdge::new(
                        dep_spec.name.clone(),
                        dep_spec.version_spec,
                        DepKind::Runtime,
                    ));
                }
            }

            let node = ResolvedNode::download(
                candidate.name.clone(),
                candidate.version.clone(),
                Self::resolve_download_url(&candidate.entry.download_url)?,
                deps,
            );

            let package_id = PackageId::new(candidate.name.clone(), candidate.version.clone());
            graph.add_node(node);

            for other in plan {
                if !matches!(other.job_type, JobType::Install | JobType::Upgrade | JobType::Fetch) {
                    continue;
                }
                if other.item0.uid == job.item0.uid {
                    continue;
                }
                if let Some(other_candidate) = candidates.get(&other.item0.digest) {
                    let depends_on_other = candidate
                        .entry
                        .dependencies
                        .runtime
                        .iter()
                        .filter_map(|dep_str| PackageSpec::parse(dep_str).ok())
                        .any(|dep_spec| dep_spec.name == other_candidate.name);
                    if depends_on_other {
                        let other_id =
                            PackageId::new(other_candidate.name.clone(), other_candidate.version.clone());
                        graph.add_edge(&other_id, &package_id);
                    }
                }
            }
        }

        Ok(graph)
    }

    /// Resolve a local package file
    async fn resolve_local_file(path: &Path, graph: &mut DependencyGraph) -> Result<(), Error> {
        let manifest = Self::load_local_manifest(path).await?;

        let version = Version::parse(&manifest.package.version)?;
        let _package_id = PackageId::new(manifest.package.name.clone(), version.clone());

        let mut deps = Vec::new();
        for dep in &manifest.dependencies.runtime {
            let dep_spec = PackageSpec::parse(dep)?;
            let edge = DepEdge::new(
                dep_spec.name.clone(),
                dep_spec.version_spec,
                DepKind::Runtime,
            );
            deps.push(edge);
        }

        let node = ResolvedNode::local(manifest.package.name, version, path.to_path_buf(), deps);

        graph.add_node(node);

        Ok(())
    }

    /// Load manifest from local .sp file
    async fn load_local_manifest(path: &Path) -> Result<Manifest, Error> {
        use tokio::fs;

        let temp_dir =
            std::env::temp_dir().join(format!("sps2_manifest_{}", uuid::Uuid::new_v4().simple()));
        fs::create_dir_all(&temp_dir).await?;

        let _cleanup_guard = scopeguard::guard(&temp_dir, |temp_dir| {
            if temp_dir.exists() {
                let _ = std::fs::remove_dir_all(temp_dir);
            }
        });

        let tar_path = temp_dir.join("package.tar");

        let platform = PlatformManager::instance().platform();
        let context = PlatformContext::new(None);

        let mut zstd_cmd = platform.process().create_command("zstd");
        zstd_cmd.args([
            "--decompress",
            "-o",
            &tar_path.display().to_string(),
            &path.display().to_string(),
        ]);

        let zstd_output = platform
            .process()
            .execute_command(&context, zstd_cmd)
            .await?;

        if !zstd_output.status.success() {
            return Err(PackageError::InvalidFormat {
                message: format!(
                    "failed to decompress .sp file: {}",
                    String::from_utf8_lossy(&zstd_output.stderr)
                ),
            }
            .into());
        }

        let manifest_content = Self::extract_manifest_from_tar(&tar_path).await?;
        let manifest = Manifest::from_toml(&manifest_content)?;

        Ok(manifest)
    }

    /// Extract manifest.toml content from tar archive
    async fn extract_manifest_from_tar(tar_path: &Path) -> Result<String, Error> {
        let platform = PlatformManager::instance().platform();
        let context = PlatformContext::new(None);

        let mut tar_cmd = platform.process().create_command("tar");
        tar_cmd.args([
            "--extract",
            "--file",
            &tar_path.display().to_string(),
            "--to-stdout",
            "manifest.toml",
        ]);

        let tar_output = platform
            .process()
            .execute_command(&context, tar_cmd)
            .await?;

        if !tar_output.status.success() {
            return Err(PackageError::InvalidFormat {
                message: format!(
                    "failed to extract manifest from tar: {}",
                    String::from_utf8_lossy(&tar_output.stderr)
                ),
            }
            .into());
        }

        let manifest_content =
            String::from_utf8(tar_output.stdout).map_err(|_| PackageError::InvalidFormat {
                message: "manifest.toml contains invalid UTF-8".to_string(),
            })?;

        if manifest_content.trim().is_empty() {
            return Err(PackageError::InvalidFormat {
                message: "manifest.toml is empty or missing".to_string(),
            }
            .into());
        }

        Ok(manifest_content)
    }

    /// Get available versions for a package
    #[must_use]
    pub fn get_package_versions(&self, name: &str) -> Option<Vec<&VersionEntry>> {
        self.index.get_package_versions(name)
    }

    /// Search for packages
    #[must_use]
    pub fn search_packages(&self, query: &str) -> Vec<&str> {
        self.index.search(query)
    }

    /// Check if a package exists
    #[must_use]
    pub fn package_exists(&self, name: &str) -> bool {
        self.index.get_package_versions(name).is_some()
    }

    /// Find best version for a package spec
    #[must_use]
    pub fn find_best_version(&self, spec: &PackageSpec) -> Option<&VersionEntry> {
        self.index.find_best_version(spec)
    }

    /// Resolve download URL with repository integration
    ///
    /// This is currently a pass-through but will be enhanced for:
    /// - Mirror failover
    /// - CDN optimization
    /// - Repository URL resolution
    fn resolve_download_url(url: &str) -> Result<String, Error> {
        if url.is_empty() {
            return Err(PackageError::InvalidFormat {
                message: "empty download URL".to_string(),
            }
            .into());
        }

        let allow_http = std::env::var("SPS2_ALLOW_HTTP").is_ok();

        if !allow_http && url.starts_with("http://") {
            return Ok(url.replace("http://", "https://"));
        }

        Ok(url.to_string())
    }
}

impl EventEmitter for Resolver {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

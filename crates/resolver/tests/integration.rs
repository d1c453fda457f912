//! Integration tests for resolver crate

#[cfg(test)]
mod tests {
    use sps2_index::{DependencyInfo, Index, IndexManager, VersionEntry};
    use sps2_resolver::*;
    use sps2_types::{PackageSpec, Version};
    use tempfile::tempdir;

    fn create_complex_index() -> Index {
        let mut index = Index::new();

        // jq -> oniguruma
        let jq_entry = VersionEntry {
            revision: 1,
            arch: "arm64".to_string(),
            blake3: "jq_hash".to_string(),
            download_url: "https://example.com/jq-1.7.0.sp".to_string(),
            minisig_url: "https://example.com/jq-1.7.0.sp.minisig".to_string(),
            dependencies: DependencyInfo {
                runtime: vec!["oniguruma>=6.9.0".to_string()],
                build: vec!["autoconf>=2.71.0".to_string()],
            },
            sbom: None,
            description: Some("JSON processor".to_string()),
            homepage: None,
            license: None,
        };

        // curl -> openssl, zlib
        let curl_entry = VersionEntry {
            revision: 1,
            arch: "arm64".to_string(),
            blake3: "curl_hash".to_string(),
            download_url: "https://example.com/curl-8.5.0.sp".to_string(),
            minisig_url: "https://example.com/curl-8.5.0.sp.minisig".to_string(),
            dependencies: DependencyInfo {
                runtime: vec!["openssl>=3.0.0".to_string(), "zlib>=1.2.0".to_string()],
                build: vec!["pkg-config>=0.29".to_string()],
            },
            sbom: None,
            description: Some("HTTP client".to_string()),
            homepage: None,
            license: None,
        };

        // git -> curl, zlib (shared dependency)
        let git_entry = VersionEntry {
            revision: 1,
            arch: "arm64".to_string(),
            blake3: "git_hash".to_string(),
            download_url: "https://example.com/git-2.41.0.sp".to_string(),
            minisig_url: "https://example.com/git-2.41.0.sp.minisig".to_string(),
            dependencies: DependencyInfo {
                runtime: vec!["curl>=8.0.0".to_string(), "zlib>=1.2.0".to_string()],
                build: vec!["make>=4.0.0".to_string()],
            },
            sbom: None,
            description: Some("Version control".to_string()),
            homepage: None,
            license: None,
        };

        // Leaf dependencies (no further deps)
        let deps = vec![
            ("oniguruma", "6.9.8"),
            ("openssl", "3.0.0"),
            ("zlib", "1.2.11"),
            ("autoconf", "2.71.0"),
            ("pkg-config", "0.29.2"),
            ("make", "4.3.0"),
        ];

        for (name, version) in deps {
            let entry = VersionEntry {
                revision: 1,
                arch: "arm64".to_string(),
                blake3: format!("{name}_hash"),
                download_url: format!("https://example.com/{name}-{version}.sp"),
                minisig_url: format!("https://example.com/{name}-{version}.sp.minisig"),
                dependencies: DependencyInfo::default(),
                sbom: None,
                description: Some(format!("{name} package")),
                homepage: None,
                license: None,
            };
            index.add_version(name.to_string(), version.to_string(), entry);
        }

        index.add_version("jq".to_string(), "1.7.0".to_string(), jq_entry);
        index.add_version("curl".to_string(), "8.5.0".to_string(), curl_entry);
        index.add_version("git".to_string(), "2.41.0".to_string(), git_entry);

        index
    }

    #[tokio::test]
    async fn test_complex_dependency_resolution() {
        let temp = tempdir().unwrap();
        let mut manager = IndexManager::new(temp.path());

        let index = create_complex_index();
        let json = index.to_json().unwrap();
        manager.load(Some(&json)).await.unwrap();

        let resolver = Resolver::new(manager);

        // Install git (which depends on curl, which depends on openssl and zlib)
        let context =
            ResolutionContext::new().add_runtime_dep(PackageSpec::parse("git>=2.0.0").unwrap());

        let result = resolver.resolve_with_sat(context).await.unwrap();

        // Should resolve: git, curl, openssl, zlib
        assert_eq!(result.nodes.len(), 4);

        let package_names: std::collections::HashSet<_> =
            result.nodes.keys().map(|id| &id.name).collect();

        assert!(package_names.iter().any(|name| name.as_str() == "git"));
        assert!(package_names.iter().any(|name| name.as_str() == "curl"));
        assert!(package_names.iter().any(|name| name.as_str() == "openssl"));
        assert!(package_names.iter().any(|name| name.as_str() == "zlib"));

        // Check execution order
        let packages = result.packages_in_order();
        let get_position = |name: &str| packages.iter().position(|p| p.name == name).unwrap();

        // Dependencies should come before dependents
        assert!(get_position("openssl") < get_position("curl"));
        assert!(get_position("zlib") < get_position("curl"));
        assert!(get_position("curl") < get_position("git"));

        // zlib is shared between curl and git - should only appear once
        let zlib_count = packages.iter().filter(|p| p.name == "zlib").count();
        assert_eq!(zlib_count, 1);
    }

    #[tokio::test]
    async fn test_multiple_root_packages() {
        let temp = tempdir().unwrap();
        let mut manager = IndexManager::new(temp.path());

        let index = create_complex_index();
        let json = index.to_json().unwrap();
        manager.load(Some(&json)).await.unwrap();

        let resolver = Resolver::new(manager);

        // Install both jq and curl
        let context = ResolutionContext::new()
            .add_runtime_dep(PackageSpec::parse("jq>=1.7.0").unwrap())
            .add_runtime_dep(PackageSpec::parse("curl>=8.0.0").unwrap());

        let result = resolver.resolve_with_sat(context).await.unwrap();

        // Should resolve: jq, oniguruma, curl, openssl, zlib
        assert_eq!(result.nodes.len(), 5);

        let package_names: std::collections::HashSet<_> =
            result.nodes.keys().map(|id| &id.name).collect();

        assert!(package_names.iter().any(|name| name.as_str() == "jq"));
        assert!(package_names
            .iter()
            .any(|name| name.as_str() == "oniguruma"));
        assert!(package_names.iter().any(|name| name.as_str() == "curl"));
        assert!(package_names.iter().any(|name| name.as_str() == "openssl"));
        assert!(package_names.iter().any(|name| name.as_str() == "zlib"));
    }

    #[tokio::test]
    async fn test_build_dependencies() {
        let temp = tempdir().unwrap();
        let mut manager = IndexManager::new(temp.path());

        let index = create_complex_index();
        let json = index.to_json().unwrap();
        manager.load(Some(&json)).await.unwrap();

        let resolver = Resolver::new(manager);

        // Resolve jq as build dependency (should include autoconf)
        let context =
            ResolutionContext::new().add_build_dep(PackageSpec::parse("jq>=1.7.0").unwrap());

        let result = resolver.resolve_with_sat(context).await.unwrap();

        // Should resolve: jq, oniguruma (runtime), autoconf (build)
        assert_eq!(result.nodes.len(), 3);

        let package_names: std::collections::HashSet<_> =
            result.nodes.keys().map(|id| &id.name).collect();

        assert!(package_names.iter().any(|name| name.as_str() == "jq"));
        assert!(package_names
            .iter()
            .any(|name| name.as_str() == "oniguruma"));
        assert!(package_names.iter().any(|name| name.as_str() == "autoconf"));
    }

    #[tokio::test]
    async fn test_execution_plan_batching() {
        let temp = tempdir().unwrap();
        let mut manager = IndexManager::new(temp.path());

        let index = create_complex_index();
        let json = index.to_json().unwrap();
        manager.load(Some(&json)).await.unwrap();

        let resolver = Resolver::new(manager);

        let context =
            ResolutionContext::new().add_runtime_dep(PackageSpec::parse("git>=2.0.0").unwrap());

        let result = resolver.resolve_with_sat(context).await.unwrap();

        // Check batching - packages with no deps should be in first batch
        let batches = result.execution_plan.batches();

        // First batch should contain leaf dependencies (openssl, zlib)
        let first_batch_names: std::collections::HashSet<_> = batches[0]
            .iter()
            .filter_map(|id| result.nodes.get(id))
            .map(|node| &node.name)
            .collect();

        assert!(first_batch_names
            .iter()
            .any(|name| name.as_str() == "openssl"));
        assert!(first_batch_names.iter().any(|name| name.as_str() == "zlib"));

        // Last batch should contain root package (git)
        let last_batch = &batches[batches.len() - 1];
        let last_batch_names: std::collections::HashSet<_> = last_batch
            .iter()
            .filter_map(|id| result.nodes.get(id))
            .map(|node| &node.name)
            .collect();

        assert!(last_batch_names.iter().any(|name| name.as_str() == "git"));
    }

    #[tokio::test]
    async fn test_version_constraint_resolution() {
        let temp = tempdir().unwrap();
        let mut manager = IndexManager::new(temp.path());

        let mut index = create_complex_index();

        // Add multiple versions of openssl
        let openssl_301 = VersionEntry {
            revision: 1,
            arch: "arm64".to_string(),
            blake3: "openssl_301_hash".to_string(),
            download_url: "https://example.com/openssl-3.0.1.sp".to_string(),
            minisig_url: "https://example.com/openssl-3.0.1.sp.minisig".to_string(),
            dependencies: DependencyInfo::default(),
            sbom: None,
            description: Some("Crypto library".to_string()),
            homepage: None,
            license: None,
        };

        index.add_version("openssl".to_string(), "3.0.1".to_string(), openssl_301);

        let json = index.to_json().unwrap();
        manager.load(Some(&json)).await.unwrap();

        let resolver = Resolver::new(manager);

        // Request specific version constraint
        let context =
            ResolutionContext::new().add_runtime_dep(PackageSpec::parse("openssl==3.0.1").unwrap());

        let result = resolver.resolve_with_sat(context).await.unwrap();

        // Should resolve to exactly version 3.0.1
        let openssl_node = result
            .nodes
            .values()
            .find(|node| node.name == "openssl")
            .unwrap();

        assert_eq!(openssl_node.version, Version::parse("3.0.1").unwrap());
    }

    #[test]
    fn test_resolution_context_builder() {
        let context = ResolutionContext::new()
            .add_runtime_dep(PackageSpec::parse("curl>=8.0.0").unwrap())
            .add_build_dep(PackageSpec::parse("pkg-config>=0.29.0").unwrap())
            .add_local_file("/path/to/local.sp".into());

        assert_eq!(context.runtime_deps.len(), 1);
        assert_eq!(context.build_deps.len(), 1);
        assert_eq!(context.local_files.len(), 1);

        assert_eq!(context.runtime_deps[0].name, "curl");
        assert_eq!(context.build_deps[0].name, "pkg-config");
    }

    // Index-backed SAT solver integration tests

    #[tokio::test]
    async fn test_sat_basic_resolution() {
        let temp = tempdir().unwrap();
        let mut manager = IndexManager::new(temp.path());

        let index = create_complex_index();
        let json = index.to_json().unwrap();
        manager.load(Some(&json)).await.unwrap();

        let resolver = Resolver::new(manager);

        // Resolve using SAT solver
        let context =
            ResolutionContext::new().add_runtime_dep(PackageSpec::parse("curl>=8.0.0").unwrap());

        let result = resolver.resolve_with_sat(context).await.unwrap();

        // Should resolve: curl, openssl, zlib
        assert_eq!(result.nodes.len(), 3);

        let package_names: std::collections::HashSet<_> =
            result.nodes.keys().map(|id| &id.name).collect();

        assert!(package_names.iter().any(|&name| name == "curl"));
        assert!(package_names.iter().any(|&name| name == "openssl"));
        assert!(package_names.iter().any(|&name| name == "zlib"));
    }

    #[tokio::test]
    async fn test_sat_transitive_dependencies() {
        let temp = tempdir().unwrap();
        let mut manager = IndexManager::new(temp.path());

        let mut index = Index::new();

        // Create deep dependency chain: A -> B -> C -> D
        let a_entry = VersionEntry {
            revision: 1,
            arch: "arm64".to_string(),
            blake3: "a_hash".to_string(),
            download_url: "https://example.com/a-1.0.0.sp".to_string(),
            minisig_url: "https://example.com/a-1.0.0.sp.minisig".to_string(),
            dependencies: DependencyInfo {
                runtime: vec!["b>=1.0.0".to_string()],
                build: vec![],
            },
            sbom: None,
            description: Some("Package A".to_string()),
            homepage: None,
            license: None,
        };

        let b_entry = VersionEntry {
            revision: 1,
            arch: "arm64".to_string(),
            blake3: "b_hash".to_string(),
            download_url: "https://example.com/b-1.0.0.sp".to_string(),
            minisig_url: "https://example.com/b-1.0.0.sp.minisig".to_string(),
            dependencies: DependencyInfo {
                runtime: vec!["c>=1.0.0".to_string()],
                build: vec![],
            },
            sbom: None,
            description: Some("Package B".to_string()),
            homepage: None,
            license: None,
        };

        let c_entry = VersionEntry {
            revision: 1,
            arch: "arm64".to_string(),
            blake3: "c_hash".to_string(),
            download_url: "https://example.com/c-1.0.0.sp".to_string(),
            minisig_url: "https://example.com/c-1.0.0.sp.minisig".to_string(),
            dependencies: DependencyInfo {
                runtime: vec!["d>=1.0.0".to_string()],
                build: vec![],
            },
            sbom: None,
            description: Some("Package C".to_string()),
            homepage: None,
            license: None,
        };

        let d_entry = VersionEntry {
            revision: 1,
            arch: "arm64".to_string(),
            blake3: "d_hash".to_string(),
            download_url: "https://example.com/d-1.0.0.sp".to_string(),
            minisig_url: "https://example.com/d-1.0.0.sp.minisig".to_string(),
            dependencies: DependencyInfo::default(),
            sbom: None,
            description: Some("Package D".to_string()),
            homepage: None,
            license: None,
        };

        index.add_version("a".to_string(), "1.0.0".to_string(), a_entry);
        index.add_version("b".to_string(), "1.0.0".to_string(), b_entry);
        index.add_version("c".to_string(), "1.0.0".to_string(), c_entry);
        index.add_version("d".to_string(), "1.0.0".to_string(), d_entry);

        let json = index.to_json().unwrap();
        manager.load(Some(&json)).await.unwrap();

        let resolver = Resolver::new(manager);

        let context =
            ResolutionContext::new().add_runtime_dep(PackageSpec::parse("a>=1.0.0").unwrap());

        let result = resolver.resolve_with_sat(context).await.unwrap();

        // Should resolve all 4 packages
        assert_eq!(result.nodes.len(), 4);

        let package_names: std::collections::HashSet<_> =
            result.nodes.keys().map(|id| &id.name).collect();

        assert!(package_names.iter().any(|&name| name == "a"));
        assert!(package_names.iter().any(|&name| name == "b"));
        assert!(package_names.iter().any(|&name| name == "c"));
        assert!(package_names.iter().any(|&name| name == "d"));

        // Check execution order
        let packages = result.packages_in_order();
        let get_position = |name: &str| packages.iter().position(|p| p.name == name).unwrap();

        // Dependencies should come before dependents
        assert!(get_position("d") < get_position("c"));
        assert!(get_position("c") < get_position("b"));
        assert!(get_position("b") < get_position("a"));
    }
}

/// Integration-level exercise of the SAT solver's own candidate universe,
/// bypassing the index crate entirely. Covers the end-to-end request/upgrade/
/// conflict/vital scenarios and the invariants the index-backed tests above
/// can't reach deterministically (a package name can carry several competing
/// remote versions in one index bucket, whose iteration order isn't fixed).
mod sat_scenarios {
    use sps2_resolver::*;
    use std::collections::HashSet;

    fn candidate(uid: &str, version: &str, origin: Origin) -> UniverseItem {
        UniverseItem {
            uid: Uid::new(uid),
            name: uid.to_string(),
            version: version.to_string(),
            digest: format!("{uid}-{version}"),
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

    fn remote(uid: &str, version: &str) -> UniverseItem {
        candidate(uid, version, Origin::Remote)
    }

    fn add(uid: &str) -> RequestItem {
        RequestItem {
            uid: Uid::new(uid),
            job_type: JobType::Install,
            digest: None,
        }
    }

    // S1 Plain install, driven through the public Problem entry point rather
    // than the index-backed Resolver.
    #[test]
    fn plain_install_resolves_one_job() {
        let mut universe = Universe::new();
        universe.insert(remote("curl", "8.5.0"));

        let mut jobs = Jobs::new();
        jobs.add(add("curl"));

        let config = SolverConfig::default();
        let callbacks = TerminalCallbacks::new(true);
        let plan = Problem::new(&universe, &jobs, config, &callbacks)
            .solve()
            .unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].job_type, JobType::Install);
        assert_eq!(plan[0].item0.uid, "curl");
    }

    // S2 Upgrade: a remote candidate competing with the installed local one
    // replaces it rather than leaving the chain untouched.
    #[test]
    fn upgrade_replaces_local_candidate() {
        let mut universe = Universe::new();
        universe.insert(candidate("curl", "8.5.0", Origin::Remote));
        universe.insert(candidate("curl", "8.0.0", Origin::Local));

        let mut jobs = Jobs::new();
        jobs.add(add("curl"));

        let config = SolverConfig::default();
        let callbacks = TerminalCallbacks::new(true);
        let plan = Problem::new(&universe, &jobs, config, &callbacks)
            .solve()
            .unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].job_type, JobType::Upgrade);
        assert_eq!(plan[0].item0.version, "8.5.0");
        assert_eq!(plan[0].item1.as_ref().unwrap().version, "8.0.0");
    }

    // Regression for a request matching three or more remote candidates
    // under the same Uid: exactly one gets installed, not the whole chain.
    #[test]
    fn request_with_several_remote_versions_installs_exactly_one() {
        let mut universe = Universe::new();
        universe.insert(remote("test", "1.0.0"));
        universe.insert(remote("test", "1.1.0"));
        universe.insert(remote("test", "1.2.0"));

        let mut jobs = Jobs::new();
        jobs.add(add("test"));

        let config = SolverConfig::default();
        let callbacks = TerminalCallbacks::new(true);
        let plan = Problem::new(&universe, &jobs, config, &callbacks)
            .solve()
            .unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].job_type, JobType::Install);
        assert_eq!(plan[0].item0.uid, "test");
    }

    // S4 Dependency pull, across a package/provides edge: requesting `a`
    // alone must also install `b` through the DEPEND clause.
    #[test]
    fn dependency_pull_installs_transitive_package() {
        let mut universe = Universe::new();
        let mut a = remote("a", "1.0.0");
        a.depends.push(Depend::single(Uid::new("b")));
        universe.insert(a);
        universe.insert(remote("b", "1.0.0"));

        let mut jobs = Jobs::new();
        jobs.add(add("a"));

        let config = SolverConfig::default();
        let callbacks = TerminalCallbacks::new(true);
        let plan = Problem::new(&universe, &jobs, config, &callbacks)
            .solve()
            .unwrap();

        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|j| j.job_type == JobType::Install));
        let uids: Vec<&str> = plan.iter().map(|j| j.item0.uid.as_str()).collect();
        assert!(uids.contains(&"a"));
        assert!(uids.contains(&"b"));
    }

    // S5 Conflict: two mutually exclusive top-level requests can't both
    // install; the solver drops exactly one rather than erroring outright.
    #[test]
    fn conflicting_requests_keep_exactly_one() {
        let mut universe = Universe::new();
        let mut foo = remote("foo", "1.0.0");
        foo.conflicts.push(Conflict {
            uid: Uid::new("bar"),
            kind: ConflictKind::RemoteRemote,
            digest: None,
        });
        universe.insert(foo);
        universe.insert(remote("bar", "1.0.0"));

        let mut jobs = Jobs::new();
        jobs.add(add("foo"));
        jobs.add(add("bar"));

        let config = SolverConfig::default();
        let callbacks = TerminalCallbacks::new(true);
        let plan = Problem::new(&universe, &jobs, config, &callbacks)
            .solve()
            .unwrap();

        assert_eq!(plan.len(), 1);
        assert!(plan[0].item0.uid == "foo" || plan[0].item0.uid == "bar");
    }

    // S6 Vital protection: removing the only candidate of a vital package is
    // rejected under the default policy.
    #[test]
    fn vital_package_survives_default_removal_request() {
        let mut universe = Universe::new();
        let mut kernel = candidate("kernel", "1.0.0", Origin::Local);
        kernel.vital = true;
        universe.insert(kernel);

        let mut jobs = Jobs::new();
        jobs.add(RequestItem {
            uid: Uid::new("kernel"),
            job_type: JobType::Delete,
            digest: None,
        });

        let config = SolverConfig::default();
        let callbacks = TerminalCallbacks::new(true);
        let plan = Problem::new(&universe, &jobs, config, &callbacks)
            .solve()
            .unwrap();

        assert!(!plan.iter().any(|j| j.job_type == JobType::Delete));
    }

    // Invariant 6 (ABI discipline): a consumer requiring a shared library by
    // soname only accepts a provider whose ABI tag matches its own, and a
    // soname listed in `system_shlibs` is treated as already satisfied.
    #[test]
    fn shlib_requirement_only_matches_compatible_abi() {
        let mut universe = Universe::new();

        let mut app = remote("app", "1.0.0");
        app.abi = Some("abi-2".into());
        app.shlibs_required.push("libfoo.so.2".into());
        universe.insert(app);

        let mut old_lib = remote("libfoo-old", "1.0.0");
        old_lib.abi = Some("abi-1".into());
        old_lib.shlibs_provided.push("libfoo.so.2".into());
        universe.insert(old_lib);

        let mut new_lib = remote("libfoo-new", "2.0.0");
        new_lib.abi = Some("abi-2".into());
        new_lib.shlibs_provided.push("libfoo.so.2".into());
        universe.insert(new_lib);

        let mut jobs = Jobs::new();
        jobs.add(add("app"));

        let config = SolverConfig::default();
        let callbacks = TerminalCallbacks::new(true);
        let plan = Problem::new(&universe, &jobs, config, &callbacks)
            .solve()
            .unwrap();

        let uids: HashSet<&str> = plan.iter().map(|j| j.item0.uid.as_str()).collect();
        assert!(uids.contains("app"));
        assert!(uids.contains("libfoo-new"));
        assert!(!uids.contains("libfoo-old"));
    }

    // A shlib listed in `system_shlibs` needs no provider in the universe at
    // all — the requirement is satisfied by the base system.
    #[test]
    fn shlib_requirement_satisfied_by_system_shlibs_needs_no_provider() {
        let mut universe = Universe::new();
        let mut app = remote("app", "1.0.0");
        app.shlibs_required.push("libc.so.7".into());
        universe.insert(app);

        let mut jobs = Jobs::new();
        jobs.add(add("app"));

        let mut config = SolverConfig::default();
        config.system_shlibs.insert("libc.so.7".to_string());
        let callbacks = TerminalCallbacks::new(true);

        let plan = Problem::new(&universe, &jobs, config, &callbacks)
            .solve()
            .unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].item0.uid, "app");
    }
}

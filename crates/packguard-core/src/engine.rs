//! The scan orchestration engine.
//!
//! One engine drives one scan at a time: acquire a fresh repository, apply
//! init stages, import baseline packages, then process each target package
//! recursively while fanning events out to every check. Execution is
//! single-threaded and strictly sequential; checks receive events one at a
//! time and need no locking.

use std::path::{Path, PathBuf};

use packguard_domain::InitStage;
use packguard_types::{InstallHookPolicy, PackageId, Report};
use tracing::debug;

use crate::archive::{ArchiveOpener, PackageArchive};
use crate::bootstrap;
use crate::check::{Check, CheckWrapper};
use crate::error::{HookError, ProcessError, ScanError};
use crate::listener::{DefaultErrorListener, ErrorListener};
use crate::memory::MemoryRepositoryFactory;
use crate::repo::{PathEvent, RepoHandle, Repository, RepositoryFactory};

/// Orchestrates an entire scan and returns the ordered report list, or
/// raises the fatal error that aborted it. There is no partial outcome.
pub struct ScanEngine {
    repositories: Box<dyn RepositoryFactory>,
    opener: Box<dyn ArchiveOpener>,
    checks: Vec<CheckWrapper>,
    error_listener: Box<dyn ErrorListener>,
    init_stages: Vec<InitStage>,
    pre_install: Vec<PathBuf>,
    hook_policy: InstallHookPolicy,
    enable_pre_install_hooks: bool,
}

impl ScanEngine {
    pub fn builder(opener: Box<dyn ArchiveOpener>) -> ScanEngineBuilder {
        ScanEngineBuilder::new(opener)
    }

    /// Execute a scan over the given target package sources, in caller
    /// order. Every check receives `finished_scan` and the repository is
    /// torn down even when the scan aborts.
    pub fn scan(&mut self, packages: &[PathBuf]) -> Result<Vec<Report>, ScanError> {
        self.error_listener.started_scan();

        let outcome = self.run(packages);

        // finish guarantee: delivered unconditionally, still isolated
        for wrapper in &mut self.checks {
            if wrapper.is_silenced() {
                continue;
            }
            let name = wrapper.effective_name();
            if let Err(error) = wrapper.check_mut().finished_scan() {
                self.error_listener.on_check_error(&error, &name, None);
            }
        }
        self.error_listener.finished_scan();

        outcome?;

        let mut reports = Vec::with_capacity(self.checks.len() + 1);
        reports.push(self.error_listener.report());
        reports.extend(self.checks.iter().map(CheckWrapper::report));
        Ok(reports)
    }

    /// Run caller logic against a bootstrapped repository session without
    /// importing any packages. Teardown guarantees match [`Self::scan`].
    pub fn init_and_inspect<T>(
        &mut self,
        inspect: impl FnOnce(&dyn RepoHandle) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let mut repository = self.repositories.acquire()?;
        let result = (|| {
            let mut handle = repository.open()?;
            bootstrap::apply_init_stages(
                handle.as_mut(),
                &self.init_stages,
                self.error_listener.as_mut(),
            );
            let inspected = inspect(handle.as_ref());
            handle.close();
            inspected
        })();
        repository.shutdown();
        result
    }

    fn run(&mut self, packages: &[PathBuf]) -> Result<(), ScanError> {
        let mut repository = self
            .repositories
            .acquire()
            .map_err(|source| ScanError::Repository { source })?;
        let result = self.run_session(repository.as_mut(), packages);
        repository.shutdown();
        result
    }

    fn run_session(
        &mut self,
        repository: &mut dyn Repository,
        packages: &[PathBuf],
    ) -> Result<(), ScanError> {
        let mut handle = repository
            .open()
            .map_err(|source| ScanError::Repository { source })?;
        let result = self.scan_session(handle.as_mut(), packages);
        handle.close();
        result
    }

    fn scan_session(
        &mut self,
        handle: &mut dyn RepoHandle,
        packages: &[PathBuf],
    ) -> Result<(), ScanError> {
        bootstrap::apply_init_stages(handle, &self.init_stages, self.error_listener.as_mut());

        let pre_install = self.pre_install.clone();
        for source in &pre_install {
            self.process_source(handle, source, true)?;
        }

        for wrapper in &mut self.checks {
            if wrapper.is_silenced() {
                continue;
            }
            let name = wrapper.effective_name();
            if let Err(error) = wrapper.check_mut().started_scan() {
                self.error_listener.on_check_error(&error, &name, None);
            }
        }

        for source in packages {
            self.process_source(handle, source, false)?;
        }

        Ok(())
    }

    /// Open and process one package source. Any failure here is fatal,
    /// wrapped with the offending source locator.
    fn process_source(
        &mut self,
        handle: &mut dyn RepoHandle,
        source: &Path,
        pre_install: bool,
    ) -> Result<(), ScanError> {
        debug!(source = %source.display(), pre_install, "processing package source");
        match self.try_source(handle, source, pre_install) {
            Ok(()) => Ok(()),
            Err(error) => {
                self.error_listener.on_package_error(&error, source);
                Err(ScanError::Package {
                    package: source.to_path_buf(),
                    source: error,
                })
            }
        }
    }

    fn try_source(
        &mut self,
        handle: &mut dyn RepoHandle,
        source: &Path,
        pre_install: bool,
    ) -> Result<(), ProcessError> {
        let archive = self.opener.open(source)?;
        if !pre_install {
            let id = archive.id.clone();
            deliver(
                &mut self.checks,
                self.error_listener.as_mut(),
                Some(&id),
                |check| check.identify_package(&id, source),
            );
        }
        self.process_package(handle, &archive, pre_install)
    }

    fn process_package(
        &mut self,
        handle: &mut dyn RepoHandle,
        archive: &PackageArchive,
        pre_install: bool,
    ) -> Result<(), ProcessError> {
        let id = archive.id.clone();
        if !archive.valid {
            return Err(ProcessError::InvalidPackage { id });
        }

        // non-recursive discovery of declared nested packages
        let subpackage_ids = archive.declared_subpackage_ids();

        if !pre_install {
            if let Some(manifest) = &archive.manifest {
                deliver(
                    &mut self.checks,
                    self.error_listener.as_mut(),
                    Some(&id),
                    |check| check.read_manifest(&id, manifest),
                );
            }
            deliver(
                &mut self.checks,
                self.error_listener.as_mut(),
                Some(&id),
                |check| check.before_extract(&id, &archive.properties, &subpackage_ids),
            );
        }

        self.apply_hook_policy(archive, pre_install)?;

        let ScanEngine {
            checks,
            error_listener,
            ..
        } = self;
        handle.import_entries(&archive.entries, &mut |event| {
            fan_path_event(checks, error_listener.as_mut(), &id, event, pre_install);
        })?;
        handle.commit()?;

        if !pre_install {
            deliver(
                &mut self.checks,
                self.error_listener.as_mut(),
                Some(&id),
                |check| check.after_extract(&id),
            );
        }

        for subpackage_id in &subpackage_ids {
            self.process_subpackage(handle, archive, subpackage_id, &id, pre_install)?;
        }

        Ok(())
    }

    /// Process one nested package. Failures abort only this subtree and are
    /// reported; siblings and the parent's remaining processing continue.
    /// The abort hook policy is the one exception and stays fatal.
    fn process_subpackage(
        &mut self,
        handle: &mut dyn RepoHandle,
        parent: &PackageArchive,
        id: &PackageId,
        parent_id: &PackageId,
        pre_install: bool,
    ) -> Result<(), ProcessError> {
        match self.try_subpackage(handle, parent, id, parent_id, pre_install) {
            Ok(()) => Ok(()),
            Err(error @ ProcessError::HookAbort { .. }) => Err(error),
            Err(error) => {
                debug!(package = %id, %error, "abandoning nested package subtree");
                handle.discard();
                self.error_listener.on_subpackage_error(&error, id);
                Ok(())
            }
        }
    }

    fn try_subpackage(
        &mut self,
        handle: &mut dyn RepoHandle,
        parent: &PackageArchive,
        id: &PackageId,
        parent_id: &PackageId,
        pre_install: bool,
    ) -> Result<(), ProcessError> {
        let subpackage = parent.subpackage(id)?;
        if !pre_install {
            deliver(
                &mut self.checks,
                self.error_listener.as_mut(),
                Some(id),
                |check| check.identify_subpackage(id, parent_id),
            );
        }
        self.process_package(handle, subpackage, pre_install)
    }

    fn apply_hook_policy(
        &mut self,
        archive: &PackageArchive,
        pre_install: bool,
    ) -> Result<(), ProcessError> {
        if archive.hooks.is_empty() {
            return Ok(());
        }
        let policy = if pre_install && !self.enable_pre_install_hooks {
            InstallHookPolicy::Skip
        } else {
            self.hook_policy
        };

        match policy {
            InstallHookPolicy::Skip => {}
            InstallHookPolicy::Prohibit => {
                for hook in &archive.hooks {
                    self.error_listener.on_hook_error(
                        &HookError::Prohibited {
                            name: hook.name.clone(),
                        },
                        &archive.id,
                    );
                }
            }
            InstallHookPolicy::Report => {
                for hook in archive.hooks.iter().filter(|hook| !hook.loadable) {
                    self.error_listener.on_hook_error(
                        &HookError::Failed {
                            name: hook.name.clone(),
                        },
                        &archive.id,
                    );
                }
            }
            InstallHookPolicy::Abort => {
                if let Some(hook) = archive.hooks.iter().find(|hook| !hook.loadable) {
                    return Err(ProcessError::HookAbort {
                        id: archive.id.clone(),
                        hook: hook.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Fan one lifecycle event out to every non-silenced check, isolating each
/// check's failure.
fn deliver(
    checks: &mut [CheckWrapper],
    listener: &mut dyn ErrorListener,
    package: Option<&PackageId>,
    mut event: impl FnMut(&mut dyn Check) -> anyhow::Result<()>,
) {
    for wrapper in checks {
        if wrapper.is_silenced() {
            continue;
        }
        let name = wrapper.effective_name();
        if let Err(error) = event(wrapper.check_mut()) {
            listener.on_check_error(&error, &name, package);
        }
    }
}

/// Translate one low-level import callback into check notifications.
fn fan_path_event(
    checks: &mut [CheckWrapper],
    listener: &mut dyn ErrorListener,
    package: &PackageId,
    event: PathEvent,
    pre_install: bool,
) {
    match event {
        PathEvent::Failed { path, error } => {
            // importer failures are reported even during pre-install
            listener.on_import_error(&error, package, &path);
        }
        _ if pre_install => {}
        PathEvent::Imported { path, node } => {
            for wrapper in checks {
                if wrapper.is_silenced() {
                    continue;
                }
                let name = wrapper.effective_name();
                if let Err(error) = wrapper.check_mut().imported_path(package, &path, &node) {
                    listener.on_check_path_error(&error, &name, package, &path);
                }
            }
        }
        PathEvent::Deleted { path } => {
            for wrapper in checks {
                if wrapper.is_silenced() {
                    continue;
                }
                let name = wrapper.effective_name();
                if let Err(error) = wrapper.check_mut().deleted_path(package, &path) {
                    listener.on_check_path_error(&error, &name, package, &path);
                }
            }
        }
    }
}

/// Builder for [`ScanEngine`], mirroring how a plan is assembled: checks,
/// init stages, pre-install sources, then policies.
pub struct ScanEngineBuilder {
    repositories: Box<dyn RepositoryFactory>,
    opener: Box<dyn ArchiveOpener>,
    checks: Vec<CheckWrapper>,
    error_listener: Box<dyn ErrorListener>,
    init_stages: Vec<InitStage>,
    pre_install: Vec<PathBuf>,
    hook_policy: InstallHookPolicy,
    enable_pre_install_hooks: bool,
}

impl ScanEngineBuilder {
    pub fn new(opener: Box<dyn ArchiveOpener>) -> Self {
        ScanEngineBuilder {
            repositories: Box::new(MemoryRepositoryFactory),
            opener,
            checks: Vec::new(),
            error_listener: Box::new(DefaultErrorListener::new()),
            init_stages: Vec::new(),
            pre_install: Vec::new(),
            hook_policy: InstallHookPolicy::default(),
            enable_pre_install_hooks: false,
        }
    }

    pub fn with_repository_factory(mut self, repositories: Box<dyn RepositoryFactory>) -> Self {
        self.repositories = repositories;
        self
    }

    pub fn with_check(mut self, check: Box<dyn Check>) -> Self {
        self.checks.push(CheckWrapper::new(check));
        self
    }

    pub fn with_wrapped_check(mut self, wrapper: CheckWrapper) -> Self {
        self.checks.push(wrapper);
        self
    }

    pub fn with_wrapped_checks(mut self, wrappers: Vec<CheckWrapper>) -> Self {
        self.checks.extend(wrappers);
        self
    }

    pub fn with_error_listener(mut self, listener: Box<dyn ErrorListener>) -> Self {
        self.error_listener = listener;
        self
    }

    pub fn with_init_stage(mut self, stage: InitStage) -> Self {
        self.init_stages.push(stage);
        self
    }

    pub fn with_init_stages(mut self, stages: Vec<InitStage>) -> Self {
        self.init_stages.extend(stages);
        self
    }

    pub fn with_pre_install_package(mut self, source: PathBuf) -> Self {
        self.pre_install.push(source);
        self
    }

    pub fn with_pre_install_packages(mut self, sources: Vec<PathBuf>) -> Self {
        self.pre_install.extend(sources);
        self
    }

    pub fn with_hook_policy(mut self, policy: InstallHookPolicy) -> Self {
        self.hook_policy = policy;
        self
    }

    pub fn with_pre_install_hooks_enabled(mut self, enabled: bool) -> Self {
        self.enable_pre_install_hooks = enabled;
        self
    }

    pub fn build(self) -> ScanEngine {
        ScanEngine {
            repositories: self.repositories,
            opener: self.opener,
            checks: self.checks,
            error_listener: self.error_listener,
            init_stages: self.init_stages,
            pre_install: self.pre_install,
            hook_policy: self.hook_policy,
            enable_pre_install_hooks: self.enable_pre_install_hooks,
        }
    }
}

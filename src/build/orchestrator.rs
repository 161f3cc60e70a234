//! One build attempt, from rebuild decision to cleanup.

use std::fs;
use std::path::Path;
use std::time::SystemTime;
use tracing::{error, info, warn};

use super::artifact;
use super::cleanup::{self, AttemptResources};
use super::context::BuildContext;
use super::engine;
use super::lease::Lease;
use super::rebuild;
use super::report::{BuildReport, Outcome};
use super::state::{BuildState, Event, Transition};
use crate::common::{write_file_mode, Workspace};
use crate::credentials::{self, CredentialSet, Role};
use crate::error::{BuildError, BuildResult, CleanupWarning};
use crate::media::{MediaStrategy, MediaSynthesizer, SynthesizedImage, DESCRIPTOR_NAME};
use crate::package::{BoxRequest, Packager};
use crate::tools::EngineJob;

/// Drives a [`BuildContext`] through the build state machine.
pub struct Orchestrator<'a> {
    ctx: &'a BuildContext,
    state: BuildState,
    report: BuildReport,
}

impl<'a> Orchestrator<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        Self {
            ctx,
            state: BuildState::Idle,
            report: BuildReport::new(&ctx.paths.version),
        }
    }

    /// Run the build. Every path through here ends in a terminal state,
    /// and every path past the rebuild decision runs cleanup first.
    pub fn run(ctx: &'a BuildContext) -> BuildReport {
        Self::new(ctx).execute()
    }

    fn execute(mut self) -> BuildReport {
        let ctx = self.ctx;
        info!(version = %ctx.paths.version, artifact = %ctx.paths.artifact_name, "build requested");

        self.step(Event::Advance);
        let decision = rebuild::decide(
            &ctx.paths.box_path,
            ctx.config.rebuild_interval(),
            ctx.force,
            SystemTime::now(),
        );
        self.report.decision = Some(decision);
        if !decision.needs_rebuild() {
            info!("{}, skipping build", decision);
            self.step(Event::UpToDate);
            self.report.outcome = Outcome::Skipped;
            return self.report;
        }
        info!("rebuilding: {}", decision);
        self.step(Event::Advance);

        let mut resources = AttemptResources::default();
        let result = self.pipeline(&mut resources);
        if let Err(e) = &result {
            error!(kind = e.kind(), stage = %self.state, "build failed: {}", e);
            self.step(Event::Fault);
        }

        let warnings = cleanup::run(&ctx.config, &ctx.paths, resources);
        self.report.warnings.extend(warnings);

        match result {
            Ok(()) => {
                self.step(Event::Done);
                self.report.outcome = Outcome::Succeeded;
            }
            Err(e) => {
                self.step(Event::DoneWithError);
                self.report.outcome = Outcome::Failed(e);
            }
        }
        self.report
    }

    /// PreparingMedia through PersistingCredentials.
    fn pipeline(&mut self, resources: &mut AttemptResources) -> BuildResult<()> {
        let ctx = self.ctx;
        let config = &ctx.config;
        let paths = &ctx.paths;

        // Everything up to the lease stays in memory.
        let credentials: &CredentialSet = resources
            .credentials
            .insert(CredentialSet::generate(ctx.tools.secrets.as_ref())?);
        let template = fs::read_to_string(&paths.descriptor_template).map_err(|e| {
            BuildError::Validation(format!(
                "cannot read descriptor template {}: {}",
                paths.descriptor_template.display(),
                e
            ))
        })?;
        let descriptor = credentials::embed(&template, credentials)?;

        resources.lease = Some(Lease::acquire(&paths.lease_path, config.lease_timeout())?);

        let workspace = Workspace::create(&config.scratch_root, "descriptor").map_err(BuildError::media)?;
        let descriptor_path = workspace.join(DESCRIPTOR_NAME);
        write_file_mode(&descriptor_path, descriptor.as_bytes(), 0o600).map_err(BuildError::media)?;
        drop(descriptor);
        let image = self.prepare_media(&descriptor_path);
        if let Err(e) = workspace.remove() {
            warn!("failed to remove descriptor workspace: {:#}", e);
        }
        let image = image?;
        self.step(Event::Advance);

        engine::run(
            ctx.tools.engine.as_ref(),
            &EngineJob {
                engine_config: &paths.engine_config,
                image: &image.path,
                output_dir: &paths.output_dir,
                network: &config.network_switch,
                log_path: &paths.engine_log,
                admin_username: &config.usernames.administrator,
                admin_password: credentials.require(Role::Administrator)?,
            },
        )?;
        self.step(Event::Advance);

        let artifact = artifact::verify(&paths.output_dir, &config.disk_format)?;
        info!(disks = artifact.disks.len(), primary = %artifact.primary_disk().display(), "build artifact verified");
        self.step(Event::Advance);

        let packager = Packager::new(
            ctx.tools.archiver.as_ref(),
            ctx.tools.registry.as_ref(),
            &config.scratch_root,
        );
        let boxed = packager.package(&BoxRequest {
            artifact: &artifact,
            name: &paths.artifact_name,
            os_version: &paths.version,
            disk_format: &config.disk_format,
            provider: &config.provider,
            box_path: &paths.box_path,
            username: &config.usernames.user,
            password: credentials.require(Role::User)?,
        })?;
        self.report.box_path = Some(boxed.path);
        self.step(Event::Advance);

        match credentials::persist(
            credentials,
            &config.usernames,
            &config.credentials_dir(),
            &paths.version,
            &paths.artifact_name,
        ) {
            Ok(path) => self.report.record_path = Some(path),
            Err(e) => {
                error!("credential record not written: {:#}", e);
                self.report.warnings.push(CleanupWarning::new(format!(
                    "credential record not written: {:#}",
                    e
                )));
            }
        }
        self.step(Event::Advance);
        Ok(())
    }

    /// Incremental patch when an image survives, else full synthesis.
    /// A failed patch falls back to full synthesis exactly once.
    fn prepare_media(&mut self, descriptor: &Path) -> BuildResult<SynthesizedImage> {
        let ctx = self.ctx;
        let paths = &ctx.paths;
        let synthesizer = MediaSynthesizer::new(ctx.tools.media.as_ref(), &ctx.config.scratch_root)
            .with_scripts(ctx.config.scripts_dir.as_deref());

        let mut strategy = MediaStrategy::select(&paths.image_path);
        loop {
            self.report.strategy = Some(strategy);
            let result = match strategy {
                MediaStrategy::Incremental => synthesizer.incremental_patch(&paths.image_path, descriptor),
                MediaStrategy::Full => {
                    synthesizer.full_synthesize(&paths.source_image, descriptor, &paths.image_path)
                }
            };
            match (result, strategy.fallback()) {
                (Ok(image), _) => {
                    info!(strategy = %strategy, boot = %image.boot.mode(), "media ready");
                    return Ok(image);
                }
                (Err(e), Some(next)) => {
                    warn!("{} media failed, falling back to {}: {}", strategy, next, e);
                    self.report.fell_back = true;
                    strategy = next;
                }
                (Err(e), None) => return Err(e),
            }
        }
    }

    fn step(&mut self, event: Event) {
        let from = self.state;
        match from.next(event) {
            Some(to) => {
                info!(from = %from, to = %to, "build state");
                self.state = to;
                self.report.transitions.push(Transition { from, to, event });
            }
            None => {
                error!(state = %from, ?event, "rejected state transition");
                debug_assert!(false, "rejected transition {:?} from {}", event, from);
            }
        }
    }
}

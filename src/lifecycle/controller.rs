//! The lifecycle controller.

use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::accounts::{AccountManager, ServiceAccount};
use crate::agent::{EndpointPublisher, PublishedEndpoint, StatusReporter, UnitStatus};
use crate::audit::{AuditEntry, AuditLogger};
use crate::config::{ExporterConfig, ExporterOptions, Settings};
use crate::error::{OperatorError, OperatorResult};
use crate::grants::{GrantManager, HELPER_COMMANDS};
use crate::host::Host;
use crate::provision::{PackageInstaller, ResourceProvisioner};
use crate::services::{ExporterUnit, ServiceUnitManager, ServiceUnitState};
use crate::templates::{TemplateEngine, SERVICE_UNIT};
use crate::validation::ListenAddress;

use super::event::LifecycleEvent;
use super::state::{check_transition, LifecyclePhase, LifecycleState, StateStore};
use super::steps::{ProvisionStep, INSTALL_SEQUENCE, TEARDOWN_SEQUENCE};
use super::version::query_version;

/// Handles one lifecycle event at a time against a single host.
pub struct LifecycleController<'a, H: Host> {
    host: &'a H,
    settings: &'a Settings,
    engine: &'a TemplateEngine,
    reporter: &'a dyn StatusReporter,
    publisher: &'a dyn EndpointPublisher,
    journal: AuditLogger,
    store: StateStore,
    unit: ExporterUnit,
    account: ServiceAccount,
    run_id: Uuid,
}

impl<'a, H: Host> LifecycleController<'a, H> {
    pub fn new(
        host: &'a H,
        settings: &'a Settings,
        engine: &'a TemplateEngine,
        reporter: &'a dyn StatusReporter,
        publisher: &'a dyn EndpointPublisher,
        journal: AuditLogger,
    ) -> OperatorResult<Self> {
        Ok(Self {
            host,
            settings,
            engine,
            reporter,
            publisher,
            journal,
            store: StateStore::new(&settings.paths.lifecycle_state),
            unit: ExporterUnit::from_settings(settings),
            account: ServiceAccount::new(&settings.service.user, &settings.service.group)?,
            run_id: Uuid::new_v4(),
        })
    }

    /// Current persisted state.
    pub fn state(&self) -> OperatorResult<LifecycleState> {
        self.store.load()
    }

    /// Handle `event` to completion.
    ///
    /// `options` is validated only for events that take options; the others
    /// use what the last install or config change persisted, so a bad bag
    /// never blocks them.
    pub fn handle(&mut self, event: LifecycleEvent, options: &ExporterOptions) -> OperatorResult<()> {
        let started = Instant::now();
        let mut state = self.store.load()?;
        let before = state.phase;

        info!(run_id = %self.run_id, event = %event, phase = %before, "Handling lifecycle event");

        let mut entry = AuditEntry::new(self.run_id, event.name(), &before.to_string());
        if event.uses_options() {
            match serde_json::to_value(options) {
                Ok(value) => entry = entry.with_options(value),
                Err(e) => warn!(error = %e, "Failed to record options in journal"),
            }
        }

        let result = check_transition(before, event).and_then(|()| match event {
            LifecycleEvent::Install => self
                .resolve_options(options)
                .and_then(|config| self.handle_install(&mut state, &config)),
            LifecycleEvent::UpgradeCharm => self.handle_upgrade_charm(&mut state),
            LifecycleEvent::ConfigChanged => self
                .resolve_options(options)
                .and_then(|config| self.handle_config_changed(&mut state, &config)),
            LifecycleEvent::Start => self.handle_start(),
            LifecycleEvent::Stop => self.handle_stop(&mut state),
            LifecycleEvent::MetricsRelationCreated => self.handle_metrics_relation_created(&state),
        });

        let duration_ms = started.elapsed().as_millis() as u64;
        let entry = match &result {
            Ok(()) => {
                info!(event = %event, phase = %state.phase, duration_ms, "Lifecycle event handled");
                entry.succeeded(&state.phase.to_string(), state.workload_version.clone(), duration_ms)
            }
            Err(e) => {
                warn!(event = %event, phase = %state.phase, error = %e, code = e.code(), "Lifecycle event failed");
                entry.failed(&state.phase.to_string(), e.code(), e.to_string(), duration_ms)
            }
        };
        if let Err(e) = self.journal.log(&entry) {
            warn!(error = %e, "Failed to write journal entry");
        }

        result
    }

    /// Run the full install sequence, then discover and report the version.
    ///
    /// A failing step aborts the sequence and leaves the phase `Installing`
    /// so a retried install is accepted. Nothing is rolled back.
    pub fn handle_install(
        &self,
        state: &mut LifecycleState,
        config: &ExporterConfig,
    ) -> OperatorResult<()> {
        self.reporter
            .set_status(UnitStatus::Maintenance, "Installing ipmi-exporter")?;

        state.phase = LifecyclePhase::Installing;
        self.store.save(state)?;

        for step in INSTALL_SEQUENCE {
            debug!(step = %step, "Running install step");
            self.run_step(step, config).map_err(|e| e.at_step(step))?;
            info!(step = %step, "Install step complete");
        }

        let version = self.report_version()?;

        state.phase = LifecyclePhase::Active;
        state.workload_version = Some(version);
        state.exporter_version = Some(config.version.clone());
        state.listen_address = Some(config.listen_address.to_string());
        self.store.save(state)?;

        self.reporter
            .set_status(UnitStatus::Active, "ipmi-exporter installed")?;
        Ok(())
    }

    /// Re-read the installed binary's version. Nothing is downloaded or
    /// restarted.
    pub fn handle_upgrade_charm(&self, state: &mut LifecycleState) -> OperatorResult<()> {
        self.reporter
            .set_status(UnitStatus::Maintenance, "Upgrading ipmi-exporter")?;

        let version = self.report_version()?;
        if state.workload_version.as_deref() == Some(version.as_str()) {
            debug!(version = %version, "Workload version unchanged");
        } else {
            state.workload_version = Some(version);
            self.store.save(state)?;
        }

        self.reporter
            .set_status(UnitStatus::Active, "ipmi-exporter upgraded")?;
        Ok(())
    }

    /// Re-render sysconfig, restart once, and republish the endpoint.
    ///
    /// The endpoint is published even when the restart fails; the restart
    /// error is then returned. Rendered files are never reverted.
    pub fn handle_config_changed(
        &self,
        state: &mut LifecycleState,
        config: &ExporterConfig,
    ) -> OperatorResult<()> {
        self.reporter
            .set_status(UnitStatus::Maintenance, "Configuring ipmi-exporter")?;

        state.phase = LifecyclePhase::Restarting;
        self.store.save(state)?;

        let rendered = self.provisioner().write_sysconfig(
            self.engine,
            &config.listen_address,
            &self.account.name,
            &self.account.group,
        );
        if let Err(e) = rendered {
            state.phase = LifecyclePhase::Active;
            self.store.save(state)?;
            return Err(e);
        }
        state.listen_address = Some(config.listen_address.to_string());

        let restarted = self.services().restart();
        let published = self.publish_endpoint(&config.listen_address);

        state.phase = LifecyclePhase::Active;
        self.store.save(state)?;

        restarted?;
        published?;

        self.reporter
            .set_status(UnitStatus::Active, "ipmi-exporter configured")?;
        Ok(())
    }

    /// Start the unit. Requires it to be enabled; a running unit is left alone.
    pub fn handle_start(&self) -> OperatorResult<()> {
        let services = self.services();
        let unit_state = services.state()?;

        if !unit_state.can_start() {
            return Err(OperatorError::InvalidTransition {
                event: LifecycleEvent::Start.to_string(),
                phase: format!("service unit is {}", unit_state),
            });
        }

        if unit_state == ServiceUnitState::Running {
            debug!(unit = %self.unit.name, "Service already running");
        } else {
            services.start()?;
        }

        self.reporter
            .set_status(UnitStatus::Active, "ipmi-exporter started")?;
        Ok(())
    }

    /// Stop and disable the unit, then reverse every provisioning step.
    ///
    /// Resources that are already gone are skipped, so this succeeds on a
    /// partially provisioned or already clean host.
    pub fn handle_stop(&self, state: &mut LifecycleState) -> OperatorResult<()> {
        self.reporter
            .set_status(UnitStatus::Maintenance, "Stopping ipmi-exporter")?;

        state.phase = LifecyclePhase::Stopping;
        self.store.save(state)?;

        let unit_state = self.services().state()?;
        for step in TEARDOWN_SEQUENCE {
            debug!(step = %step, "Running teardown step");
            self.run_teardown_step(step, unit_state)
                .map_err(|e| e.at_teardown_step(step))?;
        }
        self.publisher.withdraw()?;

        *state = LifecycleState::default();
        self.store.save(state)?;

        self.reporter
            .set_status(UnitStatus::Maintenance, "ipmi-exporter removed")?;
        Ok(())
    }

    /// Republish the endpoint for a newly attached metrics consumer.
    pub fn handle_metrics_relation_created(&self, state: &LifecycleState) -> OperatorResult<()> {
        let listen_address: ListenAddress = match &state.listen_address {
            Some(address) => address.parse()?,
            None => {
                return Err(OperatorError::Config {
                    message: "No listen address recorded for the installed exporter".to_string(),
                })
            }
        };
        self.publish_endpoint(&listen_address)
    }

    fn resolve_options(&self, options: &ExporterOptions) -> OperatorResult<ExporterConfig> {
        options
            .clone()
            .into_config(self.settings.download.architecture)
    }

    /// Query the installed binary's version and surface it to the agent.
    pub fn report_version(&self) -> OperatorResult<String> {
        let version = query_version(
            self.host,
            &self.settings.paths.binary,
            self.settings.service.command_timeout(),
        )?;
        self.reporter.set_workload_version(&version)?;
        info!(version = %version, "Workload version reported");
        Ok(version)
    }

    fn run_step(&self, step: ProvisionStep, config: &ExporterConfig) -> OperatorResult<()> {
        match step {
            ProvisionStep::InstallBinary => {
                self.provisioner()
                    .install(&config.version, config.architecture)?;
            }
            ProvisionStep::InstallDependencies => {
                PackageInstaller::new(
                    self.host,
                    self.settings.service.command_timeout(),
                    self.settings.service.package_timeout(),
                )
                .ensure_installed(&self.settings.service.dependency_package)?;
            }
            ProvisionStep::EnsureServiceAccount => {
                self.accounts().ensure_service_account(&self.account)?;
            }
            ProvisionStep::WriteExporterConfig => {
                self.provisioner().write_exporter_config(self.engine)?;
            }
            ProvisionStep::GrantPrivileges => {
                self.grants().grant(&self.account.name, HELPER_COMMANDS)?;
            }
            ProvisionStep::RegisterServiceUnit => {
                let definition = self
                    .engine
                    .render(SERVICE_UNIT, &self.unit.template_variables())?;
                self.services().register(&definition)?;
            }
            ProvisionStep::RenderSysconfig => {
                self.provisioner().write_sysconfig(
                    self.engine,
                    &config.listen_address,
                    &self.account.name,
                    &self.account.group,
                )?;
            }
            other => {
                debug!(step = %other, "Not an install step, skipping");
            }
        }
        Ok(())
    }

    fn run_teardown_step(
        &self,
        step: ProvisionStep,
        unit_state: ServiceUnitState,
    ) -> OperatorResult<()> {
        match step {
            ProvisionStep::StopService if unit_state.is_registered() => self.services().stop(),
            ProvisionStep::StopService => {
                debug!(step = %step, "Service unit not registered, skipping");
                Ok(())
            }
            ProvisionStep::DeregisterService => self.services().deregister(),
            ProvisionStep::RevokePrivileges => self.grants().revoke(),
            ProvisionStep::RemoveArtifacts => self.provisioner().uninstall(),
            ProvisionStep::RemoveServiceAccount => {
                self.accounts().remove_service_account(&self.account)
            }
            other => {
                debug!(step = %other, "Not a teardown step, skipping");
                Ok(())
            }
        }
    }

    fn publish_endpoint(&self, listen_address: &ListenAddress) -> OperatorResult<()> {
        let endpoint = PublishedEndpoint::derive(
            listen_address,
            &self.settings.metrics,
            &self.settings.paths,
        );
        self.publisher.publish(&endpoint)
    }

    fn provisioner(&self) -> ResourceProvisioner<'_, H> {
        ResourceProvisioner::new(
            self.host,
            &self.settings.paths,
            &self.settings.download.base_url,
        )
    }

    fn services(&self) -> ServiceUnitManager<'_, H> {
        ServiceUnitManager::new(self.host, &self.unit, self.settings.service.command_timeout())
    }

    fn accounts(&self) -> AccountManager<'_, H> {
        AccountManager::new(self.host, self.settings.service.command_timeout())
    }

    fn grants(&self) -> GrantManager<'_> {
        GrantManager::new(self.engine, &self.settings.paths.sudoers)
    }
}

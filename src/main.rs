use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use wedding_planner::core::ContainerEngine;
use wedding_planner::domain::model::CommandReport;
use wedding_planner::domain::ports::{SettleDelay, SourceFetcher};
use wedding_planner::utils::error::{ErrorSeverity, WedError};
use wedding_planner::utils::{logger, validation::Validate};
use wedding_planner::{
    CliConfig, Command, DockerCli, GitCli, InMemoryEngine, LogFormat, OrchestrationPlan,
};

async fn execute(plan: &OrchestrationPlan, command: &Command) -> anyhow::Result<CommandReport> {
    let report = match command {
        Command::Install => {
            let started_at = chrono::Utc::now();
            let install = plan.install().await?;
            tracing::info!(
                "📦 Installed {} dependency(ies), skipped {}, failed {}",
                install.cloned.len(),
                install.skipped.len(),
                install.failures.len()
            );
            let install = install.ensure_success()?;
            CommandReport::new("install", started_at, install.cloned)
        }
        Command::Build(mode) => plan.build(mode.remote, mode.selection()).await?,
        Command::Run(mode) => plan.run(mode.remote, mode.selection()).await?,
        Command::Stop => plan.stop().await?,
        Command::Destroy => plan.destroy().await?,
        Command::DestroyNetwork => plan.destroy_network().await?,
        Command::Teardown => plan.teardown().await?,
        Command::Wipe => plan.wipe().await?,
        Command::Post => plan.post().await?,
    };
    Ok(report)
}

fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<WedError>().map(WedError::severity) {
        Some(ErrorSeverity::Low) => 0,
        Some(ErrorSeverity::Medium) => 2,
        Some(ErrorSeverity::High) | None => 1,
        Some(ErrorSeverity::Critical) => 3,
    }
}

/// Low-severity failures are warnings: reported, then exit 0.
fn status_icon(err: &anyhow::Error) -> &'static str {
    if exit_code(err) == 0 {
        "⚠️"
    } else {
        "❌"
    }
}

fn report_failure(err: &anyhow::Error) -> ! {
    let icon = status_icon(err);
    match err.downcast_ref::<WedError>() {
        Some(e) if e.severity() == ErrorSeverity::Low => {
            tracing::warn!("{} {:#}", icon, err);
            eprintln!("{} {}", icon, e.user_friendly_message());
        }
        Some(e) => {
            tracing::error!(
                "{} {:#} (Category: {:?}, Severity: {:?})",
                icon,
                err,
                e.category(),
                e.severity()
            );
            eprintln!("{} {}", icon, e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
        }
        None => {
            tracing::error!("{} {:#}", icon, err);
            eprintln!("{} {:#}", icon, err);
        }
    }
    std::process::exit(exit_code(err))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    match config.log_format {
        LogFormat::Compact => logger::init_cli_logger(config.verbose),
        LogFormat::Json => logger::init_json_logger(config.verbose),
    }
    tracing::debug!("CLI config: {:?}", config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    let engine: Arc<dyn ContainerEngine> = if config.dry_run {
        tracing::info!("🧪 Dry run: engine calls are simulated");
        Arc::new(InMemoryEngine::new())
    } else {
        Arc::new(DockerCli::new(config.docker_bin.clone()))
    };
    let fetcher: Arc<dyn SourceFetcher> = Arc::new(GitCli::default());

    let plan = match OrchestrationPlan::load(
        &config.project_root,
        &config.plan_path(),
        &config.invite_path(),
        engine,
        fetcher,
    )
    .with_context(|| format!("Failed to load {}", config.plan_path().display()))
    {
        Ok(plan) => plan
            .with_readiness_gate(Arc::new(SettleDelay(config.settle_delay())))
            .with_build_concurrency(config.concurrency)
            .with_architecture(config.architecture()),
        Err(e) => report_failure(&e),
    };

    tracing::info!(
        "🚀 wed {} (network {}, venue {})",
        config.command.name(),
        plan.network_name(),
        plan.venue_path().display()
    );
    if let Some(post_office) = plan.post_office_path() {
        tracing::debug!("📮 Post office at {}", post_office.display());
    }

    let result = execute(&plan, &config.command)
        .await
        .with_context(|| format!("wed {} failed", config.command.name()));

    match result {
        Ok(report) => {
            match config.log_format {
                LogFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                LogFormat::Compact => {
                    tracing::info!("✅ {} finished in {} ms", report.command, report.duration_ms);
                    println!("✅ {} completed", report.command);
                    for name in &report.affected {
                        println!("   • {}", name);
                    }
                }
            }
            Ok(())
        }
        Err(e) => report_failure(&e),
    }
}

use anyhow::Context;
use cluster_provisioner::{
    config::ProvisionerConfig,
    core::{logging::init_structured_logging, ProvisioningController},
    infrastructure::{
        cloud::{GcloudCli, GcloudConfig},
        management::{AdminCli, AdminCliConfig},
        probe::HttpProbe,
        process,
    },
    storage::{MongoStateStore, StateStore},
};
use dotenv::dotenv;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_structured_logging()?;

    let config = match std::env::args().nth(1) {
        Some(path) => ProvisionerConfig::from_yaml_file(Path::new(&path)),
        None => ProvisionerConfig::from_env(),
    }
    .context("Failed to load provisioner configuration")?;

    info!(
        "Configuration loaded for cluster {} (project {}, target node count {}, replace {})",
        config.target.cluster_name,
        config.project,
        config.target.target_node_count,
        config.target.replace
    );

    let store = MongoStateStore::connect(&config.store.mongodb_uri, &config.store.database)
        .await
        .context("Failed to connect to the state store")?;
    info!("🗄️ State store backend: {}", store.backend_name());

    let admin_cli = AdminCli::new(AdminCliConfig {
        cli_path: config.cli.admin_cli_path.clone(),
        work_dir: config.cli.work_dir.clone(),
        query_timeout: Duration::from_secs(config.cli.query_timeout_secs),
        mutation_timeout: Duration::from_secs(config.cli.mutation_timeout_secs),
    })?;
    let cloud = GcloudCli::new(GcloudConfig {
        binary: config.cli.gcloud_path.clone(),
        project: config.project.clone(),
        timeout: Duration::from_secs(config.cli.mutation_timeout_secs),
    });
    let probe = HttpProbe::new().context("Failed to build HTTP client")?;

    let power_off = config.power_off_on_success && !config.dev_environment;
    let controller = ProvisioningController::new(
        Arc::new(config),
        Arc::new(store),
        Arc::new(admin_cli),
        Arc::new(cloud),
        Arc::new(probe),
    );

    if let Err(e) = controller.run().await {
        error!("Provisioning failed: {}", e);
        return Err(e.into());
    }

    if power_off {
        info!("🔌 Powering off provisioner instance");
        if let Err(e) = process::run(&PathBuf::from("poweroff"), &[], None, Duration::from_secs(30)).await {
            warn!("Power off failed: {}", e);
        }
    }

    Ok(())
}

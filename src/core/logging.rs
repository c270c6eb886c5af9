use tracing::error;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};
use uuid::Uuid;

use crate::error::{ProvisionError, Result};

/// Initialize structured logging system
pub fn init_structured_logging() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,cluster_provisioner=info"));

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::NONE)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ProvisionError::Config(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// Log a failed run with its classification and run id
pub fn log_error_with_context(err: &ProvisionError, context: &str, run_id: Uuid) {
    let log_data = serde_json::json!({
        "error": err.to_string(),
        "kind": format!("{:?}", err.kind()),
        "context": context,
        "run_id": run_id.to_string(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    error!(error_event = %log_data, "❌ Error Event");
}

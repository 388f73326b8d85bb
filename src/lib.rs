pub mod api;
pub mod catechists;
pub mod commands;
pub mod config;
pub mod dashboard;
pub mod errors;
pub mod groups;
pub mod handlers;
pub mod import;
pub mod listing;
pub mod models;
pub mod output;
pub mod participants;
pub mod secrets;
pub mod session;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use api::ApiClient;
pub use config::AppConfig;
pub use errors::{AppError, AppResult};
pub use secrets::SecretVault;
pub use session::AppContext;

/// Installs the global subscriber once. Logs go to stderr so command output
/// on stdout stays machine-readable.
pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,crisma_admin=info"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    });
}

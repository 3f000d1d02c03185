use log::{error, info};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ftpvault::config::{RuntimeSettings, StartupConfig};
use ftpvault::ftp::{FtpContext, FtpServer};
use ftpvault::http::{self, AppState};
use ftpvault::users::UserStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    let config = Arc::new(StartupConfig::load()?);
    std::fs::create_dir_all(config.storage_root())?;

    let settings = RuntimeSettings::load_or_default(Path::new(&config.settings_file)).shared();

    let store = Arc::new(UserStore::open(
        Path::new(&config.users_file),
        &config.storage_root(),
        config.max_users,
    )?);
    store.ensure_owner(&config.owner_username, &config.owner_password)?;
    info!("Loaded {} accounts from {}", store.count(), config.users_file);

    // Hourly sweep of unverified accounts past their window; the first tick
    // fires immediately so stale accounts are cleared at startup too.
    {
        let store = store.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(3600));
            loop {
                ticker.tick().await;
                let removed = store.sweep_expired();
                if removed > 0 {
                    info!("Swept {} expired unverified accounts", removed);
                }
            }
        });
    }

    let ftp = FtpServer::bind(FtpContext {
        store: store.clone(),
        settings: settings.clone(),
        config: config.clone(),
    })
    .await?;
    tokio::spawn(async move {
        if let Err(e) = ftp.run().await {
            error!("FTP server terminated: {}", e);
        }
    });

    http::serve(AppState {
        store,
        settings,
        config,
    })
    .await
}

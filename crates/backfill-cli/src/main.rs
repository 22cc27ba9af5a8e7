//! 🚀 backfill-cli: the front door, the bouncer, the maitre d' of backfill.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 Loads config, sets up logging, then lets the library do the heavy lifting.
//! Like a manager. 🦆

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 🚀 main(): where it all begins.
///
/// 🔧 Steps:
/// 1. Init tracing (so we can see what goes wrong, and when)
/// 2. Find the config file (first arg, or `backfill.toml`)
/// 3. Load config (the moment of truth)
/// 4. Run the drain
/// 5. Handle errors (cry, then exit 1)
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path_arg = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "backfill.toml".to_string());

    // 🔒 A missing file is fine, env vars alone can configure a run. An unreadable path is not.
    let config_file = std::path::Path::new(&path_arg);
    let config_file = match config_file.try_exists().with_context(|| {
        format!(
            "💀 Couldn't check whether the configuration file exists. If it's a relative path, \
             it's relative to the cwd; use an absolute one to be absolutely certain. \
             Was checking here: '{}'",
            config_file.display()
        )
    })? {
        true => Some(config_file),
        false => None,
    };

    let app_config = backfill::app_config::load_config(config_file).context(
        "💀 In backfill-cli, main, we couldn't load the configuration. Take a look at the file \
         and the BFL_* variables, make sure you didn't forget something obvious.",
    )?;

    match backfill::run(app_config).await {
        Ok(summary) => {
            info!("🍾 {summary}");
            Ok(())
        }
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion of sadness, one layer at a time
            let mut the_vibes_are_giving_connection_issues = false;
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
                let cause_str = cause.to_string();
                if cause_str.contains("dispatch failure")
                    || cause_str.contains("connection refused")
                    || cause_str.contains("Connection refused")
                    || cause_str.contains("tcp connect error")
                    || cause_str.contains("dns error")
                    || cause_str.contains("timeout")
                {
                    the_vibes_are_giving_connection_issues = true;
                }
            }

            if the_vibes_are_giving_connection_issues {
                error!(
                    "🔧 hint: looks like the object store isn't reachable. Check the region, \
                     the endpoint_url (MinIO/LocalStack users: is the container up? `docker ps`), \
                     and whether your credentials can reach S3 from here. ☕"
                );
            }

            std::process::exit(1);
        }
    }
}

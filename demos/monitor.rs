use std::env;
use std::sync::Arc;

use nibe_uplink::{
    setup_systems, Config, DeviceInfo, DiscoveryEntry, GroupSpec, Host, Platform, SystemConfig,
    UnitConfig, Uplink,
};

/// Host that prints every capability call instead of registering it.
struct PrintHost;

impl Host for PrintHost {
    fn ensure_group(&self, group: GroupSpec) -> nibe_uplink::Result<String> {
        println!(
            "group {} ({}): {:?}",
            group.object_id, group.name, group.entity_ids
        );
        Ok(format!("group.{}", group.object_id))
    }

    fn dispatch_discovery(
        &self,
        platform: Platform,
        entries: Vec<DiscoveryEntry>,
    ) -> nibe_uplink::Result<()> {
        for entry in entries {
            println!("discovered {}.{}", platform, entry.object_id);
        }
        Ok(())
    }

    fn create_notice(&self, key: &str, title: &str, message: &str) {
        println!("notice [{key}] {title}: {message}");
    }

    fn dismiss_notice(&self, key: &str) {
        println!("notice [{key}] dismissed");
    }

    fn register_device(&self, device: DeviceInfo) -> nibe_uplink::Result<()> {
        println!(
            "device {} {} ({})",
            device.manufacturer, device.model, device.name
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> nibe_uplink::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let token = args
        .get(1)
        .expect("usage: monitor <access-token> [system-id]");
    let system: Option<i64> = args
        .get(2)
        .map(|s| s.parse().expect("system id must be numeric"));

    let uplink = Arc::new(Uplink::builder(token.clone()).build());

    // Without a system id the setup lists the account's systems in a
    // notice, printed by PrintHost, so the user can pick one.
    let config = Config {
        systems: system
            .map(|system| SystemConfig {
                system,
                units: vec![UnitConfig {
                    unit: 0,
                    categories: Some(Vec::new()),
                    statuses: Some(Vec::new()),
                    sensors: None,
                    climates: None,
                    switches: None,
                }],
            })
            .into_iter()
            .collect(),
        ..Config::default()
    };

    let context = setup_systems(&config, uplink, Arc::new(PrintHost)).await?;
    if context.is_empty() {
        return Ok(());
    }

    println!("Loaded {} system(s). Watching notifications...", context.len());
    futures::future::pending::<()>().await;
    Ok(())
}

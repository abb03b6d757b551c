//! Console remote: picks the first renderer and media server known to the
//! gateway, prints the server's root listing and then every notification
//! until Ctrl-C.
//!
//! ```bash
//! HEIMKLANG_CONFIG__GATEWAY__BASE_URL=http://nas:8080/api \
//!     cargo run -p hkcontrol --example console_remote
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use hkcontrol::{
    BrowserRow, ControlConfig, ControlEvent, DirectoryBrowser, RemoteRenderer, RestGateway,
    TransportGateway,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = hkconfig::get_config();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.get_log_level()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let gateway: Arc<dyn TransportGateway> = Arc::new(RestGateway::from_config(&config));
    let control = ControlConfig::from_config(&config);

    let devices = gateway
        .list_devices()
        .await
        .context("Cannot list devices")?;
    for device in &devices.devices {
        println!("{:?}\t{}\t{}", device.kind, device.id, device.friendly_name);
    }

    if let Some(server) = devices.servers().next() {
        let mut browser = DirectoryBrowser::new(gateway.clone(), control.root_id.clone());
        browser.select_device(Some(server.device_id())).await?;
        println!("\n{}:", server.friendly_name);
        for row in browser.rows() {
            let marker = match &row {
                BrowserRow::Up => "<",
                BrowserRow::Container(_) => "+",
                BrowserRow::Item { .. } => " ",
            };
            println!("  {marker} {}", row.title());
        }
    }

    let Some(renderer_info) = devices.renderers().next() else {
        println!("No renderer available");
        return Ok(());
    };

    let renderer = RemoteRenderer::new(gateway.clone(), control);
    let events = renderer.subscribe();
    renderer.select_device(Some(renderer_info.device_id()), None);
    println!("\nWatching {}", renderer_info.friendly_name);

    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                for event in events.try_iter() {
                    match event {
                        ControlEvent::ViewModelChanged(vm) => println!(
                            "[{}] {}{} {} vol {}",
                            vm.transport_state, vm.title, vm.track_title, vm.time, vm.volume
                        ),
                        ControlEvent::CurrentTrackChanged { uri } => println!("now playing {uri}"),
                        ControlEvent::PlaylistChanged { len } => println!("playlist: {len} items"),
                        ControlEvent::ActionFailed(failure) => eprintln!("{}", failure.summary),
                    }
                }
            }
        }
    }

    renderer.select_device(None, None);
    Ok(())
}

//! Live-map visibility while clients are added from another thread

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use eff_clients::{Client, ClientRegistry};
use eff_core::{ClientId, ShadowMapSwapper, ShadowMaps};

/// Runs each swap on a separate thread and waits for it
struct ThreadSwapper;

impl ShadowMapSwapper for ThreadSwapper {
    fn swap_shadow_maps(&self, maps: Arc<dyn ShadowMaps>) {
        thread::spawn(move || maps.swap_in_shadow_maps_rt())
            .join()
            .unwrap();
    }
}

#[test]
fn test_live_map_only_grows_while_adding() {
    const CLIENTS: u32 = 64;

    let registry = ClientRegistry::new();
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let registry = Arc::clone(&registry);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut last = 0;
            while !done.load(Ordering::Acquire) {
                if let Some(len) = registry.with_live_map_rt(|m| m.len()) {
                    assert!(len >= last, "live map shrank from {last} to {len}");
                    last = len;
                }
                thread::yield_now();
            }
        })
    };

    for id in 0..CLIENTS {
        registry
            .add_client(Client::new(ClientId(id), 1000 + id as i32), &ThreadSwapper)
            .unwrap();
    }

    done.store(true, Ordering::Release);
    reader.join().unwrap();

    assert_eq!(registry.len(), CLIENTS as usize);
    assert_eq!(registry.swap_count(), u64::from(CLIENTS));
    assert_eq!(
        registry.with_live_map_rt(|m| m.len()),
        Some(CLIENTS as usize)
    );
}

#[test]
fn test_removed_client_disappears_from_live_map() {
    let registry = ClientRegistry::new();
    registry
        .add_client(Client::new(ClientId(3), 30).with_bundle_id("com.example.daw"), &ThreadSwapper)
        .unwrap();

    assert_eq!(
        registry.with_live_map_rt(|m| m.get(ClientId(3)).and_then(|c| c.bundle_id.clone())),
        Some(Some("com.example.daw".to_string()))
    );

    registry.remove_client(ClientId(3), &ThreadSwapper).unwrap();
    assert_eq!(registry.with_live_map_rt(|m| m.contains(ClientId(3))), Some(false));
    assert!(registry.client(ClientId(3)).is_none());
}

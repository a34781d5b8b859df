#![allow(dead_code)]

use std::sync::Arc;

use bridge_sim::{Completion, SimBridge, SimNamespace, SimObject};
use core_adapter::BridgeContext;
use core_runtime::config::{AdapterConfig, ListenerRemovalPolicy};
use serde_json::{json, Value};

pub const PLAYER_PROPERTIES: &[&str] = &["src", "muted", "duration"];

pub struct Harness {
    pub bridge: Arc<SimBridge>,
    pub ctx: Arc<BridgeContext>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(ListenerRemovalPolicy::Strict)
    }

    pub fn with_policy(policy: ListenerRemovalPolicy) -> Self {
        let bridge = Arc::new(
            SimBridge::new()
                .with_namespace(
                    SimNamespace::new("nativeObj")
                        .with_default_constructor("Bitmap")
                        .with_constructor("FaultyBitmap", |_| {
                            Ok(SimObject::anonymous().with_close_failure(
                                json!({ "code": 9, "message": "in use" }).into(),
                            ))
                        })
                        .with_constructor("Broken", |_| Err("constructor rejected".into())),
                )
                .with_namespace(SimNamespace::new("video").with_constructor(
                    "createVideoPlayer",
                    |args| {
                        let id = args.first().and_then(Value::as_str).unwrap_or("player");
                        Ok(SimObject::new(id)
                            .with_property("src", json!(""))
                            .with_property("muted", json!(false))
                            .with_property("duration", json!(0))
                            .with_async_method("play", Completion::Never)
                            .with_async_method(
                                "snapshot",
                                Completion::Succeed(json!({ "frame": 1 })),
                            )
                            .with_method("pause", |_| Ok(Value::Null)))
                    },
                )),
        );

        let config = AdapterConfig::builder()
            .bridge(bridge.clone())
            .listener_removal(policy)
            .build()
            .unwrap();

        Self {
            bridge,
            ctx: Arc::new(BridgeContext::new(config)),
        }
    }

    pub fn namespace(&self, name: &str) -> Arc<SimNamespace> {
        self.bridge.sim_namespace(name).unwrap()
    }

    pub fn last_object(&self, namespace: &str) -> Arc<SimObject> {
        self.namespace(namespace).last_created().unwrap()
    }
}

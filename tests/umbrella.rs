//! Deriving and dispatching through the `provision` facade alone.

use provision::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, PartialEq, Serialize, Deserialize, ResourceData)]
#[resource(name = "Volume")]
struct Volume {
    size: u64,
}

async fn create(ctx: Context, size: u64) -> Result<Void, EngineError> {
    ctx.set(&Volume { size })?;
    Ok(Void)
}

#[test]
fn derive_resolves_through_the_facade() {
    assert_eq!(Volume::type_name(), "Volume");
}

#[tokio::test]
async fn facade_exposes_a_working_engine() {
    let store = Arc::new(MemStore::new());
    store.space_create(UserId::new(0), "default").unwrap();

    let engine = Engine::builder(store.clone())
        .resource(
            ResourceBuilder::<Volume>::new()
                .with_action("create", Action::new(create).must_not_exist())
                .build(),
        )
        .build();

    let request = Request::new("Volume", UserId::new(0), "default", "create", "vol0")
        .with_input(&64u64)
        .unwrap();
    engine.handle(CancellationToken::new(), request).await.unwrap();

    let record = store.resource_get(UserId::new(0), "default", "vol0").unwrap();
    assert_eq!(record.kind, "Volume");
    assert_eq!(record.data, br#"{"size":64}"#);
}

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use flowvar::eval::fetch::MockFetcher;
use flowvar::id::IdGenerator;
use flowvar::timestamp::FixedClock;
use flowvar::{EngineConfig, SetVariableBlock, SetVariableExecutor};
use serde_json::Value as JsonValue;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[ctor::ctor]
fn init_tests() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

pub struct SequentialIds;

impl IdGenerator for SequentialIds {
    fn generate(&self) -> String {
        "id-0001".to_string()
    }
}

/// 2024-03-01T23:15:00Z
pub fn late_evening() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2024, 3, 1, 23, 15, 0).unwrap().into())
}

pub fn quiet_fetcher() -> MockFetcher {
    let mut fetcher = MockFetcher::new();
    fetcher.expect_fetch().never();
    fetcher
}

pub fn executor_with(config: &EngineConfig, fetcher: MockFetcher) -> SetVariableExecutor {
    SetVariableExecutor::new(config)
        .unwrap()
        .with_clock(Arc::new(late_evening()))
        .with_id_generator(Arc::new(SequentialIds))
        .with_fetcher(Arc::new(fetcher))
}

pub fn executor() -> SetVariableExecutor {
    executor_with(&EngineConfig::default(), quiet_fetcher())
}

pub fn block(options: JsonValue) -> SetVariableBlock {
    SetVariableBlock {
        id: "block-1".to_string(),
        outgoing_edge_id: Some("edge-1".to_string()),
        options: Some(serde_json::from_value(options).unwrap()),
    }
}

//! One engine shared by many in-flight queries.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use sqlmacro::{DataQuery, FillMode, MacroEngine, TimeRange};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shared_engine_keeps_contexts_apart() {
    let engine = Arc::new(MacroEngine::new(false));
    let from = Utc.with_ymd_and_hms(2018, 4, 12, 18, 0, 0).unwrap();
    let range = TimeRange::new(from, from + Duration::minutes(5));

    let mut handles = Vec::new();
    for idx in 0..64u32 {
        let engine = engine.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let mut query = DataQuery::new(format!("Q{idx}"));
            let fill = if idx % 2 == 0 {
                "previous".to_string()
            } else {
                idx.to_string()
            };
            let sql = engine
                .interpolate(
                    &mut query,
                    &range,
                    &format!("SELECT $__timeGroup(time_column,'5m',{fill}), v FROM t"),
                )
                .expect("template expands");
            (idx, sql, query)
        }));
    }

    for handle in handles {
        let (idx, sql, query) = handle.await.expect("task completes");
        assert_eq!(
            sql,
            "SELECT floor(extract(epoch from time_column)/300)*300 AS \"time\", v FROM t"
        );
        assert_eq!(query.ref_id, format!("Q{idx}"));
        let expected = if idx % 2 == 0 {
            FillMode::Previous
        } else {
            FillMode::Value(f64::from(idx))
        };
        assert_eq!(query.fill_mode(), Some(expected));
    }
}

#[test]
fn engine_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<MacroEngine>();
}

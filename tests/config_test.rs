// ==========================================
// 同步配置集成测试
// ==========================================
// 测试目标: config_kv 覆写进入引擎、能力占用开关、多日历合并策略
// ==========================================

mod helpers;
mod test_helpers;

use helpers::test_data_builder::OrderBuilder;
use opplan_sync::config::{config_keys, CalendarPolicy, ConfigError, ConfigManager};
use test_helpers::*;

#[test]
fn test_config_manager_reads_overrides_from_shared_connection() {
    let env = setup();
    let manager = ConfigManager::from_connection(env.conn.clone());

    manager
        .set_global_config_value(config_keys::CALENDAR_MERGE_POLICY, "intersection")
        .unwrap();
    manager
        .set_global_config_value(config_keys::RESOURCEPLAN_TIME_UNIT_SECONDS, "60")
        .unwrap();
    // 覆盖写
    manager
        .set_global_config_value(config_keys::RESOURCEPLAN_TIME_UNIT_SECONDS, "900")
        .unwrap();

    let cfg = manager.load_sync_config().unwrap();
    assert_eq!(cfg.calendar_policy, CalendarPolicy::Intersection);
    assert_eq!(cfg.time_unit_seconds, 900);
    assert!(cfg.consume_material);
    assert_eq!(
        manager
            .get_global_config_value(config_keys::CONSUME_CAPACITY)
            .unwrap(),
        None
    );
}

#[test]
fn test_invalid_policy_is_reported() {
    let env = setup();
    env.seed(|c| insert_config(c, config_keys::CALENDAR_MERGE_POLICY, "union"));

    let result = ConfigManager::from_connection(env.conn.clone()).load_sync_config();
    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}

#[test]
fn test_capacity_consumption_can_be_disabled() {
    let mut env = setup();
    env.seed(|c| {
        seed_basic_master(c)?;
        insert_resource(c, "bench", "default", 1.0, None)?;
        insert_operation(c, "assemble", "fixed_time", Some("widget"), Some("plant"), 2 * 3600)?;
        insert_operation_resource(c, "assemble", "bench", 1.0, None)?;
        insert_config(c, config_keys::CONSUME_CAPACITY, "false")
    });
    env.reload_engine();

    env.engine
        .create(OrderBuilder::manufacturing("MO1", "assemble", dt(10, 10)).build(), None, &mut env.ctx())
        .unwrap();

    assert!(env.loads("MO1").is_empty());
    assert!(env.plan_row("bench", 10).is_none());
    // 物料流水照常生成
    assert_eq!(env.flows("MO1").len(), 1);
}

/// 库点日历 8-16，资源日历 10-14
fn seed_two_calendars(env: &TestEnv) {
    env.seed(|c| {
        insert_calendar(c, "day-shift", 0.0)?;
        insert_shift_bucket(c, "day-shift", "08:00:00", "16:00:00", 1.0)?;
        insert_calendar(c, "short-shift", 0.0)?;
        insert_shift_bucket(c, "short-shift", "10:00:00", "14:00:00", 1.0)?;
        insert_location(c, "plant", Some("day-shift"))?;
        insert_resource(c, "oven", "default", 1.0, None)?;
        set_resource_calendar(c, "oven", "short-shift")?;
        insert_operation(c, "bake", "fixed_time", None, Some("plant"), 2 * 3600)?;
        insert_operation_resource(c, "bake", "oven", 1.0, None)
    });
}

#[test]
fn test_first_only_policy_uses_location_calendar() {
    let env = setup();
    seed_two_calendars(&env);

    let order = env
        .engine
        .create(OrderBuilder::manufacturing("B1", "bake", dt(10, 16)).build(), None, &mut env.ctx())
        .unwrap();
    assert_eq!((order.startdate, order.enddate), (dt(10, 14), dt(10, 16)));
}

#[test]
fn test_intersection_policy_requires_all_calendars() {
    let mut env = setup();
    seed_two_calendars(&env);
    env.seed(|c| insert_config(c, config_keys::CALENDAR_MERGE_POLICY, "intersection"));
    env.reload_engine();

    let order = env
        .engine
        .create(OrderBuilder::manufacturing("B1", "bake", dt(10, 16)).build(), None, &mut env.ctx())
        .unwrap();
    assert_eq!((order.startdate, order.enddate), (dt(10, 12), dt(10, 16)));
}

// ==========================================
// 派生数据全量重建集成测试
// ==========================================

mod helpers;
mod test_helpers;

use helpers::test_data_builder::OrderBuilder;
use opplan_sync::RebuildSummary;
use test_helpers::*;

fn seed_and_plan(env: &TestEnv) {
    env.seed(|c| {
        seed_basic_master(c)?;
        insert_resource(c, "bench", "default", 1.0, None)?;
        insert_operation(c, "assemble", "fixed_time", Some("widget"), Some("plant"), 2 * 3600)?;
        insert_operation_material(c, "assemble", "bolt", -2.0, 0.0, None)?;
        insert_operation_resource(c, "assemble", "bench", 1.0, None)
    });
    env.engine
        .create(
            OrderBuilder::inventory("STCK1", "bolt", "plant", dt(1, 0)).quantity(100.0).build(),
            None,
            &mut env.ctx(),
        )
        .unwrap();
    env.engine
        .create(
            OrderBuilder::manufacturing("MO1", "assemble", dt(10, 10)).quantity(3.0).build(),
            None,
            &mut env.ctx(),
        )
        .unwrap();
}

#[test]
fn test_rebuild_restores_wiped_balances_and_plan() {
    let env = setup();
    seed_and_plan(&env);
    let plan_before = env.plan_row("bench", 10).unwrap();

    env.seed(|c| {
        c.execute("UPDATE operationplanmaterial SET onhand = NULL", [])?;
        c.execute("DELETE FROM out_resourceplan", [])?;
        Ok(())
    });
    assert!(env.plan_row("bench", 10).is_none());

    let summary = env.engine.rebuild_derived().unwrap();
    assert_eq!(
        summary,
        RebuildSummary {
            item_locations: 2,
            resources: 1,
            material_rows_written: 3,
            plan_rows_written: 1,
        }
    );

    assert_eq!(env.balances("bolt", "plant"), vec![(100.0, 100.0), (-6.0, 94.0)]);
    assert_eq!(env.balances("widget", "plant"), vec![(3.0, 3.0)]);
    assert_eq!(env.plan_row("bench", 10).unwrap(), plan_before);
}

#[test]
fn test_rebuild_on_consistent_data_writes_nothing() {
    let env = setup();
    seed_and_plan(&env);

    let summary = env.engine.rebuild_derived().unwrap();
    assert_eq!(summary.item_locations, 2);
    assert_eq!(summary.resources, 1);
    assert_eq!(summary.material_rows_written, 0);
    assert_eq!(summary.plan_rows_written, 0);
}

#[test]
fn test_rebuild_on_empty_database() {
    let env = setup();
    assert_eq!(env.engine.rebuild_derived().unwrap(), RebuildSummary::default());
}

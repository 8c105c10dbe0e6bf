// ==========================================
// 设备保养清零/恢复集成测试
// ==========================================


use custom_manufacturing::domain::maintenance::{MachineMaintenance, MaintenanceState};
use serde_json::{json, Value};
use test_helpers::{create_test_state, insert_workstation, job_card, submit_job_card, today, worked_quantity};

fn maintenance(name: &str, machine: &str, done: Value) -> MachineMaintenance {
    let mut doc = MachineMaintenance::new(name, Some(machine.to_string()));
    doc.maintenance_done = done;
    doc
}

#[test]
fn test_toggle_done_restores_exact_counter() {
    let (_temp_file, state) = create_test_state().expect("Failed to create test state");
    insert_workstation(&state, "WS-1", None, 0.0);
    submit_job_card(&state, job_card("JC-1", "WS-1", 37.25));

    state
        .maintenance_api
        .save(maintenance("MM-1", "WS-1", json!(false)), today())
        .unwrap();
    let saved = state
        .maintenance_api
        .save(maintenance("MM-1", "WS-1", json!("true")), today())
        .unwrap();
    assert_eq!(worked_quantity(&state, "WS-1"), 0.0);
    assert_eq!(saved.state(), MaintenanceState::ResetPending);

    let saved = state
        .maintenance_api
        .save(maintenance("MM-1", "WS-1", json!(0)), today())
        .unwrap();
    assert_eq!(worked_quantity(&state, "WS-1"), 37.25);
    assert_eq!(saved.state(), MaintenanceState::Normal);
}

#[test]
fn test_saving_done_again_keeps_counter_at_zero_and_snapshot() {
    let (_temp_file, state) = create_test_state().expect("Failed to create test state");
    insert_workstation(&state, "WS-1", None, 0.0);
    state.workstation_repo.set_worked_quantity("WS-1", 20.0).unwrap();

    state
        .maintenance_api
        .save(maintenance("MM-1", "WS-1", json!(1)), today())
        .unwrap();
    submit_job_card(&state, job_card("JC-1", "WS-1", 3.0));

    // 完成 → 完成: 无操作
    let saved = state
        .maintenance_api
        .save(maintenance("MM-1", "WS-1", json!("Yes")), today())
        .unwrap();
    assert_eq!(worked_quantity(&state, "WS-1"), 3.0);
    assert_eq!(saved.previous_worked_hours, Some(20.0));
}

#[test]
fn test_delete_done_record_restores_once() {
    let (_temp_file, state) = create_test_state().expect("Failed to create test state");
    insert_workstation(&state, "WS-1", None, 0.0);
    state.workstation_repo.set_worked_quantity("WS-1", 50.0).unwrap();

    state
        .maintenance_api
        .save(maintenance("MM-1", "WS-1", json!(true)), today())
        .unwrap();
    assert_eq!(worked_quantity(&state, "WS-1"), 0.0);

    assert!(state.maintenance_api.delete("MM-1", today()).unwrap());
    assert_eq!(worked_quantity(&state, "WS-1"), 50.0);

    submit_job_card(&state, job_card("JC-1", "WS-1", 5.0));
    assert!(!state.maintenance_api.delete("MM-1", today()).unwrap());
    assert_eq!(worked_quantity(&state, "WS-1"), 55.0);
}

#[test]
fn test_cancel_submitted_maintenance_restores_counter() {
    let (_temp_file, state) = create_test_state().expect("Failed to create test state");
    insert_workstation(&state, "WS-1", None, 0.0);
    state.workstation_repo.set_worked_quantity("WS-1", 9.0).unwrap();

    state
        .maintenance_api
        .save(maintenance("MM-1", "WS-1", json!(1)), today())
        .unwrap();
    state.maintenance_api.submit("MM-1").unwrap();

    let cancelled = state.maintenance_api.cancel("MM-1", today()).unwrap();
    assert_eq!(worked_quantity(&state, "WS-1"), 9.0);
    assert_eq!(cancelled.previous_worked_hours, None);
    assert_eq!(
        state.maintenance_repo.get_previous_worked_hours("MM-1").unwrap(),
        None
    );
}

#[test]
fn test_maintenance_without_machine_is_ignored() {
    let (_temp_file, state) = create_test_state().expect("Failed to create test state");
    insert_workstation(&state, "WS-1", None, 0.0);
    state.workstation_repo.set_worked_quantity("WS-1", 4.0).unwrap();

    let mut doc = MachineMaintenance::new("MM-1", None);
    doc.maintenance_done = json!(1);
    let saved = state.maintenance_api.save(doc, today()).unwrap();

    assert_eq!(saved.previous_worked_hours, None);
    assert_eq!(worked_quantity(&state, "WS-1"), 4.0);
}

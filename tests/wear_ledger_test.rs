// ==========================================
// 工作站磨损台账集成测试
// ==========================================
// 测试目标: 作业卡提交/取消对工作站累计数量的影响
// ==========================================


use custom_manufacturing::domain::types::DocStatus;
use test_helpers::{
    create_test_state, insert_workstation, job_card, submit_job_card, today, worked_quantity,
};

#[test]
fn test_submit_then_cancel_returns_to_previous_value() {
    let (_temp_file, state) = create_test_state().expect("Failed to create test state");
    insert_workstation(&state, "WS-1", Some("Plant A"), 0.0);
    state.workstation_repo.set_worked_quantity("WS-1", 12.0).unwrap();

    let name = submit_job_card(&state, job_card("JC-1", "WS-1", 5.0));
    assert_eq!(worked_quantity(&state, "WS-1"), 17.0);

    state.job_card_api.cancel(&name, today()).unwrap();
    assert_eq!(worked_quantity(&state, "WS-1"), 12.0);
}

#[test]
fn test_counter_matches_submitted_sum() {
    let (_temp_file, state) = create_test_state().expect("Failed to create test state");
    insert_workstation(&state, "WS-1", None, 0.0);

    let a = submit_job_card(&state, job_card("JC-A", "WS-1", 3.0));
    let _b = submit_job_card(&state, job_card("JC-B", "WS-1", 4.5));
    let c = submit_job_card(&state, job_card("JC-C", "WS-1", 10.0));
    state.job_card_api.cancel(&a, today()).unwrap();
    let _d = submit_job_card(&state, job_card("JC-D", "WS-1", 0.5));
    state.job_card_api.cancel(&c, today()).unwrap();

    // 当前已提交: B + D
    assert_eq!(worked_quantity(&state, "WS-1"), 5.0);
    assert_eq!(
        state.job_card_api.get("JC-A").unwrap().docstatus,
        DocStatus::Cancelled
    );
}

#[test]
fn test_cancel_after_manual_reset_is_floored_at_zero() {
    let (_temp_file, state) = create_test_state().expect("Failed to create test state");
    insert_workstation(&state, "WS-1", None, 0.0);

    let name = submit_job_card(&state, job_card("JC-1", "WS-1", 8.0));
    let response = state.workstation_api.reset_worked_hours("WS-1").unwrap();
    assert!(response.success);

    state.job_card_api.cancel(&name, today()).unwrap();
    assert_eq!(worked_quantity(&state, "WS-1"), 0.0);
}

#[test]
fn test_job_card_without_workstation_changes_nothing() {
    let (_temp_file, state) = create_test_state().expect("Failed to create test state");
    insert_workstation(&state, "WS-1", None, 0.0);

    let mut jc = job_card("JC-1", "WS-1", 6.0);
    jc.workstation = None;
    submit_job_card(&state, jc);

    // 未登记的工作站
    submit_job_card(&state, job_card("JC-2", "WS-404", 6.0));

    assert_eq!(worked_quantity(&state, "WS-1"), 0.0);
    assert!(state.workstation_repo.get_worked_quantity("WS-404").unwrap().is_none());
}

#[test]
fn test_counter_survives_reopen() {
    let (temp_file, state) = create_test_state().expect("Failed to create test state");
    insert_workstation(&state, "WS-1", None, 0.0);
    submit_job_card(&state, job_card("JC-1", "WS-1", 2.5));
    drop(state);

    let db_path = temp_file.path().to_str().unwrap().to_string();
    let reopened = custom_manufacturing::app::AppState::new(db_path).unwrap();
    assert_eq!(worked_quantity(&reopened, "WS-1"), 2.5);
}

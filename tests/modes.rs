mod common;

use common::{command, operator, set, wait_state, within, Execute, Probe};
use mtpvisor::{
    Command, Element, EventKind, Limits, OperationMode, ParameterElement, Procedure, Scale, Service,
    SourceMode, State, Value,
};

fn flag(svc: &Service, name: &str) -> bool {
    svc.op_src_mode().attribute(name).unwrap().as_bool()
}

fn assert_exclusive(svc: &Service) {
    let acts = ["StateOffAct", "StateOpAct", "StateAutAct"]
        .into_iter()
        .filter(|n| flag(svc, n))
        .count();
    assert_eq!(acts, 1, "exactly one mode flag");
    let srcs = ["SrcIntAct", "SrcExtAct"]
        .into_iter()
        .filter(|n| flag(svc, n))
        .count();
    match svc.mode() {
        OperationMode::Offline => assert_eq!(srcs, 0),
        OperationMode::Automatic => assert_eq!(srcs, 1),
        OperationMode::Operator => assert!(srcs <= 1),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_mode_and_source_flags_stay_exclusive() {
    let (probe, _seen) = Probe::new(Execute::Finish);
    let svc = Service::builder("dosing", "", probe).build().unwrap();
    assert_exclusive(&svc);

    let steps: [(&str, bool); 8] = [
        ("StateOpOp", true),
        ("StateAutOp", true),
        ("SrcExtOp", true),
        ("SrcIntOp", true),
        ("StateChannel", true),
        ("SrcExtAut", true),
        ("StateOpAut", true),
        ("StateOffAut", true),
    ];
    for (name, v) in steps {
        set(&svc, "mode", name, v);
        assert_exclusive(&svc);
    }
    assert_eq!(svc.mode(), OperationMode::Offline);
    assert_eq!(svc.op_src_mode().source(), None);
    svc.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_automatic_forces_internal_source() {
    let (probe, _seen) = Probe::new(Execute::Finish);
    let svc = Service::builder("dosing", "", probe).build().unwrap();
    set(&svc, "mode", "StateAutOp", true);
    assert_eq!(svc.op_src_mode().source(), Some(SourceMode::Internal));

    set(&svc, "mode", "SrcExtOp", true);
    assert_eq!(svc.op_src_mode().source(), Some(SourceMode::External));
    assert!(!flag(&svc, "SrcExtOp"), "operator request clears itself");

    set(&svc, "mode", "SrcIntAut", true);
    assert_eq!(
        svc.op_src_mode().source(),
        Some(SourceMode::External),
        "automation side not authoritative while SrcChannel is false"
    );
    svc.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_non_authoritative_requests_are_mirrored() {
    let (probe, _seen) = Probe::new(Execute::Finish);
    let svc = Service::builder("dosing", "", probe).build().unwrap();
    let amount = ParameterElement::dint("amount", "", Limits::new(0.0, 10.0), Scale::default(), 0);
    let mut proc = Procedure::new(1, "cont", "", false, true).unwrap();
    proc.add_procedure_parameter(amount.clone());
    svc.add_procedure(proc);
    let pmode = amount.op_src_mode();

    set(&svc, "mode", "StateOpAut", true);
    assert_eq!(svc.mode(), OperationMode::Offline);
    assert_eq!(pmode.mode(), OperationMode::Offline);
    assert!(pmode.attribute("StateOpAut").unwrap().as_bool(), "mirrored as a plain flag");

    set(&svc, "mode", "StateChannel", true);
    assert!(pmode.attribute("StateChannel").unwrap().as_bool());
    set(&svc, "mode", "StateAutAut", true);
    assert_eq!(svc.mode(), OperationMode::Automatic);
    assert_eq!(pmode.mode(), OperationMode::Automatic);

    amount.set_v_int(7);
    assert_eq!(amount.v_req(), Value::Int(7));
    amount.set_v_int(70);
    assert_eq!(amount.v_req(), Value::Int(7), "out of range");
    svc.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_offline_refused_outside_idle() {
    let (probe, _seen) = Probe::new(Execute::UntilCancelled);
    let svc = Service::builder("dosing", "", probe).build().unwrap();
    svc.add_procedure(Procedure::new(1, "cont", "", false, true).unwrap());
    operator(&svc);
    command(&svc, Command::Start);
    wait_state(&svc, State::Execute).await;

    set(&svc, "mode", "StateOffOp", true);
    assert_eq!(svc.mode(), OperationMode::Operator);
    assert!(svc.thread_control().is_current(svc.thread_control().generation()));
    svc.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_offline_disables_commands_and_cancels_worker() {
    let (probe, _seen) = Probe::new(Execute::Finish);
    let svc = Service::builder("dosing", "", probe).build().unwrap();
    svc.add_procedure(Procedure::new(1, "cont", "", false, true).unwrap());
    operator(&svc);
    assert_eq!(svc.thread_control().running_state(), Some(State::Idle));
    let mut rx = svc.subscribe();

    set(&svc, "mode", "StateOffOp", true);
    assert_eq!(svc.mode(), OperationMode::Offline);
    assert_eq!(svc.state_machine().attribute("CommandEn").unwrap().as_int(), 0);
    assert_eq!(svc.thread_control().running_state(), None);
    assert!(!svc.state_machine().is_no_procedure_guard_installed());

    let ev = within(async {
        loop {
            let ev = rx.recv().await.unwrap();
            if ev.kind == EventKind::ModeChanged {
                return ev;
            }
        }
    })
    .await;
    assert_eq!(ev.reason.as_deref(), Some("off"));

    operator(&svc);
    assert_eq!(svc.thread_control().running_state(), Some(State::Idle));
    assert!(svc.state_machine().command_en().is_enabled(Command::Start));
    assert_eq!(svc.tag_name(), "dosing");
    svc.shutdown().await;
}

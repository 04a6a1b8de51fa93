use std::collections::HashMap;

use chrono::{DateTime, Utc};
use payment_model::{
    Cell, Command, EffId, Effect, Event, PaymentFlow, RunMode, RunOutcome, SheetKind,
    CONFIG_DISCOVERY, REPORT_TITLE,
};

use crate::support::{rows, utc};

fn config_yaml(schedule: &str, policy: &str) -> String {
    format!(
        r#"
timezone: Europe/Athens
schedule: "{schedule}"
on_sheet_error: {policy}
credentials:
  env: GOOGLE_CREDENTIALS
notification:
  topic:
    env: NTFY_TOPIC
  tags: [money_with_wings]
sheets:
  - spreadsheet_id: abc123
    sheet_name: Payments
  - spreadsheet_id: abc123
    sheet_name: Recurring
    kind: recurring
"#
    )
}

fn environment() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("GOOGLE_CREDENTIALS", "{\"client_email\":\"bot@example.com\"}"),
        ("NTFY_TOPIC", "bills"),
    ])
}

fn scheduled_rows() -> Vec<Vec<Cell>> {
    rows(&[
        &["Description", "Due Date", "Payment Date"],
        &["Rent", "2023-11-03", ""],
        &["Power", "2023-11-05", ""],
        &["Water", "2023-11-06", ""],
        &["Phone", "2023-11-07", ""],
        &["Insurance", "2023-10-01", "2023-10-02"],
    ])
}

fn recurring_rows() -> Vec<Vec<Cell>> {
    rows(&[
        &["Description", "9", "10", "11"],
        &["Netflix", "x", ""],
        &["Spotify", "x", "x"],
    ])
}

/// Loads `yaml` and answers every env read; returns the first effect after.
fn configure(flow: &mut PaymentFlow, yaml: String) -> Command {
    let tag = match flow.start() {
        Command::Do(Effect::LoadConfig { tag, .. }) => tag,
        other => panic!("unexpected command: {:?}", other),
    };
    answer_config(flow, tag, yaml)
}

fn answer_config(flow: &mut PaymentFlow, tag: EffId, yaml: String) -> Command {
    let env = environment();
    let mut cmd = flow.on_event(Event::ConfigLoaded {
        tag,
        path: "/tmp/payment-report.yaml".into(),
        contents: yaml,
    });
    while let Command::Do(Effect::ReadEnvVar { name, tag }) = cmd {
        let value = env.get(name.as_str()).map(|v| v.to_string());
        cmd = flow.on_event(Event::EnvVarLoaded { tag, name, value });
    }
    cmd
}

fn expect_clock(cmd: Command) -> EffId {
    match cmd {
        Command::Do(Effect::ReadClock { tag }) => tag,
        other => panic!("expected clock read, got {:?}", other),
    }
}

fn expect_fetch(cmd: Command, sheet_name: &str) -> EffId {
    match cmd {
        Command::Do(Effect::FetchSheet(request)) => {
            assert_eq!(request.sheet.sheet_name, sheet_name);
            assert_eq!(
                request.credentials,
                "{\"client_email\":\"bot@example.com\"}"
            );
            request.tag
        }
        other => panic!("expected sheet fetch, got {:?}", other),
    }
}

fn expect_notification(cmd: Command) -> (String, EffId) {
    match cmd {
        Command::Do(Effect::SendNotification(request)) => {
            assert_eq!(request.server, "https://ntfy.sh");
            assert_eq!(request.topic, "bills");
            assert_eq!(request.title, REPORT_TITLE);
            assert_eq!(request.tags, vec!["money_with_wings"]);
            (request.message, request.tag)
        }
        other => panic!("expected notification, got {:?}", other),
    }
}

fn expect_timer(cmd: Command) -> (DateTime<Utc>, EffId) {
    match cmd {
        Command::Do(Effect::StartTimer { fire_at, tag }) => (fire_at, tag),
        other => panic!("expected timer, got {:?}", other),
    }
}

/// Feeds both sheets and returns the notification the run asks for.
fn run_sheets(flow: &mut PaymentFlow, clock_tag: EffId, now: &str) -> (String, EffId) {
    let cmd = flow.on_event(Event::ClockRead {
        tag: clock_tag,
        now: utc(now),
    });
    let tag = expect_fetch(cmd, "Payments");
    let cmd = flow.on_event(Event::SheetFetched {
        tag,
        rows: scheduled_rows(),
    });
    let tag = expect_fetch(cmd, "Recurring");
    let cmd = flow.on_event(Event::SheetFetched {
        tag,
        rows: recurring_rows(),
    });
    expect_notification(cmd)
}

const EXPECTED_REPORT: &str = "⚠ Delayed: Rent\n\
    💸 Today: Power\n\
    ⏳ Coming Up: Water (1d), Phone (2d)\n\
    📌 Pending (≤2d): 4\n\
    🗓  Monthly: 1 pending";

#[test]
fn once_mode_runs_a_full_report() {
    let mut flow = PaymentFlow::new(RunMode::Once, None);
    let clock_tag = expect_clock(configure(&mut flow, config_yaml("0 0 10 * * *", "abort")));

    let settings = flow.settings().unwrap();
    assert_eq!(settings.sheets[1].kind, SheetKind::Recurring);
    assert_eq!(settings.notification.topic, "bills");

    let (message, tag) = run_sheets(&mut flow, clock_tag, "2023-11-05T08:00:00Z");
    assert_eq!(message, EXPECTED_REPORT);

    match flow.on_event(Event::NotificationSent { tag }) {
        Command::Done(Ok(())) => {}
        other => panic!("expected success, got {:?}", other),
    }
    assert_eq!(flow.done(), Ok(()));
    assert_eq!(
        flow.last_run(),
        Some(&RunOutcome::Delivered {
            report: EXPECTED_REPORT.to_string()
        })
    );
}

#[test]
fn explicit_config_path_is_passed_to_loader() {
    let mut flow = PaymentFlow::new(RunMode::Once, Some("/srv/payments.yaml".into()));
    match flow.start() {
        Command::Do(Effect::LoadConfig {
            discovery, path, ..
        }) => {
            assert_eq!(path.as_deref(), Some("/srv/payments.yaml"));
            assert_eq!(discovery.env_var, CONFIG_DISCOVERY.env_var);
            assert_eq!(discovery.fallback_paths, CONFIG_DISCOVERY.fallback_paths);
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn env_vars_are_read_in_name_order() {
    let mut flow = PaymentFlow::new(RunMode::Once, None);
    let tag = match flow.start() {
        Command::Do(Effect::LoadConfig { tag, .. }) => tag,
        other => panic!("unexpected command: {:?}", other),
    };
    let cmd = flow.on_event(Event::ConfigLoaded {
        tag,
        path: "/tmp/payment-report.yaml".into(),
        contents: config_yaml("1h", "abort"),
    });
    let env_tag = match cmd {
        Command::Do(Effect::ReadEnvVar { name, tag }) => {
            assert_eq!(name, "GOOGLE_CREDENTIALS");
            tag
        }
        other => panic!("expected env read, got {:?}", other),
    };
    let cmd = flow.on_event(Event::EnvVarLoaded {
        tag: env_tag,
        name: "GOOGLE_CREDENTIALS".into(),
        value: Some("{}".into()),
    });
    match cmd {
        Command::Do(Effect::ReadEnvVar { name, .. }) => assert_eq!(name, "NTFY_TOPIC"),
        other => panic!("expected env read, got {:?}", other),
    }
}

#[test]
fn cron_schedule_waits_for_first_slot_then_rearms() {
    let mut flow = PaymentFlow::new(RunMode::Scheduled, None);
    let clock_tag = expect_clock(configure(&mut flow, config_yaml("0 0 10 * * *", "abort")));

    let cmd = flow.on_event(Event::ClockRead {
        tag: clock_tag,
        now: utc("2023-11-05T07:00:00Z"),
    });
    let (fire_at, timer_tag) = expect_timer(cmd);
    assert_eq!(fire_at, utc("2023-11-05T08:00:00Z"));

    let clock_tag = expect_clock(flow.on_event(Event::TimerFired { tag: timer_tag }));
    let (message, tag) = run_sheets(&mut flow, clock_tag, "2023-11-05T08:00:00Z");
    assert_eq!(message, EXPECTED_REPORT);

    let (fire_at, _) = expect_timer(flow.on_event(Event::NotificationSent { tag }));
    assert_eq!(fire_at, utc("2023-11-06T08:00:00Z"));
}

#[test]
fn interval_schedule_runs_immediately_and_rearms() {
    let mut flow = PaymentFlow::new(RunMode::Scheduled, None);
    let clock_tag = expect_clock(configure(&mut flow, config_yaml("1h", "abort")));

    let (_, tag) = run_sheets(&mut flow, clock_tag, "2023-11-05T08:00:00Z");
    let (fire_at, _) = expect_timer(flow.on_event(Event::NotificationSent { tag }));
    assert_eq!(fire_at, utc("2023-11-05T09:00:00Z"));
}

#[test]
fn abort_policy_skips_the_report_and_waits_for_next_slot() {
    let mut flow = PaymentFlow::new(RunMode::Scheduled, None);
    let clock_tag = expect_clock(configure(&mut flow, config_yaml("1h", "abort")));

    let cmd = flow.on_event(Event::ClockRead {
        tag: clock_tag,
        now: utc("2023-11-05T08:00:00Z"),
    });
    let tag = expect_fetch(cmd, "Payments");
    let cmd = flow.on_event(Event::SheetFetchFailed {
        tag,
        error: "server responded with status=403".into(),
    });

    let (fire_at, _) = expect_timer(cmd);
    assert_eq!(fire_at, utc("2023-11-05T09:00:00Z"));
    assert_eq!(
        flow.last_run(),
        Some(&RunOutcome::Failed {
            error: "[abc123] failed to read sheet: sheet 'Payments': server responded with status=403"
                .into()
        })
    );
}

#[test]
fn abort_policy_fails_once_mode_on_unreadable_rows() {
    let mut flow = PaymentFlow::new(RunMode::Once, None);
    let clock_tag = expect_clock(configure(&mut flow, config_yaml("1h", "abort")));

    let cmd = flow.on_event(Event::ClockRead {
        tag: clock_tag,
        now: utc("2023-11-05T08:00:00Z"),
    });
    let tag = expect_fetch(cmd, "Payments");
    let cmd = flow.on_event(Event::SheetFetched {
        tag,
        rows: rows(&[&["Description", "Due Date", "Payment Date"], &["Rent", "soon", ""]]),
    });

    match cmd {
        Command::Done(Err(msg)) => assert_eq!(
            msg,
            "[abc123] failed to read sheet: sheet 'Payments': failed to parse due date value 'soon'"
        ),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[test]
fn annotate_policy_reports_remaining_sheets() {
    let mut flow = PaymentFlow::new(RunMode::Once, None);
    let clock_tag = expect_clock(configure(&mut flow, config_yaml("1h", "annotate")));

    let cmd = flow.on_event(Event::ClockRead {
        tag: clock_tag,
        now: utc("2023-11-05T08:00:00Z"),
    });
    let tag = expect_fetch(cmd, "Payments");
    let cmd = flow.on_event(Event::SheetFetched {
        tag,
        rows: rows(&[&["Description", "Due Date", "Payment Date"]]),
    });
    let tag = expect_fetch(cmd, "Recurring");
    let cmd = flow.on_event(Event::SheetFetched {
        tag,
        rows: recurring_rows(),
    });

    let (message, _) = expect_notification(cmd);
    assert_eq!(
        message,
        "😎 Nothing for today\n\
         😌 Nothing coming up\n\
         🗓  Monthly: 1 pending\n\
         ❌ Unreadable: sheet 'Payments': no data found"
    );
}

#[test]
fn notification_failure_fails_once_mode() {
    let mut flow = PaymentFlow::new(RunMode::Once, None);
    let clock_tag = expect_clock(configure(&mut flow, config_yaml("1h", "abort")));
    let (_, tag) = run_sheets(&mut flow, clock_tag, "2023-11-05T08:00:00Z");

    match flow.on_event(Event::NotificationFailed {
        tag,
        error: "server responded with status=503".into(),
    }) {
        Command::Done(Err(msg)) => {
            assert_eq!(msg, "notification error: server responded with status=503")
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(flow.done().is_err());
}

#[test]
fn missing_env_var_fails() {
    let mut flow = PaymentFlow::new(RunMode::Once, None);
    let tag = match flow.start() {
        Command::Do(Effect::LoadConfig { tag, .. }) => tag,
        other => panic!("unexpected command: {:?}", other),
    };
    let cmd = flow.on_event(Event::ConfigLoaded {
        tag,
        path: "/tmp/payment-report.yaml".into(),
        contents: config_yaml("1h", "abort"),
    });
    let (name, tag) = match cmd {
        Command::Do(Effect::ReadEnvVar { name, tag }) => (name, tag),
        other => panic!("expected env read, got {:?}", other),
    };

    match flow.on_event(Event::EnvVarLoaded {
        tag,
        name,
        value: None,
    }) {
        Command::Done(Err(msg)) => {
            assert_eq!(msg, "environment variable 'GOOGLE_CREDENTIALS' is required")
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[test]
fn config_not_found_fails() {
    let mut flow = PaymentFlow::new(RunMode::Scheduled, None);
    let tag = match flow.start() {
        Command::Do(Effect::LoadConfig { tag, .. }) => tag,
        other => panic!("unexpected command: {:?}", other),
    };

    match flow.on_event(Event::ConfigLoadFailed {
        tag,
        error: "no configuration file found".into(),
    }) {
        Command::Done(Err(msg)) => assert!(msg.contains("failed to load configuration")),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[test]
fn invalid_yaml_fails() {
    let mut flow = PaymentFlow::new(RunMode::Scheduled, None);
    let tag = match flow.start() {
        Command::Do(Effect::LoadConfig { tag, .. }) => tag,
        other => panic!("unexpected command: {:?}", other),
    };

    match flow.on_event(Event::ConfigLoaded {
        tag,
        path: "/tmp/payment-report.yaml".into(),
        contents: "sheets: [".into(),
    }) {
        Command::Done(Err(msg)) => assert!(msg.contains("invalid configuration")),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[test]
fn events_with_stale_tags_are_ignored() {
    let mut flow = PaymentFlow::new(RunMode::Once, None);
    let config_tag = match flow.start() {
        Command::Do(Effect::LoadConfig { tag, .. }) => tag,
        other => panic!("unexpected command: {:?}", other),
    };
    let clock_tag = expect_clock(answer_config(&mut flow, config_tag, config_yaml("1h", "abort")));

    let stale = flow.on_event(Event::ClockRead {
        tag: config_tag,
        now: utc("2023-11-05T08:00:00Z"),
    });
    assert!(matches!(stale, Command::Wait));

    let cmd = flow.on_event(Event::ClockRead {
        tag: clock_tag,
        now: utc("2023-11-05T08:00:00Z"),
    });
    let fetch_tag = expect_fetch(cmd, "Payments");
    let stale = flow.on_event(Event::SheetFetched {
        tag: clock_tag,
        rows: scheduled_rows(),
    });
    assert!(matches!(stale, Command::Wait));
    expect_fetch(
        flow.on_event(Event::SheetFetched {
            tag: fetch_tag,
            rows: scheduled_rows(),
        }),
        "Recurring",
    );
}

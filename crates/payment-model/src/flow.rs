use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::classify::Classifier;
use crate::config::{ConfigDiscovery, ReportConfig, Settings, SheetFailurePolicy, CONFIG_DISCOVERY};
use crate::error::ConfigError;
use crate::ingest::ingest;
use crate::payment::Payment;
use crate::report::{Report, SheetFailure};
use crate::sheet::{Cell, SheetDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Run on the configured schedule until stopped.
    #[default]
    Scheduled,
    /// Run once and finish.
    Once,
}

#[derive(Debug, Clone)]
pub enum Effect {
    LoadConfig {
        discovery: ConfigDiscovery,
        /// Explicit path; takes precedence over discovery.
        path: Option<String>,
        tag: EffId,
    },
    ReadEnvVar {
        name: String,
        tag: EffId,
    },
    ReadClock {
        tag: EffId,
    },
    FetchSheet(SheetRequest),
    SendNotification(NotificationRequest),
    StartTimer {
        fire_at: DateTime<Utc>,
        tag: EffId,
    },
}

#[derive(Debug, Clone)]
pub struct SheetRequest {
    pub sheet: SheetDescriptor,
    pub credentials: String,
    pub tag: EffId,
}

#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub server: String,
    pub topic: String,
    pub title: String,
    pub message: String,
    pub tags: Vec<String>,
    pub tag: EffId,
}

#[derive(Debug, Clone)]
pub enum Event {
    ConfigLoaded {
        tag: EffId,
        path: String,
        contents: String,
    },
    ConfigLoadFailed {
        tag: EffId,
        error: String,
    },
    EnvVarLoaded {
        tag: EffId,
        name: String,
        value: Option<String>,
    },
    ClockRead {
        tag: EffId,
        now: DateTime<Utc>,
    },
    SheetFetched {
        tag: EffId,
        rows: Vec<Vec<Cell>>,
    },
    SheetFetchFailed {
        tag: EffId,
        error: String,
    },
    NotificationSent {
        tag: EffId,
    },
    NotificationFailed {
        tag: EffId,
        error: String,
    },
    TimerFired {
        tag: EffId,
    },
}

#[derive(Debug, Clone)]
pub enum Command {
    Do(Effect),
    Wait,
    Done(Result<(), String>),
}

/// How the most recent run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Delivered { report: String },
    Failed { error: String },
}

/// Drives configuration loading and report runs without performing I/O:
/// each step is handed out as an [`Effect`] and resumed by the matching
/// [`Event`]. Exactly one effect is outstanding at a time.
pub struct PaymentFlow {
    mode: RunMode,
    config_path: Option<String>,
    stage: Stage,
    next_tag: u64,
    config: Option<ReportConfig>,
    settings: Option<Settings>,
    env_values: HashMap<String, String>,
    pending_env: VecDeque<String>,
    current_env: Option<(String, EffId)>,
    run_state: Option<RunState>,
    last_run: Option<RunOutcome>,
}

#[derive(Debug, Clone)]
enum Stage {
    Init,
    WaitingConfig { tag: EffId },
    LoadingEnv,
    WaitingClock { tag: EffId, purpose: ClockPurpose },
    Fetching { tag: EffId },
    Notifying { tag: EffId },
    WaitingTimer { tag: EffId },
    Done(Result<(), String>),
}

#[derive(Debug, Clone, Copy)]
enum ClockPurpose {
    Arm,
    Run,
}

#[derive(Debug, Clone)]
struct RunState {
    now: DateTime<Utc>,
    sheet_index: usize,
    payments: Vec<Payment>,
    failures: Vec<SheetFailure>,
    report: Option<String>,
}

#[derive(Debug, Clone)]
enum FlowError {
    ConfigLoad(String),
    Config(ConfigError),
    MissingEnvVar(String),
    NoUpcomingRun,
    Run(String),
}

impl PaymentFlow {
    pub fn new(mode: RunMode, config_path: Option<String>) -> Self {
        Self {
            mode,
            config_path,
            stage: Stage::Init,
            next_tag: 1,
            config: None,
            settings: None,
            env_values: HashMap::new(),
            pending_env: VecDeque::new(),
            current_env: None,
            run_state: None,
            last_run: None,
        }
    }

    pub fn start(&mut self) -> Command {
        match self.stage {
            Stage::Init => {
                let tag = self.next_tag();
                self.stage = Stage::WaitingConfig { tag };
                Command::Do(Effect::LoadConfig {
                    discovery: CONFIG_DISCOVERY,
                    path: self.config_path.clone(),
                    tag,
                })
            }
            Stage::Done(ref res) => Command::Done(res.clone()),
            _ => Command::Wait,
        }
    }

    pub fn on_event(&mut self, event: Event) -> Command {
        match self.stage.clone() {
            Stage::WaitingConfig { tag } => match event {
                Event::ConfigLoaded {
                    tag: t,
                    path,
                    contents,
                } if t == tag => match ReportConfig::from_yaml(&contents) {
                    Ok(cfg) => {
                        info!(path = %path, sheets = cfg.sheets.len(), "configuration loaded");
                        self.config = Some(cfg);
                        self.prepare_env_requests();
                        self.stage = Stage::LoadingEnv;
                        self.fetch_next_env_or_begin()
                    }
                    Err(err) => self.finish_error(FlowError::Config(err)),
                },
                Event::ConfigLoadFailed { tag: t, error } if t == tag => {
                    self.finish_error(FlowError::ConfigLoad(error))
                }
                _ => Command::Wait,
            },
            Stage::LoadingEnv => match event {
                Event::EnvVarLoaded { tag, name, value } => {
                    let Some((expected_name, expected_tag)) = self.current_env.clone() else {
                        return Command::Wait;
                    };
                    if expected_tag != tag || expected_name != name {
                        return Command::Wait;
                    }
                    self.current_env = None;
                    match value {
                        Some(v) => {
                            self.env_values.insert(name, v);
                            self.fetch_next_env_or_begin()
                        }
                        None => self.finish_error(FlowError::MissingEnvVar(expected_name)),
                    }
                }
                _ => Command::Wait,
            },
            Stage::WaitingClock { tag, purpose } => match event {
                Event::ClockRead { tag: t, now } if t == tag => match purpose {
                    ClockPurpose::Arm => self.arm_timer(now),
                    ClockPurpose::Run => self.start_run(now),
                },
                _ => Command::Wait,
            },
            Stage::Fetching { tag } => match event {
                Event::SheetFetched { tag: t, rows } if t == tag => self.on_sheet_rows(rows),
                Event::SheetFetchFailed { tag: t, error } if t == tag => {
                    let sheet = self.current_sheet().map(|s| s.sheet_name).unwrap_or_default();
                    self.on_sheet_error(format!("sheet '{sheet}': {error}"))
                }
                _ => Command::Wait,
            },
            Stage::Notifying { tag } => match event {
                Event::NotificationSent { tag: t } if t == tag => self.finish_run(Ok(())),
                Event::NotificationFailed { tag: t, error } if t == tag => {
                    self.finish_run(Err(format!("notification error: {error}")))
                }
                _ => Command::Wait,
            },
            Stage::WaitingTimer { tag } => match event {
                Event::TimerFired { tag: t } if t == tag => self.read_clock(ClockPurpose::Run),
                _ => Command::Wait,
            },
            Stage::Init => Command::Wait,
            Stage::Done(res) => Command::Done(res),
        }
    }

    pub fn done(&self) -> Result<(), String> {
        match &self.stage {
            Stage::Done(res) => res.clone(),
            _ => Ok(()),
        }
    }

    pub fn settings(&self) -> Option<&Settings> {
        self.settings.as_ref()
    }

    pub fn last_run(&self) -> Option<&RunOutcome> {
        self.last_run.as_ref()
    }

    fn next_tag(&mut self) -> EffId {
        let id = EffId(self.next_tag);
        self.next_tag += 1;
        id
    }

    fn prepare_env_requests(&mut self) {
        self.pending_env.clear();
        self.env_values.clear();
        self.current_env = None;
        if let Some(cfg) = &self.config {
            let requests: BTreeSet<String> = cfg.env_requests();
            self.pending_env = requests.into_iter().collect();
        }
    }

    fn fetch_next_env_or_begin(&mut self) -> Command {
        if self.current_env.is_some() {
            return Command::Wait;
        }
        if let Some(name) = self.pending_env.pop_front() {
            let tag = self.next_tag();
            self.current_env = Some((name.clone(), tag));
            return Command::Do(Effect::ReadEnvVar { name, tag });
        }
        let resolved = match &self.config {
            Some(cfg) => cfg.resolve(&self.env_values),
            None => return Command::Wait,
        };
        match resolved {
            Ok(settings) => {
                let runs_now = self.mode == RunMode::Once || settings.schedule.runs_immediately();
                self.settings = Some(settings);
                if runs_now {
                    self.read_clock(ClockPurpose::Run)
                } else {
                    self.read_clock(ClockPurpose::Arm)
                }
            }
            Err(err) => self.finish_error(FlowError::Config(err)),
        }
    }

    fn read_clock(&mut self, purpose: ClockPurpose) -> Command {
        let tag = self.next_tag();
        self.stage = Stage::WaitingClock { tag, purpose };
        Command::Do(Effect::ReadClock { tag })
    }

    fn arm_timer(&mut self, now: DateTime<Utc>) -> Command {
        let next = match &self.settings {
            Some(settings) => settings.schedule.next_after(now, &settings.calendar),
            None => return Command::Wait,
        };
        let Some(fire_at) = next else {
            return self.finish_error(FlowError::NoUpcomingRun);
        };
        info!(fire_at = %fire_at, "next payment report scheduled");
        let tag = self.next_tag();
        self.stage = Stage::WaitingTimer { tag };
        Command::Do(Effect::StartTimer { fire_at, tag })
    }

    fn start_run(&mut self, now: DateTime<Utc>) -> Command {
        info!(now = %now, "starting payment report run");
        self.run_state = Some(RunState {
            now,
            sheet_index: 0,
            payments: Vec::new(),
            failures: Vec::new(),
            report: None,
        });
        self.fetch_next_sheet()
    }

    fn current_sheet(&self) -> Option<SheetDescriptor> {
        let settings = self.settings.as_ref()?;
        let run = self.run_state.as_ref()?;
        settings.sheets.get(run.sheet_index).cloned()
    }

    fn fetch_next_sheet(&mut self) -> Command {
        let credentials = match &self.settings {
            Some(settings) => settings.credentials.clone(),
            None => return Command::Wait,
        };
        let Some(sheet) = self.current_sheet() else {
            return self.deliver_report();
        };
        let tag = self.next_tag();
        self.stage = Stage::Fetching { tag };
        Command::Do(Effect::FetchSheet(SheetRequest {
            sheet,
            credentials,
            tag,
        }))
    }

    fn on_sheet_rows(&mut self, rows: Vec<Vec<Cell>>) -> Command {
        let Some(sheet) = self.current_sheet() else {
            return Command::Wait;
        };
        let (Some(settings), Some(run)) = (self.settings.as_ref(), self.run_state.as_mut()) else {
            return Command::Wait;
        };
        let today = settings.calendar.day_of(&run.now);
        match ingest(&sheet, &rows, today) {
            Ok(payments) => {
                info!(sheet = %sheet.label(), payments = payments.len(), "sheet ingested");
                run.payments.extend(payments);
                run.sheet_index += 1;
                self.fetch_next_sheet()
            }
            Err(err) => self.on_sheet_error(err.to_string()),
        }
    }

    fn on_sheet_error(&mut self, reason: String) -> Command {
        let Some(sheet) = self.current_sheet() else {
            return Command::Wait;
        };
        let policy = match &self.settings {
            Some(settings) => settings.on_sheet_error,
            None => return Command::Wait,
        };
        match policy {
            SheetFailurePolicy::Abort => self.finish_run(Err(format!(
                "[{}] failed to read sheet: {reason}",
                sheet.spreadsheet_id
            ))),
            SheetFailurePolicy::Annotate => {
                warn!(sheet = %sheet.label(), %reason, "skipping unreadable sheet");
                if let Some(run) = self.run_state.as_mut() {
                    run.failures.push(SheetFailure {
                        sheet: sheet.sheet_name,
                        reason,
                    });
                    run.sheet_index += 1;
                }
                self.fetch_next_sheet()
            }
        }
    }

    fn deliver_report(&mut self) -> Command {
        let (Some(settings), Some(run)) = (self.settings.as_ref(), self.run_state.as_mut()) else {
            return Command::Wait;
        };
        let classifier = Classifier::new(&settings.calendar, &run.now);
        let report = Report::assemble(
            &run.payments,
            &classifier,
            settings.window_days,
            &run.failures,
        )
        .render();
        run.report = Some(report.clone());
        let target = settings.notification.clone();
        let tag = self.next_tag();
        self.stage = Stage::Notifying { tag };
        Command::Do(Effect::SendNotification(NotificationRequest {
            server: target.server,
            topic: target.topic,
            title: target.title,
            message: report,
            tags: target.tags,
            tag,
        }))
    }

    fn finish_run(&mut self, result: Result<(), String>) -> Command {
        let Some(run) = self.run_state.take() else {
            return Command::Wait;
        };
        self.last_run = Some(match &result {
            Ok(()) => {
                info!("payment report delivered");
                RunOutcome::Delivered {
                    report: run.report.unwrap_or_default(),
                }
            }
            Err(error) => {
                warn!(%error, "payment report run failed");
                RunOutcome::Failed {
                    error: error.clone(),
                }
            }
        });
        match self.mode {
            RunMode::Once => match result {
                Ok(()) => {
                    self.stage = Stage::Done(Ok(()));
                    Command::Done(Ok(()))
                }
                Err(msg) => self.finish_error(FlowError::Run(msg)),
            },
            RunMode::Scheduled => self.arm_timer(run.now),
        }
    }

    fn finish_error(&mut self, err: FlowError) -> Command {
        let msg = err.to_string();
        self.stage = Stage::Done(Err(msg.clone()));
        self.run_state = None;
        Command::Done(Err(msg))
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowError::ConfigLoad(err) => write!(f, "failed to load configuration: {err}"),
            FlowError::Config(err) => write!(f, "{err}"),
            FlowError::MissingEnvVar(name) => {
                write!(f, "environment variable '{name}' is required")
            }
            FlowError::NoUpcomingRun => write!(f, "schedule has no upcoming run"),
            FlowError::Run(err) => write!(f, "{err}"),
        }
    }
}

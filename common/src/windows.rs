use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{BitOr, BitOrAssign};

/// Define an OR-composable flag set backed by an integer
macro_rules! flag_set {
    ($(#[$meta:meta])* $name:ident: $int:ty { $($flag:ident = $value:expr,)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $int);

        impl $name {
            $(pub const $flag: $name = $name($value);)*

            /// Raw bits of the flag set
            pub fn bits(self) -> $int {
                self.0
            }

            /// Check if every flag in `other` is set
            pub fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }

            pub fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl BitOr for $name {
            type Output = $name;

            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: $name) {
                self.0 |= rhs.0;
            }
        }
    };
}

flag_set!(
    /// Days of the week a `Weekly` or `MonthlyDow` trigger fires on
    DaysOfWeek: u16 {
        SUNDAY = 0x1,
        MONDAY = 0x2,
        TUESDAY = 0x4,
        WEDNESDAY = 0x8,
        THURSDAY = 0x10,
        FRIDAY = 0x20,
        SATURDAY = 0x40,
    }
);

flag_set!(
    /// Weeks of the month a `MonthlyDow` trigger fires on
    WeeksOfMonth: u16 {
        FIRST = 0x1,
        SECOND = 0x2,
        THIRD = 0x4,
        FOURTH = 0x8,
    }
);

flag_set!(
    MonthsOfYear: u16 {
        JANUARY = 0x1,
        FEBRUARY = 0x2,
        MARCH = 0x4,
        APRIL = 0x8,
        MAY = 0x10,
        JUNE = 0x20,
        JULY = 0x40,
        AUGUST = 0x80,
        SEPTEMBER = 0x100,
        OCTOBER = 0x200,
        NOVEMBER = 0x400,
        DECEMBER = 0x800,
    }
);

flag_set!(
    /// Days of the month a `Monthly` trigger fires on. Bit 0 is the first day
    DaysOfMonth: u32 {
        FIRST = 0x1,
        FIFTEENTH = 0x4000,
    }
);

impl DaysOfMonth {
    /// Flag for a single day of the month (1-31). Out of range days are empty
    pub fn day(day: u8) -> DaysOfMonth {
        if !(1..=31).contains(&day) {
            return DaysOfMonth(0);
        }
        DaysOfMonth(1u32 << (day - 1))
    }
}

flag_set!(
    /// Options for running a registered task on demand
    TaskRunFlags: i32 {
        NO_FLAGS = 0x0,
        AS_SELF = 0x1,
        IGNORE_CONSTRAINTS = 0x2,
        USE_SESSION_ID = 0x4,
        USER_SID = 0x8,
    }
);

/// Number of days between runs of a `Daily` trigger
pub type DayInterval = u16;
pub const EVERY_DAY: DayInterval = 1;
pub const EVERY_OTHER_DAY: DayInterval = 2;

/// Number of weeks between runs of a `Weekly` trigger
pub type WeekInterval = u16;
pub const EVERY_WEEK: WeekInterval = 1;
pub const EVERY_OTHER_WEEK: WeekInterval = 2;

/// Define an enum that maps onto the integer values used by the Task Scheduler service
macro_rules! service_enum {
    ($(#[$meta:meta])* $name:ident (default $default:ident) { $($variant:ident = $value:literal,)* }) => {
        $(#[$meta])*
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            /// Map a service value to the enum. Unknown values use the default
            pub fn from_value(value: i32) -> $name {
                match value {
                    $($value => $name::$variant,)*
                    _ => $name::$default,
                }
            }

            /// Service value of the enum
            pub fn value(self) -> i32 {
                match self {
                    $($name::$variant => $value,)*
                }
            }
        }

        impl Default for $name {
            fn default() -> $name {
                $name::$default
            }
        }
    };
}

service_enum!(
    /// State of a registered task or a running instance as reported by the service
    TaskState (default Unknown) {
        Unknown = 0,
        Disabled = 1,
        Queued = 2,
        Ready = 3,
        Running = 4,
    }
);

service_enum!(
    /// How the service handles a start request while an instance is already running
    MultipleInstancesPolicy (default IgnoreNew) {
        Parallel = 0,
        Queue = 1,
        IgnoreNew = 2,
        StopExisting = 3,
    }
);

service_enum!(
    TaskCompatibility (default V2) {
        At = 0,
        V1 = 1,
        V2 = 2,
        V2_1 = 3,
        V2_2 = 4,
        V2_3 = 5,
        V2_4 = 6,
    }
);

service_enum!(
    /// Session events a `SessionStateChange` trigger reacts to
    SessionStateChangeType (default Unknown) {
        Unknown = 0,
        ConsoleConnect = 1,
        ConsoleDisconnect = 2,
        RemoteConnect = 3,
        RemoteDisconnect = 4,
        SessionLock = 7,
        SessionUnlock = 8,
    }
);

service_enum!(
    LogonType (default InteractiveToken) {
        None = 0,
        Password = 1,
        S4U = 2,
        InteractiveToken = 3,
        Group = 4,
        ServiceAccount = 5,
        InteractiveTokenOrPassword = 6,
    }
);

service_enum!(
    RunLevel (default Lua) {
        Lua = 0,
        Highest = 1,
    }
);

/**
 * Complete definition of a Schedule Task.
 * Mirrors the Task Scheduler `ITaskDefinition` object. Actions run in the order they were added
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub actions: Vec<Action>,
    /**Principal id the actions run under */
    pub context: String,
    /**Arbitrary caller data stored with the task */
    pub data: String,
    pub principal: Principal,
    pub registration_info: RegistrationInfo,
    pub settings: Settings,
    pub triggers: Vec<Trigger>,
}

impl Default for TaskDefinition {
    fn default() -> TaskDefinition {
        TaskDefinition {
            actions: Vec::new(),
            context: String::from("Author"),
            data: String::new(),
            principal: Principal::default(),
            registration_info: RegistrationInfo::default(),
            settings: Settings::default(),
            triggers: Vec::new(),
        }
    }
}

impl TaskDefinition {
    /// Append an action. Actions execute in insertion order
    pub fn add_action<A: Into<Action>>(&mut self, action: A) {
        self.actions.push(action.into());
    }

    /// Append a trigger
    pub fn add_trigger<T: Into<Trigger>>(&mut self, trigger: T) {
        self.triggers.push(trigger.into());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    Exec(ExecAction),
    ComHandler(ComHandlerAction),
    Email(EmailAction),
    ShowMessage(ShowMessageAction),
    /**Action type this library does not know about. Holds the raw type value */
    Unsupported { kind: i32 },
}

impl Action {
    /// Identifier of the action. Unsupported actions have none
    pub fn id(&self) -> &str {
        match self {
            Action::Exec(action) => &action.id,
            Action::ComHandler(action) => &action.id,
            Action::Email(action) => &action.id,
            Action::ShowMessage(action) => &action.id,
            Action::Unsupported { .. } => "",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecAction {
    pub id: String,
    pub path: String,
    /**May reference run arguments with `$(Arg0)` through `$(Arg31)` */
    pub args: String,
    pub working_dir: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComHandlerAction {
    pub id: String,
    pub class_id: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailAction {
    pub id: String,
    pub server: String,
    pub subject: String,
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub reply_to: String,
    pub from: String,
    pub header_fields: BTreeMap<String, String>,
    pub body: String,
    pub attachments: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShowMessageAction {
    pub id: String,
    pub title: String,
    pub message: String,
}

impl From<ExecAction> for Action {
    fn from(action: ExecAction) -> Action {
        Action::Exec(action)
    }
}

impl From<ComHandlerAction> for Action {
    fn from(action: ComHandlerAction) -> Action {
        Action::ComHandler(action)
    }
}

impl From<EmailAction> for Action {
    fn from(action: EmailAction) -> Action {
        Action::Email(action)
    }
}

impl From<ShowMessageAction> for Action {
    fn from(action: ShowMessageAction) -> Action {
        Action::ShowMessage(action)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Trigger {
    Boot(BootTrigger),
    Daily(DailyTrigger),
    Event(EventTrigger),
    Idle(IdleTrigger),
    Logon(LogonTrigger),
    MonthlyDow(MonthlyDowTrigger),
    Monthly(MonthlyTrigger),
    Registration(RegistrationTrigger),
    SessionStateChange(SessionStateChangeTrigger),
    Time(TimeTrigger),
    Weekly(WeeklyTrigger),
    /**Trigger type this library does not know about. Holds the raw type value */
    Unsupported { kind: i32 },
}

impl Trigger {
    /// Common trigger settings. Unsupported triggers have none
    pub fn task_trigger(&self) -> Option<&TaskTrigger> {
        let common = match self {
            Trigger::Boot(trigger) => &trigger.task_trigger,
            Trigger::Daily(trigger) => &trigger.task_trigger,
            Trigger::Event(trigger) => &trigger.task_trigger,
            Trigger::Idle(trigger) => &trigger.task_trigger,
            Trigger::Logon(trigger) => &trigger.task_trigger,
            Trigger::MonthlyDow(trigger) => &trigger.task_trigger,
            Trigger::Monthly(trigger) => &trigger.task_trigger,
            Trigger::Registration(trigger) => &trigger.task_trigger,
            Trigger::SessionStateChange(trigger) => &trigger.task_trigger,
            Trigger::Time(trigger) => &trigger.task_trigger,
            Trigger::Weekly(trigger) => &trigger.task_trigger,
            Trigger::Unsupported { .. } => return None,
        };
        Some(common)
    }
}

/// Settings shared by every trigger type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTrigger {
    pub id: String,
    /**Zero time when not set */
    pub start_boundary: DateTime<Utc>,
    /**Zero time when not set */
    pub end_boundary: DateTime<Utc>,
    pub enabled: bool,
    /**ISO8601 duration, empty for no limit */
    pub execution_time_limit: String,
    pub repetition: RepetitionPattern,
}

impl Default for TaskTrigger {
    fn default() -> TaskTrigger {
        TaskTrigger {
            id: String::new(),
            start_boundary: DateTime::default(),
            end_boundary: DateTime::default(),
            enabled: true,
            execution_time_limit: String::new(),
            repetition: RepetitionPattern::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepetitionPattern {
    pub duration: String,
    pub interval: String,
    pub stop_at_duration_end: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BootTrigger {
    pub task_trigger: TaskTrigger,
    pub delay: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTrigger {
    pub task_trigger: TaskTrigger,
    pub day_interval: DayInterval,
    pub random_delay: String,
}

impl Default for DailyTrigger {
    fn default() -> DailyTrigger {
        DailyTrigger {
            task_trigger: TaskTrigger::default(),
            day_interval: EVERY_DAY,
            random_delay: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventTrigger {
    pub task_trigger: TaskTrigger,
    pub delay: String,
    /**XPath event query */
    pub subscription: String,
    pub value_queries: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdleTrigger {
    pub task_trigger: TaskTrigger,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogonTrigger {
    pub task_trigger: TaskTrigger,
    pub delay: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyDowTrigger {
    pub task_trigger: TaskTrigger,
    pub days_of_week: DaysOfWeek,
    pub weeks_of_month: WeeksOfMonth,
    pub months_of_year: MonthsOfYear,
    pub run_on_last_week_of_month: bool,
    pub random_delay: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTrigger {
    pub task_trigger: TaskTrigger,
    pub days_of_month: DaysOfMonth,
    pub months_of_year: MonthsOfYear,
    pub run_on_last_day_of_month: bool,
    pub random_delay: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrationTrigger {
    pub task_trigger: TaskTrigger,
    pub delay: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStateChangeTrigger {
    pub task_trigger: TaskTrigger,
    pub delay: String,
    pub state_change: SessionStateChangeType,
    pub user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeTrigger {
    pub task_trigger: TaskTrigger,
    pub random_delay: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyTrigger {
    pub task_trigger: TaskTrigger,
    pub days_of_week: DaysOfWeek,
    pub week_interval: WeekInterval,
    pub random_delay: String,
}

impl Default for WeeklyTrigger {
    fn default() -> WeeklyTrigger {
        WeeklyTrigger {
            task_trigger: TaskTrigger::default(),
            days_of_week: DaysOfWeek::default(),
            week_interval: EVERY_WEEK,
            random_delay: String::new(),
        }
    }
}

/// Implement `From` for every trigger payload
macro_rules! trigger_from {
    ($($payload:ident => $variant:ident,)*) => {
        $(impl From<$payload> for Trigger {
            fn from(trigger: $payload) -> Trigger {
                Trigger::$variant(trigger)
            }
        })*
    };
}

trigger_from!(
    BootTrigger => Boot,
    DailyTrigger => Daily,
    EventTrigger => Event,
    IdleTrigger => Idle,
    LogonTrigger => Logon,
    MonthlyDowTrigger => MonthlyDow,
    MonthlyTrigger => Monthly,
    RegistrationTrigger => Registration,
    SessionStateChangeTrigger => SessionStateChange,
    TimeTrigger => Time,
    WeeklyTrigger => Weekly,
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrationInfo {
    pub author: String,
    /**Zero time when not set */
    pub date: DateTime<Utc>,
    pub description: String,
    pub documentation: String,
    pub security_descriptor: String,
    pub source: String,
    pub uri: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub display_name: String,
    pub group_id: String,
    pub user_id: String,
    pub logon_type: LogonType,
    pub run_level: RunLevel,
}

impl Default for Principal {
    fn default() -> Principal {
        Principal {
            id: String::from("Author"),
            display_name: String::new(),
            group_id: String::new(),
            user_id: String::new(),
            logon_type: LogonType::InteractiveToken,
            run_level: RunLevel::Lua,
        }
    }
}

/**
 * Flat Task settings. Defaults follow the values the Task Scheduler service
 * assigns to a freshly created definition
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub allow_demand_start: bool,
    pub allow_hard_terminate: bool,
    pub compatibility: TaskCompatibility,
    pub delete_expired_task_after: String,
    pub dont_start_on_batteries: bool,
    pub enabled: bool,
    /**ISO8601 duration, `PT0S` for no limit */
    pub time_limit: String,
    pub hidden: bool,
    pub idle_settings: IdleSettings,
    pub multiple_instances: MultipleInstancesPolicy,
    pub network_settings: NetworkSettings,
    pub priority: u8,
    pub restart_count: u32,
    pub restart_interval: String,
    pub run_only_if_idle: bool,
    pub run_only_if_network_available: bool,
    pub start_when_available: bool,
    pub stop_if_on_batteries: bool,
    pub wake_to_run: bool,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            allow_demand_start: true,
            allow_hard_terminate: true,
            compatibility: TaskCompatibility::V2,
            delete_expired_task_after: String::new(),
            dont_start_on_batteries: true,
            enabled: true,
            time_limit: String::from("PT72H"),
            hidden: false,
            idle_settings: IdleSettings::default(),
            multiple_instances: MultipleInstancesPolicy::IgnoreNew,
            network_settings: NetworkSettings::default(),
            priority: 7,
            restart_count: 0,
            restart_interval: String::new(),
            run_only_if_idle: false,
            run_only_if_network_available: false,
            start_when_available: false,
            stop_if_on_batteries: true,
            wake_to_run: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdleSettings {
    pub idle_duration: String,
    pub restart_on_idle: bool,
    pub stop_on_idle_end: bool,
    pub wait_timeout: String,
}

impl Default for IdleSettings {
    fn default() -> IdleSettings {
        IdleSettings {
            idle_duration: String::from("PT10M"),
            restart_on_idle: false,
            stop_on_idle_end: true,
            wait_timeout: String::from("PT1H"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSettings {
    pub id: String,
    pub name: String,
}

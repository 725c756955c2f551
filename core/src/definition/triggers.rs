use crate::{
    error::TaskError,
    variant::{
        dates::{date_to_text, text_date_or_zero},
        PropertyBag, Variant,
    },
};
use common::windows::{
    BootTrigger, DailyTrigger, DaysOfMonth, DaysOfWeek, EventTrigger, IdleTrigger, LogonTrigger,
    MonthlyDowTrigger, MonthlyTrigger, MonthsOfYear, RegistrationTrigger, RepetitionPattern,
    SessionStateChangeTrigger, SessionStateChangeType, TaskTrigger, TimeTrigger, Trigger,
    WeeklyTrigger, WeeksOfMonth, EVERY_DAY, EVERY_WEEK,
};
use log::{error, warn};
use std::collections::BTreeMap;

/// `Type` values the service uses for triggers
pub const TRIGGER_EVENT: i32 = 0;
pub const TRIGGER_TIME: i32 = 1;
pub const TRIGGER_DAILY: i32 = 2;
pub const TRIGGER_WEEKLY: i32 = 3;
pub const TRIGGER_MONTHLY: i32 = 4;
pub const TRIGGER_MONTHLYDOW: i32 = 5;
pub const TRIGGER_IDLE: i32 = 6;
pub const TRIGGER_REGISTRATION: i32 = 7;
pub const TRIGGER_BOOT: i32 = 8;
pub const TRIGGER_LOGON: i32 = 9;
pub const TRIGGER_SESSION_STATE_CHANGE: i32 = 11;

/// Encode a trigger into the service property layout
pub fn encode_trigger(trigger: &Trigger) -> Result<PropertyBag, TaskError> {
    let mut bag = PropertyBag::new();
    match trigger {
        Trigger::Boot(boot) => {
            bag.set("Type", TRIGGER_BOOT);
            encode_common(&mut bag, &boot.task_trigger);
            bag.set_text("Delay", &boot.delay);
        }
        Trigger::Daily(daily) => {
            bag.set("Type", TRIGGER_DAILY);
            encode_common(&mut bag, &daily.task_trigger);
            bag.set("DaysInterval", i32::from(daily.day_interval));
            bag.set_text("RandomDelay", &daily.random_delay);
        }
        Trigger::Event(event) => {
            bag.set("Type", TRIGGER_EVENT);
            encode_common(&mut bag, &event.task_trigger);
            bag.set_text("Delay", &event.delay);
            bag.set_text("Subscription", &event.subscription);

            let mut queries = Vec::new();
            for (name, value) in &event.value_queries {
                let mut pair = PropertyBag::new();
                pair.set("Name", name.as_str());
                pair.set("Value", value.as_str());
                queries.push(Variant::Bag(pair));
            }
            if !queries.is_empty() {
                bag.set("ValueQueries", queries);
            }
        }
        Trigger::Idle(idle) => {
            bag.set("Type", TRIGGER_IDLE);
            encode_common(&mut bag, &idle.task_trigger);
        }
        Trigger::Logon(logon) => {
            bag.set("Type", TRIGGER_LOGON);
            encode_common(&mut bag, &logon.task_trigger);
            bag.set_text("Delay", &logon.delay);
            bag.set_text("UserId", &logon.user_id);
        }
        Trigger::MonthlyDow(monthly) => {
            bag.set("Type", TRIGGER_MONTHLYDOW);
            encode_common(&mut bag, &monthly.task_trigger);
            bag.set("DaysOfWeek", i32::from(monthly.days_of_week.bits()));
            bag.set("WeeksOfMonth", i32::from(monthly.weeks_of_month.bits()));
            bag.set("MonthsOfYear", i32::from(monthly.months_of_year.bits()));
            bag.set("RunOnLastWeekOfMonth", monthly.run_on_last_week_of_month);
            bag.set_text("RandomDelay", &monthly.random_delay);
        }
        Trigger::Monthly(monthly) => {
            bag.set("Type", TRIGGER_MONTHLY);
            encode_common(&mut bag, &monthly.task_trigger);
            // The service stores the day mask as a signed long
            bag.set("DaysOfMonth", monthly.days_of_month.bits() as i32);
            bag.set("MonthsOfYear", i32::from(monthly.months_of_year.bits()));
            bag.set("RunOnLastDayOfMonth", monthly.run_on_last_day_of_month);
            bag.set_text("RandomDelay", &monthly.random_delay);
        }
        Trigger::Registration(registration) => {
            bag.set("Type", TRIGGER_REGISTRATION);
            encode_common(&mut bag, &registration.task_trigger);
            bag.set_text("Delay", &registration.delay);
        }
        Trigger::SessionStateChange(session) => {
            bag.set("Type", TRIGGER_SESSION_STATE_CHANGE);
            encode_common(&mut bag, &session.task_trigger);
            bag.set_text("Delay", &session.delay);
            bag.set("StateChange", session.state_change.value());
            bag.set_text("UserId", &session.user_id);
        }
        Trigger::Time(time) => {
            bag.set("Type", TRIGGER_TIME);
            encode_common(&mut bag, &time.task_trigger);
            bag.set_text("RandomDelay", &time.random_delay);
        }
        Trigger::Weekly(weekly) => {
            bag.set("Type", TRIGGER_WEEKLY);
            encode_common(&mut bag, &weekly.task_trigger);
            bag.set("DaysOfWeek", i32::from(weekly.days_of_week.bits()));
            bag.set("WeeksInterval", i32::from(weekly.week_interval));
            bag.set_text("RandomDelay", &weekly.random_delay);
        }
        Trigger::Unsupported { kind } => {
            error!("[taskmaster] Cannot encode unsupported trigger type {kind}");
            return Err(TaskError::Unsupported);
        }
    }

    Ok(bag)
}

/// Decode a trigger. Unknown `Type` values become `Trigger::Unsupported`
pub fn decode_trigger(bag: &PropertyBag) -> Trigger {
    let kind = bag.i32_or("Type", -1);
    match kind {
        TRIGGER_BOOT => Trigger::Boot(BootTrigger {
            task_trigger: decode_common(bag),
            delay: bag.string_or_default("Delay"),
        }),
        TRIGGER_DAILY => Trigger::Daily(DailyTrigger {
            task_trigger: decode_common(bag),
            day_interval: u16_or(bag, "DaysInterval", EVERY_DAY),
            random_delay: bag.string_or_default("RandomDelay"),
        }),
        TRIGGER_EVENT => {
            let mut value_queries = BTreeMap::new();
            for query in bag.array_or_default("ValueQueries") {
                if let Variant::Bag(pair) = query {
                    value_queries.insert(
                        pair.string_or_default("Name"),
                        pair.string_or_default("Value"),
                    );
                }
            }
            Trigger::Event(EventTrigger {
                task_trigger: decode_common(bag),
                delay: bag.string_or_default("Delay"),
                subscription: bag.string_or_default("Subscription"),
                value_queries,
            })
        }
        TRIGGER_IDLE => Trigger::Idle(IdleTrigger {
            task_trigger: decode_common(bag),
        }),
        TRIGGER_LOGON => Trigger::Logon(LogonTrigger {
            task_trigger: decode_common(bag),
            delay: bag.string_or_default("Delay"),
            user_id: bag.string_or_default("UserId"),
        }),
        TRIGGER_MONTHLYDOW => Trigger::MonthlyDow(MonthlyDowTrigger {
            task_trigger: decode_common(bag),
            days_of_week: DaysOfWeek(u16_or(bag, "DaysOfWeek", 0)),
            weeks_of_month: WeeksOfMonth(u16_or(bag, "WeeksOfMonth", 0)),
            months_of_year: MonthsOfYear(u16_or(bag, "MonthsOfYear", 0)),
            run_on_last_week_of_month: bag.bool_or("RunOnLastWeekOfMonth", false),
            random_delay: bag.string_or_default("RandomDelay"),
        }),
        TRIGGER_MONTHLY => Trigger::Monthly(MonthlyTrigger {
            task_trigger: decode_common(bag),
            days_of_month: DaysOfMonth(bag.i32_or("DaysOfMonth", 0) as u32),
            months_of_year: MonthsOfYear(u16_or(bag, "MonthsOfYear", 0)),
            run_on_last_day_of_month: bag.bool_or("RunOnLastDayOfMonth", false),
            random_delay: bag.string_or_default("RandomDelay"),
        }),
        TRIGGER_REGISTRATION => Trigger::Registration(RegistrationTrigger {
            task_trigger: decode_common(bag),
            delay: bag.string_or_default("Delay"),
        }),
        TRIGGER_SESSION_STATE_CHANGE => Trigger::SessionStateChange(SessionStateChangeTrigger {
            task_trigger: decode_common(bag),
            delay: bag.string_or_default("Delay"),
            state_change: SessionStateChangeType::from_value(bag.i32_or("StateChange", 0)),
            user_id: bag.string_or_default("UserId"),
        }),
        TRIGGER_TIME => Trigger::Time(TimeTrigger {
            task_trigger: decode_common(bag),
            random_delay: bag.string_or_default("RandomDelay"),
        }),
        TRIGGER_WEEKLY => Trigger::Weekly(WeeklyTrigger {
            task_trigger: decode_common(bag),
            days_of_week: DaysOfWeek(u16_or(bag, "DaysOfWeek", 0)),
            week_interval: u16_or(bag, "WeeksInterval", EVERY_WEEK),
            random_delay: bag.string_or_default("RandomDelay"),
        }),
        _ => {
            warn!("[taskmaster] Unsupported trigger type {kind}");
            Trigger::Unsupported { kind }
        }
    }
}

/// Encode the settings every trigger type shares
fn encode_common(bag: &mut PropertyBag, common: &TaskTrigger) {
    bag.set_text("Id", &common.id);
    bag.set_text("StartBoundary", &date_to_text(&common.start_boundary));
    bag.set_text("EndBoundary", &date_to_text(&common.end_boundary));
    bag.set("Enabled", common.enabled);
    bag.set_text("ExecutionTimeLimit", &common.execution_time_limit);

    let repetition = &common.repetition;
    if repetition != &RepetitionPattern::default() {
        let mut pattern = PropertyBag::new();
        pattern.set_text("Duration", &repetition.duration);
        pattern.set_text("Interval", &repetition.interval);
        pattern.set("StopAtDurationEnd", repetition.stop_at_duration_end);
        bag.set("Repetition", pattern);
    }
}

fn decode_common(bag: &PropertyBag) -> TaskTrigger {
    let pattern = bag.bag_or_default("Repetition");
    TaskTrigger {
        id: bag.string_or_default("Id"),
        start_boundary: text_date_or_zero(bag.get("StartBoundary")),
        end_boundary: text_date_or_zero(bag.get("EndBoundary")),
        enabled: bag.bool_or("Enabled", true),
        execution_time_limit: bag.string_or_default("ExecutionTimeLimit"),
        repetition: RepetitionPattern {
            duration: pattern.string_or_default("Duration"),
            interval: pattern.string_or_default("Interval"),
            stop_at_duration_end: pattern.bool_or("StopAtDurationEnd", false),
        },
    }
}

/// Service shorts travel as `I4`. Values that do not fit use the default
fn u16_or(bag: &PropertyBag, name: &str, default: u16) -> u16 {
    let value = bag.i32_or(name, i32::from(default));
    match u16::try_from(value) {
        Ok(result) => result,
        Err(_err) => {
            warn!("[taskmaster] Property {name} value {value} does not fit a short");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_trigger, encode_trigger};
    use crate::variant::{is_zero_time, PropertyBag};
    use chrono::{TimeZone, Utc};
    use common::windows::{
        BootTrigger, DailyTrigger, DaysOfMonth, DaysOfWeek, EventTrigger, IdleTrigger,
        LogonTrigger, MonthlyDowTrigger, MonthlyTrigger, MonthsOfYear, RegistrationTrigger,
        RepetitionPattern, SessionStateChangeTrigger, SessionStateChangeType, TaskTrigger,
        TimeTrigger, Trigger, WeeklyTrigger, WeeksOfMonth, EVERY_OTHER_DAY, EVERY_OTHER_WEEK,
    };
    use std::collections::BTreeMap;

    fn starting() -> TaskTrigger {
        TaskTrigger {
            start_boundary: Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap(),
            ..Default::default()
        }
    }

    fn round_trip(trigger: Trigger) {
        let bag = encode_trigger(&trigger).unwrap();
        assert_eq!(decode_trigger(&bag), trigger);
    }

    #[test]
    fn test_simple_triggers_round_trip() {
        round_trip(Trigger::Boot(BootTrigger {
            task_trigger: TaskTrigger::default(),
            delay: String::from("PT30S"),
        }));
        round_trip(Trigger::Idle(IdleTrigger::default()));
        round_trip(Trigger::Registration(RegistrationTrigger::default()));
        round_trip(Trigger::Logon(LogonTrigger {
            task_trigger: TaskTrigger::default(),
            delay: String::new(),
            user_id: String::from("DOMAIN\\bob"),
        }));
        round_trip(Trigger::Time(TimeTrigger {
            task_trigger: starting(),
            random_delay: String::from("PT5M"),
        }));
        round_trip(Trigger::Daily(DailyTrigger {
            task_trigger: starting(),
            day_interval: EVERY_OTHER_DAY,
            random_delay: String::new(),
        }));
    }

    #[test]
    fn test_event_round_trip() {
        let mut value_queries = BTreeMap::new();
        value_queries.insert(String::from("level"), String::from("Event/System/Level"));
        round_trip(Trigger::Event(EventTrigger {
            task_trigger: TaskTrigger::default(),
            delay: String::new(),
            subscription: String::from("<QueryList> <Query Id='1'> <Select Path='System'>*[System/Level=2]</Select></Query></QueryList>"),
            value_queries,
        }));
    }

    #[test]
    fn test_session_state_round_trip() {
        round_trip(Trigger::SessionStateChange(SessionStateChangeTrigger {
            task_trigger: TaskTrigger::default(),
            delay: String::new(),
            state_change: SessionStateChangeType::SessionLock,
            user_id: String::new(),
        }));
    }

    #[test]
    fn test_weekly_bitmasks() {
        let days = [
            DaysOfWeek::SUNDAY,
            DaysOfWeek::MONDAY,
            DaysOfWeek::TUESDAY,
            DaysOfWeek::WEDNESDAY,
            DaysOfWeek::THURSDAY,
            DaysOfWeek::FRIDAY,
            DaysOfWeek::SATURDAY,
        ];
        // Every combination of days of the week
        for mask in 1..(1u16 << days.len()) {
            let mut days_of_week = DaysOfWeek::default();
            for (bit, day) in days.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    days_of_week |= *day;
                }
            }
            let trigger = Trigger::Weekly(WeeklyTrigger {
                task_trigger: starting(),
                days_of_week,
                week_interval: EVERY_OTHER_WEEK,
                random_delay: String::new(),
            });
            let bag = encode_trigger(&trigger).unwrap();
            match decode_trigger(&bag) {
                Trigger::Weekly(weekly) => {
                    assert_eq!(weekly.days_of_week, days_of_week);
                    assert_eq!(weekly.week_interval, EVERY_OTHER_WEEK);
                }
                _ => panic!("expected weekly trigger"),
            }
        }
    }

    #[test]
    fn test_monthly_dow_bitmasks() {
        for months in 0..0x1000u16 {
            let trigger = Trigger::MonthlyDow(MonthlyDowTrigger {
                task_trigger: starting(),
                days_of_week: DaysOfWeek::MONDAY | DaysOfWeek::FRIDAY,
                weeks_of_month: WeeksOfMonth::FIRST | WeeksOfMonth::FOURTH,
                months_of_year: MonthsOfYear(months),
                run_on_last_week_of_month: months % 2 == 0,
                random_delay: String::new(),
            });
            round_trip(trigger);
        }
    }

    #[test]
    fn test_monthly_bitmasks() {
        for day in 1..=31 {
            round_trip(Trigger::Monthly(MonthlyTrigger {
                task_trigger: starting(),
                days_of_month: DaysOfMonth::day(day) | DaysOfMonth::FIRST,
                months_of_year: MonthsOfYear::FEBRUARY | MonthsOfYear::MARCH,
                run_on_last_day_of_month: false,
                random_delay: String::new(),
            }));
        }
        round_trip(Trigger::Monthly(MonthlyTrigger {
            days_of_month: DaysOfMonth(0xFFFF_FFFF),
            ..Default::default()
        }));
    }

    #[test]
    fn test_repetition_round_trip() {
        let mut common = starting();
        common.end_boundary = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        common.enabled = false;
        common.execution_time_limit = String::from("PT2H");
        common.repetition = RepetitionPattern {
            duration: String::from("P1D"),
            interval: String::from("PT1H"),
            stop_at_duration_end: true,
        };
        round_trip(Trigger::Time(TimeTrigger {
            task_trigger: common,
            random_delay: String::new(),
        }));
    }

    #[test]
    fn test_missing_boundaries_are_zero() {
        let mut bag = PropertyBag::new();
        bag.set("Type", 1);
        match decode_trigger(&bag) {
            Trigger::Time(time) => {
                assert!(is_zero_time(&time.task_trigger.start_boundary));
                assert!(is_zero_time(&time.task_trigger.end_boundary));
                assert!(time.task_trigger.enabled);
            }
            _ => panic!("expected time trigger"),
        }

        let trigger = Trigger::Time(TimeTrigger::default());
        let bag = encode_trigger(&trigger).unwrap();
        assert!(!bag.contains("StartBoundary"));
    }

    #[test]
    fn test_decode_unsupported() {
        let mut bag = PropertyBag::new();
        bag.set("Type", 12);
        assert_eq!(decode_trigger(&bag), Trigger::Unsupported { kind: 12 });
    }

    #[test]
    #[should_panic(expected = "Unsupported")]
    fn test_encode_unsupported() {
        let _ = encode_trigger(&Trigger::Unsupported { kind: 12 }).unwrap();
    }
}

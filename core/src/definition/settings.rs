use crate::variant::PropertyBag;
use common::windows::{
    IdleSettings, MultipleInstancesPolicy, NetworkSettings, Settings, TaskCompatibility,
};

/// Encode Task `Settings` as a flat copy of every field. Durations with a service default are
/// always written so a cleared value stays cleared
pub fn encode_settings(settings: &Settings) -> PropertyBag {
    let mut bag = PropertyBag::new();
    bag.set("AllowDemandStart", settings.allow_demand_start);
    bag.set("AllowHardTerminate", settings.allow_hard_terminate);
    bag.set("Compatibility", settings.compatibility.value());
    bag.set_text("DeleteExpiredTaskAfter", &settings.delete_expired_task_after);
    bag.set("DisallowStartIfOnBatteries", settings.dont_start_on_batteries);
    bag.set("Enabled", settings.enabled);
    bag.set("ExecutionTimeLimit", settings.time_limit.as_str());
    bag.set("Hidden", settings.hidden);

    let mut idle = PropertyBag::new();
    idle.set("IdleDuration", settings.idle_settings.idle_duration.as_str());
    idle.set("RestartOnIdle", settings.idle_settings.restart_on_idle);
    idle.set("StopOnIdleEnd", settings.idle_settings.stop_on_idle_end);
    idle.set("WaitTimeout", settings.idle_settings.wait_timeout.as_str());
    bag.set("IdleSettings", idle);

    bag.set("MultipleInstances", settings.multiple_instances.value());

    let mut network = PropertyBag::new();
    network.set_text("Id", &settings.network_settings.id);
    network.set_text("Name", &settings.network_settings.name);
    bag.set("NetworkSettings", network);

    bag.set("Priority", i32::from(settings.priority));
    bag.set("RestartCount", settings.restart_count as i32);
    bag.set_text("RestartInterval", &settings.restart_interval);
    bag.set("RunOnlyIfIdle", settings.run_only_if_idle);
    bag.set(
        "RunOnlyIfNetworkAvailable",
        settings.run_only_if_network_available,
    );
    bag.set("StartWhenAvailable", settings.start_when_available);
    bag.set("StopIfGoingOnBatteries", settings.stop_if_on_batteries);
    bag.set("WakeToRun", settings.wake_to_run);

    bag
}

/// Decode Task `Settings`. Missing values use the service defaults
pub fn decode_settings(bag: &PropertyBag) -> Settings {
    let defaults = Settings::default();
    let idle_defaults = IdleSettings::default();
    let idle = bag.bag_or_default("IdleSettings");
    let network = bag.bag_or_default("NetworkSettings");

    Settings {
        allow_demand_start: bag.bool_or("AllowDemandStart", defaults.allow_demand_start),
        allow_hard_terminate: bag.bool_or("AllowHardTerminate", defaults.allow_hard_terminate),
        compatibility: TaskCompatibility::from_value(
            bag.i32_or("Compatibility", defaults.compatibility.value()),
        ),
        delete_expired_task_after: bag.string_or_default("DeleteExpiredTaskAfter"),
        dont_start_on_batteries: bag.bool_or(
            "DisallowStartIfOnBatteries",
            defaults.dont_start_on_batteries,
        ),
        enabled: bag.bool_or("Enabled", defaults.enabled),
        time_limit: bag.string_or("ExecutionTimeLimit", &defaults.time_limit),
        hidden: bag.bool_or("Hidden", defaults.hidden),
        idle_settings: IdleSettings {
            idle_duration: idle.string_or("IdleDuration", &idle_defaults.idle_duration),
            restart_on_idle: idle.bool_or("RestartOnIdle", idle_defaults.restart_on_idle),
            stop_on_idle_end: idle.bool_or("StopOnIdleEnd", idle_defaults.stop_on_idle_end),
            wait_timeout: idle.string_or("WaitTimeout", &idle_defaults.wait_timeout),
        },
        multiple_instances: MultipleInstancesPolicy::from_value(
            bag.i32_or("MultipleInstances", defaults.multiple_instances.value()),
        ),
        network_settings: NetworkSettings {
            id: network.string_or_default("Id"),
            name: network.string_or_default("Name"),
        },
        priority: u8::try_from(bag.i32_or("Priority", i32::from(defaults.priority)))
            .unwrap_or(defaults.priority),
        restart_count: u32::try_from(bag.i32_or("RestartCount", 0)).unwrap_or_default(),
        restart_interval: bag.string_or_default("RestartInterval"),
        run_only_if_idle: bag.bool_or("RunOnlyIfIdle", defaults.run_only_if_idle),
        run_only_if_network_available: bag.bool_or(
            "RunOnlyIfNetworkAvailable",
            defaults.run_only_if_network_available,
        ),
        start_when_available: bag.bool_or("StartWhenAvailable", defaults.start_when_available),
        stop_if_on_batteries: bag.bool_or("StopIfGoingOnBatteries", defaults.stop_if_on_batteries),
        wake_to_run: bag.bool_or("WakeToRun", defaults.wake_to_run),
    }
}

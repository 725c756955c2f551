use super::{
    actions::{decode_action, encode_action},
    registration::{decode_principal, decode_registration, encode_principal, encode_registration},
    settings::{decode_settings, encode_settings},
    triggers::{decode_trigger, encode_trigger},
};
use crate::{
    error::TaskError,
    variant::{PropertyBag, Variant},
};
use common::windows::{Action, TaskDefinition, Trigger};
use log::warn;

/// Conversion between a `TaskDefinition` and the service property bag. Pure data transformation
pub trait DefinitionBag: Sized {
    /// Encode the definition. Fails only if an action or trigger is structurally invalid
    fn to_property_bag(&self) -> Result<PropertyBag, TaskError>;
    /// Decode a definition. Never fails, unusable values fall back to defaults
    fn from_property_bag(bag: &PropertyBag) -> Self;
}

impl DefinitionBag for TaskDefinition {
    fn to_property_bag(&self) -> Result<PropertyBag, TaskError> {
        let mut actions = Vec::new();
        for action in &self.actions {
            actions.push(Variant::Bag(encode_action(action)?));
        }

        let mut triggers = Vec::new();
        for trigger in &self.triggers {
            triggers.push(Variant::Bag(encode_trigger(trigger)?));
        }

        let mut bag = PropertyBag::new();
        bag.set("Actions", actions);
        bag.set("Context", self.context.as_str());
        bag.set_text("Data", &self.data);
        bag.set("Principal", encode_principal(&self.principal));
        bag.set("RegistrationInfo", encode_registration(&self.registration_info));
        bag.set("Settings", encode_settings(&self.settings));
        bag.set("Triggers", triggers);

        Ok(bag)
    }

    fn from_property_bag(bag: &PropertyBag) -> TaskDefinition {
        let mut actions = Vec::new();
        for value in bag.array_or_default("Actions") {
            match value {
                Variant::Bag(action) => actions.push(decode_action(&action)),
                other => {
                    warn!("[taskmaster] Action entry is not an object: {other:?}");
                    actions.push(Action::Unsupported { kind: -1 });
                }
            }
        }

        let mut triggers = Vec::new();
        for value in bag.array_or_default("Triggers") {
            match value {
                Variant::Bag(trigger) => triggers.push(decode_trigger(&trigger)),
                other => {
                    warn!("[taskmaster] Trigger entry is not an object: {other:?}");
                    triggers.push(Trigger::Unsupported { kind: -1 });
                }
            }
        }

        let context = match bag.string_or_default("Context") {
            value if value.is_empty() => TaskDefinition::default().context,
            value => value,
        };

        TaskDefinition {
            actions,
            context,
            data: bag.string_or_default("Data"),
            principal: decode_principal(&bag.bag_or_default("Principal")),
            registration_info: decode_registration(&bag.bag_or_default("RegistrationInfo")),
            settings: decode_settings(&bag.bag_or_default("Settings")),
            triggers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DefinitionBag;
    use crate::variant::{PropertyBag, Variant};
    use chrono::{TimeZone, Utc};
    use common::windows::{
        Action, BootTrigger, ComHandlerAction, DaysOfWeek, ExecAction, MultipleInstancesPolicy,
        ShowMessageAction, TaskDefinition, TaskTrigger, Trigger, WeeklyTrigger,
    };

    #[test]
    fn test_definition_round_trip() {
        let mut def = TaskDefinition::default();
        def.add_action(ExecAction {
            path: String::from("cmd.exe"),
            args: String::from("/c timeout $(Arg0)"),
            ..Default::default()
        });
        def.add_action(ShowMessageAction {
            title: String::from("done"),
            message: String::from("finished"),
            ..Default::default()
        });
        def.add_trigger(BootTrigger::default());
        def.add_trigger(WeeklyTrigger {
            task_trigger: TaskTrigger {
                start_boundary: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
                ..Default::default()
            },
            days_of_week: DaysOfWeek::TUESDAY | DaysOfWeek::THURSDAY,
            ..Default::default()
        });
        def.settings.multiple_instances = MultipleInstancesPolicy::Parallel;
        def.registration_info.author = String::from("Big Chungus");
        def.data = String::from("payload");

        let bag = def.to_property_bag().unwrap();
        let result = TaskDefinition::from_property_bag(&bag);
        assert_eq!(result, def);
    }

    #[test]
    fn test_empty_definition() {
        let def = TaskDefinition::default();
        let bag = def.to_property_bag().unwrap();
        assert_eq!(bag.array_or_default("Actions").len(), 0);
        assert_eq!(TaskDefinition::from_property_bag(&bag), def);
        assert_eq!(
            TaskDefinition::from_property_bag(&PropertyBag::new()),
            TaskDefinition::default()
        );
    }

    #[test]
    fn test_unknown_entries_keep_order() {
        let mut unknown = PropertyBag::new();
        unknown.set("Type", 99);
        let mut exec = PropertyBag::new();
        exec.set("Type", 0);
        exec.set("Path", "calc.exe");

        let mut bag = PropertyBag::new();
        bag.set(
            "Actions",
            vec![Variant::Bag(unknown), Variant::I4(1), Variant::Bag(exec)],
        );

        let result = TaskDefinition::from_property_bag(&bag);
        assert_eq!(result.actions.len(), 3);
        assert_eq!(result.actions[0], Action::Unsupported { kind: 99 });
        assert_eq!(result.actions[1], Action::Unsupported { kind: -1 });
        assert!(matches!(result.actions[2], Action::Exec(_)));
    }

    #[test]
    #[should_panic(expected = "InvalidDefinition")]
    fn test_invalid_action_fails_encode() {
        let mut def = TaskDefinition::default();
        def.add_trigger(Trigger::Boot(BootTrigger::default()));
        def.add_action(ComHandlerAction {
            class_id: String::from("not a guid"),
            ..Default::default()
        });
        let _ = def.to_property_bag().unwrap();
    }
}

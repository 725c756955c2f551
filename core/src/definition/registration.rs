use crate::variant::{
    dates::{date_to_text, text_date_or_zero},
    PropertyBag,
};
use common::windows::{LogonType, Principal, RegistrationInfo, RunLevel};

pub fn encode_registration(info: &RegistrationInfo) -> PropertyBag {
    let mut bag = PropertyBag::new();
    bag.set_text("Author", &info.author);
    bag.set_text("Date", &date_to_text(&info.date));
    bag.set_text("Description", &info.description);
    bag.set_text("Documentation", &info.documentation);
    bag.set_text("SecurityDescriptor", &info.security_descriptor);
    bag.set_text("Source", &info.source);
    bag.set_text("URI", &info.uri);
    bag.set_text("Version", &info.version);
    bag
}

pub fn decode_registration(bag: &PropertyBag) -> RegistrationInfo {
    RegistrationInfo {
        author: bag.string_or_default("Author"),
        date: text_date_or_zero(bag.get("Date")),
        description: bag.string_or_default("Description"),
        documentation: bag.string_or_default("Documentation"),
        security_descriptor: bag.string_or_default("SecurityDescriptor"),
        source: bag.string_or_default("Source"),
        uri: bag.string_or_default("URI"),
        version: bag.string_or_default("Version"),
    }
}

pub fn encode_principal(principal: &Principal) -> PropertyBag {
    let mut bag = PropertyBag::new();
    bag.set_text("Id", &principal.id);
    bag.set_text("DisplayName", &principal.display_name);
    bag.set_text("GroupId", &principal.group_id);
    bag.set_text("UserId", &principal.user_id);
    bag.set("LogonType", principal.logon_type.value());
    bag.set("RunLevel", principal.run_level.value());
    bag
}

pub fn decode_principal(bag: &PropertyBag) -> Principal {
    let defaults = Principal::default();
    let id = match bag.string_or_default("Id") {
        value if value.is_empty() => defaults.id,
        value => value,
    };

    Principal {
        id,
        display_name: bag.string_or_default("DisplayName"),
        group_id: bag.string_or_default("GroupId"),
        user_id: bag.string_or_default("UserId"),
        logon_type: LogonType::from_value(bag.i32_or("LogonType", defaults.logon_type.value())),
        run_level: RunLevel::from_value(bag.i32_or("RunLevel", defaults.run_level.value())),
    }
}

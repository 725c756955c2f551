use crate::{
    error::TaskError,
    variant::{PropertyBag, Variant},
};
use common::windows::{Action, ComHandlerAction, EmailAction, ExecAction, ShowMessageAction};
use log::{error, warn};
use regex::{Captures, Regex};
use std::collections::BTreeMap;

/// `Type` values the service uses for actions
pub const ACTION_EXEC: i32 = 0;
pub const ACTION_COM_HANDLER: i32 = 5;
pub const ACTION_SEND_EMAIL: i32 = 6;
pub const ACTION_SHOW_MESSAGE: i32 = 7;

/// Highest `$(ArgN)` placeholder the service substitutes
const MAX_ARGUMENTS: usize = 32;

/// Encode an action into the service property layout
pub fn encode_action(action: &Action) -> Result<PropertyBag, TaskError> {
    let mut bag = PropertyBag::new();
    match action {
        Action::Exec(exec) => {
            bag.set("Type", ACTION_EXEC);
            bag.set_text("Id", &exec.id);
            bag.set("Path", exec.path.as_str());
            bag.set_text("Arguments", &exec.args);
            bag.set_text("WorkingDirectory", &exec.working_dir);
        }
        Action::ComHandler(com) => {
            if !is_guid(&com.class_id) {
                error!(
                    "[taskmaster] ComHandler class id {} is not a GUID",
                    com.class_id
                );
                return Err(TaskError::InvalidDefinition);
            }
            bag.set("Type", ACTION_COM_HANDLER);
            bag.set_text("Id", &com.id);
            bag.set("ClassId", com.class_id.as_str());
            bag.set_text("Data", &com.data);
        }
        Action::Email(email) => {
            bag.set("Type", ACTION_SEND_EMAIL);
            bag.set_text("Id", &email.id);
            bag.set_text("Server", &email.server);
            bag.set_text("Subject", &email.subject);
            bag.set_text("To", &email.to);
            bag.set_text("Cc", &email.cc);
            bag.set_text("Bcc", &email.bcc);
            bag.set_text("ReplyTo", &email.reply_to);
            bag.set_text("From", &email.from);
            bag.set_text("Body", &email.body);

            let mut headers = Vec::new();
            for (name, value) in &email.header_fields {
                let mut pair = PropertyBag::new();
                pair.set("Name", name.as_str());
                pair.set("Value", value.as_str());
                headers.push(Variant::Bag(pair));
            }
            if !headers.is_empty() {
                bag.set("HeaderFields", headers);
            }

            if !email.attachments.is_empty() {
                let files: Vec<Variant> = email
                    .attachments
                    .iter()
                    .map(|file| Variant::from(file.as_str()))
                    .collect();
                bag.set("Attachments", files);
            }
        }
        Action::ShowMessage(message) => {
            bag.set("Type", ACTION_SHOW_MESSAGE);
            bag.set_text("Id", &message.id);
            bag.set_text("Title", &message.title);
            bag.set_text("MessageBody", &message.message);
        }
        Action::Unsupported { kind } => {
            error!("[taskmaster] Cannot encode unsupported action type {kind}");
            return Err(TaskError::Unsupported);
        }
    }

    Ok(bag)
}

/// Decode an action. Unknown `Type` values become `Action::Unsupported`
pub fn decode_action(bag: &PropertyBag) -> Action {
    let kind = bag.i32_or("Type", -1);
    match kind {
        ACTION_EXEC => Action::Exec(ExecAction {
            id: bag.string_or_default("Id"),
            path: bag.string_or_default("Path"),
            args: bag.string_or_default("Arguments"),
            working_dir: bag.string_or_default("WorkingDirectory"),
        }),
        ACTION_COM_HANDLER => Action::ComHandler(ComHandlerAction {
            id: bag.string_or_default("Id"),
            class_id: bag.string_or_default("ClassId"),
            data: bag.string_or_default("Data"),
        }),
        ACTION_SEND_EMAIL => Action::Email(decode_email(bag)),
        ACTION_SHOW_MESSAGE => Action::ShowMessage(ShowMessageAction {
            id: bag.string_or_default("Id"),
            title: bag.string_or_default("Title"),
            message: bag.string_or_default("MessageBody"),
        }),
        _ => {
            warn!("[taskmaster] Unsupported action type {kind}");
            Action::Unsupported { kind }
        }
    }
}

fn decode_email(bag: &PropertyBag) -> EmailAction {
    let mut header_fields = BTreeMap::new();
    for header in bag.array_or_default("HeaderFields") {
        if let Variant::Bag(pair) = header {
            header_fields.insert(
                pair.string_or_default("Name"),
                pair.string_or_default("Value"),
            );
        }
    }

    let mut attachments = Vec::new();
    for file in bag.array_or_default("Attachments") {
        if let Variant::Bstr(value) = file {
            attachments.push(value);
        }
    }

    EmailAction {
        id: bag.string_or_default("Id"),
        server: bag.string_or_default("Server"),
        subject: bag.string_or_default("Subject"),
        to: bag.string_or_default("To"),
        cc: bag.string_or_default("Cc"),
        bcc: bag.string_or_default("Bcc"),
        reply_to: bag.string_or_default("ReplyTo"),
        from: bag.string_or_default("From"),
        header_fields,
        body: bag.string_or_default("Body"),
        attachments,
    }
}

/// Check for a GUID token. Braces are optional: `{F0001111-0000-0000-0000-0000FEEDACDC}`
pub(crate) fn is_guid(value: &str) -> bool {
    let guid = r"^(\{[0-9a-fA-F]{8}(-[0-9a-fA-F]{4}){3}-[0-9a-fA-F]{12}\}|[0-9a-fA-F]{8}(-[0-9a-fA-F]{4}){3}-[0-9a-fA-F]{12})$";
    match Regex::new(guid) {
        Ok(result) => result.is_match(value),
        Err(err) => {
            error!("[taskmaster] Could not compile GUID regex: {err:?}");
            false
        }
    }
}

/// Replace `$(Arg0)` .. `$(Arg31)` with run arguments. Missing arguments become empty strings
pub fn substitute_arguments(text: &str, args: &[String]) -> String {
    let placeholder = match Regex::new(r"\$\(Arg(\d{1,2})\)") {
        Ok(result) => result,
        Err(err) => {
            error!("[taskmaster] Could not compile argument regex: {err:?}");
            return text.to_string();
        }
    };

    placeholder
        .replace_all(text, |caps: &Captures<'_>| {
            let index: usize = caps[1].parse().unwrap_or(MAX_ARGUMENTS);
            if index >= MAX_ARGUMENTS {
                return caps[0].to_string();
            }
            args.get(index).cloned().unwrap_or_default()
        })
        .to_string()
}

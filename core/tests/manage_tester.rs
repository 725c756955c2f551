use chrono::{TimeZone, Utc};
use common::windows::{
    Action, BootTrigger, ComHandlerAction, DailyTrigger, DaysOfMonth, DaysOfWeek, EmailAction,
    EventTrigger, ExecAction, IdleTrigger, LogonTrigger, MonthlyDowTrigger, MonthlyTrigger,
    MonthsOfYear, RegistrationTrigger, SessionStateChangeTrigger, SessionStateChangeType,
    ShowMessageAction, TaskDefinition, TaskTrigger, TimeTrigger, Trigger, WeeklyTrigger,
    WeeksOfMonth,
};
use std::{cell::RefCell, collections::BTreeMap, path::PathBuf, rc::Rc};
use taskmaster::{
    utils::config::read_config, MemoryBackend, TaskError, TaskFolder, TaskService,
};

fn connect() -> (TaskService, Rc<RefCell<MemoryBackend>>) {
    let backend = Rc::new(RefCell::new(MemoryBackend::new()));
    let service = TaskService::connect_local(backend.clone()).unwrap();
    (service, backend)
}

fn exec_definition(service: &TaskService, path: &str) -> TaskDefinition {
    let mut def = service.new_task_definition();
    def.add_action(ExecAction {
        path: path.to_string(),
        ..Default::default()
    });
    def
}

fn start() -> TaskTrigger {
    TaskTrigger {
        start_boundary: Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap(),
        ..Default::default()
    }
}

#[test]
fn test_create_exec_task() {
    let (service, _backend) = connect();
    let def = exec_definition(&service, "calc.exe");

    let (task, created) = service
        .create_task("\\Taskmaster\\ExecAction", &def, true)
        .unwrap();
    assert!(created);

    let result = service
        .get_registered_task("\\Taskmaster\\ExecAction")
        .unwrap();
    assert_eq!(result.path, task.path);
    assert_eq!(result.definition.actions.len(), 1);
    match &result.definition.actions[0] {
        Action::Exec(exec) => assert_eq!(exec.path, "calc.exe"),
        other => panic!("unexpected action {other:?}"),
    }
    assert!(result.definition.triggers.is_empty());
}

#[test]
fn test_create_every_action() {
    let (service, _backend) = connect();
    let mut def = exec_definition(&service, "cmd.exe");
    def.add_action(ComHandlerAction {
        class_id: String::from("{F0001111-0000-0000-0000-0000FEEDACDC}"),
        data: String::from("payload"),
        ..Default::default()
    });
    def.add_action(EmailAction {
        server: String::from("smtp.example.com"),
        subject: String::from("Task ran"),
        to: String::from("ops@example.com"),
        from: String::from("scheduler@example.com"),
        header_fields: BTreeMap::from([(String::from("X-Task"), String::from("1"))]),
        body: String::from("It ran"),
        attachments: vec![String::from("C:\\report.txt")],
        ..Default::default()
    });
    def.add_action(ShowMessageAction {
        title: String::from("Hello"),
        message: String::from("World"),
        ..Default::default()
    });

    service
        .create_task("\\Taskmaster\\AllActions", &def, true)
        .unwrap();
    let result = service
        .get_registered_task("\\Taskmaster\\AllActions")
        .unwrap();
    assert_eq!(result.definition.actions, def.actions);
}

#[test]
fn test_create_every_trigger() {
    let (service, _backend) = connect();
    let mut def = exec_definition(&service, "cmd.exe");
    let triggers: Vec<Trigger> = vec![
        BootTrigger {
            task_trigger: start(),
            delay: String::from("PT5M"),
        }
        .into(),
        DailyTrigger {
            task_trigger: start(),
            day_interval: 2,
            random_delay: String::from("PT1H"),
        }
        .into(),
        EventTrigger {
            task_trigger: start(),
            subscription: String::from("<QueryList></QueryList>"),
            value_queries: BTreeMap::from([(String::from("id"), String::from("Event/@Id"))]),
            ..Default::default()
        }
        .into(),
        IdleTrigger {
            task_trigger: start(),
        }
        .into(),
        LogonTrigger {
            task_trigger: start(),
            user_id: String::from("corp\\bob"),
            ..Default::default()
        }
        .into(),
        MonthlyDowTrigger {
            task_trigger: start(),
            days_of_week: DaysOfWeek::MONDAY | DaysOfWeek::FRIDAY,
            weeks_of_month: WeeksOfMonth::FIRST | WeeksOfMonth::THIRD,
            months_of_year: MonthsOfYear::JANUARY | MonthsOfYear::JULY,
            run_on_last_week_of_month: true,
            ..Default::default()
        }
        .into(),
        MonthlyTrigger {
            task_trigger: start(),
            days_of_month: DaysOfMonth::FIRST | DaysOfMonth::day(31),
            months_of_year: MonthsOfYear::DECEMBER,
            run_on_last_day_of_month: true,
            ..Default::default()
        }
        .into(),
        RegistrationTrigger {
            task_trigger: start(),
            delay: String::from("PT30S"),
        }
        .into(),
        SessionStateChangeTrigger {
            task_trigger: start(),
            state_change: SessionStateChangeType::SessionUnlock,
            ..Default::default()
        }
        .into(),
        TimeTrigger {
            task_trigger: start(),
            random_delay: String::new(),
        }
        .into(),
        WeeklyTrigger {
            task_trigger: start(),
            days_of_week: DaysOfWeek::SUNDAY | DaysOfWeek::SATURDAY,
            week_interval: 2,
            ..Default::default()
        }
        .into(),
    ];
    for trigger in triggers {
        def.add_trigger(trigger);
    }

    service
        .create_task("\\Taskmaster\\AllTriggers", &def, true)
        .unwrap();
    let result = service
        .get_registered_task("\\Taskmaster\\AllTriggers")
        .unwrap();
    assert_eq!(result.definition.triggers.len(), 11);
    assert_eq!(result.definition.triggers, def.triggers);
}

#[test]
fn test_create_without_overwrite() {
    let (service, _backend) = connect();
    let original = exec_definition(&service, "calc.exe");
    service
        .create_task("\\Taskmaster\\Keep", &original, false)
        .unwrap();

    let replacement = exec_definition(&service, "notepad.exe");
    let (task, created) = service
        .create_task("\\Taskmaster\\Keep", &replacement, false)
        .unwrap();
    assert!(!created);
    assert_eq!(task.definition.actions, original.actions);

    let fetched = service.get_registered_task("\\Taskmaster\\Keep").unwrap();
    assert_eq!(fetched.definition.actions, original.actions);
}

#[test]
fn test_update_author() {
    let (service, _backend) = connect();
    let def = exec_definition(&service, "calc.exe");
    let (mut task, _) = service
        .create_task("\\Taskmaster\\Update", &def, true)
        .unwrap();

    task.definition.registration_info.author = String::from("Big Chungus");
    service
        .update_task("\\Taskmaster\\Update", &task.definition)
        .unwrap();

    let result = service.get_registered_task("\\Taskmaster\\Update").unwrap();
    assert_eq!(result.definition.registration_info.author, "Big Chungus");
    assert_eq!(result.path, "\\Taskmaster\\Update");
}

#[test]
fn test_get_registered_tasks() {
    let (service, _backend) = connect();
    for path in [
        "\\Root",
        "\\Taskmaster\\One",
        "\\Taskmaster\\Nested\\Two",
        "\\Other\\Three",
    ] {
        let def = exec_definition(&service, "calc.exe");
        service.create_task(path, &def, false).unwrap();
    }

    let tasks = service.get_registered_tasks().unwrap();
    let mut paths: Vec<&str> = tasks.iter().map(|task| task.path.as_str()).collect();
    paths.sort();
    assert_eq!(
        paths,
        vec![
            "\\Other\\Three",
            "\\Root",
            "\\Taskmaster\\Nested\\Two",
            "\\Taskmaster\\One"
        ]
    );
}

#[test]
fn test_folder_tree() {
    let (service, _backend) = connect();
    for path in [
        "\\Taskmaster\\Folders\\Alpha\\TaskOne",
        "\\Taskmaster\\Folders\\Beta\\TaskTwo",
        "\\Taskmaster\\Folders\\Beta\\TaskThree",
    ] {
        let def = exec_definition(&service, "calc.exe");
        service.create_task(path, &def, false).unwrap();
    }

    let folder = service.get_task_folder("\\Taskmaster\\Folders").unwrap();
    assert_eq!(folder.name, "Folders");
    assert_eq!(folder.sub_folders.len(), 2);
    assert_eq!(folder.sub_folders[0].name, "Alpha");
    assert_eq!(folder.sub_folders[1].path, "\\Taskmaster\\Folders\\Beta");
    assert_eq!(folder.sub_folders[1].registered_tasks.len(), 2);
    assert_eq!(folder.sub_folders[1].registered_tasks[0].name, "TaskTwo");

    let root = service.get_task_folders().unwrap();
    assert_eq!(root.path, "\\");
    assert_eq!(root.sub_folders[0].sub_folders[0].path, "\\Taskmaster\\Folders");

    let json = serde_json::to_value(&folder).unwrap();
    assert_eq!(json["sub_folders"][0]["name"], "Alpha");
}

#[test]
fn test_delete_folder() {
    let (service, _backend) = connect();
    for path in [
        "\\Taskmaster\\Delete\\TaskOne",
        "\\Taskmaster\\Delete\\Nested\\TaskTwo",
    ] {
        let def = exec_definition(&service, "calc.exe");
        service.create_task(path, &def, false).unwrap();
    }

    let deleted = service.delete_folder("\\Taskmaster\\Delete", false).unwrap();
    assert!(!deleted);
    assert!(service.task_folder_exist("\\Taskmaster\\Delete"));
    assert!(service
        .get_registered_task("\\Taskmaster\\Delete\\Nested\\TaskTwo")
        .is_ok());

    let deleted = service.delete_folder("\\Taskmaster\\Delete", true).unwrap();
    assert!(deleted);
    assert!(!service.task_folder_exist("\\Taskmaster\\Delete"));
    assert!(!service.task_folder_exist("\\Taskmaster\\Delete\\Nested"));
    assert!(service.task_folder_exist("\\Taskmaster"));
    for path in [
        "\\Taskmaster\\Delete\\TaskOne",
        "\\Taskmaster\\Delete\\Nested\\TaskTwo",
    ] {
        assert_eq!(
            service.get_registered_task(path).err(),
            Some(TaskError::NotFound)
        );
    }

    let result = service.get_task_folder("\\Taskmaster\\Delete");
    assert_eq!(result.as_ref().err(), Some(&TaskError::NotFound));
    let folder: TaskFolder = result.unwrap_or_default();
    assert!(folder.path.is_empty());
}

#[test]
fn test_delete_folder_denied() {
    let (service, backend) = connect();
    let def = exec_definition(&service, "calc.exe");
    service
        .create_task("\\Locked\\Inner\\Task", &def, false)
        .unwrap();
    backend.borrow_mut().deny_delete("\\Locked\\Inner");

    assert_eq!(
        service.delete_folder("\\Locked", true),
        Err(TaskError::ServiceFault)
    );
    assert!(service.task_folder_exist("\\Locked\\Inner"));
}

#[test]
fn test_delete_missing_folder() {
    let (service, _backend) = connect();
    assert_eq!(
        service.delete_folder("\\Nope", true),
        Err(TaskError::NotFound)
    );
    assert!(!service.task_folder_exist("\\Nope"));
}

#[test]
fn test_handles_released() {
    let (service, backend) = connect();
    let def = exec_definition(&service, "calc.exe");
    service
        .create_task("\\Taskmaster\\Handles\\Task", &def, false)
        .unwrap();

    let mut root = service.get_task_folders().unwrap();
    assert!(backend.borrow().open_handles() > 0);
    root.release();
    assert_eq!(backend.borrow().open_handles(), 0);

    let tasks = service.get_registered_tasks().unwrap();
    drop(tasks);
    assert_eq!(backend.borrow().open_handles(), 0);
}

#[test]
fn test_connect_from_config() {
    let mut test_location = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    test_location.push("tests/test_data/taskmaster.toml");
    let config = read_config(test_location.to_str().unwrap()).unwrap();

    let backend = Rc::new(RefCell::new(MemoryBackend::new()));
    backend.borrow_mut().refuse_connects(1);
    let service = TaskService::connect_with(backend, &config.connection).unwrap();
    assert!(service.is_connected());
}

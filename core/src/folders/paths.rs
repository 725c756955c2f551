use crate::error::TaskError;
use log::error;

pub const SEPARATOR: char = '\\';
/// Path of the top level folder
pub const ROOT: &str = "\\";

/// Make a path absolute and backslash delimited. `Foo//Bar\` becomes `\Foo\Bar`
pub fn normalize_path(path: &str) -> String {
    let components = path_components(path);
    if components.is_empty() {
        return ROOT.to_string();
    }

    let mut normal = String::new();
    for component in components {
        normal.push(SEPARATOR);
        normal.push_str(component);
    }
    normal
}

/// Non-empty path components. Forward slashes are treated as separators
pub fn path_components(path: &str) -> Vec<&str> {
    path.trim()
        .split(['\\', '/'])
        .filter(|component| !component.is_empty())
        .collect()
}

/// Join a folder path and a child name
pub fn join_path(parent: &str, name: &str) -> String {
    if parent == ROOT || parent.is_empty() {
        return format!("{SEPARATOR}{name}");
    }
    format!("{parent}{SEPARATOR}{name}")
}

/// Split a task path into its folder path and task name
pub fn split_task_path(path: &str) -> Result<(String, String), TaskError> {
    let normal = normalize_path(path);
    if normal == ROOT {
        error!("[taskmaster] Path {path} does not name a task");
        return Err(TaskError::InvalidPath);
    }

    match normal.rfind(SEPARATOR) {
        Some(0) => Ok((ROOT.to_string(), normal[1..].to_string())),
        Some(index) => Ok((normal[..index].to_string(), normal[index + 1..].to_string())),
        None => {
            error!("[taskmaster] Path {path} is not absolute");
            Err(TaskError::InvalidPath)
        }
    }
}

/// Case-insensitive path comparison key
pub fn path_key(path: &str) -> String {
    normalize_path(path).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{join_path, normalize_path, path_components, path_key, split_task_path};

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "\\");
        assert_eq!(normalize_path("\\"), "\\");
        assert_eq!(normalize_path("Taskmaster"), "\\Taskmaster");
        assert_eq!(normalize_path(" Foo//Bar\\ "), "\\Foo\\Bar");
        assert_eq!(normalize_path("\\\\Foo\\\\Bar\\Task"), "\\Foo\\Bar\\Task");
    }

    #[test]
    fn test_path_components() {
        assert_eq!(path_components("\\Foo\\Bar"), vec!["Foo", "Bar"]);
        assert!(path_components("\\").is_empty());
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("\\", "Foo"), "\\Foo");
        assert_eq!(join_path("\\Foo", "Bar"), "\\Foo\\Bar");
    }

    #[test]
    fn test_split_task_path() {
        let (folder, name) = split_task_path("\\TestTask").unwrap();
        assert_eq!(folder, "\\");
        assert_eq!(name, "TestTask");

        let (folder, name) = split_task_path("Taskmaster/Folders/Alpha/TaskOne").unwrap();
        assert_eq!(folder, "\\Taskmaster\\Folders\\Alpha");
        assert_eq!(name, "TaskOne");
    }

    #[test]
    #[should_panic(expected = "InvalidPath")]
    fn test_split_root() {
        let _ = split_task_path("\\").unwrap();
    }

    #[test]
    fn test_path_key() {
        assert_eq!(path_key("\\TaskMaster\\Test"), path_key("taskmaster/test"));
    }
}

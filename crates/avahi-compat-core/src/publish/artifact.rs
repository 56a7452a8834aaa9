//! `.dnssd` unit files.
//!
//! Each published service becomes one file in the daemon's DNS-SD
//! directory:
//!
//! ```text
//! [Service]
//! Name=My Test Service
//! Type=_http._tcp
//! Port=8080
//! TxtText=path=/api
//! TxtText=version=1.0
//! ```

use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::ServiceDefinition;

/// File name for a service: `<name>-<type>.dnssd` with both parts reduced
/// to file-name-safe characters.
pub fn file_name(name: &str, service_type: &str) -> String {
    let mut out = String::with_capacity(name.len() + service_type.len() + 7);
    for c in name.chars() {
        match c {
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => out.push(c),
            ' ' => out.push('_'),
            _ => {}
        }
    }
    out.push('-');
    for c in service_type.chars() {
        match c {
            c if c.is_ascii_alphanumeric() || c == '-' => out.push(c),
            '_' | '.' => out.push('-'),
            _ => {}
        }
    }
    out.push_str(".dnssd");
    out
}

/// Render the unit file for `service`.
pub fn render(service: &ServiceDefinition) -> String {
    let mut out = String::from("[Service]\n");
    let _ = writeln!(out, "Name={}", service.name.replace('%', "%%"));
    let _ = writeln!(out, "Type={}", service.service_type);
    let _ = writeln!(out, "Port={}", service.port);
    for (key, value) in service.txt.iter() {
        let item = match value {
            Some(value) => format!("{key}={}", String::from_utf8_lossy(value)),
            None => key.to_string(),
        };
        let _ = writeln!(out, "TxtText={}", quote(&item));
    }
    out
}

fn quote(item: &str) -> String {
    if !item
        .chars()
        .any(|c| c.is_whitespace() || c == '"' || c == '\\')
    {
        return item.to_string();
    }
    let mut out = String::with_capacity(item.len() + 2);
    out.push('"');
    for c in item.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Write `content` to `dir/file_name` through a temporary sibling and a
/// rename.
pub async fn write(dir: &Path, file_name: &str, content: &str) -> io::Result<PathBuf> {
    let target = dir.join(file_name);
    let temp = dir.join(format!(".{file_name}.tmp"));

    tokio::fs::write(&temp, content).await?;
    if let Err(e) = tokio::fs::rename(&temp, &target).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e);
    }
    Ok(target)
}

/// Remove a written file. A file that is already gone is not an error.
pub async fn remove(path: &Path) {
    log_removal(path, tokio::fs::remove_file(path).await);
}

/// [`remove`] for contexts without a runtime, such as `Drop`.
pub fn remove_blocking(path: &Path) {
    log_removal(path, std::fs::remove_file(path));
}

fn log_removal(path: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => debug!(path = %path.display(), "Removed service file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove service file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_file_name_sanitization() {
        assert_eq!(
            file_name("My Test Service", "_http._tcp"),
            "My_Test_Service--http--tcp.dnssd"
        );
        assert_eq!(
            file_name("Büro/Drucker #2", "_ipp._tcp"),
            "BroDrucker_2--ipp--tcp.dnssd"
        );
        assert_eq!(file_name("a_b-c", "_x-y._udp"), "a_b-c--x-y--udp.dnssd");
    }

    #[test]
    fn test_render_plain_service() {
        let service = ServiceDefinition::new("My Test Service", "_http._tcp", 8080)
            .txt("path", "/api")
            .txt("version", "1.0");
        assert_eq!(
            render(&service),
            "[Service]\n\
             Name=My Test Service\n\
             Type=_http._tcp\n\
             Port=8080\n\
             TxtText=path=/api\n\
             TxtText=version=1.0\n"
        );
    }

    #[test]
    fn test_render_escapes_specifiers_and_quotes() {
        let mut service = ServiceDefinition::new("100% Web", "_http._tcp", 80)
            .txt("note", "two words")
            .txt("q", "say \"hi\"")
            .txt("path", "C:\\tmp");
        service.txt.set_flag("secure");

        let text = render(&service);
        assert!(text.contains("Name=100%% Web\n"));
        assert!(text.contains("TxtText=\"note=two words\"\n"));
        assert!(text.contains("TxtText=\"q=say \\\"hi\\\"\"\n"));
        assert!(text.contains("TxtText=\"path=C:\\\\tmp\"\n"));
        assert!(text.ends_with("TxtText=secure\n"));
    }

    #[test]
    fn test_render_lossy_binary_value() {
        let mut service = ServiceDefinition::new("Bin", "_x._tcp", 1);
        service.txt.set_arbitrary("raw", &[0x66, 0xff, 0x6f]);
        assert!(render(&service).contains("TxtText=raw=f\u{fffd}o\n"));
    }

    #[tokio::test]
    async fn test_write_replaces_atomically() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write(tmp.path(), "a.dnssd", "one").await.unwrap();
        assert_eq!(path, tmp.path().join("a.dnssd"));
        write(tmp.path(), "a.dnssd", "two").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");
        let names: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("a.dnssd")]);
    }

    #[tokio::test]
    async fn test_write_into_blocked_path_leaves_no_temp_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("b.dnssd")).unwrap();

        assert!(write(tmp.path(), "b.dnssd", "x").await.is_err());
        assert!(!tmp.path().join(".b.dnssd.tmp").exists());
    }

    #[tokio::test]
    async fn test_remove_tolerates_missing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write(tmp.path(), "c.dnssd", "x").await.unwrap();
        remove(&path).await;
        assert!(!path.exists());
        remove(&path).await;
        remove_blocking(&path);
    }
}

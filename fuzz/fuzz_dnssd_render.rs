//! Fuzz target for `.dnssd` file naming and rendering.
//!
//! Run with: cargo +nightly fuzz run fuzz_dnssd_render
//!
//! Whatever the service name, type, and TXT data, the file name must stay
//! inside the directory and the rendered file must keep one line per key.

#![no_main]

use avahi_compat_core::ServiceDefinition;
use avahi_compat_core::publish::artifact;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let mut parts = text.splitn(4, '\u{0}');
    let name = parts.next().unwrap_or_default();
    let service_type = parts.next().unwrap_or_default();
    let key = parts.next().unwrap_or_default();
    let value = parts.next().unwrap_or_default();

    let file_name = artifact::file_name(name, service_type);
    assert!(!file_name.contains('/'));
    assert!(!file_name.starts_with('.'));

    if key.is_empty()
        || key.contains('=')
        || name.chars().chain(service_type.chars()).any(char::is_control)
    {
        return;
    }
    let definition = ServiceDefinition::new(name, service_type, 80).txt(key, value);
    let rendered = artifact::render(&definition);
    let txt_lines = rendered.lines().filter(|l| l.starts_with("TxtText=")).count();
    assert_eq!(txt_lines, 1);
});

//! Fuzz harness for `fspath::resolve`.
//!
//! The resolver faces raw attacker input: any byte sequence the peer
//! types after `cd `. This target feeds it arbitrary current/target
//! string pairs and checks the normalization invariants hold for every
//! input: the result is root-anchored, never escapes `/`, contains no
//! `.`/`..`/empty segments, and re-resolving `.` is a fixed point.

#![no_main]
use libfuzzer_sys::fuzz_target;
use mirage_core::fspath::resolve;

fuzz_target!(|input: (&str, &str)| {
    let (current, target) = input;

    // `current` must itself be a normalized directory; derive one from
    // the fuzzed string the same way a session would.
    let current = resolve("/", current);
    let resolved = resolve(&current, target);

    assert!(resolved.starts_with('/'));
    assert!(resolved == "/" || resolved.ends_with('/'));
    assert!(!resolved.contains("//"));
    for segment in resolved.split('/') {
        assert_ne!(segment, ".");
        assert_ne!(segment, "..");
    }

    // Normalized paths are fixed points under `.`.
    assert_eq!(resolve(&resolved, "."), resolved);
});
